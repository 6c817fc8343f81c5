// SPDX-License-Identifier: MPL-2.0

//! Packing decoded frames into a replayable stream.

use std::time::Duration;

use image::RgbaImage;
use led_imager_config::TimingParams;

use crate::{
    canvas::{Canvas, FrameBuffer},
    decode::DecodedFrame,
    stream::{FrameStream, StreamError},
};

/// Frames without a usable authored delay are shown this long.
pub const FALLBACK_FRAME_DELAY: Duration = Duration::from_millis(100);

/// A decoded input, ready to be replayed any number of times.
#[derive(Debug)]
pub struct PreparedSource {
    pub timing: TimingParams,
    pub is_multi_frame: bool,
    pub stream: FrameStream,
}

/// Display delay of one frame before any override is applied.
fn frame_delay(frame: &DecodedFrame, is_multi_frame: bool, timing: &TimingParams) -> Duration {
    let delay = if is_multi_frame {
        frame.delay
    } else {
        timing.still_wait
    };

    if delay.is_zero() {
        FALLBACK_FRAME_DELAY
    } else {
        delay
    }
}

/// Draw the opaque pixels of `image` onto `canvas`.
///
/// Nothing is cleared first: translucent pixels leave whatever the canvas
/// already holds.
pub fn composite<B: FrameBuffer + ?Sized>(canvas: &mut B, image: &RgbaImage, center: bool) {
    let (x_offset, y_offset) = if center {
        (
            (i64::from(canvas.width()) - i64::from(image.width())) / 2,
            (i64::from(canvas.height()) - i64::from(image.height())) / 2,
        )
    } else {
        (0, 0)
    };

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        if a < u8::MAX {
            continue;
        }
        let (Ok(x), Ok(y)) = (
            i32::try_from(i64::from(x) + x_offset),
            i32::try_from(i64::from(y) + y_offset),
        ) else {
            continue;
        };
        canvas.set_pixel(x, y, r, g, b);
    }
}

/// Stop exporting for good. Anything appended after a failed write would
/// follow a possibly truncated record.
pub fn abandon_mirror(mirror: &mut Option<FrameStream>, err: &StreamError) {
    if let Some(dropped) = mirror.take() {
        tracing::warn!(
            path = ?dropped.path(),
            error = %err,
            frames = dropped.frames_written(),
            "export failed, no further frames are exported"
        );
    }
}

/// Composite every frame onto `canvas` and store the snapshots in a fresh
/// memory stream, plus `mirror` when exporting.
///
/// A failing mirror is dropped; the source itself is still prepared.
pub fn prepare(
    frames: &[DecodedFrame],
    timing: TimingParams,
    canvas: &mut Canvas,
    center: bool,
    mirror: &mut Option<FrameStream>,
) -> Result<PreparedSource, StreamError> {
    let is_multi_frame = frames.len() > 1;
    let mut stream = FrameStream::in_memory();

    for frame in frames {
        let delay = frame_delay(frame, is_multi_frame, &timing);

        canvas.clear();
        composite(canvas, &frame.image, center);

        stream.write(canvas, delay)?;
        if let Some(sink) = mirror.as_mut() {
            if let Err(err) = sink.write(canvas, delay) {
                abandon_mirror(mirror, &err);
            }
        }
    }

    tracing::debug!(
        frames = stream.frames_written(),
        is_multi_frame,
        mirrored = mirror.is_some(),
        "prepared source"
    );

    Ok(PreparedSource {
        timing,
        is_multi_frame,
        stream,
    })
}
