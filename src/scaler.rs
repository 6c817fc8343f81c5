// SPDX-License-Identifier: MPL-2.0

//! Fitting decoded frames to the panel: fit, fill width, fill height, fill both.

use image::imageops::FilterType;
use led_imager_config::Fill;
use rayon::prelude::*;

use crate::decode::DecodedFrame;

/// Bounding box an image is scaled into for the given fill mode.
#[must_use]
pub fn target_box(
    image_width: u32,
    image_height: u32,
    panel_width: u32,
    panel_height: u32,
    fill: Fill,
) -> (u32, u32) {
    let width_fraction = f64::from(panel_width) / f64::from(image_width);
    let height_fraction = f64::from(panel_height) / f64::from(image_height);

    match fill {
        Fill::None => (panel_width, panel_height),
        Fill::Width => (
            panel_width,
            (width_fraction * f64::from(image_height)).round() as u32,
        ),
        Fill::Height => (
            (height_fraction * f64::from(image_width)).round() as u32,
            panel_height,
        ),
        Fill::Both => {
            let larger = width_fraction.max(height_fraction);
            (
                (larger * f64::from(image_width)).round() as u32,
                (larger * f64::from(image_height)).round() as u32,
            )
        }
    }
}

/// Largest size with the image's aspect ratio that fits in the box.
#[must_use]
pub fn fit_size(image_width: u32, image_height: u32, box_width: u32, box_height: u32) -> (u32, u32) {
    let ratio = (f64::from(box_width) / f64::from(image_width))
        .min(f64::from(box_height) / f64::from(image_height));

    (
        ((f64::from(image_width) * ratio).round() as u32).max(1),
        ((f64::from(image_height) * ratio).round() as u32).max(1),
    )
}

/// Scale every frame for a `panel_width` x `panel_height` panel.
pub fn scale_frames(
    frames: &mut [DecodedFrame],
    panel_width: u32,
    panel_height: u32,
    fill: Fill,
    filter: FilterType,
) {
    let Some(first) = frames.first() else {
        return;
    };
    let (image_width, image_height) = first.image.dimensions();
    if image_width == 0 || image_height == 0 {
        return;
    }

    let (box_width, box_height) =
        target_box(image_width, image_height, panel_width, panel_height, fill);
    let (width, height) = fit_size(image_width, image_height, box_width, box_height);
    if (width, height) == (image_width, image_height) {
        return;
    }

    tracing::trace!(
        from = ?(image_width, image_height),
        to = ?(width, height),
        frames = frames.len(),
        "scaling"
    );

    frames.par_iter_mut().for_each(|frame| {
        frame.image = image::imageops::resize(&frame.image, width, height, filter);
    });
}
