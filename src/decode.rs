// SPDX-License-Identifier: MPL-2.0

//! Image and animation decoding.

use std::{fs::File, io::BufReader, path::Path, time::Duration};

use eyre::{OptionExt, eyre};
use image::{
    AnimationDecoder, DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, RgbImage,
    RgbaImage,
    codecs::{gif::GifDecoder, png::PngDecoder, webp::WebPDecoder},
};
use jxl_oxide::{EnumColourEncoding, JxlImage, PixelFormat};

/// One raster of an image sequence with its authored display delay.
#[derive(Clone)]
pub struct DecodedFrame {
    pub image: RgbaImage,
    /// Zero for still images and for animation frames without timing.
    pub delay: Duration,
}

impl std::fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedFrame")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .field("delay", &self.delay)
            .finish()
    }
}

/// Decode a still image or every frame of an animation.
///
/// Animation frames come back fully composited, so GIF disposal modes are
/// already applied.
pub fn decode(path: &Path) -> eyre::Result<Vec<DecodedFrame>> {
    let frames = match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("jxl") => vec![still(decode_jpegxl(path)?)],
        _ => decode_with_image(path)?,
    };

    if frames.is_empty() {
        return Err(eyre!("no image found"));
    }

    tracing::debug!(path = %path.display(), frames = frames.len(), "decoded");
    Ok(frames)
}

fn decode_with_image(path: &Path) -> eyre::Result<Vec<DecodedFrame>> {
    let format = ImageReader::open(path)?.with_guessed_format()?.format();

    match format {
        Some(ImageFormat::Gif) => animation(GifDecoder::new(buffered(path)?)?),
        Some(ImageFormat::Png) => {
            let decoder = PngDecoder::new(buffered(path)?)?;
            if decoder.is_apng()? {
                animation(decoder.apng()?)
            } else {
                decode_still(path)
            }
        }
        Some(ImageFormat::WebP) => {
            let decoder = WebPDecoder::new(buffered(path)?)?;
            if decoder.has_animation() {
                animation(decoder)
            } else {
                decode_still(path)
            }
        }
        Some(_) => decode_still(path),
        None => Err(eyre!("unrecognized image format")),
    }
}

fn buffered(path: &Path) -> std::io::Result<BufReader<File>> {
    File::open(path).map(BufReader::new)
}

fn decode_still(path: &Path) -> eyre::Result<Vec<DecodedFrame>> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(vec![still(image)])
}

fn still(image: DynamicImage) -> DecodedFrame {
    DecodedFrame {
        image: image.into_rgba8(),
        delay: Duration::ZERO,
    }
}

fn animation<'a>(decoder: impl AnimationDecoder<'a>) -> eyre::Result<Vec<DecodedFrame>> {
    let frames = decoder.into_frames().collect_frames()?;

    Ok(frames
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            DecodedFrame {
                delay: delay_from_ratio(numer, denom),
                image: frame.into_buffer(),
            }
        })
        .collect())
}

/// GIF delays are authored in hundredths of a second; `image` hands them over
/// as a millisecond ratio.
fn delay_from_ratio(numer_ms: u32, denom: u32) -> Duration {
    if denom == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(u64::from(numer_ms) * 1000 / u64::from(denom))
}

/// Decodes JPEG XL image files into `image::DynamicImage` via `jxl-oxide`.
fn decode_jpegxl(path: &Path) -> eyre::Result<DynamicImage> {
    let mut image = JxlImage::builder()
        .open(path)
        .map_err(|why| eyre!("failed to read image header: {why}"))?;

    image.request_color_encoding(EnumColourEncoding::srgb(
        jxl_oxide::RenderingIntent::Relative,
    ));

    let render = image
        .render_frame(0)
        .map_err(|why| eyre!("failed to render image frame: {why}"))?;

    let framebuffer = render.image_all_channels();
    let (width, height) = (framebuffer.width() as u32, framebuffer.height() as u32);
    let samples = framebuffer
        .buf()
        .iter()
        .map(|x| (x * 255. + 0.5) as u8)
        .collect::<Vec<_>>();

    match image.pixel_format() {
        PixelFormat::Graya => GrayAlphaImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageLumaA8)
            .ok_or_eyre("Can't decode gray alpha buffer"),
        PixelFormat::Gray => GrayImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageLuma8)
            .ok_or_eyre("Can't decode gray buffer"),
        PixelFormat::Rgba => RgbaImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageRgba8)
            .ok_or_eyre("Can't decode rgba buffer"),
        PixelFormat::Rgb => RgbImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageRgb8)
            .ok_or_eyre("Can't decode rgb buffer"),
        PixelFormat::Cmyk => Err(eyre!("unsupported pixel format: CMYK")),
        PixelFormat::Cmyka => Err(eyre!("unsupported pixel format: CMYKA")),
    }
}
