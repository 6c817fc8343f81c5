// SPDX-License-Identifier: MPL-2.0

//! Pixel surfaces frames are drawn into before being swapped onto the panel.

/// Bytes per pixel of the packed RGB layout used by [`Canvas`] and the stream codec.
pub const BYTES_PER_PIXEL: usize = 3;

/// Addressable pixel surface covering one full panel image.
///
/// Coordinates outside the surface are ignored, so callers may draw images
/// larger than the panel or offset partly off-screen.
pub trait FrameBuffer {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Set every pixel to black.
    fn clear(&mut self);

    fn set_pixel(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8);

    /// Overwrite the whole surface from packed row-major RGB bytes.
    ///
    /// `rgb` holds exactly `width * height * 3` bytes.
    fn fill_rgb(&mut self, rgb: &[u8]) {
        let width = self.width() as usize;
        for (pos, pixel) in rgb.chunks_exact(BYTES_PER_PIXEL).enumerate() {
            let (x, y) = (pos % width, pos / width);
            self.set_pixel(x as i32, y as i32, pixel[0], pixel[1], pixel[2]);
        }
    }
}

/// In-memory RGB frame buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    /// Packed row-major RGB bytes.
    #[must_use]
    pub fn as_rgb(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let index = self.index(x as i32, y as i32)?;
        Some([self.data[index], self.data[index + 1], self.data[index + 2]])
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL)
    }
}

impl FrameBuffer for Canvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.data.fill(0);
    }

    fn set_pixel(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8) {
        if let Some(index) = self.index(x, y) {
            self.data[index..index + BYTES_PER_PIXEL].copy_from_slice(&[r, g, b]);
        }
    }

    fn fill_rgb(&mut self, rgb: &[u8]) {
        self.data.copy_from_slice(rgb);
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_read_pixel() {
        let mut canvas = Canvas::new(4, 3);
        canvas.set_pixel(2, 1, 10, 20, 30);
        assert_eq!(canvas.pixel(2, 1), Some([10, 20, 30]));
        assert_eq!(canvas.pixel(1, 2), Some([0, 0, 0]));
        assert_eq!(canvas.as_rgb().len(), 4 * 3 * 3);
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut canvas = Canvas::new(2, 2);
        canvas.set_pixel(-1, 0, 255, 255, 255);
        canvas.set_pixel(0, 2, 255, 255, 255);
        canvas.set_pixel(2, 0, 255, 255, 255);
        assert!(canvas.as_rgb().iter().all(|&b| b == 0));
        assert_eq!(canvas.pixel(2, 0), None);
    }

    #[test]
    fn clear_blackens() {
        let mut canvas = Canvas::new(2, 2);
        canvas.set_pixel(1, 1, 1, 2, 3);
        canvas.clear();
        assert_eq!(canvas.pixel(1, 1), Some([0, 0, 0]));
    }

    /// Exercises the default `fill_rgb` that goes through `set_pixel`.
    struct PixelLog(Vec<(i32, i32, [u8; 3])>);

    impl FrameBuffer for PixelLog {
        fn width(&self) -> u32 {
            2
        }

        fn height(&self) -> u32 {
            2
        }

        fn clear(&mut self) {
            self.0.clear();
        }

        fn set_pixel(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8) {
            self.0.push((x, y, [r, g, b]));
        }
    }

    #[test]
    fn default_fill_is_row_major() {
        let mut log = PixelLog(Vec::new());
        let rgb: Vec<u8> = (0..12).collect();
        log.fill_rgb(&rgb);
        assert_eq!(
            log.0,
            vec![
                (0, 0, [0, 1, 2]),
                (1, 0, [3, 4, 5]),
                (0, 1, [6, 7, 8]),
                (1, 1, [9, 10, 11]),
            ]
        );
    }
}
