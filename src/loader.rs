// SPDX-License-Identifier: MPL-2.0

//! Load phase: turn an input path into a [`PreparedSource`].

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use image::imageops::FilterType;
use led_imager_config::{Fill, TimingParams};
use walkdir::WalkDir;

use crate::{
    canvas::Canvas,
    decode,
    error::Error,
    prepare::{PreparedSource, abandon_mirror, prepare},
    scaler,
    stream::{FrameStream, RECORD_MAGIC, StreamError},
};

/// Decodes, scales and packs inputs for one panel size.
pub struct Loader {
    width: u32,
    height: u32,
    center: bool,
    fill: Fill,
    filter: FilterType,
    /// Scratch surface for compositing; never shown.
    canvas: Canvas,
    /// Receives a copy of every prepared record when exporting.
    mirror: Option<FrameStream>,
}

impl Loader {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            center: false,
            fill: Fill::None,
            filter: FilterType::Lanczos3,
            canvas: Canvas::new(width, height),
            mirror: None,
        }
    }

    #[must_use]
    pub fn center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    #[must_use]
    pub fn fill(mut self, fill: Fill) -> Self {
        self.fill = fill;
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn mirror(mut self, mirror: FrameStream) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Flush the export stream, if any. Exporting stops if that fails.
    pub fn flush(&mut self) -> Result<(), Error> {
        let Some(mirror) = self.mirror.as_mut() else {
            return Ok(());
        };
        let path = mirror.path().map(Path::to_path_buf).unwrap_or_default();
        mirror.flush().map_err(|err| {
            self.mirror = None;
            Error::stream(path, err)
        })
    }

    /// Prepare one input for playback.
    ///
    /// Anything the image decoder rejects is retried as a previously
    /// exported frame stream.
    pub fn load(&mut self, path: &Path, timing: TimingParams) -> Result<PreparedSource, Error> {
        let source = match decode::decode(path) {
            Ok(mut frames) => {
                scaler::scale_frames(&mut frames, self.width, self.height, self.fill, self.filter);
                prepare(
                    &frames,
                    timing,
                    &mut self.canvas,
                    self.center,
                    &mut self.mirror,
                )
                .map_err(|err| Error::stream(path, err))?
            }
            Err(decode_err) => match self.load_stream(path, timing) {
                Ok(source) => source,
                Err(stream_err) if starts_with_magic(path) => {
                    return Err(Error::stream(path, stream_err));
                }
                Err(stream_err) => {
                    tracing::debug!(path = %path.display(), %stream_err, "not a frame stream either");
                    return Err(Error::Decode {
                        path: path.to_path_buf(),
                        message: decode_err.to_string(),
                    });
                }
            },
        };

        tracing::info!(
            path = %path.display(),
            multi_frame = source.is_multi_frame,
            "loaded"
        );
        Ok(source)
    }

    fn load_stream(
        &mut self,
        path: &Path,
        timing: TimingParams,
    ) -> Result<PreparedSource, StreamError> {
        let mut stream = FrameStream::open(path)?;

        if stream.read_next(&mut self.canvas)?.is_none() {
            return Err(StreamError::Corrupt {
                offset: 0,
                reason: "stream holds no frames".into(),
            });
        }
        let is_multi_frame = stream.read_next(&mut self.canvas)?.is_some();
        stream.rewind()?;

        if let Some(mirror) = self.mirror.as_mut() {
            match stream.copy_into(mirror, &mut self.canvas) {
                Ok(copied) => tracing::debug!(path = %path.display(), copied, "mirrored stream"),
                Err(err) => abandon_mirror(&mut self.mirror, &err),
            }
            stream.rewind()?;
        }

        Ok(PreparedSource {
            timing,
            is_multi_frame,
            stream,
        })
    }
}

fn starts_with_magic(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut magic))
        .is_ok_and(|()| &magic == RECORD_MAGIC)
}

/// Files an input names: itself, or every file below a directory sorted by path.
#[must_use]
pub fn expand(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::FrameBuffer;
    use image::{Rgba, RgbaImage};
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32, rgba: [u8; 4]) {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
            .save(path)
            .unwrap();
    }

    #[test]
    fn loads_and_scales_a_still() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, 8, 4, [90, 80, 70, 255]);

        let mut loader = Loader::new(4, 4).filter(FilterType::Nearest);
        let mut source = loader.load(&path, TimingParams::default()).unwrap();
        assert!(!source.is_multi_frame);

        let mut canvas = Canvas::new(4, 4);
        let delay = source.stream.read_next(&mut canvas).unwrap();
        assert_eq!(delay, Some(TimingParams::default().still_wait));
        // Scaled to 4x2 and drawn at the top.
        assert_eq!(canvas.pixel(3, 1), Some([90, 80, 70]));
        assert_eq!(canvas.pixel(3, 2), Some([0, 0, 0]));
    }

    #[test]
    fn centers_when_asked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, 8, 4, [90, 80, 70, 255]);

        let mut loader = Loader::new(4, 4).center(true).filter(FilterType::Nearest);
        let mut source = loader.load(&path, TimingParams::default()).unwrap();

        let mut canvas = Canvas::new(4, 4);
        source.stream.read_next(&mut canvas).unwrap();
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0]));
        assert_eq!(canvas.pixel(0, 1), Some([90, 80, 70]));
        assert_eq!(canvas.pixel(0, 2), Some([90, 80, 70]));
        assert_eq!(canvas.pixel(0, 3), Some([0, 0, 0]));
    }

    #[test]
    fn reads_back_an_exported_stream() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.stream");

        let mut stream = FrameStream::create(&path).unwrap();
        let mut frame = Canvas::new(2, 2);
        frame.set_pixel(0, 0, 1, 2, 3);
        stream.write(&frame, Duration::from_millis(30)).unwrap();
        stream.write(&frame, Duration::from_millis(40)).unwrap();
        stream.flush().unwrap();
        drop(stream);

        let mut loader = Loader::new(2, 2);
        let mut source = loader.load(&path, TimingParams::default()).unwrap();
        assert!(source.is_multi_frame);

        let mut canvas = Canvas::new(2, 2);
        assert_eq!(
            source.stream.read_next(&mut canvas).unwrap(),
            Some(Duration::from_millis(30))
        );
        assert_eq!(canvas, frame);
    }

    #[test]
    fn single_record_stream_is_a_still() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("one.stream");
        let mut stream = FrameStream::create(&path).unwrap();
        stream.write(&Canvas::new(2, 2), Duration::from_secs(1)).unwrap();
        stream.flush().unwrap();
        drop(stream);

        let source = Loader::new(2, 2).load(&path, TimingParams::default()).unwrap();
        assert!(!source.is_multi_frame);
    }

    #[test]
    fn unreadable_input_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not an image").unwrap();

        let err = Loader::new(2, 2)
            .load(&path, TimingParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "{err}");
        assert!(err.to_string().starts_with(&path.display().to_string()));
    }

    #[test]
    fn stream_for_another_panel_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.stream");
        let mut stream = FrameStream::create(&path).unwrap();
        stream.write(&Canvas::new(8, 8), Duration::ZERO).unwrap();
        stream.flush().unwrap();
        drop(stream);

        let err = Loader::new(2, 2)
            .load(&path, TimingParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::CorruptStream { .. }), "{err}");
    }

    #[test]
    fn mirror_collects_everything_loaded() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("a.png");
        write_png(&image, 2, 2, [5, 5, 5, 255]);
        let export = dir.path().join("all.stream");

        let mut loader = Loader::new(2, 2).mirror(FrameStream::create(&export).unwrap());
        loader.load(&image, TimingParams::default()).unwrap();
        loader.load(&image, TimingParams::default()).unwrap();
        loader.flush().unwrap();

        let len = std::fs::metadata(&export).unwrap().len();
        assert_eq!(len, 2 * (20 + 2 * 2 * 3));
    }

    #[test]
    fn failed_export_stops_without_failing_the_load() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("a.png");
        write_png(&image, 2, 2, [5, 5, 5, 255]);

        let mut sealed = FrameStream::in_memory();
        sealed.rewind().unwrap();
        let mut loader = Loader::new(2, 2).mirror(sealed);

        let source = loader.load(&image, TimingParams::default()).unwrap();
        assert!(!source.is_multi_frame);
        assert!(loader.mirror.is_none());
        loader.flush().unwrap();
    }

    #[test]
    fn failed_stream_copy_stops_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.stream");
        let mut stream = FrameStream::create(&path).unwrap();
        stream.write(&Canvas::new(2, 2), Duration::from_millis(30)).unwrap();
        stream.write(&Canvas::new(2, 2), Duration::from_millis(40)).unwrap();
        stream.flush().unwrap();
        drop(stream);

        let mut sealed = FrameStream::in_memory();
        sealed.rewind().unwrap();
        let mut loader = Loader::new(2, 2).mirror(sealed);

        let mut source = loader.load(&path, TimingParams::default()).unwrap();
        assert!(loader.mirror.is_none());

        // The source itself is rewound and complete.
        let mut canvas = Canvas::new(2, 2);
        assert_eq!(
            source.stream.read_next(&mut canvas).unwrap(),
            Some(Duration::from_millis(30))
        );
    }

    #[test]
    fn directories_expand_sorted() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        for name in ["b.png", "a.png", "sub/c.png"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let files = expand(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.png"),
                PathBuf::from("b.png"),
                PathBuf::from("sub/c.png")
            ]
        );

        let single = dir.path().join("a.png");
        assert_eq!(expand(&single), vec![single]);
    }
}
