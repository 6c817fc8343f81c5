// SPDX-License-Identifier: MPL-2.0

//! Write-once, read-many frame stream.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use super::format::RecordHeader;
use crate::canvas::{Canvas, FrameBuffer};

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt stream at byte {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },
    #[error("stream is being read, no more frames can be written")]
    Sealed,
    #[error("a {width}x{height} frame does not fit in a stream record")]
    FrameTooLarge { width: u32, height: u32 },
}

fn corrupt(offset: u64, reason: impl Into<String>) -> StreamError {
    StreamError::Corrupt {
        offset,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Write,
    Read,
}

enum FileBacking {
    Writing(BufWriter<File>),
    Reading(BufReader<File>),
    /// Only observed if switching phases failed halfway.
    Closed,
}

enum Backing {
    Memory(Vec<u8>),
    File(FileBacking),
}

/// Sequence of `(frame, delay)` records.
///
/// A stream starts in write phase, accepting [`write`](Self::write) calls.
/// The first [`read_next`](Self::read_next) or [`rewind`](Self::rewind)
/// seals it; from then on it can be replayed any number of times but not
/// extended.
pub struct FrameStream {
    backing: Backing,
    phase: Phase,
    /// Bytes written so far, or readable bytes once sealed.
    len: u64,
    cursor: u64,
    frames_written: usize,
    /// Payload buffer for file reads, reused across frames.
    scratch: Vec<u8>,
    path: Option<PathBuf>,
}

impl FrameStream {
    /// Memory-resident stream for immediate playback.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_backing(Backing::Memory(Vec::new()), Phase::Write, 0, None)
    }

    /// Create (or truncate) a durable stream file in write phase.
    pub fn create(path: &Path) -> Result<Self, StreamError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self::with_backing(
            Backing::File(FileBacking::Writing(BufWriter::new(file))),
            Phase::Write,
            0,
            Some(path.to_path_buf()),
        ))
    }

    /// Open an existing stream file for replay.
    pub fn open(path: &Path) -> Result<Self, StreamError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        Ok(Self::with_backing(
            Backing::File(FileBacking::Reading(BufReader::new(file))),
            Phase::Read,
            len,
            Some(path.to_path_buf()),
        ))
    }

    fn with_backing(backing: Backing, phase: Phase, len: u64, path: Option<PathBuf>) -> Self {
        Self {
            backing,
            phase,
            len,
            cursor: 0,
            frames_written: 0,
            scratch: Vec::new(),
            path,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records appended through this handle.
    #[must_use]
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Append one frame with its display delay.
    pub fn write(&mut self, frame: &Canvas, delay: Duration) -> Result<(), StreamError> {
        if self.phase == Phase::Read {
            return Err(StreamError::Sealed);
        }

        let header = RecordHeader::for_frame(frame.width(), frame.height(), delay).ok_or(
            StreamError::FrameTooLarge {
                width: frame.width(),
                height: frame.height(),
            },
        )?;
        let pixels = frame.as_rgb();

        match &mut self.backing {
            Backing::Memory(data) => {
                data.extend_from_slice(&header.encode());
                data.extend_from_slice(pixels);
            }
            Backing::File(FileBacking::Writing(writer)) => {
                writer.write_all(&header.encode())?;
                writer.write_all(pixels)?;
            }
            Backing::File(_) => return Err(StreamError::Sealed),
        }

        self.len += (RecordHeader::SIZE + pixels.len()) as u64;
        self.frames_written += 1;
        Ok(())
    }

    /// Push buffered records of a durable stream to disk.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        if let Backing::File(FileBacking::Writing(writer)) = &mut self.backing {
            writer.flush()?;
        }
        Ok(())
    }

    /// Leave write phase. Idempotent.
    fn seal(&mut self) -> Result<(), StreamError> {
        if self.phase == Phase::Read {
            return Ok(());
        }

        if let Backing::File(file) = &mut self.backing {
            let FileBacking::Writing(writer) = std::mem::replace(file, FileBacking::Closed) else {
                return Err(StreamError::Sealed);
            };
            let mut handle = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
            handle.seek(SeekFrom::Start(0))?;
            *file = FileBacking::Reading(BufReader::new(handle));
        }

        tracing::trace!(bytes = self.len, frames = self.frames_written, "frame stream sealed");
        self.phase = Phase::Read;
        self.cursor = 0;
        Ok(())
    }

    /// Move the read cursor back to the first record.
    pub fn rewind(&mut self) -> Result<(), StreamError> {
        self.seal()?;
        if let Backing::File(FileBacking::Reading(reader)) = &mut self.backing {
            reader.seek(SeekFrom::Start(0))?;
        }
        self.cursor = 0;
        Ok(())
    }

    /// Decode the next record straight into `buffer`.
    ///
    /// Returns the record's delay, or `None` once every record has been read.
    pub fn read_next<B>(&mut self, buffer: &mut B) -> Result<Option<Duration>, StreamError>
    where
        B: FrameBuffer + ?Sized,
    {
        self.seal()?;

        let offset = self.cursor;
        let remaining = self.len.saturating_sub(offset);
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < RecordHeader::SIZE as u64 {
            return Err(corrupt(
                offset,
                format!("truncated record header ({remaining} bytes left)"),
            ));
        }

        let mut raw = [0u8; RecordHeader::SIZE];
        match &mut self.backing {
            Backing::Memory(data) => {
                let start = offset as usize;
                raw.copy_from_slice(&data[start..start + RecordHeader::SIZE]);
            }
            Backing::File(FileBacking::Reading(reader)) => reader.read_exact(&mut raw)?,
            Backing::File(_) => return Err(StreamError::Sealed),
        }

        let header = RecordHeader::decode(&raw).map_err(|reason| corrupt(offset, reason))?;
        let size = header.size as usize;
        let available = remaining - RecordHeader::SIZE as u64;

        if size as u64 > available {
            return Err(corrupt(
                offset,
                format!("record declares {size} bytes but only {available} remain"),
            ));
        }
        if size != header.expected_size() {
            return Err(corrupt(
                offset,
                format!(
                    "record declares {size} bytes for a {}x{} frame",
                    header.width, header.height
                ),
            ));
        }
        if u32::from(header.width) != buffer.width() || u32::from(header.height) != buffer.height()
        {
            return Err(corrupt(
                offset,
                format!(
                    "{}x{} frame does not match the {}x{} buffer",
                    header.width,
                    header.height,
                    buffer.width(),
                    buffer.height()
                ),
            ));
        }

        match &mut self.backing {
            Backing::Memory(data) => {
                let start = offset as usize + RecordHeader::SIZE;
                buffer.fill_rgb(&data[start..start + size]);
            }
            Backing::File(FileBacking::Reading(reader)) => {
                self.scratch.resize(size, 0);
                reader.read_exact(&mut self.scratch)?;
                buffer.fill_rgb(&self.scratch);
            }
            Backing::File(_) => return Err(StreamError::Sealed),
        }

        self.cursor += (RecordHeader::SIZE + size) as u64;
        Ok(Some(header.delay()))
    }

    /// Replay the remaining records of this stream into `sink`.
    ///
    /// `scratch` must have the stream's frame dimensions. Returns the number
    /// of records copied.
    pub fn copy_into(
        &mut self,
        sink: &mut FrameStream,
        scratch: &mut Canvas,
    ) -> Result<usize, StreamError> {
        let mut copied = 0;
        while let Some(delay) = self.read_next(scratch)? {
            sink.write(scratch, delay)?;
            copied += 1;
        }
        Ok(copied)
    }
}

impl std::fmt::Debug for FrameStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStream")
            .field("path", &self.path)
            .field("phase", &self.phase)
            .field("len", &self.len)
            .field("cursor", &self.cursor)
            .field("frames_written", &self.frames_written)
            .finish()
    }
}
