// SPDX-License-Identifier: MPL-2.0

//! Frame stream codec.
//!
//! Decoded images are packed once into a stream of frame records and then
//! replayed as often as the timing parameters ask for, without touching the
//! image decoder again. A stream lives either in memory, for immediate
//! playback, or in a file, for exporting and replaying later.
//!
//! # File Format
//!
//! A stream is a plain sequence of records, no global header:
//!
//! ```text
//! Record header (20 bytes, little endian):
//!   Magic: "LEDF" (4 bytes)
//!   Width: u16
//!   Height: u16
//!   Delay: u64 (microseconds)
//!   Size: u32 (payload bytes, width * height * 3)
//!
//! Payload (Size bytes):
//!   Packed row-major RGB
//! ```

mod codec;
mod format;

pub use codec::{FrameStream, StreamError};
pub use format::{RECORD_MAGIC, RecordHeader};
