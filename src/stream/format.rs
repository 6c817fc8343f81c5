// SPDX-License-Identifier: MPL-2.0

//! Binary layout of a single frame record.

use std::time::Duration;

use crate::canvas::BYTES_PER_PIXEL;

/// Magic bytes opening every frame record.
pub const RECORD_MAGIC: &[u8; 4] = b"LEDF";

/// Header preceding the pixel payload of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub width: u16,
    pub height: u16,
    /// Display delay in microseconds.
    pub delay_us: u64,
    /// Payload length in bytes.
    pub size: u32,
}

impl RecordHeader {
    /// Magic(4) + Width(2) + Height(2) + Delay(8) + Size(4) = 20
    pub const SIZE: usize = 20;

    /// Header for a packed RGB frame, or `None` if it cannot be represented.
    pub fn for_frame(width: u32, height: u32, delay: Duration) -> Option<Self> {
        let width = u16::try_from(width).ok()?;
        let height = u16::try_from(height).ok()?;
        let size = u32::try_from(payload_size(width, height)).ok()?;

        Some(Self {
            width,
            height,
            delay_us: u64::try_from(delay.as_micros()).unwrap_or(u64::MAX),
            size,
        })
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_micros(self.delay_us)
    }

    /// Payload length implied by the frame dimensions.
    #[must_use]
    pub fn expected_size(&self) -> usize {
        payload_size(self.width, self.height)
    }

    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(RECORD_MAGIC);
        out[4..6].copy_from_slice(&self.width.to_le_bytes());
        out[6..8].copy_from_slice(&self.height.to_le_bytes());
        out[8..16].copy_from_slice(&self.delay_us.to_le_bytes());
        out[16..20].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    /// Parse a header, rejecting anything that does not start with [`RECORD_MAGIC`].
    pub fn decode(raw: &[u8; Self::SIZE]) -> Result<Self, String> {
        if &raw[0..4] != RECORD_MAGIC {
            return Err(format!("bad record magic {:02x?}", &raw[0..4]));
        }

        Ok(Self {
            width: u16::from_le_bytes([raw[4], raw[5]]),
            height: u16::from_le_bytes([raw[6], raw[7]]),
            delay_us: u64::from_le_bytes([
                raw[8], raw[9], raw[10], raw[11], raw[12], raw[13], raw[14], raw[15],
            ]),
            size: u32::from_le_bytes([raw[16], raw[17], raw[18], raw[19]]),
        })
    }
}

fn payload_size(width: u16, height: u16) -> usize {
    usize::from(width) * usize::from(height) * BYTES_PER_PIXEL
}
