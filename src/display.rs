// SPDX-License-Identifier: MPL-2.0

//! Double-buffered panel surfaces.

use std::time::{Duration, Instant};

use crate::canvas::{Canvas, FrameBuffer};

/// A panel that shows one buffer while the next frame is drawn into another.
pub trait Display {
    type Buffer: FrameBuffer;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// A fresh back buffer matching the panel size.
    fn offscreen(&mut self) -> Self::Buffer;

    /// Present `buffer` at the next `vsync_multiple`-th refresh.
    ///
    /// Blocks until the swap happened. Afterwards `buffer` holds the
    /// previously visible frame and can be drawn into again.
    fn swap_on_vsync(&mut self, buffer: &mut Self::Buffer, vsync_multiple: u32);

    /// Blank the visible frame.
    fn clear(&mut self);
}

/// Software panel that keeps vertical refresh timing without hardware.
pub struct VirtualPanel {
    front: Canvas,
    refresh_period: Duration,
    epoch: Instant,
    /// Refresh index of the last swap.
    last_refresh: Option<u64>,
    swaps: u64,
}

impl VirtualPanel {
    #[must_use]
    pub fn new(width: u32, height: u32, refresh_rate_hz: u32) -> Self {
        let refresh_period = Duration::from_secs_f64(1.0 / f64::from(refresh_rate_hz.max(1)));
        tracing::info!(width, height, refresh_rate_hz, "virtual panel ready");

        Self {
            front: Canvas::new(width, height),
            refresh_period,
            epoch: Instant::now(),
            last_refresh: None,
            swaps: 0,
        }
    }

    /// The frame currently on the panel.
    #[cfg(test)]
    #[must_use]
    pub fn front(&self) -> &Canvas {
        &self.front
    }

    #[must_use]
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// When refresh number `index` starts.
    fn refresh_due(&self, index: u64) -> Option<Instant> {
        let nanos = self
            .refresh_period
            .as_nanos()
            .saturating_mul(u128::from(index));
        self.epoch
            .checked_add(Duration::from_nanos(u64::try_from(nanos).ok()?))
    }

    fn refresh_index(&self, at: Instant) -> u64 {
        let elapsed = at.saturating_duration_since(self.epoch).as_nanos();
        (elapsed / self.refresh_period.as_nanos().max(1)) as u64
    }
}

impl Display for VirtualPanel {
    type Buffer = Canvas;

    fn width(&self) -> u32 {
        self.front.width()
    }

    fn height(&self) -> u32 {
        self.front.height()
    }

    fn offscreen(&mut self) -> Canvas {
        Canvas::new(self.front.width(), self.front.height())
    }

    fn swap_on_vsync(&mut self, buffer: &mut Canvas, vsync_multiple: u32) {
        let current = self.refresh_index(Instant::now());
        let target = match self.last_refresh {
            Some(last) => (last + u64::from(vsync_multiple.max(1))).max(current + 1),
            None => current + 1,
        };

        if let Some(due) = self.refresh_due(target) {
            let wait = due.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
        }

        std::mem::swap(&mut self.front, buffer);
        self.last_refresh = Some(target);
        self.swaps += 1;
        tracing::trace!(refresh = target, swaps = self.swaps, "swapped");
    }

    fn clear(&mut self) {
        self.front.clear();
    }
}
