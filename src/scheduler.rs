// SPDX-License-Identifier: MPL-2.0

//! Real-time replay of a prepared source onto a display.
//!
//! One call to [`Scheduler::play`] walks a single source through
//! `Idle -> Looping -> Done`:
//!
//! ```text
//! Idle     rewind the stream, fix the end time
//! Looping  while loops remain, time remains and nobody asked to stop:
//!            read frame -> swap on vsync -> sleep (delay - swap time)
//!          rewind after every pass
//! Done     report why playback ended
//! ```

use std::time::{Duration, Instant};

use crate::{
    display::Display,
    prepare::PreparedSource,
    stream::StreamError,
};

/// Longest uninterrupted sleep, so stop requests are noticed during long waits.
pub const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Source of time for pacing playback.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Sleep for `duration`, returning early once `stop` reports true.
    fn sleep(&self, duration: Duration, stop: &dyn Fn() -> bool);
}

/// Wall clock, sleeping in [`SLEEP_SLICE`] steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration, stop: &dyn Fn() -> bool) {
        let deadline = Instant::now().checked_add(duration);

        loop {
            if stop() {
                return;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => SLEEP_SLICE,
            };
            if remaining.is_zero() {
                return;
            }
            std::thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    LoopsExhausted,
    DurationElapsed,
    Stopped,
    /// A pass ended without presenting anything.
    EmptyStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackReport {
    pub passes: u32,
    pub frames_presented: u64,
    pub reason: StopReason,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Looping { pass: u32 },
    Done { passes: u32, reason: StopReason },
}

/// Paces frames from a [`PreparedSource`] onto a [`Display`].
pub struct Scheduler<D: Display, C: Clock = SystemClock> {
    display: D,
    offscreen: D::Buffer,
    clock: C,
    vsync_multiple: u32,
}

impl<D: Display, C: Clock> Scheduler<D, C> {
    pub fn new(mut display: D, clock: C, vsync_multiple: u32) -> Self {
        let offscreen = display.offscreen();
        Self {
            display,
            offscreen,
            clock,
            vsync_multiple: vsync_multiple.max(1),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Replay `source` until its loops or duration run out, or `stop` fires.
    ///
    /// A swap in progress always completes; `stop` is checked between frames
    /// and while sleeping.
    pub fn play(
        &mut self,
        source: &mut PreparedSource,
        stop: &dyn Fn() -> bool,
    ) -> Result<PlaybackReport, StreamError> {
        let timing = source.timing;
        let mut frames_presented = 0u64;
        let mut end = None;
        let mut state = State::Idle;

        loop {
            state = match state {
                State::Idle => {
                    source.stream.rewind()?;
                    let cap = if source.is_multi_frame {
                        timing.animation_duration
                    } else {
                        timing.still_wait
                    };
                    end = self.clock.now().checked_add(cap);
                    State::Looping { pass: 0 }
                }
                State::Looping { pass } => {
                    let finished = if timing.loop_count >= 0
                        && i64::from(pass) >= i64::from(timing.loop_count)
                    {
                        Some(StopReason::LoopsExhausted)
                    } else if stop() {
                        Some(StopReason::Stopped)
                    } else if end.is_some_and(|end| self.clock.now() >= end) {
                        Some(StopReason::DurationElapsed)
                    } else {
                        None
                    };

                    match finished {
                        Some(reason) => State::Done {
                            passes: pass,
                            reason,
                        },
                        None => {
                            let presented = self.play_pass(source, end, stop)?;
                            frames_presented += presented;
                            source.stream.rewind()?;

                            if presented == 0 && !stop() {
                                State::Done {
                                    passes: pass + 1,
                                    reason: StopReason::EmptyStream,
                                }
                            } else {
                                State::Looping { pass: pass + 1 }
                            }
                        }
                    }
                }
                State::Done { passes, reason } => {
                    let report = PlaybackReport {
                        passes,
                        frames_presented,
                        reason,
                    };
                    tracing::debug!(?report, "playback finished");
                    return Ok(report);
                }
            };
        }
    }

    /// One run through the stream. Returns the number of frames presented.
    fn play_pass(
        &mut self,
        source: &mut PreparedSource,
        end: Option<Instant>,
        stop: &dyn Fn() -> bool,
    ) -> Result<u64, StreamError> {
        let override_delay = source.timing.frame_delay_override;
        let mut presented = 0;

        while !stop() && !end.is_some_and(|end| self.clock.now() > end) {
            let Some(authored) = source.stream.read_next(&mut self.offscreen)? else {
                break;
            };
            let delay = override_delay.unwrap_or(authored);

            let swap_started = self.clock.now();
            self.display
                .swap_on_vsync(&mut self.offscreen, self.vsync_multiple);
            presented += 1;

            let spent = self.clock.now().saturating_duration_since(swap_started);
            self.clock.sleep(delay.saturating_sub(spent), stop);
        }

        Ok(presented)
    }
}
