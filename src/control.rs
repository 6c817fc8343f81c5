// SPDX-License-Identifier: MPL-2.0

//! Cross-thread control of the presentation loop.
//!
//! ```text
//! ┌──────────────┐   trigger()   ┌───────────┐
//! │ signals      │ ────────────▶ │ Interrupt │ ──┐
//! └──────────────┘               └───────────┘   │ checked between frames
//! ┌──────────────┐   publish()   ┌───────────┐   │ and while sleeping
//! │ control file │ ────────────▶ │ Mailbox   │ ──┤
//! └──────────────┘ last wins     └───────────┘   ▼
//!                                          presentation thread
//! ```
//!
//! Neither side ever blocks the other for longer than a slot swap.

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

/// Process-wide request to stop playing. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn trigger(&self) {
        if !self.0.swap(true, Ordering::AcqRel) {
            tracing::info!("interrupt received, stopping after the current frame");
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Single-slot holder for the next image to switch to.
///
/// A new request overwrites one that has not been taken yet.
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Option<PathBuf>>,
    pending: AtomicBool,
    replaced: AtomicU64,
}

/// Shared handle to a mailbox.
pub type SharedMailbox = Arc<Mailbox>;

impl Mailbox {
    pub fn publish(&self, path: PathBuf) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(path) {
            self.replaced.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(dropped = %previous.display(), "switch request replaced");
        }
        self.pending.store(true, Ordering::Release);
    }

    /// Remove and return the pending request, if any.
    pub fn take(&self) -> Option<PathBuf> {
        if !self.is_pending() {
            return None;
        }
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        self.pending.store(false, Ordering::Release);
        slot.take()
    }

    /// Cheap check, suitable for calling once per frame.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Requests overwritten before anyone took them.
    #[must_use]
    pub fn replaced(&self) -> u64 {
        self.replaced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_is_shared_and_sticky() {
        let interrupt = Interrupt::default();
        let other = interrupt.clone();
        assert!(!interrupt.is_set());

        other.trigger();
        other.trigger();
        assert!(interrupt.is_set());
    }

    #[test]
    fn last_request_wins() {
        let mailbox = Mailbox::default();
        assert!(!mailbox.is_pending());
        assert_eq!(mailbox.take(), None);

        mailbox.publish("a.gif".into());
        mailbox.publish("b.gif".into());
        assert!(mailbox.is_pending());
        assert_eq!(mailbox.replaced(), 1);

        assert_eq!(mailbox.take(), Some(PathBuf::from("b.gif")));
        assert!(!mailbox.is_pending());
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn publish_from_another_thread() {
        let mailbox: SharedMailbox = Arc::default();
        let sender = Arc::clone(&mailbox);
        std::thread::spawn(move || sender.publish("next.png".into()))
            .join()
            .unwrap();
        assert_eq!(mailbox.take(), Some(PathBuf::from("next.png")));
    }
}
