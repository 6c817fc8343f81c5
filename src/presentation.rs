// SPDX-License-Identifier: MPL-2.0

//! The play-list and the loop that walks it.

use std::path::{Path, PathBuf};

use led_imager_config::{DISTANT_FUTURE, TimingParams};
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::{
    control::{Interrupt, SharedMailbox},
    display::Display,
    error::Error,
    loader::{Loader, expand},
    prepare::PreparedSource,
    scheduler::{Clock, Scheduler, SystemClock},
};

pub struct PlaylistEntry {
    pub path: PathBuf,
    pub source: PreparedSource,
}

impl std::fmt::Debug for PlaylistEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistEntry")
            .field("path", &self.path)
            .field("timing", &self.source.timing)
            .field("is_multi_frame", &self.source.is_multi_frame)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PresentOptions {
    pub forever: bool,
    pub shuffle: bool,
    /// Timing for sources loaded in response to a switch request.
    pub default_timing: TimingParams,
}

/// Keep every entry of a multi-source play-list from hogging the panel,
/// and keep a lone source up for good.
pub fn apply_playlist_policy(entries: &mut [PlaylistEntry]) {
    if let [only] = entries {
        only.source.timing.still_wait = DISTANT_FUTURE;
        return;
    }

    for entry in entries {
        let timing = &mut entry.source.timing;
        if timing.loops_forever() && timing.unbounded_duration() {
            debug!(path = %entry.path.display(), "limiting endless source to one loop");
            timing.loop_count = 1;
        }
    }
}

/// Everything one presentation run needs, built once at startup.
pub struct Session {
    playlist: Vec<PlaylistEntry>,
    options: PresentOptions,
    loader: Loader,
    interrupt: Interrupt,
    mailbox: SharedMailbox,
}

impl Session {
    pub fn new(
        loader: Loader,
        options: PresentOptions,
        interrupt: Interrupt,
        mailbox: SharedMailbox,
    ) -> Self {
        Self {
            playlist: Vec::new(),
            options,
            loader,
            interrupt,
            mailbox,
        }
    }

    #[must_use]
    pub fn playlist(&self) -> &[PlaylistEntry] {
        &self.playlist
    }

    /// Load phase: prepare every input, skipping the ones that fail.
    ///
    /// Directories contribute all of their files with the directory's timing.
    /// An interrupt ends loading early; that is not an error even if nothing
    /// was loaded yet.
    pub fn load_inputs(&mut self, inputs: &[(PathBuf, TimingParams)]) -> Result<(), Error> {
        'inputs: for (input, timing) in inputs {
            for path in expand(input) {
                if self.interrupt.is_set() {
                    break 'inputs;
                }
                self.push(&path, *timing);
            }
        }

        if let Err(err) = self.loader.flush() {
            warn!(error = %err, "export stopped");
        }
        if self.interrupt.is_set() {
            info!(sources = self.playlist.len(), "load interrupted");
            return Ok(());
        }
        apply_playlist_policy(&mut self.playlist);

        if self.playlist.is_empty() {
            return Err(Error::Config("No image could be loaded".into()));
        }
        info!(sources = self.playlist.len(), "play-list ready");
        Ok(())
    }

    fn push(&mut self, path: &Path, timing: TimingParams) {
        match self.loader.load(path, timing) {
            Ok(source) => self.playlist.push(PlaylistEntry {
                path: path.to_path_buf(),
                source,
            }),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping source"),
        }
    }

    /// Replace entry `index` with a freshly loaded `path`.
    fn switch(&mut self, index: usize, path: PathBuf) {
        match self.loader.load(&path, self.options.default_timing) {
            Ok(source) => {
                info!(
                    from = %self.playlist[index].path.display(),
                    to = %path.display(),
                    "switching source"
                );
                self.playlist[index] = PlaylistEntry { path, source };
                apply_playlist_policy(&mut self.playlist);
            }
            Err(err) => warn!(path = %path.display(), error = %err, "switch request failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: u32,
    pub sources_played: u64,
    pub frames_presented: u64,
}

/// Drives a [`Session`]'s play-list through a [`Scheduler`].
pub struct Presentation<D: Display, C: Clock = SystemClock> {
    session: Session,
    scheduler: Scheduler<D, C>,
}

impl<D: Display, C: Clock> Presentation<D, C> {
    pub fn new(session: Session, scheduler: Scheduler<D, C>) -> Self {
        Self { session, scheduler }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn scheduler(&self) -> &Scheduler<D, C> {
        &self.scheduler
    }

    /// Play the play-list once, or until interrupted when `forever` is set.
    ///
    /// Sources whose stream turns out corrupt are dropped from the list.
    pub fn run(&mut self) -> Result<RunSummary, Error> {
        let mut summary = RunSummary::default();
        let mut rng = rand::rng();

        while !self.session.interrupt.is_set() {
            if self.session.playlist.is_empty() {
                return Err(Error::Config("No playable source left".into()));
            }
            if self.session.options.shuffle {
                self.session.playlist.shuffle(&mut rng);
            }

            let mut index = 0;
            while index < self.session.playlist.len() && !self.session.interrupt.is_set() {
                if let Some(next) = self.session.mailbox.take() {
                    self.session.switch(index, next);
                }

                let Session {
                    playlist,
                    interrupt,
                    mailbox,
                    ..
                } = &mut self.session;
                let entry = &mut playlist[index];
                let stop = || interrupt.is_set() || mailbox.is_pending();

                match self.scheduler.play(&mut entry.source, &stop) {
                    Ok(report) => {
                        debug!(path = %entry.path.display(), ?report, "source done");
                        summary.sources_played += 1;
                        summary.frames_presented += report.frames_presented;
                    }
                    Err(err) => {
                        let err = Error::stream(entry.path.clone(), err);
                        warn!(error = %err, "dropping source");
                        playlist.remove(index);
                        apply_playlist_policy(playlist);
                        continue;
                    }
                }

                if !mailbox.is_pending() {
                    index += 1;
                }
            }

            summary.passes += 1;
            if !self.session.options.forever {
                break;
            }
        }

        self.scheduler.display_mut().clear();
        info!(?summary, "presentation finished");
        Ok(summary)
    }
}
