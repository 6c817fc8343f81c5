// SPDX-License-Identifier: MPL-2.0

//! Watches the control file and turns its contents into switch requests.

use std::path::{Path, PathBuf};

use calloop::{LoopHandle, channel};
use notify::{
    RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};

use crate::Reactor;

/// Start watching `control_file`. Events are handled on the reactor thread.
///
/// The returned watcher must be kept alive for as long as requests should
/// be accepted.
pub fn img_source(
    handle: &LoopHandle<'static, Reactor>,
    control_file: &Path,
) -> eyre::Result<RecommendedWatcher> {
    // Resolved once, so a later change of working directory can't move it.
    let control_file = std::path::absolute(control_file)?;
    let (notify_tx, notify_rx) = channel::sync_channel(20);
    let watched = control_file.clone();

    handle
        .insert_source(notify_rx, move |e: channel::Event<notify::Event>, _, state| {
            match e {
                channel::Event::Msg(event) => {
                    if let Some(next) = switch_request(&watched, &event) {
                        tracing::info!(next = %next.display(), "switch requested");
                        state.mailbox.publish(next);
                    }
                }
                channel::Event::Closed => {
                    tracing::debug!("control file watcher closed");
                }
            }
        })
        .map_err(|err| eyre::eyre!("{}", err))?;

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let _ = notify_tx.send(event);
            }
            Err(why) => tracing::warn!(?why, "control file watch error"),
        },
        notify::Config::default(),
    )?;

    // Watch the directory so the file may be replaced or created later.
    watcher.watch(parent_dir(&control_file), RecursiveMode::NonRecursive)?;
    tracing::info!(path = %control_file.display(), "watching control file");

    Ok(watcher)
}

/// The image path a watcher event asks for, if the event concerns the
/// control file and the file names something.
fn switch_request(control_file: &Path, event: &notify::Event) -> Option<PathBuf> {
    let relevant = matches!(
        event.kind,
        notify::EventKind::Create(_)
            | notify::EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
            | notify::EventKind::Modify(ModifyKind::Name(RenameMode::To))
    );
    if !relevant || !event.paths.iter().any(|p| same_file(p, control_file)) {
        return None;
    }

    let contents = match std::fs::read_to_string(control_file) {
        Ok(contents) => contents,
        Err(why) => {
            tracing::warn!(path = %control_file.display(), ?why, "can't read control file");
            return None;
        }
    };

    let requested = contents.trim();
    (!requested.is_empty()).then(|| PathBuf::from(requested))
}

/// Directory holding `path`; a bare file name lives in `.`.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    // Watchers may report the directory through a different spelling,
    // e.g. `/srv/./ctl` for a watch on `.`.
    let parent = |p: &Path| parent_dir(p).canonicalize().ok();
    a.file_name().is_some() && a.file_name() == b.file_name() && parent(a) == parent(b)
}
