// SPDX-License-Identifier: MPL-2.0

mod canvas;
mod cli;
mod control;
mod decode;
mod display;
mod error;
mod img_source;
mod loader;
mod prepare;
mod presentation;
mod scaler;
mod scheduler;
mod stream;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use calloop::{
    EventLoop, LoopSignal, channel,
    signals::{Signal, Signals},
};
use clap::{CommandFactory, FromArgMatches};
use eyre::eyre;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::{
    cli::{Cli, Settings},
    control::{Interrupt, SharedMailbox},
    display::VirtualPanel,
    error::Error,
    loader::Loader,
    presentation::{Presentation, RunSummary, Session},
    scheduler::{Scheduler, SystemClock},
    stream::FrameStream,
};

/// State owned by the main thread's event loop.
pub struct Reactor {
    interrupt: Interrupt,
    mailbox: SharedMailbox,
    outcome: Option<Result<RunSummary, Error>>,
    loop_signal: LoopSignal,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    let config = cli::load_config(&cli)?;
    let settings = Settings::resolve(&cli, &matches, config);

    let mut event_loop: EventLoop<'static, Reactor> = EventLoop::try_new()?;
    let interrupt = Interrupt::default();
    let mailbox: SharedMailbox = Arc::default();

    // Blocks the signals for this thread and every thread spawned after it.
    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])?;
    event_loop
        .handle()
        .insert_source(signals, |event, _, state: &mut Reactor| {
            tracing::debug!(signal = ?event.signal(), "signal received");
            state.interrupt.trigger();
        })
        .map_err(|err| eyre!("{}", err))?;

    let _watcher = settings
        .control_file
        .as_deref()
        .map(|path| img_source::img_source(&event_loop.handle(), path))
        .transpose()?;

    let mut loader = Loader::new(settings.width, settings.height)
        .center(settings.center)
        .fill(settings.fill)
        .filter(settings.filter);
    if let Some(output) = &settings.output {
        let stream = FrameStream::create(output).map_err(|err| Error::stream(output, err))?;
        tracing::info!(path = %output.display(), "exporting frames");
        loader = loader.mirror(stream);
    }

    let session = Session::new(
        loader,
        settings.options,
        interrupt.clone(),
        Arc::clone(&mailbox),
    );
    let panel = VirtualPanel::new(settings.width, settings.height, settings.refresh_rate);
    let scheduler = Scheduler::new(panel, SystemClock, settings.vsync_multiple);
    let inputs = settings.inputs;

    let (done_tx, done_rx) = channel::channel();
    event_loop
        .handle()
        .insert_source(done_rx, |event, _, state: &mut Reactor| {
            if let channel::Event::Msg(outcome) = event {
                state.outcome = Some(outcome);
            }
            state.loop_signal.stop();
        })
        .map_err(|err| eyre!("{}", err))?;

    let presenter = std::thread::Builder::new()
        .name("presentation".into())
        .spawn(move || {
            let mut session = session;
            let outcome = session.load_inputs(&inputs).and_then(|()| {
                let mut presentation = Presentation::new(session, scheduler);
                let summary = presentation.run();
                tracing::debug!(
                    sources = presentation.session().playlist().len(),
                    swaps = presentation.scheduler().display().swaps(),
                    "panel idle"
                );
                summary
            });
            let _ = done_tx.send(outcome);
        })?;

    let mut reactor = Reactor {
        interrupt,
        mailbox,
        outcome: None,
        loop_signal: event_loop.get_signal(),
    };
    event_loop.run(None, &mut reactor, |_| {})?;

    if presenter.join().is_err() {
        return Err(eyre!("presentation thread panicked"));
    }

    match reactor.outcome {
        Some(Ok(summary)) => {
            tracing::debug!(
                ?summary,
                dropped_requests = reactor.mailbox.replaced(),
                "exiting"
            );
            Ok(())
        }
        Some(Err(err)) => Err(err.into()),
        None => Err(eyre!("presentation ended without reporting")),
    }
}
