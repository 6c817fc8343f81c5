// SPDX-License-Identifier: MPL-2.0

//! Command line, and merging it with the play-list file.

use std::{path::PathBuf, time::Duration};

use clap::{ArgAction, ArgMatches, Parser, ValueEnum};
use image::imageops::FilterType;
use led_imager_config::{Config, DISTANT_FUTURE, Fill, FilterMethod, TimingParams};

use crate::{error::Error, presentation::PresentOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Filter {
    Nearest,
    Linear,
    Lanczos,
}

impl From<Filter> for FilterMethod {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => FilterMethod::Nearest,
            Filter::Linear => FilterMethod::Linear,
            Filter::Lanczos => FilterMethod::Lanczos,
        }
    }
}

/// Show images, animations and frame streams on an LED panel.
///
/// Timing options apply to the inputs that follow them, until repeated:
/// `led-imager -w 5 a.png b.png -w 2 c.png` shows a and b for five seconds
/// and c for two.
#[derive(Debug, Parser)]
#[command(name = "led-imager")]
pub struct Cli {
    /// Images, animations, frame-stream files or directories.
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Seconds to show a still image.
    #[arg(short = 'w', long = "wait", value_name = "SECONDS", action = ArgAction::Append)]
    pub wait: Vec<f32>,

    /// Stop an animation after this many seconds.
    #[arg(short = 't', long = "duration", value_name = "SECONDS", action = ArgAction::Append)]
    pub duration: Vec<f32>,

    /// Play an animation this many times; negative loops until the duration runs out.
    #[arg(
        short = 'l',
        long = "loops",
        value_name = "N",
        allow_negative_numbers = true,
        action = ArgAction::Append
    )]
    pub loops: Vec<i32>,

    /// Replace every frame delay of an animation; -1 keeps the authored delays.
    #[arg(
        short = 'D',
        long = "frame-delay",
        value_name = "MS",
        allow_negative_numbers = true,
        action = ArgAction::Append
    )]
    pub frame_delay: Vec<i64>,

    /// Cycle through the inputs until interrupted.
    #[arg(short = 'f', long)]
    pub forever: bool,

    /// Shuffle the inputs before every cycle.
    #[arg(short = 's', long)]
    pub shuffle: bool,

    /// Center images smaller than the panel.
    #[arg(short = 'C', long)]
    pub center: bool,

    /// Swap at most every N panel refreshes.
    #[arg(short = 'V', long, value_name = "N", default_value_t = 1)]
    pub vsync_multiple: u32,

    /// Also write every prepared frame to this stream file.
    #[arg(short = 'O', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Scale images to the panel width.
    #[arg(long)]
    pub fill_width: bool,

    /// Scale images to the panel height.
    #[arg(long)]
    pub fill_height: bool,

    #[arg(long, value_enum)]
    pub filter: Option<Filter>,

    /// Rows per panel.
    #[arg(long, default_value_t = 32)]
    pub rows: u32,

    /// Columns per panel.
    #[arg(long, default_value_t = 32)]
    pub cols: u32,

    /// Panels daisy-chained horizontally.
    #[arg(long, default_value_t = 1)]
    pub chain: u32,

    /// Parallel chains stacked vertically.
    #[arg(long, default_value_t = 1)]
    pub parallel: u32,

    #[arg(long, value_name = "HZ", default_value_t = 120)]
    pub refresh_rate: u32,

    /// File whose contents name the next image to show.
    #[arg(long, value_name = "FILE")]
    pub control_file: Option<PathBuf>,

    /// RON play-list to load instead of the default one.
    #[arg(long, value_name = "FILE")]
    pub playlist: Option<PathBuf>,
}

fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or(DISTANT_FUTURE)
}

/// Values of option `id` paired with their position on the command line.
fn positioned<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Vec<(usize, T)> {
    match (matches.indices_of(id), matches.get_many::<T>(id)) {
        (Some(indices), Some(values)) => indices.zip(values.cloned()).collect(),
        _ => Vec::new(),
    }
}

/// Last value given before position `at`.
fn in_effect<T: Copy>(values: &[(usize, T)], at: usize) -> Option<T> {
    values
        .iter()
        .take_while(|(index, _)| *index < at)
        .last()
        .map(|(_, value)| *value)
}

/// Pair every input with the timing flags preceding it.
pub fn timed_inputs(matches: &ArgMatches, base: TimingParams) -> Vec<(PathBuf, TimingParams)> {
    let wait = positioned::<f32>(matches, "wait");
    let duration = positioned::<f32>(matches, "duration");
    let loops = positioned::<i32>(matches, "loops");
    let frame_delay = positioned::<i64>(matches, "frame_delay");

    positioned::<PathBuf>(matches, "inputs")
        .into_iter()
        .map(|(at, path)| {
            let mut timing = base;
            if let Some(value) = in_effect(&wait, at) {
                timing.still_wait = seconds(value);
            }
            if let Some(value) = in_effect(&duration, at) {
                timing.animation_duration = seconds(value);
            }
            if let Some(value) = in_effect(&loops, at) {
                timing.loop_count = value;
            }
            if let Some(value) = in_effect(&frame_delay, at) {
                timing.frame_delay_override = u64::try_from(value).ok().map(Duration::from_millis);
            }
            (path, timing)
        })
        .collect()
}

/// Everything `main` needs, after merging command line and play-list.
#[derive(Debug)]
pub struct Settings {
    pub inputs: Vec<(PathBuf, TimingParams)>,
    pub options: PresentOptions,
    pub center: bool,
    pub fill: Fill,
    pub filter: FilterType,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
    pub vsync_multiple: u32,
    pub output: Option<PathBuf>,
    pub control_file: Option<PathBuf>,
}

impl Settings {
    /// Play-list entries come first, then the command line inputs. Flags
    /// switch features on; they never switch off what the play-list enables.
    pub fn resolve(cli: &Cli, matches: &ArgMatches, config: Option<Config>) -> Self {
        let config = config.unwrap_or_default();

        let mut inputs: Vec<_> = config
            .entries
            .iter()
            .map(|entry| (entry.source.clone(), entry.timing))
            .collect();
        inputs.extend(timed_inputs(matches, TimingParams::default()));

        let fill = if cli.fill_width || cli.fill_height {
            Fill::from_flags(cli.fill_width, cli.fill_height)
        } else {
            config.fill
        };
        let filter_method = cli.filter.map_or(config.filter_method, FilterMethod::from);

        Self {
            inputs,
            options: PresentOptions {
                forever: cli.forever || config.forever,
                shuffle: cli.shuffle || config.shuffle,
                default_timing: TimingParams::default(),
            },
            center: cli.center || config.center,
            fill,
            filter: filter_method.into(),
            width: cli.cols.saturating_mul(cli.chain).max(1),
            height: cli.rows.saturating_mul(cli.parallel).max(1),
            refresh_rate: cli.refresh_rate,
            vsync_multiple: cli.vsync_multiple.max(1),
            output: cli.output.clone(),
            control_file: cli.control_file.clone().or(config.control_file),
        }
    }
}

/// The play-list to merge: the one named on the command line, or the
/// default file when no inputs were given.
pub fn load_config(cli: &Cli) -> Result<Option<Config>, Error> {
    if let Some(path) = &cli.playlist {
        return Config::load(path)
            .map(Some)
            .map_err(|err| Error::Config(err.to_string()));
    }
    if !cli.inputs.is_empty() {
        return Ok(None);
    }

    match Config::load_default() {
        Ok(config) => Ok(config),
        Err(err) => {
            tracing::warn!(%err, "ignoring default play-list");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use led_imager_config::Entry;

    fn parse(args: &[&str]) -> (Cli, ArgMatches) {
        let matches = Cli::command()
            .try_get_matches_from(std::iter::once("led-imager").chain(args.iter().copied()))
            .unwrap();
        let cli = Cli::from_arg_matches(&matches).unwrap();
        (cli, matches)
    }

    #[test]
    fn timing_applies_to_following_inputs() {
        let (_, matches) = parse(&["a.png", "-w", "5", "b.png", "c.png", "-w", "2", "d.png"]);
        let timed = timed_inputs(&matches, TimingParams::default());

        let waits: Vec<_> = timed.iter().map(|(_, t)| t.still_wait).collect();
        assert_eq!(
            waits,
            vec![
                Duration::from_millis(1500),
                Duration::from_secs(5),
                Duration::from_secs(5),
                Duration::from_secs(2)
            ]
        );
        assert_eq!(timed[3].0, PathBuf::from("d.png"));
    }

    #[test]
    fn same_file_twice_keeps_separate_timing() {
        let (_, matches) = parse(&["-l", "1", "x.gif", "-l", "3", "x.gif"]);
        let timed = timed_inputs(&matches, TimingParams::default());
        assert_eq!(timed[0].1.loop_count, 1);
        assert_eq!(timed[1].1.loop_count, 3);
    }

    #[test]
    fn negative_values_parse() {
        let (_, matches) = parse(&["-D", "200", "-l", "-1", "a.gif", "-D", "-1", "b.gif"]);
        let timed = timed_inputs(&matches, TimingParams::default());

        assert_eq!(
            timed[0].1.frame_delay_override,
            Some(Duration::from_millis(200))
        );
        assert_eq!(timed[0].1.loop_count, -1);
        assert_eq!(timed[1].1.frame_delay_override, None);
    }

    #[test]
    fn duration_in_seconds() {
        let (_, matches) = parse(&["-t", "2.5", "a.gif"]);
        let timed = timed_inputs(&matches, TimingParams::default());
        assert_eq!(timed[0].1.animation_duration, Duration::from_millis(2500));
    }

    #[test]
    fn panel_geometry_and_flags() {
        let (cli, matches) = parse(&[
            "--rows", "16", "--cols", "64", "--chain", "2", "--parallel", "3", "-f", "-s", "-C",
            "-V", "0", "--fill-width", "--filter", "nearest", "a.png",
        ]);
        let settings = Settings::resolve(&cli, &matches, None);

        assert_eq!((settings.width, settings.height), (128, 48));
        assert!(settings.options.forever && settings.options.shuffle && settings.center);
        assert_eq!(settings.vsync_multiple, 1);
        assert_eq!(settings.fill, Fill::Width);
        assert_eq!(settings.filter, FilterType::Nearest);
    }

    #[test]
    fn playlist_entries_come_first() {
        let (cli, matches) = parse(&["cli.png"]);
        let config = Config::default()
            .entries(vec![Entry::new("listed.gif".into()).timing(TimingParams::default().loop_count(4))])
            .forever(true)
            .fill(Fill::Both);
        let settings = Settings::resolve(&cli, &matches, Some(config));

        let paths: Vec<_> = settings.inputs.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("listed.gif"), PathBuf::from("cli.png")]);
        assert_eq!(settings.inputs[0].1.loop_count, 4);
        assert!(settings.options.forever);
        assert_eq!(settings.fill, Fill::Both);
        assert_eq!(settings.filter, FilterType::Lanczos3);
    }

    #[test]
    fn missing_playlist_file_is_config_error() {
        let (cli, _) = parse(&["--playlist", "/nonexistent/list.ron"]);
        assert!(matches!(load_config(&cli), Err(Error::Config(_))));
    }
}
