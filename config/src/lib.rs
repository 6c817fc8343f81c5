// SPDX-License-Identifier: MPL-2.0

//! Timing parameters and play-list configuration for `led-imager`.

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub const NAME: &str = "led-imager";
pub const PLAYLIST_FILE: &str = "playlist.ron";

/// Stands in for "no limit". That is a while.
pub const DISTANT_FUTURE: Duration = Duration::from_millis(1 << 40);

/// Display time of a still image unless configured otherwise.
pub const DEFAULT_STILL_WAIT: Duration = Duration::from_millis(1500);

/// Per-source display policy.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Setters)]
#[serde(default, deny_unknown_fields)]
#[must_use]
pub struct TimingParams {
    /// Cap on the total play time of an animation.
    #[serde(rename = "animation_duration_ms", with = "millis")]
    pub animation_duration: Duration,
    /// How long a still image stays up.
    #[serde(rename = "still_wait_ms", with = "millis")]
    pub still_wait: Duration,
    /// Replaces every authored frame delay when set.
    #[serde(rename = "frame_delay_ms", with = "optional_millis")]
    pub frame_delay_override: Option<Duration>,
    /// Full passes through an animation; negative loops indefinitely.
    pub loop_count: i32,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            animation_duration: DISTANT_FUTURE,
            still_wait: DEFAULT_STILL_WAIT,
            frame_delay_override: None,
            loop_count: -1,
        }
    }
}

impl TimingParams {
    #[must_use]
    pub fn loops_forever(&self) -> bool {
        self.loop_count < 0
    }

    #[must_use]
    pub fn unbounded_duration(&self) -> bool {
        self.animation_duration >= DISTANT_FUTURE
    }
}

/// Image filtering method
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMethod {
    // nearest neighbor filtering
    Nearest,
    // linear filtering
    Linear,
    // lanczos filtering with window 3
    #[default]
    Lanczos,
}

impl From<FilterMethod> for image::imageops::FilterType {
    fn from(method: FilterMethod) -> Self {
        match method {
            FilterMethod::Nearest => image::imageops::FilterType::Nearest,
            FilterMethod::Linear => image::imageops::FilterType::Triangle,
            FilterMethod::Lanczos => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Which panel axes an image is stretched to fill while keeping its aspect ratio.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fill {
    /// Fit entirely inside the panel.
    #[default]
    None,
    /// Match the panel width, height may overflow.
    Width,
    /// Match the panel height, width may overflow.
    Height,
    /// Cover the panel on both axes.
    Both,
}

impl Fill {
    #[must_use]
    pub fn from_flags(fill_width: bool, fill_height: bool) -> Self {
        match (fill_width, fill_height) {
            (false, false) => Fill::None,
            (true, false) => Fill::Width,
            (false, true) => Fill::Height,
            (true, true) => Fill::Both,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Setters)]
#[serde(deny_unknown_fields)]
#[must_use]
pub struct Entry {
    /// Image, animation, stream file or directory.
    #[setters(skip)]
    pub source: PathBuf,
    #[serde(default)]
    pub timing: TimingParams,
}

impl Entry {
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            timing: TimingParams::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq, Setters)]
#[serde(default, deny_unknown_fields)]
#[must_use]
pub struct Config {
    pub entries: Vec<Entry>,
    /// Cycle through the play-list until interrupted.
    pub forever: bool,
    /// Reorder the play-list before every pass.
    pub shuffle: bool,
    /// Center images smaller than the panel.
    pub center: bool,
    pub fill: Fill,
    pub filter_method: FilterMethod,
    /// File whose contents name the next image to show.
    pub control_file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

impl Config {
    /// Location of the default play-list, if a config directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(NAME).join(PLAYLIST_FILE))
    }

    /// Load a RON play-list.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_ron(&text).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), entries = config.entries.len(), "loaded play-list");
        Ok(config)
    }

    /// Load the default play-list when it exists.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but is unreadable.
    pub fn load_default() -> Result<Option<Self>, Error> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path).map(Some),
            _ => Ok(None),
        }
    }

    /// Parse a play-list from RON text.
    ///
    /// # Errors
    ///
    /// Fails on malformed RON or unknown fields.
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Negative values mean "not set", like the `-1` accepted on the command line.
mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(delay) => {
                serializer.serialize_i64(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX))
            }
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }
}
