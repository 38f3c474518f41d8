//! Per-play settings chosen before a song starts.

use crate::{
    chart::Difficulty,
    judge::{JudgeConfig, JudgeMode},
};

/// Errors on reading settings.
#[cfg(feature = "serde")]
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The JSON was malformed or had a wrong shape.
    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serde adapter writing a [`TimeSpan`](gametime::TimeSpan) as whole milliseconds, which is
/// how the spans of the configurations read in a settings file.
#[cfg(feature = "serde")]
pub(crate) mod span_millis {
    use gametime::TimeSpan;
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};

    pub fn serialize<S: Serializer>(span: &TimeSpan, serializer: S) -> Result<S::Ok, S::Error> {
        span.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeSpan, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        TimeSpan::MILLISECOND
            .checked_mul(millis)
            .ok_or_else(|| D::Error::custom("time span out of range"))
    }
}

/// Difficulty and judge mode of one play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SongSettings {
    /// Which part of the chart to play.
    pub difficulty: Difficulty,
    /// How presses are judged.
    pub mode: JudgeMode,
}

impl SongSettings {
    /// Sets the difficulty.
    #[must_use]
    pub const fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Sets the judge mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: JudgeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Judgment configuration for these settings, with default windows and scoring.
    #[must_use]
    pub fn judge_config(&self) -> JudgeConfig {
        JudgeConfig::default().mode(self.mode)
    }

    /// Reads settings from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Json`] when the text is not valid settings JSON.
    #[cfg(feature = "serde")]
    pub fn from_json(source: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Writes the settings as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Json`] if serialization fails.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }
}
