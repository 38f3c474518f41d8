//! Chart parsing from MIDI files.
//!
//! A chart file holds one track per instrument part, each named by a track name meta event.
//! The guitar part carries the notes of all difficulties at once, each difficulty on its own
//! octave of five keys. The vocals part carries the lyrics.
//!
//! Raw bytes == [`crate::midi::resolve_tracks`] ==> [`TimedTrack`]s == [`parse_tracks`] ==>
//! [`NoteTimeline`] (in [`ChartOutput`])

use std::{
    ops::RangeInclusive,
    path::{Path, PathBuf},
    str::FromStr,
};

use gametime::TimeSpan;
use thiserror::Error;

use crate::{
    lyric::{Lyric, partition_lyrics},
    midi::{MidiEvent, TimedTrack, resolve_tracks},
    timeline::{FRET_COUNT, Lane, Note, NoteTimeline},
};

/// Substring identifying the guitar part track.
pub const GUITAR_TRACK: &str = "guitar";
/// Substring identifying the vocals part track.
pub const VOCALS_TRACK: &str = "vocals";

/// A fatal error while building a chart. No partial chart is produced.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    /// No track is named like the guitar part.
    #[error("no guitar track in chart")]
    NoGuitarTrack,
    /// The file is not a readable Standard MIDI File.
    #[error("malformed midi: {0}")]
    MalformedMidi(String),
    /// The chart file does not exist.
    #[error("missing chart asset: {}", .path.display())]
    MissingAsset {
        /// The path that was looked up.
        path: PathBuf,
    },
    /// The chart file exists but could not be read.
    #[error("failed to read chart: {0}")]
    Io(String),
    /// The difficulty name is none of the known ones.
    #[error("unknown difficulty `{0}`, expected easy, medium, hard or expert")]
    UnknownDifficulty(String),
}

/// A problem in the chart that was worked around.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartWarning {
    /// The key belongs to the difficulty but its lane is not played. The event was dropped.
    #[error("key {key} maps to lane {lane}, which is out of the configured lanes")]
    LaneOutOfRange {
        /// The MIDI key of the event.
        key: u8,
        /// The lane the key would map to.
        lane: usize,
    },
    /// A note was closed on a lane that has no note yet. The event was dropped.
    #[error("key {key} released at {at:?} without any note on its lane")]
    UnmatchedNoteOff {
        /// The MIDI key of the event.
        key: u8,
        /// When the release happened.
        at: TimeSpan,
    },
    /// There is no vocals track, so the chart has no lyrics.
    #[error("no vocals track in chart, lyrics are disabled")]
    NoVocalsTrack,
}

/// Difficulty of a chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Difficulty {
    /// Keys 60-64.
    Easy,
    /// Keys 72-76.
    #[default]
    Medium,
    /// Keys 84-88.
    Hard,
    /// Keys 96-100.
    Expert,
}

impl Difficulty {
    /// All difficulties from the hardest, as the song setup lists them.
    pub const ALL: [Self; 4] = [Self::Expert, Self::Hard, Self::Medium, Self::Easy];

    /// The key of the leftmost lane.
    #[must_use]
    pub const fn low_key(self) -> u8 {
        match self {
            Self::Easy => 60,
            Self::Medium => 72,
            Self::Hard => 84,
            Self::Expert => 96,
        }
    }

    /// Keys played on this difficulty, one per fret.
    #[must_use]
    pub const fn key_range(self) -> RangeInclusive<u8> {
        let low = self.low_key();
        low..=low + (FRET_COUNT as u8 - 1)
    }

    /// Lowercase name of the difficulty.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Expert => "expert",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|difficulty| difficulty.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChartError::UnknownDifficulty(s.to_owned()))
    }
}

/// Options of chart parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChartConfig {
    lane_count: usize,
    #[cfg_attr(feature = "serde", serde(with = "crate::settings::span_millis"))]
    lyric_batch_gap: TimeSpan,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            lane_count: FRET_COUNT,
            lyric_batch_gap: TimeSpan::MILLISECOND * 2000,
        }
    }
}

impl ChartConfig {
    /// Sets the number of lanes to play, at most [`FRET_COUNT`].
    #[must_use]
    pub fn lane_count(mut self, lane_count: usize) -> Self {
        self.lane_count = lane_count.min(FRET_COUNT);
        self
    }

    /// Sets the longest distance from the first lyric of a batch to the last one.
    #[must_use]
    pub const fn lyric_batch_gap(mut self, gap: TimeSpan) -> Self {
        self.lyric_batch_gap = gap;
        self
    }

    /// Number of lanes to play.
    #[must_use]
    pub const fn lanes(&self) -> usize {
        if self.lane_count < FRET_COUNT {
            self.lane_count
        } else {
            FRET_COUNT
        }
    }
}

/// Output of parsing a chart.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ChartOutput {
    /// The parsed notes and lyrics.
    pub timeline: NoteTimeline,
    /// Problems that were worked around.
    pub warnings: Vec<ChartWarning>,
}

/// Parses a chart from the bytes of a Standard MIDI File.
///
/// `song_length` ends every note that is never released.
///
/// # Errors
///
/// Returns [`ChartError::MalformedMidi`] if the file can't be decoded and
/// [`ChartError::NoGuitarTrack`] if it has no guitar part.
pub fn parse_chart(
    bytes: &[u8],
    difficulty: Difficulty,
    song_length: TimeSpan,
    config: &ChartConfig,
) -> Result<ChartOutput, ChartError> {
    let tracks = resolve_tracks(bytes)?;
    parse_tracks(&tracks, difficulty, song_length, config)
}

/// Reads a chart file from disk and parses it with [`parse_chart`].
///
/// # Errors
///
/// Returns [`ChartError::MissingAsset`] if there is no such file, [`ChartError::Io`] if it
/// can't be read, and the errors of [`parse_chart`].
pub fn load_chart_file(
    path: impl AsRef<Path>,
    difficulty: Difficulty,
    song_length: TimeSpan,
    config: &ChartConfig,
) -> Result<ChartOutput, ChartError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => ChartError::MissingAsset {
            path: path.to_path_buf(),
        },
        _ => ChartError::Io(err.to_string()),
    })?;
    parse_chart(&bytes, difficulty, song_length, config)
}

/// Builds the note timeline of `difficulty` from tracks already resolved to absolute time.
///
/// The first track named like [`GUITAR_TRACK`] gives the notes and the first one named like
/// [`VOCALS_TRACK`] gives the lyrics.
///
/// A release always closes the last note opened on its lane. Overlapping notes of the same key
/// are therefore not supported.
///
/// # Errors
///
/// Returns [`ChartError::NoGuitarTrack`] if no track is named like the guitar part.
pub fn parse_tracks(
    tracks: &[TimedTrack],
    difficulty: Difficulty,
    song_length: TimeSpan,
    config: &ChartConfig,
) -> Result<ChartOutput, ChartError> {
    let guitar = tracks
        .iter()
        .find(|track| track.is_named_like(GUITAR_TRACK))
        .ok_or(ChartError::NoGuitarTrack)?;

    let mut warnings = Vec::new();
    let mut lanes: Vec<Vec<Note>> = vec![Vec::new(); config.lanes()];
    let keys = difficulty.key_range();

    for timed in &guitar.events {
        let (key, opens) = match &timed.event {
            MidiEvent::NoteOn { key, velocity } if *velocity > 0 => (*key, true),
            event => match event.closing_key() {
                Some(key) => (key, false),
                None => continue,
            },
        };
        if !keys.contains(&key) {
            continue;
        }
        let lane_index = usize::from(key - difficulty.low_key());
        let Some(lane) = lanes.get_mut(lane_index) else {
            warnings.push(ChartWarning::LaneOutOfRange {
                key,
                lane: lane_index,
            });
            continue;
        };
        if opens {
            lane.push(Note::new(timed.at, song_length.max(timed.at)));
        } else if let Some(last) = lane.last_mut() {
            last.end = timed.at.max(last.start);
        } else {
            warnings.push(ChartWarning::UnmatchedNoteOff { key, at: timed.at });
        }
    }

    let lyric_batches = match tracks
        .iter()
        .find(|track| track.is_named_like(VOCALS_TRACK))
    {
        Some(vocals) => partition_lyrics(
            vocals.events.iter().filter_map(|timed| match &timed.event {
                MidiEvent::Lyric(text) => Some(Lyric::new(timed.at, text.clone())),
                _ => None,
            }),
            config.lyric_batch_gap,
        ),
        None => {
            warnings.push(ChartWarning::NoVocalsTrack);
            Vec::new()
        }
    };

    for warning in &warnings {
        log::warn!("{difficulty} chart: {warning}");
    }
    let timeline = NoteTimeline::new(lanes.into_iter().map(Lane::new).collect(), lyric_batches);
    log::debug!(
        "parsed {difficulty} chart: {} notes on {} lanes, {} lyric batches",
        timeline.note_count(),
        timeline.lanes().len(),
        timeline.lyric_batches().len()
    );

    Ok(ChartOutput { timeline, warnings })
}
