//! Prelude module for the crate.
//!
//! You can use `use rhythm_core::prelude::*;` to import the types needed to load a chart and
//! play it.

pub use crate::{
    chart::{
        ChartConfig, ChartError, ChartOutput, ChartWarning, Difficulty, load_chart_file,
        parse_chart, parse_tracks,
    },
    input::{InputAction, InputProfile, InputSnapshot, InputTracker, LaneInput},
    judge::{
        FretHitListener, GuitarVolume, JudgeConfig, JudgeEngine, JudgeMode, NoEffects,
        TickOutcome,
    },
    lyric::{Lyric, LyricBatch, partition_lyrics},
    midi::{MidiEvent, TimedEvent, TimedTrack, resolve_tracks},
    session::{AudioIntent, AudioPart, SessionConfig, SessionUpdate, SongSession},
    settings::SongSettings,
    timeline::{FRET_COUNT, Fret, Lane, Note, NoteState, NoteTimeline},
};

#[cfg(feature = "serde")]
pub use crate::settings::SettingsError;
