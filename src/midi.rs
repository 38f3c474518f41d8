//! Time resolution of Standard MIDI Files.
//!
//! A chart is authored in ticks, but judgment works on song offsets. This module decodes the
//! container with [`midly`] and rewrites every track into [`TimedTrack`]s whose events carry an
//! absolute offset from the beginning of the song.
//!
//! Tempo changes are merged from all tracks into one global tempo map, as type 1 files keep them
//! in a conductor track that applies to every other track.

use gametime::TimeSpan;
use itertools::Itertools;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use num::ToPrimitive;

use crate::chart::ChartError;

/// Tempo assumed until the first tempo event, in microseconds per quarter note (120 BPM).
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

/// The furthest offset an event may be resolved to. Later events are rejected so that judgment
/// windows and song tails can still be added to every offset.
pub const LATEST_EVENT: TimeSpan = TimeSpan::new(i64::MAX / 4);

/// A chart-relevant message of a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MidiEvent {
    /// A key was pressed. A velocity of zero is a release in disguise.
    NoteOn {
        /// The MIDI key number.
        key: u8,
        /// The velocity of the press.
        velocity: u8,
    },
    /// A key was released.
    NoteOff {
        /// The MIDI key number.
        key: u8,
    },
    /// A lyric syllable.
    Lyric(String),
}

impl MidiEvent {
    /// Returns the key this event closes, if it is a Note-Off or a zero velocity Note-On.
    #[must_use]
    pub const fn closing_key(&self) -> Option<u8> {
        match self {
            Self::NoteOff { key } | Self::NoteOn { key, velocity: 0 } => Some(*key),
            _ => None,
        }
    }
}

/// A [`MidiEvent`] placed at an absolute offset from the song start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    /// Offset from the beginning of the song.
    pub at: TimeSpan,
    /// The message itself.
    pub event: MidiEvent,
}

impl TimedEvent {
    /// Creates a new event at the given offset.
    #[must_use]
    pub const fn new(at: TimeSpan, event: MidiEvent) -> Self {
        Self { at, event }
    }
}

/// One track of the file, resolved to absolute time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimedTrack {
    /// The text of the track name meta event, only when it is the first event of the track.
    pub name: Option<String>,
    /// Events in non-decreasing time order.
    pub events: Vec<TimedEvent>,
}

impl TimedTrack {
    /// Creates a track from its name and already ordered events.
    #[must_use]
    pub const fn new(name: Option<String>, events: Vec<TimedEvent>) -> Self {
        Self { name, events }
    }

    /// Whether the track name contains `needle`, ignoring case.
    #[must_use]
    pub fn is_named_like(&self, needle: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(&needle.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Division {
    Metrical { ticks_per_beat: u64 },
    Timecode { ticks_per_second: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TempoPoint {
    tick: u64,
    micros: u64,
    micros_per_beat: u64,
}

/// Converts absolute ticks into microseconds.
#[derive(Debug, Clone)]
struct TempoMap {
    division: Division,
    points: Vec<TempoPoint>,
}

impl TempoMap {
    fn new(timing: Timing, tempo_changes: impl IntoIterator<Item = (u64, u32)>) -> Self {
        let division = match timing {
            Timing::Metrical(ticks) => Division::Metrical {
                ticks_per_beat: u64::from(ticks.as_int()).max(1),
            },
            Timing::Timecode(fps, subframes) => Division::Timecode {
                ticks_per_second: (f64::from(fps.as_f32()) * f64::from(subframes)).max(1.0),
            },
        };
        let mut map = Self {
            division,
            points: vec![TempoPoint {
                tick: 0,
                micros: 0,
                micros_per_beat: u64::from(DEFAULT_MICROS_PER_BEAT),
            }],
        };
        for (tick, micros_per_beat) in tempo_changes {
            let point = TempoPoint {
                tick,
                micros: map.micros_at(tick),
                micros_per_beat: u64::from(micros_per_beat),
            };
            match map.points.last_mut() {
                Some(last) if last.tick == tick => *last = point,
                _ => map.points.push(point),
            }
        }
        map
    }

    fn micros_at(&self, tick: u64) -> u64 {
        match self.division {
            Division::Metrical { ticks_per_beat } => {
                let idx = self.points.partition_point(|point| point.tick <= tick);
                let Some(point) = idx.checked_sub(1).and_then(|i| self.points.get(i)) else {
                    return 0;
                };
                let since = u128::from(tick - point.tick) * u128::from(point.micros_per_beat)
                    / u128::from(ticks_per_beat);
                point
                    .micros
                    .saturating_add(since.to_u64().unwrap_or(u64::MAX))
            }
            Division::Timecode { ticks_per_second } => {
                (tick as f64 * 1_000_000.0 / ticks_per_second)
                    .to_u64()
                    .unwrap_or(u64::MAX)
            }
        }
    }

    fn span_at(&self, tick: u64) -> Result<TimeSpan, ChartError> {
        self.micros_at(tick)
            .checked_mul(1000)
            .and_then(|nanos| i64::try_from(nanos).ok())
            .map(TimeSpan::new)
            .filter(|at| *at <= LATEST_EVENT)
            .ok_or_else(|| ChartError::MalformedMidi("event time out of range".to_owned()))
    }
}

fn absolute_ticks<'a>(
    track: &'a [TrackEvent<'a>],
) -> impl Iterator<Item = (u64, TrackEventKind<'a>)> + 'a {
    track.iter().scan(0u64, |tick, event| {
        *tick += u64::from(event.delta.as_int());
        Some((*tick, event.kind))
    })
}

fn resolve_event(kind: TrackEventKind<'_>) -> Option<MidiEvent> {
    match kind {
        TrackEventKind::Midi { message, .. } => match message {
            MidiMessage::NoteOn { key, vel } => Some(MidiEvent::NoteOn {
                key: key.as_int(),
                velocity: vel.as_int(),
            }),
            MidiMessage::NoteOff { key, .. } => Some(MidiEvent::NoteOff { key: key.as_int() }),
            _ => None,
        },
        TrackEventKind::Meta(MetaMessage::Lyric(text)) => {
            Some(MidiEvent::Lyric(String::from_utf8_lossy(text).into_owned()))
        }
        _ => None,
    }
}

/// Decodes a Standard MIDI File and resolves all of its tracks to absolute time.
///
/// # Errors
///
/// Returns [`ChartError::MalformedMidi`] when the container cannot be decoded, or when an
/// event lies further out than [`LATEST_EVENT`].
pub fn resolve_tracks(bytes: &[u8]) -> Result<Vec<TimedTrack>, ChartError> {
    let smf = Smf::parse(bytes).map_err(|err| ChartError::MalformedMidi(err.to_string()))?;

    let tempo_changes = smf
        .tracks
        .iter()
        .map(|track| {
            absolute_ticks(track).filter_map(|(tick, kind)| match kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Some((tick, tempo.as_int())),
                _ => None,
            })
        })
        .kmerge_by(|a, b| a.0 < b.0);
    let tempo_map = TempoMap::new(smf.header.timing, tempo_changes);

    let tracks = smf
        .tracks
        .iter()
        .map(|track| -> Result<TimedTrack, ChartError> {
            let name = match track.first().map(|event| event.kind) {
                Some(TrackEventKind::Meta(MetaMessage::TrackName(name))) => {
                    Some(String::from_utf8_lossy(name).into_owned())
                }
                _ => None,
            };
            let events = absolute_ticks(track)
                .filter_map(|(tick, kind)| {
                    resolve_event(kind).map(|event| {
                        tempo_map
                            .span_at(tick)
                            .map(|at| TimedEvent::new(at, event))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TimedTrack::new(name, events))
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "resolved {} tracks ({} tempo points)",
        tracks.len(),
        tempo_map.points.len()
    );
    Ok(tracks)
}
