//! Helpers for building charts in tests.
//!
//! These functions are provided for testing purposes only. They write real Standard MIDI
//! Files, so tests can go through the same path as charts loaded from disk.

use gametime::TimeSpan;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};

/// A span of `ms` milliseconds.
#[must_use]
pub fn millis(ms: i64) -> TimeSpan {
    TimeSpan::MILLISECOND * ms
}

#[derive(Debug, Clone)]
enum Sketched {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8 },
    Lyric(String),
    Tempo(u32),
}

impl Sketched {
    fn kind(&self) -> TrackEventKind<'_> {
        let channel = u4::new(0);
        match self {
            Self::NoteOn { key, velocity } => TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(*key),
                    vel: u7::new(*velocity),
                },
            },
            Self::NoteOff { key } => TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(*key),
                    vel: u7::new(0),
                },
            },
            Self::Lyric(text) => TrackEventKind::Meta(MetaMessage::Lyric(text.as_bytes())),
            Self::Tempo(micros) => TrackEventKind::Meta(MetaMessage::Tempo(u24::new(*micros))),
        }
    }
}

/// Events of one track at absolute ticks. Events on the same tick keep the order they were
/// added in.
#[derive(Debug, Clone, Default)]
pub struct TrackSketch {
    name: Option<String>,
    events: Vec<(u32, Sketched)>,
}

impl TrackSketch {
    /// A note held from `start` to `end`.
    #[must_use]
    pub fn note(self, key: u8, start: u32, end: u32) -> Self {
        self.note_on(key, start, 100).note_off(key, end)
    }

    /// A note-on. A zero `velocity` is how many files close notes.
    #[must_use]
    pub fn note_on(mut self, key: u8, at: u32, velocity: u8) -> Self {
        self.events.push((at, Sketched::NoteOn { key, velocity }));
        self
    }

    /// A note-off.
    #[must_use]
    pub fn note_off(mut self, key: u8, at: u32) -> Self {
        self.events.push((at, Sketched::NoteOff { key }));
        self
    }

    /// A lyric meta event.
    #[must_use]
    pub fn lyric(mut self, at: u32, text: &str) -> Self {
        self.events.push((at, Sketched::Lyric(text.to_owned())));
        self
    }

    /// A tempo change in microseconds per quarter note.
    #[must_use]
    pub fn tempo(mut self, at: u32, micros_per_beat: u32) -> Self {
        self.events.push((at, Sketched::Tempo(micros_per_beat)));
        self
    }

    fn to_track(&self) -> Track<'_> {
        let mut events: Vec<(u32, TrackEventKind<'_>)> = self
            .name
            .iter()
            .map(|name| (0, TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes()))))
            .chain(self.events.iter().map(|(at, event)| (*at, event.kind())))
            .collect();
        events.sort_by_key(|&(at, _)| at);

        let mut last = 0;
        let mut track: Track<'_> = events
            .into_iter()
            .map(|(at, kind)| {
                let delta = at - last;
                last = at;
                TrackEvent {
                    delta: u28::new(delta),
                    kind,
                }
            })
            .collect();
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        track
    }
}

/// Builds a parallel Standard MIDI File track by track.
#[derive(Debug, Clone)]
pub struct SmfBuilder {
    ticks_per_beat: u16,
    tracks: Vec<TrackSketch>,
}

impl SmfBuilder {
    /// A file without any track.
    #[must_use]
    pub const fn new(ticks_per_beat: u16) -> Self {
        Self {
            ticks_per_beat,
            tracks: Vec::new(),
        }
    }

    /// A file where one tick is one millisecond.
    ///
    /// Its first track is an unnamed conductor track holding the tempo, so tracks added
    /// afterwards start at index 1.
    #[must_use]
    pub fn millis() -> Self {
        Self::new(1000).track(None, |conductor| conductor.tempo(0, 1_000_000))
    }

    /// Appends a track.
    #[must_use]
    pub fn track(mut self, name: Option<&str>, build: impl FnOnce(TrackSketch) -> TrackSketch) -> Self {
        let sketch = TrackSketch {
            name: name.map(str::to_owned),
            ..TrackSketch::default()
        };
        self.tracks.push(build(sketch));
        self
    }

    /// Writes the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be encoded, such as with a delta out of range.
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let header = Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(self.ticks_per_beat)),
        );
        let mut smf = Smf::new(header);
        smf.tracks = self.tracks.iter().map(TrackSketch::to_track).collect();

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes)?;
        Ok(bytes)
    }
}
