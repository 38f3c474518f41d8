//! The note timeline that judgment runs against.
//!
//! The structure of a [`NoteTimeline`] is fixed once the chart is parsed: lanes never gain or
//! lose notes and notes are never reordered. Only the judgment state of each note, the lane
//! cursors and the transient hold state change while a song is played.

use gametime::TimeSpan;

use crate::lyric::LyricBatch;

/// Number of frets on the instrument.
pub const FRET_COUNT: usize = 5;

/// A playable column of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fret {
    /// The leftmost fret.
    Green,
    /// The second fret.
    Red,
    /// The middle fret.
    Yellow,
    /// The fourth fret.
    Blue,
    /// The rightmost fret.
    Orange,
}

impl Fret {
    /// All frets from left to right.
    pub const ALL: [Self; FRET_COUNT] = [
        Self::Green,
        Self::Red,
        Self::Yellow,
        Self::Blue,
        Self::Orange,
    ];

    /// Lane index of the fret, counted from the left.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The fret at the lane index, if any.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Green),
            1 => Some(Self::Red),
            2 => Some(Self::Yellow),
            3 => Some(Self::Blue),
            4 => Some(Self::Orange),
            _ => None,
        }
    }
}

impl std::fmt::Display for Fret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Green => "green",
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Orange => "orange",
        };
        f.write_str(name)
    }
}

/// Judgment state of a note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoteState {
    /// Not judged yet.
    #[default]
    Pending,
    /// Played in time.
    Hit,
    /// Played too late, not played at all, or lost to a bad strum.
    Missed,
}

/// A single note on a lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub(crate) start: TimeSpan,
    pub(crate) end: TimeSpan,
    pub(crate) state: NoteState,
    pub(crate) sustaining: bool,
}

impl Note {
    /// Creates a pending note spanning `start..end`.
    #[must_use]
    pub const fn new(start: TimeSpan, end: TimeSpan) -> Self {
        Self {
            start,
            end,
            state: NoteState::Pending,
            sustaining: false,
        }
    }

    /// When the note should be played, from the song start.
    #[must_use]
    pub const fn start(&self) -> TimeSpan {
        self.start
    }

    /// When the note is released, from the song start.
    #[must_use]
    pub const fn end(&self) -> TimeSpan {
        self.end
    }

    /// Current judgment state.
    #[must_use]
    pub const fn state(&self) -> NoteState {
        self.state
    }

    /// Whether the note was hit and is still being held.
    #[must_use]
    pub const fn is_sustaining(&self) -> bool {
        self.sustaining
    }

    /// Whether the note left [`NoteState::Pending`].
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state != NoteState::Pending
    }

    /// Whether the note lasts longer than `threshold`, making it a note to hold.
    #[must_use]
    pub fn is_sustain(&self, threshold: TimeSpan) -> bool {
        self.end > self.start + threshold
    }

    /// Moves a pending note to `state`. Resolved notes are never judged again.
    pub(crate) fn resolve(&mut self, state: NoteState) -> bool {
        if self.is_resolved() {
            return false;
        }
        self.state = state;
        true
    }
}

/// One fret's notes together with its judgment cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lane {
    pub(crate) notes: Vec<Note>,
    pub(crate) cursor: usize,
    pub(crate) pressed_since: Option<TimeSpan>,
}

impl Lane {
    /// Creates a lane from notes in chart order.
    #[must_use]
    pub const fn new(notes: Vec<Note>) -> Self {
        Self {
            notes,
            cursor: 0,
            pressed_since: None,
        }
    }

    /// Notes of the lane in chart order.
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Index of the first note that may still need judging. Never decreases.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Since when the fret is held, or `None` if it is up.
    #[must_use]
    pub const fn pressed_since(&self) -> Option<TimeSpan> {
        self.pressed_since
    }

    /// Whether the fret is held down.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.pressed_since.is_some()
    }

    pub(crate) fn hold(&mut self, held: bool, now: TimeSpan) {
        match (held, self.pressed_since) {
            (true, None) => self.pressed_since = Some(now),
            (false, Some(_)) => self.pressed_since = None,
            _ => {}
        }
    }
}

/// Per-lane notes and lyric batches of a chart at one difficulty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteTimeline {
    pub(crate) lanes: Vec<Lane>,
    pub(crate) lyric_batches: Vec<LyricBatch>,
}

impl NoteTimeline {
    /// Creates a timeline from its lanes and lyric batches.
    #[must_use]
    pub const fn new(lanes: Vec<Lane>, lyric_batches: Vec<LyricBatch>) -> Self {
        Self {
            lanes,
            lyric_batches,
        }
    }

    /// All lanes from left to right.
    #[must_use]
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// The lane of the fret, if the chart has that many lanes.
    #[must_use]
    pub fn lane(&self, fret: Fret) -> Option<&Lane> {
        self.lanes.get(fret.index())
    }

    /// Lyric batches in song order.
    #[must_use]
    pub fn lyric_batches(&self) -> &[LyricBatch] {
        &self.lyric_batches
    }

    /// Number of notes over all lanes.
    #[must_use]
    pub fn note_count(&self) -> usize {
        self.lanes.iter().map(|lane| lane.notes.len()).sum()
    }

    /// Number of notes that are no longer pending.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.notes().filter(|note| note.is_resolved()).count()
    }

    /// Iterates over all notes, lane by lane.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.lanes.iter().flat_map(|lane| lane.notes.iter())
    }

    /// Offset of the last note end, or zero for an empty chart.
    #[must_use]
    pub fn last_note_end(&self) -> TimeSpan {
        self.notes()
            .map(Note::end)
            .max()
            .unwrap_or(TimeSpan::ZERO)
    }
}
