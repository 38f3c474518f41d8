//! Lyrics and their grouping into displayable batches.

use gametime::TimeSpan;
use itertools::Itertools;

/// A lyric syllable placed on the song timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lyric {
    /// Offset from the song start.
    pub time: TimeSpan,
    /// The text to show.
    pub text: String,
}

impl Lyric {
    /// Creates a new lyric.
    #[must_use]
    pub fn new(time: TimeSpan, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
        }
    }
}

/// Consecutive lyrics shown together, never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricBatch {
    lyrics: Vec<Lyric>,
}

impl LyricBatch {
    /// Time of the first lyric.
    #[must_use]
    pub fn start_time(&self) -> TimeSpan {
        self.lyrics.first().map_or(TimeSpan::ZERO, |lyric| lyric.time)
    }

    /// Time of the last lyric.
    #[must_use]
    pub fn end_time(&self) -> TimeSpan {
        self.lyrics.last().map_or(TimeSpan::ZERO, |lyric| lyric.time)
    }

    /// Lyrics of the batch in order.
    #[must_use]
    pub fn lyrics(&self) -> &[Lyric] {
        &self.lyrics
    }

    /// Texts of the batch in order, as the renderer draws them.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lyrics.iter().map(|lyric| lyric.text.as_str())
    }

    /// All texts joined with a space.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines().join(" ")
    }
}

/// Splits lyrics into batches.
///
/// A lyric starts a new batch when it is more than `gap` after the *first* lyric of the current
/// batch. The distance to the previous lyric does not matter.
#[must_use]
pub fn partition_lyrics(lyrics: impl IntoIterator<Item = Lyric>, gap: TimeSpan) -> Vec<LyricBatch> {
    let mut batches: Vec<LyricBatch> = Vec::new();
    for lyric in lyrics {
        match batches.last_mut() {
            Some(batch) if lyric.time - batch.start_time() <= gap => batch.lyrics.push(lyric),
            _ => batches.push(LyricBatch {
                lyrics: vec![lyric],
            }),
        }
    }
    batches
}
