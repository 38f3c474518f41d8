//! A single play-through of a song.
//!
//! [`SongSession`] owns the parsed timeline and a [`JudgeEngine`], turns wall clock time into
//! song time, and translates judgment results into [`AudioIntent`]s for the host to apply.
//! Playback starts lazily on the first [`SongSession::update`].

use gametime::{TimeSpan, TimeStamp};

use crate::{
    input::InputSnapshot,
    judge::{FretHitListener, GuitarVolume, JudgeConfig, JudgeEngine, NoEffects, TickOutcome},
    lyric::LyricBatch,
    timeline::{Lane, NoteTimeline},
};

/// Something the host should do with an audio part.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioIntent {
    /// Start or continue playing the part.
    Play(String),
    /// Pause the part.
    Pause(String),
    /// Set the volume of the part, in `0.0..=1.0`.
    SetVolume(String, f32),
}

/// A loaded audio stream the session owns, such as the guitar or the backing track.
pub trait AudioPart {
    /// Name the [`AudioIntent`]s address this part with.
    fn name(&self) -> &str;

    /// Releases the underlying stream. Called exactly once, when the session closes.
    fn release(&mut self);
}

/// Settings of a session that are not about judgment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    guitar_part: String,
    #[cfg_attr(feature = "serde", serde(with = "crate::settings::span_millis"))]
    tail: TimeSpan,
    full_volume: f32,
    ducked_volume: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            guitar_part: "guitar".to_owned(),
            tail: TimeSpan::SECOND * 2,
            full_volume: 1.0,
            ducked_volume: 0.2,
        }
    }
}

impl SessionConfig {
    /// Sets the name of the part whose volume follows the judgment.
    #[must_use]
    pub fn guitar_part(mut self, name: impl Into<String>) -> Self {
        self.guitar_part = name.into();
        self
    }

    /// Sets how long the session goes on after the song length.
    #[must_use]
    pub const fn tail(mut self, tail: TimeSpan) -> Self {
        self.tail = tail;
        self
    }

    /// Sets the guitar volume after hits and after misses. Both are clamped into `0.0..=1.0`.
    #[must_use]
    pub fn volumes(mut self, full: f32, ducked: f32) -> Self {
        self.full_volume = full.clamp(0.0, 1.0);
        self.ducked_volume = ducked.clamp(0.0, 1.0);
        self
    }

    fn level(&self, volume: GuitarVolume) -> f32 {
        let level = match volume {
            GuitarVolume::Full => self.full_volume,
            GuitarVolume::Ducked => self.ducked_volume,
        };
        level.clamp(0.0, 1.0)
    }
}

/// Result of one [`SongSession::update`].
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct SessionUpdate {
    /// What the judgment did in this tick, if it ran.
    pub outcome: Option<TickOutcome>,
    /// Audio changes for the host to apply, in order.
    pub intents: Vec<AudioIntent>,
}

/// Flips exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Latch {
    fired: bool,
}

impl Latch {
    /// Returns `true` only on the first call.
    const fn fire(&mut self) -> bool {
        let first = !self.fired;
        self.fired = true;
        first
    }
}

/// One play-through of a chart.
pub struct SongSession<L: FretHitListener = NoEffects> {
    timeline: NoteTimeline,
    engine: JudgeEngine,
    song_length: TimeSpan,
    config: SessionConfig,
    listener: L,
    playback: Latch,
    start_time: Option<TimeStamp>,
    paused_at: Option<TimeStamp>,
    parts: Vec<Box<dyn AudioPart>>,
    cleanups: Vec<Box<dyn FnOnce()>>,
    closed: bool,
}

impl<L: FretHitListener> std::fmt::Debug for SongSession<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SongSession")
            .field("song_length", &self.song_length)
            .field("start_time", &self.start_time)
            .field("paused_at", &self.paused_at)
            .field("parts", &self.parts.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<L: FretHitListener> SongSession<L> {
    /// Creates a session that has not started playing yet.
    #[must_use]
    pub fn new(timeline: NoteTimeline, song_length: TimeSpan, listener: L) -> Self {
        Self {
            timeline,
            engine: JudgeEngine::default(),
            song_length,
            config: SessionConfig::default(),
            listener,
            playback: Latch::default(),
            start_time: None,
            paused_at: None,
            parts: Vec::new(),
            cleanups: Vec::new(),
            closed: false,
        }
    }

    /// Replaces the judgment configuration. Only meaningful before the first update.
    #[must_use]
    pub fn with_judge_config(mut self, config: JudgeConfig) -> Self {
        self.engine = JudgeEngine::new(config);
        self
    }

    /// Replaces the session configuration.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Hands an audio part over to the session, which releases it on close.
    pub fn add_audio_part(&mut self, part: impl AudioPart + 'static) {
        self.parts.push(Box::new(part));
    }

    /// Registers a callback run once when the session closes, after the audio parts are
    /// released. Callbacks run in registration order.
    pub fn on_close(&mut self, cleanup: impl FnOnce() + 'static) {
        self.cleanups.push(Box::new(cleanup));
    }

    /// Advances the session to `now`.
    ///
    /// The first call starts playback: it fixes the song start at `now` and asks every part
    /// to play. Nothing is judged while paused or after close.
    pub fn update(&mut self, now: TimeStamp, input: &InputSnapshot) -> SessionUpdate {
        let mut update = SessionUpdate::default();
        if self.closed {
            return update;
        }
        if self.playback.fire() {
            self.start_time = Some(now);
            update.intents.extend(self.play_all());
            log::debug!("session started with {} audio parts", self.parts.len());
        }
        if self.paused_at.is_some() {
            return update;
        }

        let elapsed = self.elapsed(now);
        let outcome = self
            .engine
            .tick(&mut self.timeline, elapsed, input, &mut self.listener);
        if let Some(volume) = outcome.guitar {
            update.intents.push(AudioIntent::SetVolume(
                self.config.guitar_part.clone(),
                self.config.level(volume),
            ));
        }
        update.outcome = Some(outcome);
        update
    }

    /// Pauses playback and judgment. Does nothing before the start, while paused or after close.
    pub fn pause(&mut self, now: TimeStamp) -> Vec<AudioIntent> {
        if self.closed || self.start_time.is_none() || self.paused_at.is_some() {
            return Vec::new();
        }
        self.paused_at = Some(now);
        log::debug!("session paused at {:?}", self.elapsed(now));
        self.parts
            .iter()
            .map(|part| AudioIntent::Pause(part.name().to_owned()))
            .collect()
    }

    /// Resumes after [`Self::pause`], leaving the paused time out of the song time.
    pub fn resume(&mut self, now: TimeStamp) -> Vec<AudioIntent> {
        if self.closed {
            return Vec::new();
        }
        let (Some(paused_at), Some(start)) = (self.paused_at.take(), self.start_time) else {
            return Vec::new();
        };
        let paused_for = now.checked_elapsed_since(paused_at).unwrap_or(TimeSpan::ZERO);
        self.start_time = Some(start + paused_for);
        log::debug!("session resumed after {paused_for:?}");
        self.play_all().collect()
    }

    /// Whether the session is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// When playback started, if it has.
    #[must_use]
    pub const fn started_at(&self) -> Option<TimeStamp> {
        self.start_time
    }

    /// Song time at `now`. Zero before the start, and frozen while paused.
    #[must_use]
    pub fn elapsed(&self, now: TimeStamp) -> TimeSpan {
        let now = self.paused_at.unwrap_or(now);
        self.start_time
            .and_then(|start| now.checked_elapsed_since(start))
            .filter(|elapsed| *elapsed > TimeSpan::ZERO)
            .unwrap_or(TimeSpan::ZERO)
    }

    /// Whether the song and its tail are over.
    #[must_use]
    pub fn finished(&self, now: TimeStamp) -> bool {
        self.start_time.is_some() && self.elapsed(now) >= self.song_length + self.config.tail
    }

    /// Length of the song without the tail.
    #[must_use]
    pub const fn song_length(&self) -> TimeSpan {
        self.song_length
    }

    /// The score so far.
    #[must_use]
    pub const fn score(&self) -> u64 {
        self.engine.score()
    }

    /// Notes hit so far.
    #[must_use]
    pub const fn notes_hit(&self) -> usize {
        self.engine.notes_hit()
    }

    /// Notes missed so far.
    #[must_use]
    pub const fn notes_missed(&self) -> usize {
        self.engine.notes_missed()
    }

    /// Notes judged so far.
    #[must_use]
    pub const fn total_notes(&self) -> usize {
        self.engine.total_notes()
    }

    /// Hit rate in whole percent of the judged notes.
    #[must_use]
    pub const fn percent(&self) -> usize {
        self.engine.percent()
    }

    /// The lyric batch to show now.
    #[must_use]
    pub fn current_lyric_batch(&self) -> Option<&LyricBatch> {
        self.engine.current_lyric_batch(&self.timeline)
    }

    /// Lanes with their notes and judgment state, for drawing.
    #[must_use]
    pub fn lanes(&self) -> &[Lane] {
        self.timeline.lanes()
    }

    /// The whole timeline.
    #[must_use]
    pub const fn timeline(&self) -> &NoteTimeline {
        &self.timeline
    }

    /// The listener receiving hit feedback.
    #[must_use]
    pub const fn listener(&self) -> &L {
        &self.listener
    }

    /// Whether [`Self::close`] already ran.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases every audio part, then runs the close callbacks in registration order.
    ///
    /// Closing again does nothing. Dropping an open session closes it.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for mut part in self.parts.drain(..) {
            part.release();
        }
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
        log::debug!(
            "session closed: score {}, {}/{} notes hit",
            self.engine.score(),
            self.engine.notes_hit(),
            self.engine.total_notes()
        );
    }

    fn play_all(&self) -> impl Iterator<Item = AudioIntent> + '_ {
        self.parts
            .iter()
            .map(|part| AudioIntent::Play(part.name().to_owned()))
    }
}

impl<L: FretHitListener> Drop for SongSession<L> {
    fn drop(&mut self) {
        self.close();
    }
}
