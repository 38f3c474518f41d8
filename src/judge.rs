//! Per-tick note judgment.
//!
//! [`JudgeEngine::tick`] runs once per simulation tick in two phases:
//!
//! 1. Every lane sweeps notes that can no longer be played, then scans the notes near the
//!    current time. Notes that the player tried to hit are collected as candidates, and a
//!    strum with nothing to hit on its lane is recorded as a forced miss.
//! 2. The candidates of all lanes are resolved together. A forced miss anywhere turns every
//!    candidate into a miss, so a chord is either hit completely or not at all.
//!
//! All offsets are measured as `note.start - elapsed`: positive while the note is still ahead.

use gametime::TimeSpan;

use crate::{
    input::InputSnapshot,
    lyric::LyricBatch,
    timeline::{FRET_COUNT, Lane, NoteState, NoteTimeline},
};

/// How a fret press becomes an attempt to hit a note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum JudgeMode {
    /// The fret must be held while strumming.
    #[default]
    Strum,
    /// Pressing the fret is enough.
    Tap,
}

/// Windows and scoring of the judgment.
///
/// With the `serde` feature, spans are written as whole milliseconds and missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JudgeConfig {
    #[cfg_attr(feature = "serde", serde(with = "crate::settings::span_millis"))]
    threshold_high: TimeSpan,
    #[cfg_attr(feature = "serde", serde(with = "crate::settings::span_millis"))]
    threshold_low: TimeSpan,
    #[cfg_attr(feature = "serde", serde(with = "crate::settings::span_millis"))]
    sustain_min: TimeSpan,
    hit_score: u64,
    sustain_tick_score: u64,
    sustain_effect_period: u64,
    #[cfg_attr(feature = "serde", serde(with = "crate::settings::span_millis"))]
    lyric_linger: TimeSpan,
    mode: JudgeMode,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            threshold_high: TimeSpan::MILLISECOND * 250,
            threshold_low: TimeSpan::MILLISECOND * -150,
            sustain_min: TimeSpan::MILLISECOND * 200,
            hit_score: 5,
            sustain_tick_score: 1,
            sustain_effect_period: 5,
            lyric_linger: TimeSpan::MILLISECOND * 300,
            mode: JudgeMode::Strum,
        }
    }
}

impl JudgeConfig {
    /// Sets how early a note may be played and how late it may still be played.
    ///
    /// `late` is how long after the note start it can be hit, so it is positive.
    #[must_use]
    pub fn window(mut self, early: TimeSpan, late: TimeSpan) -> Self {
        self.threshold_high = early;
        self.threshold_low = TimeSpan::ZERO - late;
        self
    }

    /// Sets the length a note must exceed to be held.
    #[must_use]
    pub const fn sustain_min(mut self, sustain_min: TimeSpan) -> Self {
        self.sustain_min = sustain_min;
        self
    }

    /// Sets the score of a hit note and of each tick a sustain is held.
    #[must_use]
    pub const fn scores(mut self, hit: u64, sustain_tick: u64) -> Self {
        self.hit_score = hit;
        self.sustain_tick_score = sustain_tick;
        self
    }

    /// Sets every how many ticks a held sustain shows hit feedback again. Zero disables it.
    #[must_use]
    pub const fn sustain_effect_period(mut self, ticks: u64) -> Self {
        self.sustain_effect_period = ticks;
        self
    }

    /// Sets how long a lyric batch stays after its last lyric.
    #[must_use]
    pub const fn lyric_linger(mut self, linger: TimeSpan) -> Self {
        self.lyric_linger = linger;
        self
    }

    /// Sets how presses are judged.
    #[must_use]
    pub const fn mode(mut self, mode: JudgeMode) -> Self {
        self.mode = mode;
        self
    }

    /// The latest `note.start - elapsed` at which a note may be played.
    #[must_use]
    pub const fn threshold_high(&self) -> TimeSpan {
        self.threshold_high
    }

    /// The earliest `note.start - elapsed` at which a note may be played. Not positive.
    #[must_use]
    pub const fn threshold_low(&self) -> TimeSpan {
        self.threshold_low
    }

    /// The length a note must exceed to be held.
    #[must_use]
    pub const fn sustain_threshold(&self) -> TimeSpan {
        self.sustain_min
    }

    /// How presses are judged.
    #[must_use]
    pub const fn judge_mode(&self) -> JudgeMode {
        self.mode
    }
}

/// Receives visual feedback of hits, such as flames over the fret.
pub trait FretHitListener {
    /// The note of the lane was played, or a sustain on it is still held.
    fn on_fret_hit(&mut self, lane: usize);
}

impl<F: FnMut(usize)> FretHitListener for F {
    fn on_fret_hit(&mut self, lane: usize) {
        self(lane);
    }
}

/// A [`FretHitListener`] that ignores everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoEffects;

impl FretHitListener for NoEffects {
    fn on_fret_hit(&mut self, _lane: usize) {}
}

/// How loud the guitar part should be after a tick that changed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GuitarVolume {
    /// A note was hit: play the guitar.
    Full,
    /// A note was missed or a strum was wrong: duck the guitar.
    Ducked,
}

/// What happened in one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct TickOutcome {
    /// Notes hit in this tick.
    pub hits: usize,
    /// Notes missed in this tick.
    pub misses: usize,
    /// A lane was played with nothing to hit.
    pub forced_miss: bool,
    /// Lanes that had a note inside the window, indexed by lane.
    pub judgable: [bool; FRET_COUNT],
    /// New guitar volume, if this tick changed it.
    pub guitar: Option<GuitarVolume>,
}

/// Judgment state of one play-through: counters, score and cursors outside the timeline.
#[derive(Debug, Clone, Default)]
pub struct JudgeEngine {
    config: JudgeConfig,
    tick_counter: u64,
    notes_hit: usize,
    notes_missed: usize,
    score: u64,
    lyric_cursor: usize,
    candidates: Vec<(usize, usize)>,
}

impl JudgeEngine {
    /// Creates an engine before the first tick.
    #[must_use]
    pub fn new(config: JudgeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Number of ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Notes hit so far.
    #[must_use]
    pub const fn notes_hit(&self) -> usize {
        self.notes_hit
    }

    /// Notes missed so far.
    #[must_use]
    pub const fn notes_missed(&self) -> usize {
        self.notes_missed
    }

    /// Notes judged so far.
    #[must_use]
    pub const fn total_notes(&self) -> usize {
        self.notes_hit + self.notes_missed
    }

    /// Hit rate in whole percent of the judged notes, zero before any note is judged.
    #[must_use]
    pub const fn percent(&self) -> usize {
        match self.total_notes() {
            0 => 0,
            total => self.notes_hit * 100 / total,
        }
    }

    /// The score so far.
    #[must_use]
    pub const fn score(&self) -> u64 {
        self.score
    }

    /// Index of the lyric batch to show.
    #[must_use]
    pub const fn lyric_cursor(&self) -> usize {
        self.lyric_cursor
    }

    /// The lyric batch to show, if any is left.
    #[must_use]
    pub fn current_lyric_batch<'a>(&self, timeline: &'a NoteTimeline) -> Option<&'a LyricBatch> {
        timeline.lyric_batches.get(self.lyric_cursor)
    }

    /// Judges one tick at `elapsed` since the song start.
    ///
    /// Never fails: a wrong or missing input only shows up as missed notes.
    pub fn tick(
        &mut self,
        timeline: &mut NoteTimeline,
        elapsed: TimeSpan,
        input: &InputSnapshot,
        effects: &mut impl FretHitListener,
    ) -> TickOutcome {
        self.tick_counter += 1;
        self.candidates.clear();

        let mut outcome = TickOutcome::default();
        let mut stop_guitar = false;

        for (lane_index, lane) in timeline.lanes.iter_mut().enumerate() {
            let lane_input = input.lane(lane_index);
            lane.hold(lane_input.held, elapsed);
            outcome.misses += self.sweep_stale(lane, elapsed);

            let pressed = match self.config.mode {
                JudgeMode::Strum => lane_input.held && input.strum_just_pressed,
                JudgeMode::Tap => lane_input.just_pressed,
            };
            let held = lane.is_held();
            let mut judgable = false;

            for (note_index, note) in lane.notes.iter_mut().enumerate().skip(lane.cursor) {
                let offset = note.start - elapsed;
                if offset > self.config.threshold_high {
                    break;
                }
                match note.state {
                    NoteState::Pending if offset < self.config.threshold_low => {
                        note.resolve(NoteState::Missed);
                        outcome.misses += 1;
                        stop_guitar = true;
                    }
                    NoteState::Pending => {
                        judgable = true;
                        if pressed {
                            self.candidates.push((lane_index, note_index));
                            effects.on_fret_hit(lane_index);
                        }
                    }
                    NoteState::Hit if note.sustaining => {
                        let lasts = note.end > elapsed && note.is_sustain(self.config.sustain_min);
                        if !lasts || !held {
                            note.sustaining = false;
                        } else {
                            self.score += self.config.sustain_tick_score;
                            let period = self.config.sustain_effect_period;
                            if period != 0 && self.tick_counter % period == 0 {
                                effects.on_fret_hit(lane_index);
                            }
                        }
                    }
                    NoteState::Hit | NoteState::Missed => {}
                }
            }

            if let Some(flag) = outcome.judgable.get_mut(lane_index) {
                *flag = judgable;
            }
            if pressed && !judgable {
                outcome.forced_miss = true;
            }
        }

        self.resolve_candidates(timeline, &mut outcome);
        if outcome.forced_miss {
            stop_guitar = true;
        }
        if stop_guitar {
            outcome.guitar = Some(GuitarVolume::Ducked);
        } else if outcome.hits > 0 {
            outcome.guitar = Some(GuitarVolume::Full);
        }

        self.notes_hit += outcome.hits;
        self.notes_missed += outcome.misses;
        self.advance_lyrics(timeline, elapsed);
        outcome
    }

    /// Moves the cursor past notes that ended too long ago, missing the ones never played.
    fn sweep_stale(&self, lane: &mut Lane, elapsed: TimeSpan) -> usize {
        let mut missed = 0;
        while let Some(note) = lane.notes.get_mut(lane.cursor) {
            if note.end >= elapsed + self.config.threshold_low {
                break;
            }
            if note.resolve(NoteState::Missed) {
                missed += 1;
            }
            note.sustaining = false;
            lane.cursor += 1;
        }
        missed
    }

    fn resolve_candidates(&mut self, timeline: &mut NoteTimeline, outcome: &mut TickOutcome) {
        let verdict = if outcome.forced_miss {
            NoteState::Missed
        } else {
            NoteState::Hit
        };
        for &(lane_index, note_index) in &self.candidates {
            let Some(note) = timeline
                .lanes
                .get_mut(lane_index)
                .and_then(|lane| lane.notes.get_mut(note_index))
            else {
                continue;
            };
            if !note.resolve(verdict) {
                continue;
            }
            match verdict {
                NoteState::Hit => {
                    note.sustaining = note.is_sustain(self.config.sustain_min);
                    outcome.hits += 1;
                    self.score += self.config.hit_score;
                }
                _ => outcome.misses += 1,
            }
        }
    }

    fn advance_lyrics(&mut self, timeline: &NoteTimeline, elapsed: TimeSpan) {
        while let Some(batch) = timeline.lyric_batches.get(self.lyric_cursor) {
            if elapsed < batch.end_time() + self.config.lyric_linger {
                break;
            }
            self.lyric_cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        lyric::{Lyric, partition_lyrics},
        timeline::{Fret, Note},
    };

    fn ms(n: i64) -> TimeSpan {
        TimeSpan::MILLISECOND * n
    }

    fn timeline(lanes: &[&[(i64, i64)]]) -> NoteTimeline {
        NoteTimeline::new(
            lanes
                .iter()
                .map(|notes| {
                    Lane::new(
                        notes
                            .iter()
                            .map(|&(start, end)| Note::new(ms(start), ms(end)))
                            .collect(),
                    )
                })
                .collect(),
            Vec::new(),
        )
    }

    fn state(timeline: &NoteTimeline, lane: usize, note: usize) -> NoteState {
        timeline.lanes()[lane].notes()[note].state()
    }

    #[test]
    fn strum_on_time_hits() {
        let mut tl = timeline(&[&[(1000, 1000)]]);
        let mut engine = JudgeEngine::default();
        let mut flames = Vec::new();

        let outcome = engine.tick(
            &mut tl,
            ms(1000),
            &InputSnapshot::idle().hold(Fret::Green).strum(),
            &mut |lane: usize| flames.push(lane),
        );

        assert_eq!(outcome.hits, 1);
        assert_eq!(outcome.guitar, Some(GuitarVolume::Full));
        assert_eq!(state(&tl, 0, 0), NoteState::Hit);
        assert!(!tl.lanes()[0].notes()[0].is_sustaining());
        assert_eq!(engine.score(), 5);
        assert_eq!(engine.notes_hit(), 1);
        assert_eq!(flames, vec![0]);
    }

    #[test]
    fn holding_without_strum_does_nothing() {
        let mut tl = timeline(&[&[(1000, 1000)]]);
        let mut engine = JudgeEngine::default();
        let outcome = engine.tick(
            &mut tl,
            ms(1000),
            &InputSnapshot::idle().hold(Fret::Green),
            &mut NoEffects,
        );
        assert_eq!(outcome.hits, 0);
        assert!(!outcome.forced_miss);
        assert!(outcome.judgable[0]);
        assert_eq!(state(&tl, 0, 0), NoteState::Pending);
    }

    #[test]
    fn strum_without_fret_does_nothing() {
        let mut tl = timeline(&[&[(1000, 1000)]]);
        let mut engine = JudgeEngine::default();
        let outcome = engine.tick(&mut tl, ms(1000), &InputSnapshot::idle().strum(), &mut NoEffects);
        assert_eq!(outcome, TickOutcome {
            judgable: [true, false, false, false, false],
            ..TickOutcome::default()
        });
    }

    #[test]
    fn window_edges() {
        let strum = InputSnapshot::idle().hold(Fret::Green).strum();

        // 250ms early is still inside
        let mut tl = timeline(&[&[(1000, 1000)]]);
        let _ = JudgeEngine::default().tick(&mut tl, ms(750), &strum, &mut NoEffects);
        assert_eq!(state(&tl, 0, 0), NoteState::Hit);

        // 251ms early is not even scanned, so the strum is a forced miss
        let mut tl = timeline(&[&[(1000, 1000)]]);
        let outcome = JudgeEngine::default().tick(&mut tl, ms(749), &strum, &mut NoEffects);
        assert!(outcome.forced_miss);
        assert_eq!(outcome.guitar, Some(GuitarVolume::Ducked));
        assert_eq!(state(&tl, 0, 0), NoteState::Pending);

        // 150ms late is still inside
        let mut tl = timeline(&[&[(1000, 1000)]]);
        let _ = JudgeEngine::default().tick(&mut tl, ms(1150), &strum, &mut NoEffects);
        assert_eq!(state(&tl, 0, 0), NoteState::Hit);
    }

    #[test]
    fn late_note_is_missed_before_player_acts() {
        let mut tl = timeline(&[&[(1000, 1000)]]);
        let mut engine = JudgeEngine::default();
        let outcome = engine.tick(&mut tl, ms(1151), &InputSnapshot::idle(), &mut NoEffects);
        assert_eq!(outcome.misses, 1);
        assert_eq!(engine.notes_missed(), 1);
        assert_eq!(state(&tl, 0, 0), NoteState::Missed);
        assert_eq!(tl.lanes()[0].cursor(), 1);

        // strumming now has nothing left to hit
        let outcome = engine.tick(
            &mut tl,
            ms(1200),
            &InputSnapshot::idle().hold(Fret::Green).strum(),
            &mut NoEffects,
        );
        assert!(outcome.forced_miss);
        assert_eq!(engine.notes_missed(), 1);
        assert_eq!(engine.score(), 0);
    }

    #[test]
    fn scan_misses_late_long_note() {
        // the note still lasts, so the sweep keeps it; the scan misses it by its start
        let mut tl = timeline(&[&[(1000, 3000)]]);
        let mut engine = JudgeEngine::default();
        let outcome = engine.tick(&mut tl, ms(1200), &InputSnapshot::idle(), &mut NoEffects);
        assert_eq!(outcome.misses, 1);
        assert_eq!(outcome.guitar, Some(GuitarVolume::Ducked));
        assert_eq!(tl.lanes()[0].cursor(), 0);
        assert_eq!(state(&tl, 0, 0), NoteState::Missed);
    }

    #[test]
    fn chord_is_all_or_nothing() {
        // green and red have notes, yellow has none
        let mut tl = timeline(&[&[(1000, 1000)], &[(1000, 1000)], &[]]);
        let mut engine = JudgeEngine::default();
        let input = InputSnapshot::idle()
            .hold(Fret::Green)
            .hold(Fret::Red)
            .hold(Fret::Yellow)
            .strum();

        let outcome = engine.tick(&mut tl, ms(1000), &input, &mut NoEffects);

        assert!(outcome.forced_miss);
        assert_eq!(outcome.hits, 0);
        assert_eq!(outcome.misses, 2);
        assert_eq!(state(&tl, 0, 0), NoteState::Missed);
        assert_eq!(state(&tl, 1, 0), NoteState::Missed);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.total_notes(), 2);
    }

    #[test]
    fn full_chord_hits() {
        let mut tl = timeline(&[&[(1000, 1000)], &[(1000, 1000)]]);
        let mut engine = JudgeEngine::default();
        let input = InputSnapshot::idle().hold(Fret::Green).hold(Fret::Red).strum();
        let outcome = engine.tick(&mut tl, ms(990), &input, &mut NoEffects);
        assert_eq!(outcome.hits, 2);
        assert_eq!(engine.score(), 10);
        assert_eq!(engine.percent(), 100);
    }

    #[test]
    fn sustain_scores_while_held() {
        let mut tl = timeline(&[&[(1000, 1400)]]);
        let mut engine = JudgeEngine::default();
        let held = InputSnapshot::idle().hold(Fret::Green);

        let _ = engine.tick(&mut tl, ms(1000), &held.strum(), &mut NoEffects);
        assert!(tl.lanes()[0].notes()[0].is_sustaining());
        assert_eq!(engine.score(), 5);

        for t in [1100, 1200, 1300] {
            let _ = engine.tick(&mut tl, ms(t), &held, &mut NoEffects);
        }
        assert_eq!(engine.score(), 8);

        // the sustain is over at its end
        let _ = engine.tick(&mut tl, ms(1400), &held, &mut NoEffects);
        assert_eq!(engine.score(), 8);
        assert!(!tl.lanes()[0].notes()[0].is_sustaining());
    }

    #[test]
    fn releasing_ends_sustain() {
        let mut tl = timeline(&[&[(1000, 1400)]]);
        let mut engine = JudgeEngine::default();
        let held = InputSnapshot::idle().hold(Fret::Green);

        let _ = engine.tick(&mut tl, ms(1000), &held.strum(), &mut NoEffects);
        let _ = engine.tick(&mut tl, ms(1100), &held, &mut NoEffects);
        let _ = engine.tick(
            &mut tl,
            ms(1200),
            &InputSnapshot::idle().release(Fret::Green),
            &mut NoEffects,
        );
        assert!(!tl.lanes()[0].notes()[0].is_sustaining());
        let _ = engine.tick(&mut tl, ms(1300), &held, &mut NoEffects);
        assert_eq!(engine.score(), 6);
        assert_eq!(state(&tl, 0, 0), NoteState::Hit);
    }

    #[test]
    fn short_note_is_not_a_sustain() {
        let mut tl = timeline(&[&[(1000, 1200)]]);
        let mut engine = JudgeEngine::default();
        let held = InputSnapshot::idle().hold(Fret::Green);
        let _ = engine.tick(&mut tl, ms(1000), &held.strum(), &mut NoEffects);
        let _ = engine.tick(&mut tl, ms(1100), &held, &mut NoEffects);
        assert!(!tl.lanes()[0].notes()[0].is_sustaining());
        assert_eq!(engine.score(), 5);
    }

    #[test]
    fn sustain_feedback_every_fifth_tick() {
        let mut tl = timeline(&[&[(0, 10_000)]]);
        let mut engine = JudgeEngine::default();
        let held = InputSnapshot::idle().hold(Fret::Green);
        let mut flames = 0;
        let mut count = |_lane: usize| flames += 1;

        // tick 1 hits, ticks 2..=10 hold
        let _ = engine.tick(&mut tl, ms(0), &held.strum(), &mut count);
        for t in 1..10 {
            let _ = engine.tick(&mut tl, ms(t * 10), &held, &mut count);
        }
        // the hit, then ticks 5 and 10
        assert_eq!(flames, 3);
        assert_eq!(engine.score(), 5 + 9);
    }

    #[test]
    fn tap_mode_uses_press_edge() {
        let mut tl = timeline(&[&[(1000, 1000)], &[(2000, 2000)]]);
        let mut engine = JudgeEngine::new(JudgeConfig::default().mode(JudgeMode::Tap));

        let _ = engine.tick(
            &mut tl,
            ms(1000),
            &InputSnapshot::idle().press(Fret::Green),
            &mut NoEffects,
        );
        assert_eq!(state(&tl, 0, 0), NoteState::Hit);

        // holding and strumming does not count in tap mode
        let outcome = engine.tick(
            &mut tl,
            ms(2000),
            &InputSnapshot::idle().hold(Fret::Red).strum(),
            &mut NoEffects,
        );
        assert_eq!(outcome.hits, 0);
        assert_eq!(state(&tl, 1, 0), NoteState::Pending);
    }

    #[test]
    fn lyric_cursor_lingers_after_batch() {
        let batches = partition_lyrics(
            [
                Lyric::new(ms(0), "a"),
                Lyric::new(ms(1000), "b"),
                Lyric::new(ms(5000), "c"),
            ],
            ms(2000),
        );
        let mut tl = NoteTimeline::new(Vec::new(), batches);
        let mut engine = JudgeEngine::default();

        let _ = engine.tick(&mut tl, ms(1299), &InputSnapshot::idle(), &mut NoEffects);
        assert_eq!(engine.current_lyric_batch(&tl).map(LyricBatch::text).as_deref(), Some("a b"));
        let _ = engine.tick(&mut tl, ms(1300), &InputSnapshot::idle(), &mut NoEffects);
        assert_eq!(engine.lyric_cursor(), 1);
        let _ = engine.tick(&mut tl, ms(9000), &InputSnapshot::idle(), &mut NoEffects);
        assert_eq!(engine.current_lyric_batch(&tl), None);
    }

    #[test]
    fn custom_window() {
        let config = JudgeConfig::default().window(ms(100), ms(50));
        assert_eq!(config.threshold_high(), ms(100));
        assert_eq!(config.threshold_low(), ms(-50));

        let mut tl = timeline(&[&[(1000, 1000)]]);
        let mut engine = JudgeEngine::new(config);
        let _ = engine.tick(&mut tl, ms(1051), &InputSnapshot::idle(), &mut NoEffects);
        assert_eq!(state(&tl, 0, 0), NoteState::Missed);
    }
}
