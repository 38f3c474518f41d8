//! Chart parsing and note judgment for a five-fret rhythm game.
//!
//! The crate turns a MIDI chart into a [`timeline::NoteTimeline`] and judges the player's input
//! against it tick by tick. It never touches a window, an audio device or a clock on its own:
//! the host hands in the time and the input of each tick, and receives the audio changes to
//! apply as [`session::AudioIntent`]s.
//!
//! ```text
//! bytes -- midi::resolve_tracks --> TimedTrack -- chart::parse_tracks --> NoteTimeline
//! NoteTimeline + InputSnapshot + time -- session::SongSession::update --> AudioIntent
//! ```
//!
//! - `midi` reads Standard MIDI Files and resolves tempo into absolute time.
//! - `chart` picks the guitar and vocals parts of one difficulty out of the tracks.
//! - `lyric` groups lyrics into batches to show together.
//! - `input` describes what the player did in a tick, and derives it from key bindings.
//! - `judge` runs the per-tick judgment and keeps the score.
//! - `session` drives the judgment with wall clock time and owns the audio parts.
//! - `settings` holds the choices made before playing.
//!
//! Logging goes through the [`log`] facade. Install any logger to see chart warnings and
//! session events.

pub mod chart;
pub mod input;
pub mod judge;
pub mod lyric;
pub mod midi;
pub mod prelude;
pub mod session;
pub mod settings;
pub mod test_helpers;
pub mod timeline;
