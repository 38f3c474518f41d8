//! A song session driven the way a game loop drives it.

use std::{cell::RefCell, collections::HashSet, rc::Rc};

use gametime::TimeStamp;
use pretty_assertions::assert_eq;

use rhythm_core::prelude::*;
use rhythm_core::test_helpers::{SmfBuilder, millis};

const FRAME: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Num(u8),
    Up,
    Space,
}

fn keyboard() -> InputProfile<Key> {
    InputProfile::from_keys([
        Key::Num(1),
        Key::Num(2),
        Key::Num(3),
        Key::Num(4),
        Key::Num(5),
        Key::Up,
        Key::Space,
    ])
}

struct Stream {
    name: String,
    released: Rc<RefCell<Vec<String>>>,
}

impl AudioPart for Stream {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) {
        self.released.borrow_mut().push(self.name.clone());
    }
}

fn chart(settings: &SongSettings) -> NoteTimeline {
    let bytes = SmfBuilder::millis()
        .track(Some("PART GUITAR"), |t| {
            t.note(72, 500, 500).note(73, 1000, 1500).note(96, 500, 500)
        })
        .track(Some("PART VOCALS"), |t| {
            t.lyric(400, "one").lyric(900, "two").lyric(3000, "three")
        })
        .to_bytes()
        .expect("writable chart");
    parse_chart(&bytes, settings.difficulty, millis(2000), &ChartConfig::default())
        .expect("chart must parse")
        .timeline
}

#[test]
fn play_through_with_keyboard() {
    let settings = SongSettings::default();
    let released = Rc::new(RefCell::new(Vec::new()));
    let cleaned = Rc::new(RefCell::new(false));

    let mut session = SongSession::new(chart(&settings), millis(2000), NoEffects)
        .with_judge_config(settings.judge_config());
    for name in ["guitar", "song"] {
        session.add_audio_part(Stream {
            name: name.to_owned(),
            released: Rc::clone(&released),
        });
    }
    {
        let cleaned = Rc::clone(&cleaned);
        session.on_close(move || *cleaned.borrow_mut() = true);
    }

    let profile = keyboard();
    let mut tracker = InputTracker::new();
    let start = TimeStamp::now();
    let mut intents = Vec::new();
    let mut lyrics = Vec::new();

    let mut frame = 0;
    while !session.finished(start + millis(frame * FRAME)) {
        let ms = frame * FRAME;
        let mut down = HashSet::new();
        // green for the first note, red held through the sustain
        if (500..=510).contains(&ms) {
            down.insert(Key::Num(1));
        }
        if (1000..1500).contains(&ms) {
            down.insert(Key::Num(2));
        }
        if ms == 500 || ms == 1000 {
            down.insert(Key::Space);
        }
        let input = tracker.poll(&profile, |key| down.contains(key));
        let update = session.update(start + millis(ms), &input);
        intents.extend(update.intents);

        let lyric = session.current_lyric_batch().map(LyricBatch::text);
        if lyrics.last() != Some(&lyric) {
            lyrics.push(lyric);
        }
        frame += 1;
    }

    assert_eq!(
        intents,
        vec![
            AudioIntent::Play("guitar".to_owned()),
            AudioIntent::Play("song".to_owned()),
            AudioIntent::SetVolume("guitar".to_owned(), 1.0),
            AudioIntent::SetVolume("guitar".to_owned(), 1.0),
        ]
    );
    assert_eq!(session.notes_hit(), 2);
    assert_eq!(session.total_notes(), 2);
    assert_eq!(session.percent(), 100);
    assert!(session.score() > 10);
    assert_eq!(
        lyrics,
        vec![Some("one two".to_owned()), Some("three".to_owned()), None]
    );
    assert_eq!(frame * FRAME, 4000);

    drop(session);
    assert_eq!(*released.borrow(), vec!["guitar", "song"]);
    assert!(*cleaned.borrow());
}

#[test]
fn bad_strum_ducks_guitar() {
    let settings = SongSettings::default();
    let mut session = SongSession::new(chart(&settings), millis(2000), NoEffects);
    let start = TimeStamp::now();

    let _ = session.update(start, &InputSnapshot::idle());
    let update = session.update(start + millis(100), &InputSnapshot::idle().hold(Fret::Blue).strum());
    let outcome = update.outcome.expect("judged");
    assert!(outcome.forced_miss);
    assert_eq!(
        update.intents,
        vec![AudioIntent::SetVolume("guitar".to_owned(), 0.2)]
    );
    assert_eq!(session.total_notes(), 0);
}

#[test]
fn custom_session_config() {
    let settings = SongSettings::default().with_mode(JudgeMode::Tap);
    let mut session = SongSession::new(chart(&settings), millis(2000), NoEffects)
        .with_judge_config(settings.judge_config())
        .with_config(
            SessionConfig::default()
                .guitar_part("lead")
                .volumes(0.8, 0.0)
                .tail(millis(0)),
        );
    let start = TimeStamp::now();

    let _ = session.update(start, &InputSnapshot::idle());
    let update = session.update(start + millis(500), &InputSnapshot::idle().press(Fret::Green));
    assert_eq!(
        update.intents,
        vec![AudioIntent::SetVolume("lead".to_owned(), 0.8)]
    );
    assert!(!session.finished(start + millis(1999)));
    assert!(session.finished(start + millis(2000)));
}
