use std::collections::BTreeSet;

use pulsefall_core::{Game, NoteState, PlayMode};

/// Minimum age before the bot clicks a pointer note.
const POINTER_REACTION_S: f32 = 0.05;

/// Plays a game perfectly enough to demo it: lane notes are pressed once they
/// cross the middle of the target zone and sustains are released when their
/// tail gets there; pointer notes are clicked dead centre.
#[derive(Debug, Default)]
pub struct Autoplay;

impl Autoplay {
    pub fn play(&mut self, game: &mut Game) {
        match game.config().mode {
            PlayMode::Lanes => self.play_lanes(game),
            PlayMode::Pointer => self.play_pointer(game),
        }
    }

    fn play_lanes(&mut self, game: &mut Game) {
        let geometry = game.field().geometry();
        let aim = (geometry.zone_top + geometry.zone_bottom) * 0.5;
        let bottom = geometry.zone_bottom;

        let releases: Vec<usize> = game
            .session()
            .active_holds()
            .iter()
            .filter_map(|(lane, id)| {
                let note = game.field().get(*id)?;
                (note.trailing_edge() >= aim).then_some(*lane)
            })
            .collect();
        for lane in releases {
            game.key_up(lane);
        }

        let presses: BTreeSet<usize> = game
            .notes()
            .filter(|note| note.state() == NoteState::Active)
            .filter(|note| (aim..=bottom).contains(&note.position().y))
            .filter_map(|note| note.lane())
            .collect();
        for lane in presses {
            game.key_down(lane);
        }
    }

    fn play_pointer(&mut self, game: &mut Game) {
        let now = game.now();
        let targets: Vec<(f32, f32)> = game
            .notes()
            .filter(|note| note.state() == NoteState::Active)
            .filter(|note| now - note.spawn_time() >= POINTER_REACTION_S)
            .map(|note| (note.position().x, note.position().y))
            .collect();
        for (x, y) in targets {
            game.pointer(x, y);
        }
    }
}
