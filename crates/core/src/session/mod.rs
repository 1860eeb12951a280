use std::collections::BTreeMap;

use crate::{BeatClock, NoteId};

/// Mutable state of one play-through, handed to each component by reference.
///
/// A fresh session is stopped until the game starts it. Pausing only
/// applies to a started session.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    score: u64,
    combo: u32,
    started: bool,
    paused: bool,
    active_holds: BTreeMap<usize, NoteId>,
    beat_clock: BeatClock,
}

impl Default for GameSession {
    fn default() -> Self {
        Self {
            score: 0,
            combo: 0,
            started: false,
            paused: true,
            active_holds: BTreeMap::new(),
            beat_clock: BeatClock::default(),
        }
    }
}

impl GameSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Marks the session as running. Only a started session can be resumed
    /// after a pause.
    pub fn begin(&mut self) {
        self.started = true;
        self.paused = false;
    }

    /// Has no effect on a stopped session.
    pub fn set_paused(&mut self, paused: bool) {
        if self.started {
            self.paused = paused;
        }
    }

    /// Lane to held sustain note.
    pub fn active_holds(&self) -> &BTreeMap<usize, NoteId> {
        &self.active_holds
    }

    pub fn holding(&self, lane: usize) -> Option<NoteId> {
        self.active_holds.get(&lane).copied()
    }

    pub fn beat_clock(&self) -> &BeatClock {
        &self.beat_clock
    }

    pub fn beat_clock_mut(&mut self) -> &mut BeatClock {
        &mut self.beat_clock
    }

    /// Zeroes score and combo, drops holds and beat history, and stops play.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn award(&mut self, points: u32) {
        self.score += u64::from(points);
        self.combo += 1;
    }

    pub(crate) fn break_combo(&mut self) {
        self.combo = 0;
    }

    pub(crate) fn hold(&mut self, lane: usize, id: NoteId) {
        self.active_holds.insert(lane, id);
    }

    pub(crate) fn release(&mut self, lane: usize) -> Option<NoteId> {
        self.active_holds.remove(&lane)
    }

    /// Drops every hold entry that still references `id`.
    pub(crate) fn forget_hold(&mut self, id: NoteId) {
        self.active_holds.retain(|_, held| *held != id);
    }
}
