//! Live notes and their state machine.
//!
//! Notes are kept in an arena keyed by [`NoteId`] and are advanced together
//! once per frame. A note leaves the arena exactly once, when it resolves as
//! a hit or a miss; everything that refers to it afterwards (input, stale
//! holds) finds nothing and does nothing.

use std::{collections::BTreeMap, fmt};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Band, GameConfig, GameSession, Grade, PlayMode, PointerGrading, SustainConfig};

/// Process-unique note identifier. Never reused, not even across resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub u64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    /// Spawned, not advanced yet. Input ignores it.
    Pending,
    Active,
    /// Sustain note whose press landed; waits for the release.
    Held,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    id: NoteId,
    kind: Band,
    spawn_time: f32,
    lane: Option<usize>,
    position: Position,
    sustain: Option<f32>,
    alpha: f32,
    state: NoteState,
}

impl Note {
    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn kind(&self) -> Band {
        self.kind
    }

    pub fn spawn_time(&self) -> f32 {
        self.spawn_time
    }

    pub fn lane(&self) -> Option<usize> {
        self.lane
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Tail length of a sustain note.
    pub fn sustain(&self) -> Option<f32> {
        self.sustain
    }

    pub fn is_sustain(&self) -> bool {
        self.sustain.is_some()
    }

    /// Opacity of a pointer note, fading from 1.0 towards 0.5 over its life.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    /// Trailing (upper) edge of a falling note: the tail end for sustain
    /// notes, the head otherwise.
    pub fn trailing_edge(&self) -> f32 {
        self.position.y - self.sustain.unwrap_or(0.0)
    }
}

/// How a note left the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hit(Grade),
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub id: NoteId,
    pub kind: Band,
    pub lane: Option<usize>,
    pub resolution: Resolution,
}

/// Result of a lane key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Press {
    /// A tap note was hit and removed.
    Hit(Resolved),
    /// A sustain note entered the held state.
    Held { id: NoteId, lane: usize },
}

/// Everything one [`NoteField::advance`] call did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Advanced {
    pub moved: Vec<(NoteId, Position)>,
    pub expired: Vec<Resolved>,
}

/// Field dimensions and rules, resolved to field units once.
#[derive(Debug, Clone)]
pub struct FieldGeometry {
    pub mode: PlayMode,
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    pub lanes: usize,
    pub fall_speed: f32,
    pub zone_top: f32,
    pub zone_bottom: f32,
    pub sustain: SustainConfig,
    pub hit_radius: f32,
    /// Drawn size of a pointer note; hits use `hit_radius`.
    pub note_radius: f32,
    pub life_time: f32,
    pub grading: PointerGrading,
}

impl FieldGeometry {
    pub fn from_config(config: &GameConfig) -> Self {
        let height = config.field.height;
        Self {
            mode: config.mode,
            width: config.field.width,
            height,
            padding: config.field.padding,
            lanes: config.lanes.count,
            fall_speed: config.lanes.fall_speed,
            zone_top: config.target_zone.top * height,
            zone_bottom: config.target_zone.bottom * height,
            sustain: config.sustain,
            hit_radius: config.pointer.hit_radius,
            note_radius: config.pointer.note_radius,
            life_time: config.pointer.life_time,
            grading: config.pointer.grading,
        }
    }

    pub fn lane_center(&self, lane: usize) -> f32 {
        (lane as f32 + 0.5) * self.width / self.lanes as f32
    }

    pub fn in_zone(&self, y: f32) -> bool {
        y >= self.zone_top && y <= self.zone_bottom
    }
}

/// Owner of every live note.
#[derive(Debug, Clone)]
pub struct NoteField {
    geometry: FieldGeometry,
    notes: BTreeMap<NoteId, Note>,
    next_id: u64,
}

impl NoteField {
    pub fn new(geometry: FieldGeometry) -> Self {
        Self {
            geometry,
            notes: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn geometry(&self) -> &FieldGeometry {
        &self.geometry
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(&id)
    }

    /// Live notes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn in_lane(&self, lane: usize) -> impl Iterator<Item = &Note> {
        self.notes
            .values()
            .filter(move |note| note.lane == Some(lane))
    }

    /// Spawns a note of `kind` at `now`. Falling notes start at the top of a
    /// random lane and may carry a sustain tail; pointer notes are placed
    /// anywhere inside the padded field.
    pub fn spawn<R: Rng>(&mut self, kind: Band, now: f32, rng: &mut R) -> &Note {
        let id = NoteId(self.next_id);
        self.next_id += 1;

        let geometry = &self.geometry;
        let (lane, position, sustain) = match geometry.mode {
            PlayMode::Lanes => {
                let lane = rng.random_range(0..geometry.lanes);
                let sustain = (rng.random::<f32>() < geometry.sustain.chance).then(|| {
                    rng.random_range(geometry.sustain.min_length..=geometry.sustain.max_length)
                });
                let position = Position {
                    x: geometry.lane_center(lane),
                    y: 0.0,
                };
                (Some(lane), position, sustain)
            }
            PlayMode::Pointer => {
                let pad_x = geometry.padding * geometry.width;
                let pad_y = geometry.padding * geometry.height;
                let position = Position {
                    x: rng.random_range(pad_x..=geometry.width - pad_x),
                    y: rng.random_range(pad_y..=geometry.height - pad_y),
                };
                (None, position, None)
            }
        };

        debug!(%id, ?kind, ?lane, x = position.x, y = position.y, ?sustain, "note spawned");
        self.notes.entry(id).or_insert(Note {
            id,
            kind,
            spawn_time: now,
            lane,
            position,
            sustain,
            alpha: 1.0,
            state: NoteState::Pending,
        })
    }

    /// Spawns a note with a uniformly random kind.
    pub fn spawn_random<R: Rng>(&mut self, now: f32, rng: &mut R) -> &Note {
        let kind = Band::ALL[rng.random_range(0..Band::ALL.len())];
        self.spawn(kind, now, rng)
    }

    /// Moves every live note by `dt` seconds and retires the ones that left
    /// the interaction window as misses. Hold entries of expired notes are
    /// dropped from the session.
    pub fn advance(&mut self, dt: f32, now: f32, session: &mut GameSession) -> Advanced {
        let dt = dt.max(0.0);
        let geometry = &self.geometry;
        let mut advanced = Advanced::default();
        let mut expired = Vec::new();

        for note in self.notes.values_mut() {
            if note.state == NoteState::Pending {
                note.state = NoteState::Active;
            }

            let gone = match geometry.mode {
                PlayMode::Lanes => {
                    note.position.y += geometry.fall_speed * dt;
                    note.trailing_edge() > geometry.height
                }
                PlayMode::Pointer => {
                    let age = now - note.spawn_time;
                    note.alpha = (1.0 - (age / geometry.life_time) * 0.5).clamp(0.5, 1.0);
                    age > geometry.life_time
                }
            };

            advanced.moved.push((note.id, note.position));
            if gone {
                expired.push(note.id);
            }
        }

        for id in expired {
            session.forget_hold(id);
            if let Some(resolved) = self.resolve(id, Resolution::Miss) {
                advanced.expired.push(resolved);
            }
        }

        advanced
    }

    /// Hits every active note whose centre lies within the hit radius of
    /// `(x, y)`. With timed grading, notes outside the good window stay live.
    pub fn pointer(&mut self, x: f32, y: f32, now: f32) -> Vec<Resolved> {
        if self.geometry.mode != PlayMode::Pointer {
            return Vec::new();
        }

        let radius = self.geometry.hit_radius;
        let grading = self.geometry.grading;
        let hits: Vec<(NoteId, Grade)> = self
            .notes
            .values()
            .filter(|note| note.state == NoteState::Active)
            .filter(|note| {
                let dx = x - note.position.x;
                let dy = y - note.position.y;
                (dx * dx + dy * dy).sqrt() <= radius
            })
            .filter_map(|note| {
                let grade = match grading {
                    PointerGrading::Flat => Some(Grade::Tap),
                    PointerGrading::Timed => Grade::from_offset(now - note.spawn_time),
                };
                grade.map(|grade| (note.id, grade))
            })
            .collect();

        hits.into_iter()
            .filter_map(|(id, grade)| self.resolve(id, Resolution::Hit(grade)))
            .collect()
    }

    /// Presses `lane`: the active note of that lane deepest inside the target
    /// zone is hit, or held if it is a sustain note. A lane that is already
    /// holding ignores presses.
    pub fn key_down(&mut self, lane: usize, session: &mut GameSession) -> Option<Press> {
        if self.geometry.mode != PlayMode::Lanes || lane >= self.geometry.lanes {
            return None;
        }
        if session.holding(lane).is_some() {
            return None;
        }

        let mut target: Option<&Note> = None;
        for note in self.in_lane(lane) {
            if note.state != NoteState::Active || !self.geometry.in_zone(note.position.y) {
                continue;
            }
            if target.map_or(true, |best| note.position.y > best.position.y) {
                target = Some(note);
            }
        }
        let (id, sustain) = target.map(|note| (note.id, note.is_sustain()))?;

        if sustain {
            if let Some(note) = self.notes.get_mut(&id) {
                note.state = NoteState::Held;
            }
            session.hold(lane, id);
            debug!(%id, lane, "sustain held");
            Some(Press::Held { id, lane })
        } else {
            self.resolve(id, Resolution::Hit(Grade::Tap)).map(Press::Hit)
        }
    }

    /// Releases `lane`. A held sustain note whose tail end is inside the
    /// target zone (bounds included) is a hit, anything else a miss.
    pub fn key_up(&mut self, lane: usize, session: &mut GameSession) -> Option<Resolved> {
        let id = session.release(lane)?;
        let note = self.notes.get(&id)?;
        if note.state != NoteState::Held {
            return None;
        }

        let resolution = if self.geometry.in_zone(note.trailing_edge()) {
            Resolution::Hit(Grade::Release)
        } else {
            Resolution::Miss
        };
        self.resolve(id, resolution)
    }

    /// Removes a note with the given resolution. Unknown ids are ignored, so
    /// a note can resolve at most once.
    pub fn resolve(&mut self, id: NoteId, resolution: Resolution) -> Option<Resolved> {
        let note = self.notes.remove(&id)?;
        debug!(%id, kind = ?note.kind, ?resolution, "note resolved");
        Some(Resolved {
            id,
            kind: note.kind,
            lane: note.lane,
            resolution,
        })
    }

    /// Drops every live note without resolving it. Returns how many were
    /// dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.notes.len();
        self.notes.clear();
        dropped
    }

    #[cfg(test)]
    pub(crate) fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.get_mut(&id)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn lanes_field(sustain_chance: f32) -> NoteField {
        let mut config = GameConfig::lanes_defaults();
        config.sustain.chance = sustain_chance;
        NoteField::new(FieldGeometry::from_config(&config))
    }

    fn pointer_field(grading: PointerGrading) -> NoteField {
        let mut config = GameConfig::pointer_defaults();
        config.pointer.grading = grading;
        NoteField::new(FieldGeometry::from_config(&config))
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    /// Spawns a note and pins it to `lane` at height `y`.
    fn place(field: &mut NoteField, lane: usize, y: f32, rng: &mut StdRng) -> NoteId {
        let id = field.spawn(Band::Low, 0.0, rng).id();
        let center = field.geometry().lane_center(lane);
        let note = field.note_mut(id).unwrap();
        note.lane = Some(lane);
        note.position = Position { x: center, y };
        note.state = NoteState::Active;
        id
    }

    #[test]
    fn ids_increase_monotonically() {
        let mut field = lanes_field(0.0);
        let mut rng = rng();
        let ids: Vec<NoteId> = (0..5)
            .map(|_| field.spawn(Band::Mid, 0.0, &mut rng).id())
            .collect();
        assert_eq!(ids, (0..5).map(NoteId).collect::<Vec<_>>());

        field.clear();
        assert_eq!(field.spawn(Band::Mid, 0.0, &mut rng).id(), NoteId(5));
    }

    #[test]
    fn lane_notes_spawn_at_lane_centres() {
        let mut field = lanes_field(1.0);
        let mut rng = rng();
        for _ in 0..50 {
            let note = field.spawn(Band::High, 1.5, &mut rng).clone();
            let lane = note.lane().unwrap();
            assert!(lane < 4);
            assert_eq!(note.position().x, (lane as f32 + 0.5) * 200.0);
            assert_eq!(note.position().y, 0.0);
            assert_eq!(note.state(), NoteState::Pending);
            let length = note.sustain().unwrap();
            assert!((200.0..=400.0).contains(&length));
        }
    }

    #[test]
    fn pointer_notes_stay_inside_padding() {
        let mut field = pointer_field(PointerGrading::Flat);
        let mut rng = rng();
        for _ in 0..50 {
            let note = field.spawn_random(0.0, &mut rng);
            assert!(note.lane().is_none());
            assert!(!note.is_sustain());
            let Position { x, y } = note.position();
            assert!((40.0..=760.0).contains(&x));
            assert!((30.0..=570.0).contains(&y));
        }
    }

    #[test]
    fn falling_tap_note_misses_past_the_bottom() {
        let mut field = lanes_field(0.0);
        let mut session = GameSession::new();
        let mut rng = rng();
        let id = field.spawn(Band::Low, 0.0, &mut rng).id();

        let step = field.advance(1.0, 1.0, &mut session);
        assert_eq!(step.moved, vec![(id, Position { x: field.get(id).unwrap().position().x, y: 250.0 })]);
        assert!(step.expired.is_empty());
        assert_eq!(field.get(id).unwrap().state(), NoteState::Active);

        field.advance(1.0, 2.0, &mut session);
        field.advance(0.25, 2.25, &mut session);
        assert!(field.get(id).is_some(), "y = 562.5 is still on the field");

        let step = field.advance(0.25, 2.5, &mut session);
        assert_eq!(step.expired.len(), 1);
        assert_eq!(step.expired[0].resolution, Resolution::Miss);
        assert!(field.is_empty());
    }

    #[test]
    fn press_picks_the_deepest_note_in_zone() {
        let mut field = lanes_field(0.0);
        let mut session = GameSession::new();
        let mut rng = rng();
        let shallow = place(&mut field, 1, 490.0, &mut rng);
        let deep = place(&mut field, 1, 530.0, &mut rng);
        let outside = place(&mut field, 1, 545.0, &mut rng);
        let other_lane = place(&mut field, 2, 535.0, &mut rng);

        let press = field.key_down(1, &mut session).unwrap();
        match press {
            Press::Hit(resolved) => {
                assert_eq!(resolved.id, deep);
                assert_eq!(resolved.resolution, Resolution::Hit(Grade::Tap));
            }
            other => panic!("unexpected press {other:?}"),
        }
        assert!(field.get(shallow).is_some());
        assert!(field.get(outside).is_some());
        assert!(field.get(other_lane).is_some());
    }

    #[test]
    fn press_outside_the_zone_does_nothing() {
        let mut field = lanes_field(0.0);
        let mut session = GameSession::new();
        let mut rng = rng();
        place(&mut field, 0, 100.0, &mut rng);

        assert_eq!(field.key_down(0, &mut session), None);
        assert_eq!(field.key_down(9, &mut session), None);
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn zone_bounds_are_inclusive() {
        let mut field = lanes_field(0.0);
        let mut session = GameSession::new();
        let mut rng = rng();
        let top = field.geometry().zone_top;
        let bottom = field.geometry().zone_bottom;
        place(&mut field, 0, top, &mut rng);
        place(&mut field, 3, bottom, &mut rng);

        assert!(matches!(field.key_down(0, &mut session), Some(Press::Hit(_))));
        assert!(matches!(field.key_down(3, &mut session), Some(Press::Hit(_))));
    }

    #[test]
    fn pending_notes_ignore_input() {
        let mut field = lanes_field(0.0);
        let mut session = GameSession::new();
        let mut rng = rng();
        let id = place(&mut field, 0, 500.0, &mut rng);
        field.note_mut(id).unwrap().state = NoteState::Pending;

        assert_eq!(field.key_down(0, &mut session), None);
    }

    #[test]
    fn sustain_release_inside_zone_hits() {
        let mut field = lanes_field(1.0);
        let mut session = GameSession::new();
        let mut rng = rng();
        let id = place(&mut field, 2, 500.0, &mut rng);
        field.note_mut(id).unwrap().sustain = Some(300.0);

        assert_eq!(field.key_down(2, &mut session), Some(Press::Held { id, lane: 2 }));
        assert_eq!(session.holding(2), Some(id));
        assert_eq!(field.get(id).unwrap().state(), NoteState::Held);

        // Tail end exactly on the zone's lower boundary.
        let bottom = field.geometry().zone_bottom;
        field.note_mut(id).unwrap().position.y = bottom + 300.0;
        assert_eq!(field.get(id).unwrap().trailing_edge(), bottom);
        let resolved = field.key_up(2, &mut session).unwrap();
        assert_eq!(resolved.resolution, Resolution::Hit(Grade::Release));
        assert_eq!(session.holding(2), None);
        assert!(field.get(id).is_none());
    }

    #[test]
    fn early_release_misses() {
        let mut field = lanes_field(1.0);
        let mut session = GameSession::new();
        let mut rng = rng();
        let id = place(&mut field, 0, 500.0, &mut rng);

        field.key_down(0, &mut session);
        let resolved = field.key_up(0, &mut session).unwrap();
        assert_eq!(resolved.id, id);
        assert_eq!(resolved.resolution, Resolution::Miss);
        assert!(session.active_holds().is_empty());
        assert_eq!(field.key_up(0, &mut session), None);
    }

    #[test]
    fn holding_lane_ignores_further_presses() {
        let mut field = lanes_field(1.0);
        let mut session = GameSession::new();
        let mut rng = rng();
        let held = place(&mut field, 1, 500.0, &mut rng);
        let second = place(&mut field, 1, 490.0, &mut rng);

        assert_eq!(field.key_down(1, &mut session), Some(Press::Held { id: held, lane: 1 }));
        assert_eq!(field.key_down(1, &mut session), None);
        assert_eq!(field.get(second).unwrap().state(), NoteState::Active);
    }

    #[test]
    fn held_note_scrolling_off_clears_its_hold() {
        let mut field = lanes_field(1.0);
        let mut session = GameSession::new();
        let mut rng = rng();
        let id = place(&mut field, 3, 500.0, &mut rng);
        field.key_down(3, &mut session);

        let step = field.advance(10.0, 10.0, &mut session);
        assert_eq!(step.expired.len(), 1);
        assert_eq!(step.expired[0].id, id);
        assert_eq!(session.holding(3), None);
        assert_eq!(field.key_up(3, &mut session), None);
    }

    #[test]
    fn resolving_twice_is_a_no_op() {
        let mut field = lanes_field(0.0);
        let mut rng = rng();
        let id = field.spawn(Band::Low, 0.0, &mut rng).id();

        assert!(field.resolve(id, Resolution::Hit(Grade::Tap)).is_some());
        assert!(field.resolve(id, Resolution::Hit(Grade::Tap)).is_none());
        assert!(field.resolve(id, Resolution::Miss).is_none());
    }

    #[test]
    fn pointer_hit_radius_is_inclusive_at_ninety() {
        let mut field = pointer_field(PointerGrading::Flat);
        let mut session = GameSession::new();
        let mut rng = rng();
        let id = field.spawn(Band::Mid, 0.0, &mut rng).id();
        field.advance(0.0, 0.0, &mut session);
        let Position { x, y } = field.get(id).unwrap().position();

        assert!(field.pointer(x + 95.0, y, 0.1).is_empty());
        assert!(field.get(id).is_some());

        let hits = field.pointer(x + 51.0, y + 68.0, 0.1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].resolution, Resolution::Hit(Grade::Tap));
        assert!(field.pointer(x, y, 0.1).is_empty());
    }

    #[test]
    fn pointer_geometry_carries_drawn_and_hit_radii() {
        let mut config = GameConfig::pointer_defaults();
        config.pointer.note_radius = 60.0;
        let geometry = FieldGeometry::from_config(&config);
        assert_eq!(geometry.note_radius, 60.0);
        assert_eq!(geometry.hit_radius, 90.0);
    }

    #[test]
    fn timed_pointer_hits_need_a_grade() {
        let mut field = pointer_field(PointerGrading::Timed);
        let mut session = GameSession::new();
        let mut rng = rng();
        let id = field.spawn(Band::High, 1.0, &mut rng).id();
        field.advance(0.0, 1.0, &mut session);
        let Position { x, y } = field.get(id).unwrap().position();

        assert!(field.pointer(x, y, 1.4).is_empty());
        assert!(field.get(id).is_some());

        let hits = field.pointer(x, y, 1.1);
        assert_eq!(hits[0].resolution, Resolution::Hit(Grade::Great));
    }

    #[test]
    fn pointer_notes_fade_then_expire() {
        let mut field = pointer_field(PointerGrading::Flat);
        let mut session = GameSession::new();
        let mut rng = rng();
        let id = field.spawn(Band::Low, 0.0, &mut rng).id();

        field.advance(0.016, 1.0, &mut session);
        assert!((field.get(id).unwrap().alpha() - 0.75).abs() < 1e-6);

        assert!(field.advance(0.016, 2.0, &mut session).expired.is_empty());
        let step = field.advance(0.016, 2.01, &mut session);
        assert_eq!(step.expired[0].resolution, Resolution::Miss);
    }

    #[test]
    fn input_for_the_other_mode_is_ignored() {
        let mut lanes = lanes_field(0.0);
        let mut pointer = pointer_field(PointerGrading::Flat);
        let mut session = GameSession::new();
        let mut rng = rng();
        lanes.spawn(Band::Low, 0.0, &mut rng);
        pointer.spawn(Band::Low, 0.0, &mut rng);
        lanes.advance(0.0, 0.0, &mut session);
        pointer.advance(0.0, 0.0, &mut session);

        assert!(lanes.pointer(400.0, 0.0, 0.0).is_empty());
        assert_eq!(pointer.key_down(0, &mut session), None);
    }
}
