use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info};

use crate::{
    BandAnalyzer, BeatDetector, DetectorSettings, FieldGeometry, GameConfig, GameEvent,
    GameSession, KeyMap, MagnitudeSource, Note, NoteField, Outcome, PlayMode, PlaybackClock,
    Press, Resolved, Result, ScoringEngine, SignalSampler,
};

/// One player's game: the analysis pipeline, the note field, scoring and the
/// transport, driven by two per-frame entry points.
///
/// [`Game::analysis_tick`] samples the spectrum once and spawns notes for any
/// detected beats; [`Game::advance`] moves the playback clock and every live
/// note. Both do nothing while the session is paused or not yet started.
/// Events accumulate until [`Game::drain_events`] is called.
#[derive(Debug)]
pub struct Game {
    config: GameConfig,
    sampler: SignalSampler,
    analyzer: BandAnalyzer,
    detector: BeatDetector,
    field: NoteField,
    scoring: ScoringEngine,
    keys: KeyMap,
    session: GameSession,
    clock: PlaybackClock,
    rng: StdRng,
    events: Vec<GameEvent>,
}

impl Game {
    pub fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let detector = BeatDetector::new(DetectorSettings::from_tier(
            &config.tier(),
            config.detection.discipline,
        ));

        Ok(Self {
            sampler: SignalSampler::new(config.sampler.fft_size),
            analyzer: BandAnalyzer::new(config.detection.partition),
            detector,
            field: NoteField::new(FieldGeometry::from_config(&config)),
            scoring: ScoringEngine::for_config(&config),
            keys: KeyMap::from_config(&config.lanes),
            session: GameSession::new(),
            clock: PlaybackClock::default(),
            rng,
            events: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn field(&self) -> &NoteField {
        &self.field
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.field.iter()
    }

    pub fn keys(&self) -> &KeyMap {
        &self.keys
    }

    pub fn now(&self) -> f32 {
        self.clock.now()
    }

    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }

    pub fn is_started(&self) -> bool {
        self.session.is_started()
    }

    pub fn has_source(&self) -> bool {
        self.sampler.has_source()
    }

    /// Switches to a new magnitude source and re-initialises the session.
    /// `None` stands for a cancelled selection and changes nothing. Returns
    /// whether a track was loaded.
    pub fn load_track(&mut self, source: Option<Box<dyn MagnitudeSource>>) -> bool {
        let Some(source) = source else {
            debug!("track selection cancelled");
            return false;
        };
        self.sampler.attach(source);
        self.reset();
        info!("track loaded");
        true
    }

    /// Starts a fresh play-through from time zero. Pointer games begin with a
    /// few notes already on the field.
    pub fn start(&mut self) {
        self.reset();
        if self.config.mode == PlayMode::Pointer {
            for _ in 0..self.config.pointer.initial_notes {
                let note = self.field.spawn_random(0.0, &mut self.rng);
                self.events.push(spawned(note));
            }
        }
        self.session.begin();
        info!(mode = ?self.config.mode, difficulty = ?self.config.difficulty, "session started");
    }

    /// Freezes the clock and every note in place.
    pub fn pause(&mut self) {
        if !self.session.is_paused() {
            self.session.set_paused(true);
            info!(time = self.clock.now(), "paused");
        }
    }

    /// Continues from the frozen state. A game that was never started, or
    /// was reset since, stays stopped until [`Game::start`].
    pub fn resume(&mut self) {
        if self.session.is_started() && self.session.is_paused() {
            self.session.set_paused(false);
            info!(time = self.clock.now(), "resumed");
        }
    }

    /// Drops every note and hold, zeroes score and combo, forgets the beat
    /// history and rewinds the clock. The game stays stopped until
    /// [`Game::start`].
    pub fn reset(&mut self) {
        let dropped = self.field.clear();
        self.session.reset();
        self.clock.reset();
        self.events.push(GameEvent::ScoreChanged { score: 0, combo: 0 });
        debug!(dropped, "session reset");
    }

    /// Samples the spectrum once and spawns a note per detected beat. Returns
    /// the number of notes spawned.
    pub fn analysis_tick(&mut self) -> usize {
        if self.session.is_paused() {
            return 0;
        }

        let now = self.clock.now();
        let Some(snapshot) = self.sampler.sample(now) else {
            return 0;
        };
        let bands = self.analyzer.analyze(snapshot.bins(), snapshot.sample_rate());
        let beats = self.detector.detect(
            &bands,
            now,
            self.field.len(),
            self.session.beat_clock_mut(),
        );

        for beat in &beats {
            let note = self.field.spawn(beat.band, beat.time, &mut self.rng);
            self.events.push(spawned(note));
        }
        beats.len()
    }

    /// Advances the playback clock and every live note by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        if self.session.is_paused() {
            return;
        }

        self.clock.advance(dt);
        let advanced = self
            .field
            .advance(dt, self.clock.now(), &mut self.session);
        self.events.extend(
            advanced
                .moved
                .into_iter()
                .map(|(id, position)| GameEvent::NoteAdvanced { id, position }),
        );
        for resolved in advanced.expired {
            self.settle(resolved);
        }
    }

    /// One frame: advance, then analyse at the new time.
    pub fn tick(&mut self, dt: f32) -> usize {
        self.advance(dt);
        self.analysis_tick()
    }

    /// Click or touch at field coordinates. Returns the number of notes hit.
    pub fn pointer(&mut self, x: f32, y: f32) -> usize {
        if self.session.is_paused() {
            return 0;
        }
        let hits = self.field.pointer(x, y, self.clock.now());
        let count = hits.len();
        for resolved in hits {
            self.settle(resolved);
        }
        count
    }

    pub fn key_down(&mut self, lane: usize) -> Option<Press> {
        if self.session.is_paused() {
            return None;
        }
        let press = self.field.key_down(lane, &mut self.session)?;
        match press {
            Press::Hit(resolved) => {
                self.settle(resolved);
            }
            Press::Held { id, lane } => self.events.push(GameEvent::NoteHeld { id, lane }),
        }
        Some(press)
    }

    pub fn key_up(&mut self, lane: usize) -> Option<Outcome> {
        if self.session.is_paused() {
            return None;
        }
        let resolved = self.field.key_up(lane, &mut self.session)?;
        Some(self.settle(resolved))
    }

    pub fn key_down_char(&mut self, key: char) -> Option<Press> {
        let lane = self.keys.lane_for(key)?;
        self.key_down(lane)
    }

    pub fn key_up_char(&mut self, key: char) -> Option<Outcome> {
        let lane = self.keys.lane_for(key)?;
        self.key_up(lane)
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn settle(&mut self, resolved: Resolved) -> Outcome {
        let outcome = self.scoring.apply(&mut self.session, resolved.resolution);
        self.events.push(GameEvent::NoteResolved {
            id: resolved.id,
            outcome,
            points: outcome.points(),
        });
        self.events.push(GameEvent::ScoreChanged {
            score: self.session.score(),
            combo: self.session.combo(),
        });
        outcome
    }
}

fn spawned(note: &Note) -> GameEvent {
    GameEvent::NoteSpawned {
        id: note.id(),
        kind: note.kind(),
        lane: note.lane(),
        sustain: note.sustain(),
        position: note.position(),
    }
}
