//! Core library for the Pulsefall rhythm game.
//!
//! The pipeline runs leaves first: the [`SignalSampler`] captures a byte
//! spectrum, the [`BandAnalyzer`] reduces it to low/mid/high energies, the
//! [`BeatDetector`] turns those into beats, the [`NoteField`] spawns, moves
//! and resolves notes and the [`ScoringEngine`] keeps score. [`Game`] wires
//! them together around an explicit [`GameSession`] and reports everything
//! that happens as [`GameEvent`]s for a presentation layer to draw.

pub mod analysis;
pub mod audio;
pub mod beat;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod input;
pub mod notes;
pub mod scoring;
pub mod session;
pub mod timeline;

pub use analysis::{Band, BandAnalyzer, BandEnergies, PartitionPolicy, PerBand};
pub use audio::{
    FrequencySnapshot, MagnitudeSource, SignalSampler, SpectrumAnalyser, Track, TrackSource,
};
pub use beat::{
    BeatClock, BeatDetector, BeatEvent, CooldownScope, DetectorSettings, FiringDiscipline,
};
pub use config::{
    DetectionConfig, Difficulty, FieldConfig, GameConfig, LaneConfig, PlayMode, PointerConfig,
    PointerGrading, SamplerConfig, SustainConfig, TargetZone, TierSettings,
};
pub use error::{PulsefallError, Result};
pub use events::GameEvent;
pub use game::Game;
pub use input::{DisplayRect, KeyMap, PointerMapper};
pub use notes::{
    Advanced, FieldGeometry, Note, NoteField, NoteId, NoteState, Position, Press, Resolution,
    Resolved,
};
pub use scoring::{Grade, Outcome, ScoringEngine, ScoringRule};
pub use session::GameSession;
pub use timeline::PlaybackClock;
