use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{FiringDiscipline, PartitionPolicy, PulsefallError, Result};

/// Top-level configuration structure for a game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub difficulty: Difficulty,
    pub mode: PlayMode,
    pub field: FieldConfig,
    pub lanes: LaneConfig,
    pub sustain: SustainConfig,
    pub pointer: PointerConfig,
    pub target_zone: TargetZone,
    pub detection: DetectionConfig,
    pub sampler: SamplerConfig,
    /// Fixed RNG seed. Unset seeds from entropy.
    pub seed: Option<u64>,
}

impl GameConfig {
    /// Reads a (possibly partial) JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn lanes_defaults() -> Self {
        Self::default()
    }

    pub fn pointer_defaults() -> Self {
        Self {
            mode: PlayMode::Pointer,
            ..Self::default()
        }
    }

    /// Detector settings in effect: the custom table if present, otherwise
    /// the difficulty tier.
    pub fn tier(&self) -> TierSettings {
        self.detection
            .custom_tier
            .unwrap_or_else(|| self.difficulty.settings())
    }

    pub fn validate(&self) -> Result<()> {
        if !(positive(self.field.width) && positive(self.field.height)) {
            return Err(PulsefallError::config("field dimensions must be positive"));
        }
        if !(0.0..0.5).contains(&self.field.padding) {
            return Err(PulsefallError::config("field padding must be in [0, 0.5)"));
        }
        if self.lanes.count == 0 {
            return Err(PulsefallError::config("at least one lane is required"));
        }
        if !positive(self.lanes.fall_speed) {
            return Err(PulsefallError::config("fall speed must be positive"));
        }
        if !(0.0..=1.0).contains(&self.sustain.chance) {
            return Err(PulsefallError::config("sustain chance must be in [0, 1]"));
        }
        let sustain = self.sustain;
        if !(positive(sustain.min_length)
            && positive(sustain.max_length)
            && sustain.min_length <= sustain.max_length)
        {
            return Err(PulsefallError::config(format!(
                "sustain length range [{}, {}] is empty",
                sustain.min_length, sustain.max_length
            )));
        }
        let zone = self.target_zone;
        if !(0.0 <= zone.top && zone.top <= zone.bottom && zone.bottom <= 1.0) {
            return Err(PulsefallError::config(
                "target zone must satisfy 0 <= top <= bottom <= 1",
            ));
        }
        let pointer = self.pointer;
        if !(positive(pointer.hit_radius)
            && positive(pointer.note_radius)
            && positive(pointer.life_time))
        {
            return Err(PulsefallError::config(
                "pointer radii and life time must be positive",
            ));
        }
        let fft = self.sampler.fft_size;
        if fft < 32 || !fft.is_power_of_two() {
            return Err(PulsefallError::config(format!(
                "fft size {fft} must be a power of two of at least 32"
            )));
        }
        if let PartitionPolicy::IndexSplit { low_end, mid_end } = self.detection.partition {
            if low_end > mid_end {
                return Err(PulsefallError::config("index split requires low_end <= mid_end"));
            }
        }
        if self.tier().max_active_notes == 0 {
            return Err(PulsefallError::config("max active notes must be at least 1"));
        }
        Ok(())
    }
}

/// Declared difficulty tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn settings(self) -> TierSettings {
        match self {
            Difficulty::Easy => TierSettings {
                spawn_cooldown_ms: 400,
                max_active_notes: 4,
                low_threshold: 170.0,
                mid_threshold: 140.0,
                high_threshold: 120.0,
            },
            Difficulty::Normal => TierSettings {
                spawn_cooldown_ms: 200,
                max_active_notes: 8,
                low_threshold: 150.0,
                mid_threshold: 120.0,
                high_threshold: 100.0,
            },
            Difficulty::Hard => TierSettings {
                spawn_cooldown_ms: 120,
                max_active_notes: 14,
                low_threshold: 130.0,
                mid_threshold: 100.0,
                high_threshold: 80.0,
            },
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = PulsefallError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(PulsefallError::config(format!("unknown difficulty `{other}`"))),
        }
    }
}

/// Beat detector tuning for one difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierSettings {
    pub spawn_cooldown_ms: u32,
    pub max_active_notes: usize,
    pub low_threshold: f32,
    pub mid_threshold: f32,
    pub high_threshold: f32,
}

/// Input model, which also selects the note trajectory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Notes fall down lanes and are hit with lane keys.
    #[default]
    Lanes,
    /// Notes sit at random positions, fade out and are hit by clicks/touches.
    Pointer,
}

/// Play area in field units (pixels for the browser front end).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub width: f32,
    pub height: f32,
    /// Fraction of each side kept clear of pointer notes.
    pub padding: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            padding: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    pub count: usize,
    /// Keys bound to lanes, left to right.
    pub keys: Vec<char>,
    /// Fall speed in field units per second.
    pub fall_speed: f32,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            count: 4,
            keys: vec!['d', 'f', 'j', 'k'],
            fall_speed: 250.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SustainConfig {
    pub chance: f32,
    pub min_length: f32,
    pub max_length: f32,
}

impl Default for SustainConfig {
    fn default() -> Self {
        Self {
            chance: 0.20,
            min_length: 200.0,
            max_length: 400.0,
        }
    }
}

/// How pointer hits are scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerGrading {
    /// Any hit inside the radius is worth a flat amount.
    #[default]
    Flat,
    /// Hits are graded Perfect/Great/Good by distance from the appear time.
    Timed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    pub hit_radius: f32,
    pub note_radius: f32,
    /// Seconds a pointer note stays on screen before it counts as missed.
    pub life_time: f32,
    pub grading: PointerGrading,
    /// Notes placed when a session starts, before any beat is heard.
    pub initial_notes: usize,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            hit_radius: 90.0,
            note_radius: 80.0,
            life_time: 2.0,
            grading: PointerGrading::Flat,
            initial_notes: 3,
        }
    }
}

/// Vertical band, as fractions of the field height, where lane presses land.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetZone {
    pub top: f32,
    pub bottom: f32,
}

impl Default for TargetZone {
    fn default() -> Self {
        Self {
            top: 0.80,
            bottom: 0.90,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub partition: PartitionPolicy,
    pub discipline: FiringDiscipline,
    /// Overrides the difficulty table when set.
    pub custom_tier: Option<TierSettings>,
}

/// Configuration of the magnitude source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub fft_size: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { fft_size: 512 }
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}
