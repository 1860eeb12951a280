use serde::{Deserialize, Serialize};

use crate::{GameConfig, GameSession, PlayMode, Resolution};

// Timing windows for graded pointer hits, in seconds from the appear time.
pub const PERFECT_WINDOW_S: f32 = 0.08;
pub const GREAT_WINDOW_S: f32 = 0.15;
pub const GOOD_WINDOW_S: f32 = 0.25;

const PERFECT_POINTS: u32 = 300;
const GREAT_POINTS: u32 = 150;
const GOOD_POINTS: u32 = 50;
const FLAT_POINTS: u32 = 100;
const COMBO_BASE_POINTS: u32 = 100;
const COMBO_STEP_POINTS: u32 = 10;
const SUSTAIN_BONUS_POINTS: u32 = 200;

/// Quality of a successful resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Perfect,
    Great,
    Good,
    /// Ungraded press inside the hit area.
    Tap,
    /// Sustain released with its tail inside the target zone.
    Release,
}

impl Grade {
    /// Grades the absolute distance from a note's appear time. Offsets past
    /// the good window have no grade and do not count as hits.
    pub fn from_offset(offset: f32) -> Option<Grade> {
        let offset = offset.abs();
        if offset < PERFECT_WINDOW_S {
            Some(Grade::Perfect)
        } else if offset < GREAT_WINDOW_S {
            Some(Grade::Great)
        } else if offset < GOOD_WINDOW_S {
            Some(Grade::Good)
        } else {
            None
        }
    }
}

/// Result of a resolution after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Outcome {
    Hit { grade: Grade, points: u32 },
    Miss,
}

impl Outcome {
    pub fn points(&self) -> u32 {
        match self {
            Outcome::Hit { points, .. } => *points,
            Outcome::Miss => 0,
        }
    }
}

/// Points for an ungraded tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringRule {
    Flat { points: u32 },
    /// `base + combo * step`, using the combo before the hit.
    ComboScaled { base: u32, step: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringEngine {
    rule: ScoringRule,
    sustain_bonus: u32,
}

impl ScoringEngine {
    pub fn new(rule: ScoringRule) -> Self {
        Self {
            rule,
            sustain_bonus: SUSTAIN_BONUS_POINTS,
        }
    }

    pub fn for_config(config: &GameConfig) -> Self {
        match config.mode {
            PlayMode::Lanes => Self::new(ScoringRule::ComboScaled {
                base: COMBO_BASE_POINTS,
                step: COMBO_STEP_POINTS,
            }),
            PlayMode::Pointer => Self::new(ScoringRule::Flat {
                points: FLAT_POINTS,
            }),
        }
    }

    pub fn rule(&self) -> ScoringRule {
        self.rule
    }

    pub fn points_for(&self, grade: Grade, combo: u32) -> u32 {
        match grade {
            Grade::Perfect => PERFECT_POINTS,
            Grade::Great => GREAT_POINTS,
            Grade::Good => GOOD_POINTS,
            Grade::Release => self.sustain_bonus,
            Grade::Tap => match self.rule {
                ScoringRule::Flat { points } => points,
                ScoringRule::ComboScaled { base, step } => {
                    base.saturating_add(combo.saturating_mul(step))
                }
            },
        }
    }

    /// Applies one resolution to the session. Hits add points and extend the
    /// combo, misses break it; the score never goes down.
    pub fn apply(&self, session: &mut GameSession, resolution: Resolution) -> Outcome {
        match resolution {
            Resolution::Hit(grade) => {
                let points = self.points_for(grade, session.combo());
                session.award(points);
                Outcome::Hit { grade, points }
            }
            Resolution::Miss => {
                session.break_combo();
                Outcome::Miss
            }
        }
    }
}
