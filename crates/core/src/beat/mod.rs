use serde::{Deserialize, Serialize};

use crate::{Band, BandEnergies, PerBand, TierSettings};

/// The high band re-arms faster than low and mid.
const HIGH_COOLDOWN_SCALE: f32 = 0.75;

/// Which clock a band's cooldown is measured against in chord mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownScope {
    /// One clock for all bands, stamped once per firing tick.
    Shared,
    /// Every band keeps its own clock.
    #[default]
    PerBand,
}

/// How many bands may fire in one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringDiscipline {
    /// Only the highest priority qualifying band fires. Uses the shared clock.
    #[default]
    Exclusive,
    /// Every qualifying band fires.
    Chord { scope: CooldownScope },
}

/// A detected beat in one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub band: Band,
    pub time: f32,
}

/// Time of the last accepted beat, shared and per band. Unset clocks never
/// block a beat.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BeatClock {
    shared: Option<f32>,
    bands: PerBand<Option<f32>>,
}

impl BeatClock {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn shared(&self) -> Option<f32> {
        self.shared
    }

    pub fn band(&self, band: Band) -> Option<f32> {
        self.bands.get(band)
    }
}

/// Thresholds and cooldowns (seconds) used by [`BeatDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    pub thresholds: PerBand<f32>,
    pub cooldowns: PerBand<f32>,
    pub max_active_notes: usize,
    pub discipline: FiringDiscipline,
}

impl DetectorSettings {
    pub fn from_tier(tier: &TierSettings, discipline: FiringDiscipline) -> Self {
        let cooldown = tier.spawn_cooldown_ms as f32 / 1_000.0;
        Self {
            thresholds: PerBand::new(tier.low_threshold, tier.mid_threshold, tier.high_threshold),
            cooldowns: PerBand::new(cooldown, cooldown, cooldown * HIGH_COOLDOWN_SCALE),
            max_active_notes: tier.max_active_notes,
            discipline,
        }
    }
}

/// Cooldown-gated threshold classifier over band energies.
#[derive(Debug, Clone)]
pub struct BeatDetector {
    settings: DetectorSettings,
}

impl BeatDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Evaluates low, mid and high in that order and stamps `clock` for every
    /// beat that fires. At most `max_active_notes - live_notes` beats fire, so
    /// spawning them never takes the field past the cap.
    pub fn detect(
        &self,
        bands: &BandEnergies,
        now: f32,
        live_notes: usize,
        clock: &mut BeatClock,
    ) -> Vec<BeatEvent> {
        let mut events = Vec::new();
        let room = self.settings.max_active_notes.saturating_sub(live_notes);
        if room == 0 {
            return events;
        }

        match self.settings.discipline {
            FiringDiscipline::Exclusive => {
                if let Some(band) = Band::ALL
                    .into_iter()
                    .find(|band| self.qualifies(*band, bands, now, clock.shared))
                {
                    clock.shared = Some(now);
                    events.push(BeatEvent { band, time: now });
                }
            }
            FiringDiscipline::Chord {
                scope: CooldownScope::Shared,
            } => {
                let last = clock.shared;
                events.extend(
                    Band::ALL
                        .into_iter()
                        .filter(|band| self.qualifies(*band, bands, now, last))
                        .take(room)
                        .map(|band| BeatEvent { band, time: now }),
                );
                if !events.is_empty() {
                    clock.shared = Some(now);
                }
            }
            FiringDiscipline::Chord {
                scope: CooldownScope::PerBand,
            } => {
                for band in Band::ALL {
                    if events.len() == room {
                        break;
                    }
                    if self.qualifies(band, bands, now, clock.bands.get(band)) {
                        clock.bands.set(band, Some(now));
                        events.push(BeatEvent { band, time: now });
                    }
                }
            }
        }

        events
    }

    fn qualifies(&self, band: Band, bands: &BandEnergies, now: f32, last: Option<f32>) -> bool {
        bands.get(band) > self.settings.thresholds.get(band)
            && last
                .map(|last| now - last > self.settings.cooldowns.get(band))
                .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Difficulty;

    fn settings(discipline: FiringDiscipline) -> DetectorSettings {
        DetectorSettings {
            thresholds: PerBand::new(150.0, 120.0, 100.0),
            cooldowns: PerBand::splat(0.2),
            max_active_notes: 8,
            discipline,
        }
    }

    fn loud() -> BandEnergies {
        PerBand::new(200.0, 200.0, 200.0)
    }

    #[test]
    fn silence_never_fires() {
        let detector = BeatDetector::new(settings(FiringDiscipline::Exclusive));
        let mut clock = BeatClock::default();
        for step in 0..20 {
            let events = detector.detect(&BandEnergies::default(), step as f32 * 0.1, 0, &mut clock);
            assert!(events.is_empty());
        }
        assert_eq!(clock, BeatClock::default());
    }

    #[test]
    fn cooldown_gates_repeated_bass() {
        let detector = BeatDetector::new(settings(FiringDiscipline::Exclusive));
        let mut clock = BeatClock::default();
        let bass = PerBand::new(200.0, 0.0, 0.0);

        let first = detector.detect(&bass, 0.0, 0, &mut clock);
        assert_eq!(first, vec![BeatEvent { band: Band::Low, time: 0.0 }]);
        assert!(detector.detect(&bass, 0.1, 0, &mut clock).is_empty());
        let third = detector.detect(&bass, 0.25, 0, &mut clock);
        assert_eq!(third, vec![BeatEvent { band: Band::Low, time: 0.25 }]);
    }

    #[test]
    fn threshold_is_strict() {
        let detector = BeatDetector::new(settings(FiringDiscipline::Exclusive));
        let mut clock = BeatClock::default();
        let at_threshold = PerBand::new(150.0, 120.0, 100.0);
        assert!(detector.detect(&at_threshold, 1.0, 0, &mut clock).is_empty());
    }

    #[test]
    fn exclusive_fires_highest_priority_band_only() {
        let detector = BeatDetector::new(settings(FiringDiscipline::Exclusive));
        let mut clock = BeatClock::default();

        let events = detector.detect(&loud(), 1.0, 0, &mut clock);
        assert_eq!(events, vec![BeatEvent { band: Band::Low, time: 1.0 }]);

        let mid_only = PerBand::new(0.0, 200.0, 0.0);
        assert!(detector.detect(&mid_only, 1.1, 0, &mut clock).is_empty());
        let events = detector.detect(&mid_only, 1.3, 0, &mut clock);
        assert_eq!(events[0].band, Band::Mid);
        assert_eq!(clock.shared(), Some(1.3));
    }

    #[test]
    fn chord_fires_every_qualifying_band() {
        let detector = BeatDetector::new(settings(FiringDiscipline::Chord {
            scope: CooldownScope::PerBand,
        }));
        let mut clock = BeatClock::default();

        let events = detector.detect(&PerBand::new(200.0, 0.0, 200.0), 1.0, 0, &mut clock);
        let bands: Vec<Band> = events.iter().map(|event| event.band).collect();
        assert_eq!(bands, vec![Band::Low, Band::High]);

        // Mid has never fired, so its own clock lets it through.
        let events = detector.detect(&loud(), 1.1, 0, &mut clock);
        let bands: Vec<Band> = events.iter().map(|event| event.band).collect();
        assert_eq!(bands, vec![Band::Mid]);
        assert_eq!(clock.band(Band::Low), Some(1.0));
        assert_eq!(clock.band(Band::Mid), Some(1.1));
    }

    #[test]
    fn chord_with_shared_clock_blocks_all_bands() {
        let detector = BeatDetector::new(settings(FiringDiscipline::Chord {
            scope: CooldownScope::Shared,
        }));
        let mut clock = BeatClock::default();

        assert_eq!(detector.detect(&loud(), 1.0, 0, &mut clock).len(), 3);
        assert!(detector.detect(&loud(), 1.1, 0, &mut clock).is_empty());
        assert_eq!(detector.detect(&loud(), 1.3, 0, &mut clock).len(), 3);
    }

    #[test]
    fn note_cap_suppresses_spawning() {
        let detector = BeatDetector::new(settings(FiringDiscipline::Exclusive));
        let mut clock = BeatClock::default();
        assert!(detector.detect(&loud(), 1.0, 8, &mut clock).is_empty());
        assert_eq!(clock, BeatClock::default());
        assert_eq!(detector.detect(&loud(), 1.0, 7, &mut clock).len(), 1);
    }

    #[test]
    fn chord_stops_at_the_note_cap() {
        let detector = BeatDetector::new(settings(FiringDiscipline::Chord {
            scope: CooldownScope::PerBand,
        }));
        let mut clock = BeatClock::default();

        let events = detector.detect(&loud(), 1.0, 7, &mut clock);
        assert_eq!(events, vec![BeatEvent { band: Band::Low, time: 1.0 }]);
        // Bands cut by the cap keep an unset clock.
        assert_eq!(clock.band(Band::Mid), None);
        assert_eq!(clock.band(Band::High), None);

        let events = detector.detect(&loud(), 1.05, 6, &mut clock);
        let bands: Vec<Band> = events.iter().map(|event| event.band).collect();
        assert_eq!(bands, vec![Band::Mid, Band::High]);

        let shared = BeatDetector::new(settings(FiringDiscipline::Chord {
            scope: CooldownScope::Shared,
        }));
        let mut clock = BeatClock::default();
        let events = shared.detect(&loud(), 1.0, 6, &mut clock);
        let bands: Vec<Band> = events.iter().map(|event| event.band).collect();
        assert_eq!(bands, vec![Band::Low, Band::Mid]);
    }

    #[test]
    fn tier_cooldowns_are_converted_to_seconds() {
        let settings =
            DetectorSettings::from_tier(&Difficulty::Normal.settings(), FiringDiscipline::Exclusive);
        assert!((settings.cooldowns.low - 0.2).abs() < 1e-6);
        assert!((settings.cooldowns.mid - 0.2).abs() < 1e-6);
        assert!((settings.cooldowns.high - 0.15).abs() < 1e-6);
        assert_eq!(settings.thresholds.low, 150.0);
    }
}
