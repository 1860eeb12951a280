use serde::{Deserialize, Serialize};

/// Frequency band a beat (and the note it spawns) originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    /// Bands in detection priority order.
    pub const ALL: [Band; 3] = [Band::Low, Band::Mid, Band::High];

    pub fn index(self) -> usize {
        match self {
            Band::Low => 0,
            Band::Mid => 1,
            Band::High => 2,
        }
    }
}

/// One value per band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerBand<T> {
    pub low: T,
    pub mid: T,
    pub high: T,
}

impl<T: Copy> PerBand<T> {
    pub fn new(low: T, mid: T, high: T) -> Self {
        Self { low, mid, high }
    }

    pub fn splat(value: T) -> Self {
        Self::new(value, value, value)
    }

    pub fn get(&self, band: Band) -> T {
        match band {
            Band::Low => self.low,
            Band::Mid => self.mid,
            Band::High => self.high,
        }
    }

    pub fn set(&mut self, band: Band, value: T) {
        match band {
            Band::Low => self.low = value,
            Band::Mid => self.mid = value,
            Band::High => self.high = value,
        }
    }
}

/// Average energy of each band for a single analysis tick.
pub type BandEnergies = PerBand<f32>;

/// How the bins of a snapshot are assigned to bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionPolicy {
    /// Fixed index ranges `[0, low_end)`, `[low_end, mid_end)`, `[mid_end, N)`
    /// regardless of the sample rate.
    IndexSplit { low_end: usize, mid_end: usize },
    /// Buckets by the centre frequency of each bin:
    /// low `[low_min_hz, low_max_hz]`, mid `(low_max_hz, mid_max_hz]`,
    /// high `(mid_max_hz, ..)`. Bins under `low_min_hz` are ignored.
    FrequencySplit {
        low_min_hz: f32,
        low_max_hz: f32,
        mid_max_hz: f32,
    },
}

impl PartitionPolicy {
    pub fn index_split() -> Self {
        Self::IndexSplit {
            low_end: 20,
            mid_end: 60,
        }
    }

    pub fn frequency_split() -> Self {
        Self::FrequencySplit {
            low_min_hz: 20.0,
            low_max_hz: 250.0,
            mid_max_hz: 2_000.0,
        }
    }
}

impl Default for PartitionPolicy {
    fn default() -> Self {
        Self::frequency_split()
    }
}

/// Reduces a byte spectrum to three band averages.
#[derive(Debug, Clone, Copy, Default)]
pub struct BandAnalyzer {
    policy: PartitionPolicy,
}

impl BandAnalyzer {
    pub fn new(policy: PartitionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PartitionPolicy {
        self.policy
    }

    /// Averages the bins of each band. Bands without members report 0.
    pub fn analyze(&self, bins: &[u8], sample_rate: u32) -> BandEnergies {
        let mut sums = PerBand::splat(0.0_f32);
        let mut counts = PerBand::splat(0_usize);

        for (index, value) in bins.iter().enumerate() {
            if let Some(band) = self.band_of(index, bins.len(), sample_rate) {
                sums.set(band, sums.get(band) + f32::from(*value));
                counts.set(band, counts.get(band) + 1);
            }
        }

        let mut energies = BandEnergies::default();
        for band in Band::ALL {
            let count = counts.get(band);
            if count > 0 {
                energies.set(band, sums.get(band) / count as f32);
            }
        }
        energies
    }

    fn band_of(&self, index: usize, len: usize, sample_rate: u32) -> Option<Band> {
        match self.policy {
            PartitionPolicy::IndexSplit { low_end, mid_end } => {
                if index < low_end {
                    Some(Band::Low)
                } else if index < mid_end {
                    Some(Band::Mid)
                } else {
                    Some(Band::High)
                }
            }
            PartitionPolicy::FrequencySplit {
                low_min_hz,
                low_max_hz,
                mid_max_hz,
            } => {
                if sample_rate == 0 {
                    return None;
                }
                let freq = index as f32 * (sample_rate as f32 / 2.0) / len as f32;
                if freq >= low_min_hz && freq <= low_max_hz {
                    Some(Band::Low)
                } else if freq > low_max_hz && freq <= mid_max_hz {
                    Some(Band::Mid)
                } else if freq > mid_max_hz {
                    Some(Band::High)
                } else {
                    None
                }
            }
        }
    }
}
