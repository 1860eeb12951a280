use std::{f32::consts::PI, fmt, path::Path, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use tracing::warn;

use crate::{PulsefallError, Result};

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const SMOOTHING_TIME_CONSTANT: f32 = 0.8;

/// Real-time provider of byte frequency magnitudes.
pub trait MagnitudeSource {
    /// Sample rate the magnitudes were computed at.
    fn sample_rate(&self) -> u32;

    /// Writes the spectrum at `time` (seconds) into `bins`, one byte per bin.
    /// Returns `false` when there is no signal to report.
    fn capture(&mut self, time: f32, bins: &mut [u8]) -> Result<bool>;
}

/// Byte spectrum captured by a [`SignalSampler`] for one analysis tick.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencySnapshot {
    bins: Vec<u8>,
    sample_rate: u32,
    time: f32,
}

impl FrequencySnapshot {
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

/// Owns the snapshot buffer and the (optional) provider that fills it.
pub struct SignalSampler {
    fft_size: usize,
    snapshot: FrequencySnapshot,
    source: Option<Box<dyn MagnitudeSource>>,
}

impl SignalSampler {
    pub fn new(fft_size: usize) -> Self {
        Self {
            fft_size,
            snapshot: FrequencySnapshot {
                bins: vec![0; fft_size / 2],
                sample_rate: 0,
                time: 0.0,
            },
            source: None,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.snapshot.bins.len()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Replaces the current provider.
    pub fn attach(&mut self, source: Box<dyn MagnitudeSource>) {
        self.source = Some(source);
        self.snapshot.bins.fill(0);
    }

    pub fn detach(&mut self) {
        self.source = None;
    }

    /// Captures the spectrum at `time`. Returns `None` without a provider,
    /// without a signal, or when the provider fails; a failed capture is
    /// never exposed half-written.
    pub fn sample(&mut self, time: f32) -> Option<&FrequencySnapshot> {
        let source = self.source.as_mut()?;
        match source.capture(time, &mut self.snapshot.bins) {
            Ok(true) => {
                self.snapshot.sample_rate = source.sample_rate();
                self.snapshot.time = time;
                Some(&self.snapshot)
            }
            Ok(false) => None,
            Err(err) => {
                warn!(%err, time, "magnitude capture failed, skipping tick");
                None
            }
        }
    }
}

impl fmt::Debug for SignalSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSampler")
            .field("fft_size", &self.fft_size)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// Converts PCM frames into smoothed byte magnitudes: Blackman window,
/// forward real FFT, magnitude over N, exponential time smoothing and a
/// decibel range mapped onto `0..=255`.
pub struct SpectrumAnalyser {
    fft: FftResources,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        let fft = FftResources {
            size: fft_size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Self {
            fft,
            window: (0..fft_size)
                .map(|index| blackman_value(index, fft_size))
                .collect(),
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft.size
    }

    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }

    /// Analyses exactly one FFT frame of samples into `bins`.
    pub fn process(&mut self, frame: &[f32], bins: &mut [u8]) -> Result<()> {
        if frame.len() != self.fft.size {
            return Err(PulsefallError::InvalidInput(
                "spectrum analysis requires exactly one fft frame",
            ));
        }

        let fft = &mut self.fft;
        for ((slot, sample), weight) in fft.input.iter_mut().zip(frame).zip(&self.window) {
            *slot = sample * weight;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let scale = 1.0 / fft.size as f32;
        for ((smoothed, bin), byte) in self
            .smoothed
            .iter_mut()
            .zip(&fft.spectrum)
            .zip(bins.iter_mut())
        {
            let magnitude = bin.norm() * scale;
            *smoothed =
                SMOOTHING_TIME_CONSTANT * *smoothed + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
            *byte = decibels_to_byte(*smoothed);
        }

        Ok(())
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft", &self.fft)
            .finish()
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

/// Mono PCM audio held in memory.
#[derive(Debug, Clone)]
pub struct Track {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl Track {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PulsefallError::InvalidInput("track sample rate must be positive"));
        }
        Ok(Self {
            samples: samples.into(),
            sample_rate,
        })
    }

    /// Decodes raw little-endian `f32` samples. An empty buffer is treated as
    /// "nothing selected" and yields `None`; trailing partial samples are
    /// dropped.
    pub fn from_f32le_bytes(bytes: &[u8], sample_rate: u32) -> Result<Option<Self>> {
        if bytes.len() < 4 {
            return Ok(None);
        }
        let samples = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::new(samples, sample_rate).map(Some)
    }

    /// Loads a raw PCM file. An empty path or empty file yields `None`.
    pub fn load(path: impl AsRef<Path>, sample_rate: u32) -> Result<Option<Self>> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)?;
        Self::from_f32le_bytes(&bytes, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// [`MagnitudeSource`] that analyses the window of a [`Track`] ending at the
/// requested playback time.
#[derive(Debug)]
pub struct TrackSource {
    track: Track,
    analyser: SpectrumAnalyser,
    frame: Vec<f32>,
}

impl TrackSource {
    pub fn new(track: Track, fft_size: usize) -> Self {
        Self {
            track,
            analyser: SpectrumAnalyser::new(fft_size),
            frame: vec![0.0; fft_size],
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }
}

impl MagnitudeSource for TrackSource {
    fn sample_rate(&self) -> u32 {
        self.track.sample_rate
    }

    fn capture(&mut self, time: f32, bins: &mut [u8]) -> Result<bool> {
        let samples = self.track.samples();
        if time < 0.0 {
            return Ok(false);
        }
        let end = (time * self.track.sample_rate as f32).round() as usize;
        if end > samples.len() {
            return Ok(false);
        }

        let start = end.saturating_sub(self.frame.len());
        let available = end - start;
        let padding = self.frame.len() - available;
        self.frame[..padding].fill(0.0);
        self.frame[padding..].copy_from_slice(&samples[start..end]);

        self.analyser.process(&self.frame, bins)?;
        Ok(true)
    }
}

fn decibels_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let decibels = 20.0 * magnitude.log10();
    let scaled = 255.0 * (decibels - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

fn blackman_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    let phase = 2.0 * PI * index as f32 / len as f32;
    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}
