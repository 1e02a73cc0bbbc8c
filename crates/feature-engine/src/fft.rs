//! Short-Time Fourier Transform Spectrograms

use crate::FeatureError;
use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Analysis window applied to each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Hann,
    Hamming,
}

impl WindowKind {
    fn coefficients(&self, n: usize) -> Vec<f64> {
        let denom = (n - 1) as f64;
        (0..n)
            .map(|i| {
                let phase = (2.0 * std::f64::consts::PI * i as f64 / denom).cos();
                match self {
                    WindowKind::Hann => 0.5 - 0.5 * phase,
                    WindowKind::Hamming => 0.54 - 0.46 * phase,
                }
            })
            .collect()
    }
}

/// Parameters of the spectrogram computed for every segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramParams {
    /// Samples per frame
    pub nperseg: usize,
    /// Samples shared by consecutive frames
    pub noverlap: usize,
    pub window: WindowKind,
    /// Inclusive frequency band kept (Hz)
    pub freq_cutoffs: Option<(f64, f64)>,
    /// Take log10 of power for spectrum-shaped features
    pub log_transform: bool,
    /// Floor applied before the log
    pub log_floor: f64,
}

impl Default for SpectrogramParams {
    fn default() -> Self {
        Self {
            nperseg: 512,
            noverlap: 384,
            window: WindowKind::Hann,
            freq_cutoffs: Some((500.0, 10000.0)),
            log_transform: true,
            log_floor: 1e-10,
        }
    }
}

impl SpectrogramParams {
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.nperseg < 2 {
            return Err(FeatureError::InvalidSpectParams(format!(
                "nperseg must be at least 2, got {}",
                self.nperseg
            )));
        }
        if self.noverlap >= self.nperseg {
            return Err(FeatureError::InvalidSpectParams(format!(
                "noverlap ({}) must be smaller than nperseg ({})",
                self.noverlap, self.nperseg
            )));
        }
        if let Some((lo, hi)) = self.freq_cutoffs {
            if !(lo >= 0.0 && lo < hi) {
                return Err(FeatureError::InvalidSpectParams(format!(
                    "freq_cutoffs must be ascending and non-negative, got ({lo}, {hi})"
                )));
            }
        }
        if !(self.log_floor > 0.0) {
            return Err(FeatureError::InvalidSpectParams(
                "log_floor must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn hop(&self) -> usize {
        self.nperseg - self.noverlap
    }

    /// Indices of the FFT bins inside the frequency band
    pub fn band_bins(&self, sample_rate: u32) -> Vec<usize> {
        let resolution = f64::from(sample_rate) / self.nperseg as f64;
        (0..=self.nperseg / 2)
            .filter(|&k| {
                let freq = k as f64 * resolution;
                self.freq_cutoffs
                    .map_or(true, |(lo, hi)| freq >= lo && freq <= hi)
            })
            .collect()
    }
}

/// Power spectrogram of one segment, stored frames x frequency bins
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Linear power, one row per frame
    pub power: Array2<f64>,
    /// Bin centre frequencies (Hz)
    pub freqs: Vec<f64>,
    /// Frame centre times relative to the segment start (s)
    pub times: Vec<f64>,
    log_transform: bool,
    log_floor: f64,
}

impl Spectrogram {
    pub fn n_frames(&self) -> usize {
        self.power.nrows()
    }

    pub fn n_freqs(&self) -> usize {
        self.power.ncols()
    }

    pub fn frame(&self, t: usize) -> ArrayView1<'_, f64> {
        self.power.row(t)
    }

    pub fn log_floor(&self) -> f64 {
        self.log_floor
    }

    /// Power in the configured scale (log10 or linear)
    pub fn scaled(&self) -> Array2<f64> {
        if self.log_transform {
            self.log_power()
        } else {
            self.power.clone()
        }
    }

    pub fn log_power(&self) -> Array2<f64> {
        let floor = self.log_floor;
        self.power.mapv(|p| p.max(floor).log10())
    }

    /// Value used to pad the scaled spectrogram
    pub fn pad_value(&self) -> f64 {
        if self.log_transform {
            self.log_floor.log10()
        } else {
            0.0
        }
    }
}

/// Computes spectrograms with a cached FFT plan
pub struct SpectrogramMaker {
    params: SpectrogramParams,
    planner: FftPlanner<f64>,
    window: Vec<f64>,
    window_power: f64,
}

impl SpectrogramMaker {
    pub fn new(params: SpectrogramParams) -> Result<Self, FeatureError> {
        params.validate()?;
        let window = params.window.coefficients(params.nperseg);
        let window_power = window.iter().map(|w| w * w).sum();
        Ok(Self {
            params,
            planner: FftPlanner::new(),
            window,
            window_power,
        })
    }

    pub fn params(&self) -> &SpectrogramParams {
        &self.params
    }

    /// Number of frequency bins produced at a sample rate
    pub fn n_freq_bins(&self, sample_rate: u32) -> usize {
        self.params.band_bins(sample_rate).len()
    }

    /// Compute the spectrogram of `samples`.
    ///
    /// Returns `None` when the signal is shorter than one frame or no FFT bin
    /// falls inside the frequency band.
    pub fn compute(&mut self, samples: &[f64], sample_rate: u32) -> Option<Spectrogram> {
        let nperseg = self.params.nperseg;
        if samples.len() < nperseg {
            trace!("Segment of {} samples shorter than nperseg={}", samples.len(), nperseg);
            return None;
        }

        let bins = self.params.band_bins(sample_rate);
        if bins.is_empty() {
            return None;
        }

        let hop = self.params.hop();
        let n_frames = 1 + (samples.len() - nperseg) / hop;
        let fft = self.planner.plan_fft_forward(nperseg);
        let sr = f64::from(sample_rate);

        let mut power = Array2::<f64>::zeros((n_frames, bins.len()));
        let mut buffer: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); nperseg];

        for t in 0..n_frames {
            let start = t * hop;
            for (slot, (&x, &w)) in buffer
                .iter_mut()
                .zip(samples[start..start + nperseg].iter().zip(&self.window))
            {
                *slot = Complex::new(x * w, 0.0);
            }
            fft.process(&mut buffer);

            for (j, &k) in bins.iter().enumerate() {
                power[[t, j]] = buffer[k].norm_sqr() / self.window_power;
            }
        }

        let resolution = sr / nperseg as f64;
        let freqs = bins.iter().map(|&k| k as f64 * resolution).collect();
        let times = (0..n_frames)
            .map(|t| (t * hop) as f64 / sr + nperseg as f64 / (2.0 * sr))
            .collect();

        Some(Spectrogram {
            power,
            freqs,
            times,
            log_transform: self.params.log_transform,
            log_floor: self.params.log_floor,
        })
    }
}
