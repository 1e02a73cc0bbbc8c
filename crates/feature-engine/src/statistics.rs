//! Waveform and Spectrum Statistics

use ndarray::ArrayView1;

/// Distribution summary of a sample sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticalFeatures {
    pub mean: f64,
    pub std_dev: f64,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub min: f64,
    pub max: f64,
    /// Mean absolute difference between consecutive values
    pub rate_of_change: f64,
    /// Sign changes around the mean; values equal to the mean are skipped
    pub zero_crossings: usize,
}

impl StatisticalFeatures {
    /// All zeros for empty input
    pub fn compute(values: &[f64]) -> Self {
        let Some(&first) = values.first() else {
            return Self::default();
        };
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;

        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        let (mut min, mut max) = (first, first);
        for &v in values {
            let d = v - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
            min = min.min(v);
            max = max.max(v);
        }
        let (m2, m3, m4) = (m2 / n, m3 / n, m4 / n);
        let std_dev = m2.sqrt();
        let (skewness, kurtosis) = if std_dev > 0.0 {
            (m3 / (m2 * std_dev), m4 / (m2 * m2) - 3.0)
        } else {
            (0.0, 0.0)
        };

        let rate_of_change = if values.len() > 1 {
            values.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };

        let mut zero_crossings = 0;
        let mut last_positive = None;
        for &v in values {
            if v == mean {
                continue;
            }
            let positive = v > mean;
            if last_positive.is_some_and(|p| p != positive) {
                zero_crossings += 1;
            }
            last_positive = Some(positive);
        }

        Self {
            mean,
            std_dev,
            skewness,
            kurtosis,
            min,
            max,
            rate_of_change,
            zero_crossings,
        }
    }
}

/// Shape descriptors of one power spectrum, treating normalised power as a
/// distribution over frequency
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectralMoments {
    /// Power-weighted mean frequency (Hz)
    pub centroid: f64,
    /// Power-weighted standard deviation around the centroid (Hz)
    pub spread: f64,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    /// Geometric over arithmetic mean of power, in [0, 1]
    pub flatness: f64,
    /// Least-squares slope of power against frequency
    pub slope: f64,
    /// Shannon entropy of normalised power (bits)
    pub entropy: f64,
    /// Frequency of the strongest bin (Hz)
    pub dominant_frequency: f64,
}

impl SpectralMoments {
    /// Compute moments of a linear power spectrum
    pub fn compute(freqs: &[f64], power: ArrayView1<'_, f64>) -> Self {
        let total: f64 = power.sum();
        if freqs.is_empty() || freqs.len() != power.len() || !(total > 0.0) {
            return Self::default();
        }

        let n = freqs.len() as f64;
        let centroid = freqs.iter().zip(power.iter()).map(|(f, p)| f * p).sum::<f64>() / total;

        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        let mut entropy = 0.0;
        for (&f, &p) in freqs.iter().zip(power.iter()) {
            let w = p / total;
            let d = f - centroid;
            m2 += w * d * d;
            m3 += w * d * d * d;
            m4 += w * d * d * d * d;
            if w > 0.0 {
                entropy -= w * w.log2();
            }
        }
        let spread = m2.sqrt();
        let (skewness, kurtosis) = if spread > 0.0 {
            (m3 / spread.powi(3), m4 / (m2 * m2) - 3.0)
        } else {
            (0.0, 0.0)
        };

        let arith_mean = total / n;
        let log_mean = power.iter().map(|&p| p.max(f64::MIN_POSITIVE).ln()).sum::<f64>() / n;
        let flatness = (log_mean.exp() / arith_mean).clamp(0.0, 1.0);

        let freq_mean = freqs.iter().sum::<f64>() / n;
        let (mut cov, mut var) = (0.0, 0.0);
        for (&f, &p) in freqs.iter().zip(power.iter()) {
            cov += (f - freq_mean) * (p - arith_mean);
            var += (f - freq_mean) * (f - freq_mean);
        }
        let slope = if var > 0.0 { cov / var } else { 0.0 };

        let dominant_frequency = power
            .iter()
            .enumerate()
            .fold((0usize, f64::MIN), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
            .0;

        Self {
            centroid,
            spread,
            skewness,
            kurtosis,
            flatness,
            slope,
            entropy,
            dominant_frequency: freqs[dominant_frequency],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use proptest::prelude::*;

    #[test]
    fn test_sine_statistics() {
        let sr = 8000.0;
        let samples: Vec<f64> = (0..8000)
            .map(|t| 1000.0 * (2.0 * std::f64::consts::PI * 100.0 * (t as f64 + 0.5) / sr).sin())
            .collect();
        let stats = StatisticalFeatures::compute(&samples);
        assert!(stats.mean.abs() < 1e-6);
        assert!((stats.std_dev - 1000.0 / 2f64.sqrt()).abs() < 1.0);
        assert!(stats.skewness.abs() < 1e-6);
        // a sine has excess kurtosis -1.5
        assert!((stats.kurtosis + 1.5).abs() < 1e-3);
        assert!((stats.max - 1000.0).abs() < 1.0);
        assert!((stats.min + 1000.0).abs() < 1.0);
        // two crossings per cycle, one second of 100 Hz
        assert!((198..=200).contains(&stats.zero_crossings));
    }

    #[test]
    fn test_known_moments() {
        let stats = StatisticalFeatures::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std_dev, 2.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert!((stats.rate_of_change - 1.0).abs() < 1e-12);
        assert!(stats.skewness > 0.0);
    }

    #[test]
    fn test_crossings_skip_mean_values() {
        let stats = StatisticalFeatures::compute(&[1.0, 0.0, 0.0, -1.0, 0.0, 1.0]);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.zero_crossings, 2);
    }

    #[test]
    fn test_constant_and_empty() {
        let flat = StatisticalFeatures::compute(&[3.0; 10]);
        assert_eq!(flat.std_dev, 0.0);
        assert_eq!(flat.skewness, 0.0);
        assert_eq!(flat.kurtosis, 0.0);
        assert_eq!(flat.zero_crossings, 0);
        assert_eq!(StatisticalFeatures::compute(&[]), StatisticalFeatures::default());
    }

    #[test]
    fn test_flat_spectrum() {
        let freqs = [100.0, 200.0, 300.0, 400.0];
        let moments = SpectralMoments::compute(&freqs, arr1(&[1.0, 1.0, 1.0, 1.0]).view());
        assert!((moments.centroid - 250.0).abs() < 1e-9);
        assert!((moments.flatness - 1.0).abs() < 1e-9);
        assert!((moments.entropy - 2.0).abs() < 1e-9);
        assert!(moments.slope.abs() < 1e-12);
    }

    #[test]
    fn test_pure_tone_spectrum() {
        let freqs = [100.0, 200.0, 300.0, 400.0];
        let moments = SpectralMoments::compute(&freqs, arr1(&[0.0, 0.0, 5.0, 0.0]).view());
        assert_eq!(moments.dominant_frequency, 300.0);
        assert!((moments.centroid - 300.0).abs() < 1e-9);
        assert_eq!(moments.spread, 0.0);
        assert_eq!(moments.entropy, 0.0);
        assert!(moments.flatness < 1e-6);
    }

    #[test]
    fn test_rising_spectrum_has_positive_slope() {
        let freqs = [100.0, 200.0, 300.0];
        let moments = SpectralMoments::compute(&freqs, arr1(&[1.0, 2.0, 3.0]).view());
        assert!((moments.slope - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_silent_spectrum() {
        let freqs = [100.0, 200.0];
        let moments = SpectralMoments::compute(&freqs, arr1(&[0.0, 0.0]).view());
        assert_eq!(moments, SpectralMoments::default());
    }

    proptest! {
        #[test]
        fn prop_centroid_within_band(power in prop::collection::vec(0.0f64..1e6, 1..64)) {
            let freqs: Vec<f64> = (0..power.len()).map(|i| 100.0 + i as f64 * 50.0).collect();
            let moments = SpectralMoments::compute(&freqs, arr1(&power).view());
            prop_assert!(moments.centroid >= 0.0);
            prop_assert!(moments.centroid <= freqs[freqs.len() - 1] + 1e-6);
            prop_assert!((0.0..=1.0).contains(&moments.flatness));
            prop_assert!(moments.entropy >= 0.0);
        }

        #[test]
        fn prop_moments_are_consistent(values in prop::collection::vec(-3e4f64..3e4, 1..256)) {
            let stats = StatisticalFeatures::compute(&values);
            prop_assert!(stats.min <= stats.mean + 1e-9);
            prop_assert!(stats.mean <= stats.max + 1e-9);
            prop_assert!(stats.std_dev >= 0.0);
            prop_assert!(stats.std_dev <= (stats.max - stats.min) + 1e-9);
            prop_assert!(stats.kurtosis >= -2.0 - 1e-9);
            prop_assert!(stats.zero_crossings < values.len());
        }
    }
}
