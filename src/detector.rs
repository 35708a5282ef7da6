//! Preamble detection by matched-filter cross-correlation
//!
//! A Mode S frame opens with four pulses at 0, 1, 3.5 and 4.5 µs; at
//! 2 samples/µs those land on samples 0, 2, 7 and 9 of a 16-sample window.
//! Candidate windows are gated on raw pulse energy first, then scored by
//! normalized cross-correlation against the ideal pulse shape.

/// Samples covered by the preamble (8 µs at 2 samples/µs)
pub const PREAMBLE_SAMPLES: usize = 16;

/// Ideal preamble pulse shape, mean-centered: 1.0 at the four pulse
/// positions, 0.0 elsewhere, shifted down by 0.25.
pub const PREAMBLE_PATTERN: [f64; PREAMBLE_SAMPLES] = [
    0.75, -0.25, 0.75, -0.25, -0.25, -0.25, -0.25, 0.75, -0.25, 0.75, -0.25, -0.25, -0.25, -0.25,
    -0.25, -0.25,
];

/// Energy gate: candidates must exceed mean + SIGNAL_SIGMAS * stddev
const SIGNAL_SIGMAS: f64 = 5.0;

/// Minimum normalized correlation for a window to count as a preamble
const CORRELATION_THRESHOLD: f64 = 0.5;

/// Scans amplitude blocks for candidate frame start offsets.
pub struct PreambleDetector {
    corr_threshold: f64,
}

impl PreambleDetector {
    pub fn new() -> Self {
        Self {
            corr_threshold: CORRELATION_THRESHOLD,
        }
    }

    /// Lazily yield the start offsets of plausible preambles in `samples`.
    ///
    /// Offsets within the last 15 samples of the block can never supply a
    /// full window and are skipped, never reported as malformed.
    pub fn scan<'a>(&'a self, samples: &'a [f32]) -> impl Iterator<Item = usize> + 'a {
        let (mean, stddev) = mean_stddev(samples);
        let sig_thresh = (mean + SIGNAL_SIGMAS * stddev) as f32;

        samples
            .iter()
            .enumerate()
            .filter(move |&(_, &s)| s > sig_thresh)
            .filter_map(move |(n, _)| {
                let window = samples.get(n..n + PREAMBLE_SAMPLES)?;
                (preamble_correlation(window) > self.corr_threshold).then_some(n)
            })
    }
}

impl Default for PreambleDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalized cross-correlation of a 16-sample window against the preamble
/// pattern. The window is centered by its own mean; the pattern is already
/// zero-mean. Result is in [-1, 1]; a flat window scores 0.
pub fn preamble_correlation(window: &[f32]) -> f64 {
    debug_assert_eq!(window.len(), PREAMBLE_SAMPLES);

    let mean = window.iter().map(|&s| s as f64).sum::<f64>() / PREAMBLE_SAMPLES as f64;

    let mut dot = 0.0;
    let mut win_sq = 0.0;
    let mut pat_sq = 0.0;
    for (s, p) in window.iter().zip(PREAMBLE_PATTERN.iter()) {
        let c = *s as f64 - mean;
        dot += c * p;
        win_sq += c * c;
        pat_sq += p * p;
    }

    let denom = (win_sq * pat_sq).sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// Mean and (population) standard deviation of a sample block.
fn mean_stddev(samples: &[f32]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }

    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The noise-free preamble: unit pulses at 0, 2, 7, 9.
    fn ideal_preamble() -> [f32; PREAMBLE_SAMPLES] {
        let mut w = [0.0f32; PREAMBLE_SAMPLES];
        for &p in &[0, 2, 7, 9] {
            w[p] = 1.0;
        }
        w
    }

    #[test]
    fn test_ideal_preamble_correlates_exactly() {
        let corr = preamble_correlation(&ideal_preamble());
        assert!((corr - 1.0).abs() < 1e-9);
        assert!(corr > CORRELATION_THRESHOLD);
    }

    #[test]
    fn test_flat_window_scores_zero() {
        assert_eq!(preamble_correlation(&[3.0f32; PREAMBLE_SAMPLES]), 0.0);
    }

    #[test]
    fn test_inverted_pattern_rejected() {
        let mut w = [1.0f32; PREAMBLE_SAMPLES];
        for &p in &[0, 2, 7, 9] {
            w[p] = 0.0;
        }
        assert!(preamble_correlation(&w) < 0.0);
    }

    #[test]
    fn test_scan_finds_embedded_preamble() {
        let mut samples = vec![0.0f32; 4096];
        let offset = 1234;
        for &p in &[0, 2, 7, 9] {
            samples[offset + p] = 1.0;
        }

        let detector = PreambleDetector::new();
        let hits: Vec<usize> = detector.scan(&samples).collect();
        assert!(hits.contains(&offset));
    }

    #[test]
    fn test_scan_skips_truncated_tail_window() {
        // Pulses too close to the end of the block to fill a window
        let mut samples = vec![0.0f32; 512];
        let offset = 512 - 8;
        for &p in &[0, 2, 7] {
            samples[offset + p] = 1.0;
        }

        let detector = PreambleDetector::new();
        assert_eq!(detector.scan(&samples).count(), 0);
    }

    #[test]
    fn test_scan_rejects_uniform_noise() {
        // Uniformly distributed noise never exceeds mean + 5 sigma
        // (sigma = range/sqrt(12)), so the energy gate drops everything.
        let mut state: u32 = 0x1234_5678;
        let samples: Vec<f32> = (0..65536)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / 16_777_216.0
            })
            .collect();

        let detector = PreambleDetector::new();
        assert_eq!(detector.scan(&samples).count(), 0);
    }

    #[test]
    fn test_empty_block_yields_nothing() {
        let detector = PreambleDetector::new();
        assert_eq!(detector.scan(&[]).count(), 0);
    }
}
