//! Resampling schemes for particle ensembles.
//!
//! Every scheme takes a normalized weight vector and returns `N` indices into
//! the current ensemble. The result is a multiset: heavy particles appear
//! several times, light ones may vanish, and the order carries no meaning.
//!
//! [`systematic_resample`] is the default. It draws a single uniform offset
//! `u0` and places `N` evenly spaced points `(u0 + i) / N` on the cumulative
//! weight distribution, so each particle `j` is selected either
//! `floor(N w_j)` or `ceil(N w_j)` times. That is strictly less variance than
//! [`multinomial_resample`], which draws the `N` points independently.
//!
//! All schemes share one cursor that walks the cumulative table exactly once,
//! so a full pass is `O(N)` (plus a sort for the multinomial scheme). The
//! cursor never moves past the last particle with positive weight; rounding in
//! the cumulative sum therefore cannot select a zero-weight tail particle or
//! run off the end of the table.
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Available resampling schemes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResamplingStrategy {
    /// Single offset, evenly spaced points (low variance)
    #[default]
    Systematic,
    /// One independent offset per stratum
    Stratified,
    /// Independent draws from the categorical distribution
    Multinomial,
    /// Deterministic integer copies, systematic on the remainder
    Residual,
}

impl ResamplingStrategy {
    /// Resample `weights` with this scheme, returning `weights.len()` indices.
    pub fn resample<R: Rng + ?Sized>(&self, weights: &[f64], rng: &mut R) -> Vec<usize> {
        match self {
            ResamplingStrategy::Systematic => systematic_resample(weights, rng),
            ResamplingStrategy::Stratified => stratified_resample(weights, rng),
            ResamplingStrategy::Multinomial => multinomial_resample(weights, rng),
            ResamplingStrategy::Residual => residual_resample(weights, rng),
        }
    }
}

/// Low-variance systematic resampling.
///
/// # Arguments
/// * `weights` - normalized, non-negative weights (must sum to one)
/// * `rng` - source of the single uniform offset
///
/// # Returns
/// * `weights.len()` indices into the ensemble
///
/// # Example
/// ```rust
/// use pfilter::resample::systematic_resample;
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let indices = systematic_resample(&[1.0, 0.0, 0.0, 0.0], &mut rng);
/// assert_eq!(indices, vec![0, 0, 0, 0]);
/// ```
pub fn systematic_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let offset: f64 = rng.random();
    systematic_resample_from_offset(weights, offset)
}

/// Systematic resampling with an explicit offset `u0` in `[0, 1)`.
///
/// This is the deterministic core of [`systematic_resample`]; the sample
/// points are `(u0 + i) / N` for `i = 0..N`.
///
/// ```rust
/// use pfilter::resample::systematic_resample_from_offset;
///
/// // points 0.0125, 0.2625, 0.5125, 0.7625 against bins [0, .1, .3, .6, 1]
/// let indices = systematic_resample_from_offset(&[0.1, 0.2, 0.3, 0.4], 0.05);
/// assert_eq!(indices, vec![0, 1, 2, 3]);
/// ```
pub fn systematic_resample_from_offset(weights: &[f64], offset: f64) -> Vec<usize> {
    debug_assert!(is_normalized(weights), "weights must sum to one");
    let n = weights.len();
    let positions: Vec<f64> = (0..n).map(|i| (offset + i as f64) / n as f64).collect();
    select_from_positions(weights, &positions)
}

/// Stratified resampling: one independent uniform draw inside each of the
/// `N` equal strata of `[0, 1)`.
pub fn stratified_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    debug_assert!(is_normalized(weights), "weights must sum to one");
    let n = weights.len();
    let positions: Vec<f64> = (0..n)
        .map(|i| (i as f64 + rng.random::<f64>()) / n as f64)
        .collect();
    select_from_positions(weights, &positions)
}

/// Multinomial resampling: `N` independent draws from the categorical
/// distribution given by `weights`.
pub fn multinomial_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    debug_assert!(is_normalized(weights), "weights must sum to one");
    let n = weights.len();
    let mut positions: Vec<f64> = (0..n).map(|_| rng.random::<f64>()).collect();
    positions.sort_by(f64::total_cmp);
    select_from_positions(weights, &positions)
}

/// Residual resampling.
///
/// Each particle is first copied `floor(N w_j)` times. The remaining slots are
/// filled by systematic resampling over the fractional residuals.
pub fn residual_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    debug_assert!(is_normalized(weights), "weights must sum to one");
    let n = weights.len();
    let mut indices = Vec::with_capacity(n);
    let mut residual = vec![0.0; n];
    for (i, &w) in weights.iter().enumerate() {
        let scaled = w * n as f64;
        let copies = scaled.floor() as usize;
        indices.extend(std::iter::repeat_n(i, copies));
        residual[i] = scaled - copies as f64;
    }
    // A weight sum rounded slightly above one can produce an extra copy.
    indices.truncate(n);
    let remaining = n - indices.len();
    if remaining > 0 {
        let sum_residual: f64 = residual.iter().sum();
        if sum_residual > 0.0 {
            let step = sum_residual / remaining as f64;
            let offset: f64 = rng.random();
            let positions: Vec<f64> = (0..remaining)
                .map(|k| (offset + k as f64) * step)
                .collect();
            indices.extend(select_from_positions(&residual, &positions));
        } else {
            let best = argmax(weights);
            indices.extend(std::iter::repeat_n(best, remaining));
        }
    }
    indices
}

/// Effective sample size `1 / sum(w^2)` of a normalized weight vector.
///
/// Equals `N` for uniform weights and `1` when all mass sits on one particle.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum_of_squares: f64 = weights.iter().map(|w| w * w).sum();
    if sum_of_squares > 0.0 {
        1.0 / sum_of_squares
    } else {
        0.0
    }
}

/// Walk the cumulative weight table once for a non-decreasing sequence of
/// positions. Position `u` selects the particle `k` with
/// `C[k] <= u < C[k + 1]`, so zero-width bins are never chosen.
fn select_from_positions(weights: &[f64], positions: &[f64]) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }
    let last = weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or(weights.len() - 1);
    let mut indices = Vec::with_capacity(positions.len());
    let mut cursor = 0;
    let mut upper = weights[0];
    for &u in positions {
        while cursor < last && u >= upper {
            cursor += 1;
            upper += weights[cursor];
        }
        indices.push(cursor);
    }
    indices
}

fn argmax(weights: &[f64]) -> usize {
    weights
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn is_normalized(weights: &[f64]) -> bool {
    weights.is_empty() || (weights.iter().sum::<f64>() - 1.0).abs() < 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn counts(indices: &[usize], n: usize) -> Vec<usize> {
        let mut counts = vec![0; n];
        for &i in indices {
            counts[i] += 1;
        }
        counts
    }

    #[test]
    fn systematic_matches_hand_computed_table() {
        // cumulative table [0, 0.1, 0.3, 0.6, 1.0]
        let weights = [0.1, 0.2, 0.3, 0.4];
        let indices = systematic_resample_from_offset(&weights, 0.05);
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn systematic_skewed_offset() {
        // points 0.225, 0.475, 0.725, 0.975
        let weights = [0.1, 0.2, 0.3, 0.4];
        let indices = systematic_resample_from_offset(&weights, 0.9);
        assert_eq!(indices, vec![1, 2, 3, 3]);
    }

    #[test]
    fn systematic_concentrated_weight() {
        let weights = [1.0, 0.0, 0.0, 0.0];
        for &offset in &[0.0, 0.3, 0.999_999] {
            assert_eq!(systematic_resample_from_offset(&weights, offset), vec![0; 4]);
        }
    }

    #[test]
    fn systematic_concentrated_on_last_particle() {
        let weights = [0.0, 0.0, 0.0, 1.0];
        assert_eq!(systematic_resample_from_offset(&weights, 0.0), vec![3; 4]);
    }

    #[test]
    fn zero_weight_particles_are_never_selected() {
        let weights = [0.0, 0.5, 0.0, 0.5, 0.0];
        for k in 0..20 {
            let offset = k as f64 / 20.0;
            let indices = systematic_resample_from_offset(&weights, offset);
            assert!(indices.iter().all(|&i| i == 1 || i == 3), "{indices:?}");
        }
    }

    #[test]
    fn rounding_short_of_one_stays_in_bounds() {
        let weights = vec![0.1; 10];
        let indices = systematic_resample_from_offset(&weights, 0.999_999_9);
        assert_eq!(indices.len(), 10);
        assert!(indices.iter().all(|&i| i < 10));
        assert_eq!(indices[9], 9);
    }

    #[test]
    fn systematic_counts_within_one_of_expectation() {
        let mut rng = StdRng::seed_from_u64(11);
        let weights = [0.05, 0.15, 0.3, 0.5];
        let n = weights.len();
        for _ in 0..100 {
            let c = counts(&systematic_resample(&weights, &mut rng), n);
            for (j, &w) in weights.iter().enumerate() {
                let expected = w * n as f64;
                assert!((c[j] as f64 - expected).abs() < 1.0 + 1e-9);
            }
        }
    }

    fn first_count_variance(trials: usize, mut draw: impl FnMut() -> Vec<usize>) -> f64 {
        let mut acc = 0.0;
        for _ in 0..trials {
            let c = counts(&draw(), 4);
            acc += (c[0] as f64 - 1.0).powi(2);
        }
        acc / trials as f64
    }

    #[test]
    fn systematic_has_lower_variance_than_multinomial() {
        let mut rng = StdRng::seed_from_u64(3);
        let weights = [0.25, 0.25, 0.25, 0.25];
        let systematic = first_count_variance(500, || systematic_resample(&weights, &mut rng));
        let multinomial = first_count_variance(500, || multinomial_resample(&weights, &mut rng));
        assert_approx_eq!(systematic, 0.0, 1e-12);
        assert!(multinomial > 0.3);
    }

    #[test]
    fn all_strategies_preserve_particle_count() {
        let mut rng = StdRng::seed_from_u64(5);
        let weights = [0.02, 0.08, 0.4, 0.1, 0.0, 0.4];
        for strategy in [
            ResamplingStrategy::Systematic,
            ResamplingStrategy::Stratified,
            ResamplingStrategy::Multinomial,
            ResamplingStrategy::Residual,
        ] {
            let indices = strategy.resample(&weights, &mut rng);
            assert_eq!(indices.len(), weights.len());
            assert!(indices.iter().all(|&i| i < weights.len() && i != 4));
        }
    }

    #[test]
    fn residual_copies_integer_part() {
        let mut rng = StdRng::seed_from_u64(1);
        // N w = [2.5, 1.0, 0.5]
        let weights = [2.5 / 4.0, 1.0 / 4.0, 0.5 / 4.0];
        let padded = [weights[0], weights[1], weights[2], 0.0];
        let c = counts(&residual_resample(&padded, &mut rng), 4);
        assert!(c[0] >= 2);
        assert!(c[1] >= 1);
        assert_eq!(c.iter().sum::<usize>(), 4);
        assert_eq!(c[3], 0);
    }

    #[test]
    fn residual_exact_integers() {
        let mut rng = StdRng::seed_from_u64(1);
        let weights = [0.5, 0.25, 0.25, 0.0];
        let c = counts(&residual_resample(&weights, &mut rng), 4);
        assert_eq!(c, vec![2, 1, 1, 0]);
    }

    #[test]
    fn effective_sample_size_bounds() {
        assert_approx_eq!(effective_sample_size(&[0.25; 4]), 4.0, 1e-12);
        assert_approx_eq!(effective_sample_size(&[1.0, 0.0, 0.0]), 1.0, 1e-12);
        assert_eq!(effective_sample_size(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn empty_weights_give_empty_indices() {
        assert!(systematic_resample_from_offset(&[], 0.5).is_empty());
    }
}
