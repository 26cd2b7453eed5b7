//! Prior distributions over individual state dimensions.
//!
//! The filter needs exactly one thing from a prior: "draw `n` samples". Any
//! [`rand_distr::Distribution<f64>`] already provides that, so [`Prior`] is
//! implemented for all of them and a prior list is simply
//! `Vec<Box<dyn Prior>>`:
//!
//! ```rust
//! use pfilter::prior::Prior;
//! use rand_distr::{Normal, Uniform};
//!
//! let priors: Vec<Box<dyn Prior>> = vec![
//!     Box::new(Uniform::new(0.0, 32.0).unwrap()),
//!     Box::new(Normal::new(0.0, 1.0).unwrap()),
//! ];
//! assert_eq!(priors.len(), 2);
//! ```
use nalgebra::DVector;
use rand::RngCore;
use rand_distr::{Distribution, Gamma, Normal, Uniform};

use crate::error::{FilterError, Result};

/// A sampleable distribution for one state dimension.
pub trait Prior {
    /// Draw `n` independent samples.
    fn sample_n(&self, n: usize, rng: &mut dyn RngCore) -> DVector<f64>;
}

impl<D: Distribution<f64>> Prior for D {
    fn sample_n(&self, n: usize, rng: &mut dyn RngCore) -> DVector<f64> {
        DVector::from_iterator(n, (0..n).map(|_| self.sample(rng)))
    }
}

/// Uniform prior on `[low, high)`.
pub fn uniform(low: f64, high: f64) -> Result<Box<dyn Prior>> {
    let distribution = Uniform::new(low, high).map_err(|e| {
        FilterError::InvalidConfiguration(format!("uniform prior [{low}, {high}): {e}"))
    })?;
    Ok(Box::new(distribution))
}

/// Gaussian prior with the given mean and standard deviation.
pub fn normal(mean: f64, std_dev: f64) -> Result<Box<dyn Prior>> {
    let distribution = Normal::new(mean, std_dev).map_err(|e| {
        FilterError::InvalidConfiguration(format!("normal prior ({mean}, {std_dev}): {e}"))
    })?;
    Ok(Box::new(distribution))
}

/// Gamma prior with the given shape and scale.
pub fn gamma(shape: f64, scale: f64) -> Result<Box<dyn Prior>> {
    let distribution = Gamma::new(shape, scale).map_err(|e| {
        FilterError::InvalidConfiguration(format!("gamma prior ({shape}, {scale}): {e}"))
    })?;
    Ok(Box::new(distribution))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn uniform_samples_stay_in_support() {
        let mut rng = StdRng::seed_from_u64(0);
        let prior = uniform(-2.0, 3.0).unwrap();
        let samples = prior.sample_n(1000, &mut rng);
        assert_eq!(samples.len(), 1000);
        assert!(samples.iter().all(|&x| (-2.0..3.0).contains(&x)));
    }

    #[test]
    fn normal_sample_mean() {
        let mut rng = StdRng::seed_from_u64(1);
        let prior = normal(5.0, 0.5).unwrap();
        let samples = prior.sample_n(5000, &mut rng);
        assert_approx_eq!(samples.mean(), 5.0, 0.05);
    }

    #[test]
    fn gamma_is_positive() {
        let mut rng = StdRng::seed_from_u64(2);
        let prior = gamma(2.0, 10.0).unwrap();
        assert!(prior.sample_n(500, &mut rng).iter().all(|&x| x > 0.0));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(matches!(
            uniform(1.0, 1.0),
            Err(FilterError::InvalidConfiguration(_))
        ));
        assert!(normal(0.0, -1.0).is_err());
        assert!(gamma(-1.0, 1.0).is_err());
    }

    #[test]
    fn same_seed_same_draws() {
        let prior = normal(0.0, 1.0).unwrap();
        let a = prior.sample_n(10, &mut StdRng::seed_from_u64(9));
        let b = prior.sample_n(10, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
