//! State transforms: dynamics and process noise.
//!
//! Both steps of the prediction share one interface. A dynamics model is a
//! deterministic transform that simply ignores the RNG; a noise model draws
//! from it. Each update applies dynamics first, then noise, to the whole
//! `N x D` particle matrix in place.
use nalgebra::{DMatrix, DVector};
use rand::RngCore;
use rand_distr::{Distribution, Normal};

use crate::error::{FilterError, Result};

/// In-place transformation of the particle matrix (one particle per row).
pub trait StateTransform {
    fn apply(&self, particles: &mut DMatrix<f64>, rng: &mut dyn RngCore);
    /// State dimension this transform is built for, if it has one.
    ///
    /// The filter checks it against the number of priors at build time.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

impl<F> StateTransform for F
where
    F: Fn(&mut DMatrix<f64>, &mut dyn RngCore),
{
    fn apply(&self, particles: &mut DMatrix<f64>, rng: &mut dyn RngCore) {
        self(particles, rng)
    }
}

/// Leaves the particles unchanged. Default for both dynamics and noise.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl StateTransform for Identity {
    fn apply(&self, _particles: &mut DMatrix<f64>, _rng: &mut dyn RngCore) {}
}

/// Linear dynamics `x' = F x` applied to every particle.
#[derive(Clone, Debug)]
pub struct LinearDynamics {
    transition: DMatrix<f64>,
}

impl LinearDynamics {
    /// # Errors
    /// * `DimensionMismatch` if the transition matrix is not square
    pub fn new(transition: DMatrix<f64>) -> Result<Self> {
        if !transition.is_square() {
            return Err(FilterError::dimension_mismatch(
                "transition matrix columns",
                transition.nrows(),
                transition.ncols(),
            ));
        }
        Ok(LinearDynamics { transition })
    }
    pub fn transition(&self) -> &DMatrix<f64> {
        &self.transition
    }
}

impl StateTransform for LinearDynamics {
    fn apply(&self, particles: &mut DMatrix<f64>, _rng: &mut dyn RngCore) {
        // rows are particles: X' = X F^T
        *particles = &*particles * self.transition.transpose();
    }
    fn dimension(&self) -> Option<usize> {
        Some(self.transition.nrows())
    }
}

/// Independent zero-mean Gaussian noise, one standard deviation per dimension.
#[derive(Clone, Debug)]
pub struct GaussianNoise {
    sigmas: DVector<f64>,
    distributions: Vec<Normal<f64>>,
}

impl GaussianNoise {
    /// # Errors
    /// * `InvalidConfiguration` for a negative or non-finite standard deviation
    pub fn new(sigmas: &[f64]) -> Result<Self> {
        let distributions = sigmas
            .iter()
            .map(|&sigma| {
                if !sigma.is_finite() {
                    return Err(FilterError::InvalidConfiguration(format!(
                        "noise standard deviation must be finite, got {sigma}"
                    )));
                }
                Normal::new(0.0, sigma).map_err(|e| {
                    FilterError::InvalidConfiguration(format!(
                        "noise standard deviation {sigma}: {e}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GaussianNoise {
            sigmas: DVector::from_column_slice(sigmas),
            distributions,
        })
    }
    pub fn sigmas(&self) -> &DVector<f64> {
        &self.sigmas
    }
}

impl StateTransform for GaussianNoise {
    fn apply(&self, particles: &mut DMatrix<f64>, rng: &mut dyn RngCore) {
        for mut row in particles.row_iter_mut() {
            for (value, distribution) in row.iter_mut().zip(&self.distributions) {
                *value += distribution.sample(rng);
            }
        }
    }
    fn dimension(&self) -> Option<usize> {
        Some(self.sigmas.len())
    }
}
