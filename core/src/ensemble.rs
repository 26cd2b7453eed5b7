//! The particle ensemble: an `N x D` matrix with one particle per row.
//!
//! Rows are positional. They only line up with weights and hypotheses inside
//! a single update cycle; after resampling the row order means nothing.
use nalgebra::{DMatrix, DVector};
use rand::{Rng, RngCore};

use crate::error::{FilterError, Result};
use crate::prior::Prior;

/// `N` particles of dimension `D`.
#[derive(Clone, Debug, PartialEq)]
pub struct Ensemble {
    particles: DMatrix<f64>,
}

impl Ensemble {
    /// Wrap an existing `N x D` particle matrix.
    pub fn from_matrix(particles: DMatrix<f64>) -> Self {
        Ensemble { particles }
    }
    /// Allocate `n` particles and draw every row from `priors`.
    pub fn from_priors(priors: &[Box<dyn Prior>], n: usize, rng: &mut dyn RngCore) -> Result<Self> {
        let mut ensemble = Ensemble {
            particles: DMatrix::zeros(n, priors.len()),
        };
        ensemble.initialize(priors, None, rng)?;
        Ok(ensemble)
    }
    /// Number of particles `N`.
    pub fn len(&self) -> usize {
        self.particles.nrows()
    }
    pub fn is_empty(&self) -> bool {
        self.particles.nrows() == 0
    }
    /// State dimension `D`.
    pub fn dim(&self) -> usize {
        self.particles.ncols()
    }
    pub fn particles(&self) -> &DMatrix<f64> {
        &self.particles
    }
    /// (Re)draw particles from the priors, one prior per column.
    ///
    /// For every dimension `N` samples are drawn from its prior. Without a
    /// mask all rows are replaced; with a mask only rows flagged `true` take
    /// their sample and every other row is left exactly as it was.
    ///
    /// # Errors
    /// * `DimensionMismatch` if `priors.len() != D` or `mask.len() != N`
    pub fn initialize(
        &mut self,
        priors: &[Box<dyn Prior>],
        mask: Option<&[bool]>,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        let n = self.len();
        if priors.len() != self.dim() {
            return Err(FilterError::dimension_mismatch(
                "priors",
                self.dim(),
                priors.len(),
            ));
        }
        if let Some(mask) = mask
            && mask.len() != n
        {
            return Err(FilterError::dimension_mismatch(
                "initialization mask",
                n,
                mask.len(),
            ));
        }
        for (column, prior) in priors.iter().enumerate() {
            let samples = prior.sample_n(n, rng);
            match mask {
                None => self.particles.set_column(column, &samples),
                Some(mask) => {
                    for (row, _) in mask.iter().enumerate().filter(|(_, redraw)| **redraw) {
                        self.particles[(row, column)] = samples[row];
                    }
                }
            }
        }
        Ok(())
    }
    /// Replace the ensemble by the rows at `indices` (duplicates allowed).
    pub fn select(&mut self, indices: &[usize]) {
        self.particles = self.particles.select_rows(indices.iter());
    }
    /// Weighted average of the particles, `sum_i w_i x_i`.
    pub fn weighted_mean(&self, weights: &DVector<f64>) -> DVector<f64> {
        self.particles.tr_mul(weights)
    }
    /// Weighted covariance of the particles around their weighted mean.
    pub fn weighted_covariance(&self, weights: &DVector<f64>) -> DMatrix<f64> {
        let mean = self.weighted_mean(weights);
        let mut centered = self.particles.clone();
        for mut row in centered.row_iter_mut() {
            row -= mean.transpose();
        }
        let mut scaled = centered.clone();
        for (mut row, &w) in scaled.row_iter_mut().zip(weights.iter()) {
            row *= w;
        }
        centered.tr_mul(&scaled)
    }
}

/// Flag each of `n` particles independently with probability `proportion`.
pub fn diversity_mask(n: usize, proportion: f64, rng: &mut dyn RngCore) -> Vec<bool> {
    (0..n).map(|_| rng.random::<f64>() < proportion).collect()
}
