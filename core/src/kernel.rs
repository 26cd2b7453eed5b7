//! Weight kernels: similarity between hypotheses and the observation.
//!
//! A kernel scores every hypothesis row against the observed vector and
//! returns `N` weights, higher meaning more similar. The filter clips
//! negative outputs to zero, so a kernel may be sloppy about sign, but it
//! must not reject every hypothesis (see [`FilterError::DegenerateWeights`]).
//!
//! The observation broadcasts against one hypothesis row: it has either `M`
//! entries, or a single entry that is compared against every column.
use nalgebra::{DMatrix, DVector};

use crate::error::{FilterError, Result};

/// Batched similarity score between hypotheses and an observation.
pub trait WeightKernel {
    fn weight(&self, hypotheses: &DMatrix<f64>, observed: &DVector<f64>) -> Result<DVector<f64>>;
}

impl<F> WeightKernel for F
where
    F: Fn(&DMatrix<f64>, &DVector<f64>) -> DVector<f64>,
{
    fn weight(&self, hypotheses: &DMatrix<f64>, observed: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(self(hypotheses, observed))
    }
}

/// Squared Euclidean distance from each hypothesis row to `observed`.
///
/// # Errors
/// * `DimensionMismatch` if `observed` has neither `M` entries nor one
pub fn squared_distances(hypotheses: &DMatrix<f64>, observed: &DVector<f64>) -> Result<DVector<f64>> {
    let m = hypotheses.ncols();
    let distances = if observed.len() == m {
        DVector::from_iterator(
            hypotheses.nrows(),
            hypotheses
                .row_iter()
                .map(|row| row.iter().zip(observed.iter()).map(|(h, o)| (h - o).powi(2)).sum::<f64>()),
        )
    } else if observed.len() == 1 {
        let o = observed[0];
        DVector::from_iterator(
            hypotheses.nrows(),
            hypotheses
                .row_iter()
                .map(|row| row.iter().map(|h| (h - o).powi(2)).sum::<f64>()),
        )
    } else {
        return Err(FilterError::dimension_mismatch(
            "observation length",
            m,
            observed.len(),
        ));
    };
    Ok(distances)
}

/// Heat kernel over a plain distance: `d -> exp(-d^2 / (2 sigma^2))`.
///
/// Useful for building kernels on metrics other than Euclidean distance.
///
/// ```rust
/// use pfilter::kernel::heat_kernel;
///
/// let heat = heat_kernel(2.0);
/// assert_eq!(heat(0.0), 1.0);
/// assert!((heat(2.0) - (-0.5f64).exp()).abs() < 1e-12);
/// ```
pub fn heat_kernel(sigma: f64) -> impl Fn(f64) -> f64 {
    let denominator = 2.0 * sigma * sigma;
    move |distance| (-distance * distance / denominator).exp()
}

/// Gaussian radial basis kernel over squared Euclidean distance:
/// `exp(-|h - o|^2 / (2 sigma^2))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RbfKernel {
    sigma: f64,
    stabilized: bool,
}

impl Default for RbfKernel {
    fn default() -> Self {
        RbfKernel {
            sigma: 1.0,
            stabilized: false,
        }
    }
}

impl RbfKernel {
    /// # Errors
    /// * `InvalidConfiguration` unless `sigma` is finite and positive
    pub fn new(sigma: f64) -> Result<Self> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(FilterError::InvalidConfiguration(format!(
                "kernel bandwidth must be finite and positive, got {sigma}"
            )));
        }
        Ok(RbfKernel {
            sigma,
            stabilized: false,
        })
    }
    /// Shift distances by their minimum before exponentiating.
    ///
    /// Every weight is scaled by the same factor, so normalized weights are
    /// unchanged, but the best hypothesis always scores exactly one and the
    /// raw weights no longer underflow for high dimensional observations.
    pub fn stabilized(mut self) -> Self {
        self.stabilized = true;
        self
    }
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl WeightKernel for RbfKernel {
    fn weight(&self, hypotheses: &DMatrix<f64>, observed: &DVector<f64>) -> Result<DVector<f64>> {
        let distances = squared_distances(hypotheses, observed)?;
        let offset = if self.stabilized && !distances.is_empty() {
            distances.min()
        } else {
            0.0
        };
        let denominator = 2.0 * self.sigma * self.sigma;
        Ok(distances.map(|d| (-(d - offset) / denominator).exp()))
    }
}
