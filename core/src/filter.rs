//! Sequential Monte Carlo filter engine.
//!
//! [`ParticleFilter`] owns the particle ensemble and a seedable random number
//! generator. Each call to [`ParticleFilter::update`] runs one full cycle:
//!
//! 1. apply the dynamics, then the noise, to every particle;
//! 2. map particles into observation space with the sensor model
//!    (the hypotheses);
//! 3. score hypotheses against the observation with the weight kernel;
//! 4. clip negative or NaN scores to zero and normalize;
//! 5. resample the ensemble (rows only);
//! 6. report the weighted mean state and mean hypothesis, both taken over the
//!    *pre-resample* particles and hypotheses with the normalized weights;
//! 7. redraw a random subset of particles from the priors (diversity
//!    injection) to counter sample impoverishment.
//!
//! A cycle either completes or changes nothing: all work happens on a copy of
//! the ensemble that is committed only after every step succeeded.
//!
//! # Example
//! ```rust
//! use nalgebra::DVector;
//! use pfilter::filter::ParticleFilterBuilder;
//! use pfilter::kernel::RbfKernel;
//! use pfilter::prior;
//! use pfilter::sensor::IdentitySensor;
//! use pfilter::transform::GaussianNoise;
//!
//! let priors = vec![prior::normal(0.0, 5.0).unwrap()];
//! let mut pf = ParticleFilterBuilder::new(priors, IdentitySensor)
//!     .n_particles(300)
//!     .noise(GaussianNoise::new(&[0.1]).unwrap())
//!     .weight_kernel(RbfKernel::new(0.5).unwrap())
//!     .seed(3)
//!     .build()
//!     .unwrap();
//!
//! let observed = DVector::from_element(1, 2.0);
//! for _ in 0..10 {
//!     pf.update(&observed).unwrap();
//! }
//! let estimate = &pf.last_cycle().unwrap().mean_state;
//! assert!((estimate[0] - 2.0).abs() < 0.25);
//! ```
use std::fmt::{self, Debug};

use log::{debug, info, trace, warn};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::config::FilterConfig;
use crate::ensemble::{Ensemble, diversity_mask};
use crate::error::{FilterError, Result};
use crate::kernel::{RbfKernel, WeightKernel};
use crate::prior::Prior;
use crate::resample::{ResamplingStrategy, effective_sample_size};
use crate::sensor::SensorModel;
use crate::transform::{Identity, StateTransform};

/// Everything one update cycle produced.
///
/// `weights`, `hypotheses`, `mean_state`, `mean_hypothesis`,
/// `state_covariance` and `best_particle` all describe the weighted,
/// pre-resample ensemble. `particles` is the ensemble the next cycle starts
/// from (resampled, then partially redrawn where `reinitialized` is `true`).
#[derive(Clone, Debug, PartialEq)]
pub struct CycleResult {
    /// 1-based index of the cycle
    pub cycle: usize,
    /// `N x D` ensemble after resampling and diversity injection
    pub particles: DMatrix<f64>,
    /// Normalized weights, length `N`
    pub weights: DVector<f64>,
    /// `N x M` predicted observations
    pub hypotheses: DMatrix<f64>,
    /// Weighted mean of the pre-resample particles, length `D`
    pub mean_state: DVector<f64>,
    /// Weighted mean of the hypotheses, length `M`
    pub mean_hypothesis: DVector<f64>,
    /// Weighted covariance of the pre-resample particles, `D x D`
    pub state_covariance: DMatrix<f64>,
    /// Highest-weight pre-resample particle
    pub best_particle: DVector<f64>,
    /// Particles redrawn from the priors this cycle
    pub reinitialized: Vec<bool>,
}

impl CycleResult {
    pub fn effective_sample_size(&self) -> f64 {
        effective_sample_size(self.weights.as_slice())
    }
    pub fn reinitialized_count(&self) -> usize {
        self.reinitialized.iter().filter(|&&m| m).count()
    }
    /// Pair each mean state component with its column name.
    pub fn named_mean_state<'a>(&self, names: &'a [String]) -> Vec<(&'a str, f64)> {
        names
            .iter()
            .map(String::as_str)
            .zip(self.mean_state.iter().copied())
            .collect()
    }
}

/// Collects collaborators and configuration for a [`ParticleFilter`].
///
/// Only the priors and the sensor model are required. Dynamics and noise
/// default to [`Identity`], the kernel to [`RbfKernel`] with unit bandwidth.
pub struct ParticleFilterBuilder {
    priors: Vec<Box<dyn Prior>>,
    sensor: Box<dyn SensorModel>,
    dynamics: Box<dyn StateTransform>,
    noise: Box<dyn StateTransform>,
    kernel: Box<dyn WeightKernel>,
    config: FilterConfig,
    state_dim: Option<usize>,
}

impl ParticleFilterBuilder {
    /// Start a builder from one prior per state dimension and a sensor model.
    pub fn new<S: SensorModel + 'static>(priors: Vec<Box<dyn Prior>>, sensor: S) -> Self {
        ParticleFilterBuilder {
            priors,
            sensor: Box::new(sensor),
            dynamics: Box::new(Identity),
            noise: Box::new(Identity),
            kernel: Box::new(RbfKernel::default()),
            config: FilterConfig::default(),
            state_dim: None,
        }
    }
    /// Replace the whole numeric configuration.
    pub fn config(mut self, config: FilterConfig) -> Self {
        self.config = config;
        self
    }
    pub fn n_particles(mut self, n_particles: usize) -> Self {
        self.config.n_particles = n_particles;
        self
    }
    pub fn resample_proportion(mut self, proportion: f64) -> Self {
        self.config.resample_proportion = proportion;
        self
    }
    pub fn resampling_strategy(mut self, strategy: ResamplingStrategy) -> Self {
        self.config.resampling_strategy = strategy;
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }
    pub fn column_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.column_names = Some(names.into_iter().map(Into::into).collect());
        self
    }
    /// Expected state dimension; [`build`](Self::build) fails if the number
    /// of priors differs.
    pub fn state_dim(mut self, state_dim: usize) -> Self {
        self.state_dim = Some(state_dim);
        self
    }
    pub fn dynamics<T: StateTransform + 'static>(mut self, dynamics: T) -> Self {
        self.dynamics = Box::new(dynamics);
        self
    }
    pub fn noise<T: StateTransform + 'static>(mut self, noise: T) -> Self {
        self.noise = Box::new(noise);
        self
    }
    pub fn weight_kernel<K: WeightKernel + 'static>(mut self, kernel: K) -> Self {
        self.kernel = Box::new(kernel);
        self
    }
    /// Build with a [`StdRng`] seeded from the configured seed.
    pub fn build(self) -> Result<ParticleFilter<StdRng>> {
        let rng = StdRng::seed_from_u64(self.config.seed);
        self.build_with_rng(rng)
    }
    /// Build with an injected random number generator. The configured seed
    /// is ignored.
    ///
    /// # Errors
    /// * `InvalidConfiguration` for an empty prior list or out-of-range
    ///   configuration values
    /// * `DimensionMismatch` when the priors, the expected state dimension,
    ///   the dynamics/noise dimensions or the column names disagree
    pub fn build_with_rng<R: RngCore>(self, mut rng: R) -> Result<ParticleFilter<R>> {
        self.config.validate()?;
        let dim = self.priors.len();
        if dim == 0 {
            return Err(FilterError::InvalidConfiguration(
                "at least one prior is required".into(),
            ));
        }
        if let Some(expected) = self.state_dim
            && expected != dim
        {
            return Err(FilterError::dimension_mismatch("priors", expected, dim));
        }
        if let Some(d) = self.dynamics.dimension()
            && d != dim
        {
            return Err(FilterError::dimension_mismatch("dynamics dimension", dim, d));
        }
        if let Some(d) = self.noise.dimension()
            && d != dim
        {
            return Err(FilterError::dimension_mismatch("noise dimension", dim, d));
        }
        if let Some(names) = &self.config.column_names
            && names.len() != dim
        {
            return Err(FilterError::dimension_mismatch(
                "column names",
                dim,
                names.len(),
            ));
        }
        let ensemble = Ensemble::from_priors(&self.priors, self.config.n_particles, &mut rng)?;
        info!(
            "Particle filter initialized: {} particles, {} state dimensions, {:?} resampling",
            self.config.n_particles, dim, self.config.resampling_strategy
        );
        Ok(ParticleFilter {
            config: self.config,
            priors: self.priors,
            sensor: self.sensor,
            dynamics: self.dynamics,
            noise: self.noise,
            kernel: self.kernel,
            ensemble,
            rng,
            cycle: 0,
            last_cycle: None,
        })
    }
}

/// Generic particle filter over an `N x D` ensemble.
pub struct ParticleFilter<R: RngCore = StdRng> {
    config: FilterConfig,
    priors: Vec<Box<dyn Prior>>,
    sensor: Box<dyn SensorModel>,
    dynamics: Box<dyn StateTransform>,
    noise: Box<dyn StateTransform>,
    kernel: Box<dyn WeightKernel>,
    ensemble: Ensemble,
    rng: R,
    cycle: usize,
    last_cycle: Option<CycleResult>,
}

impl<R: RngCore> Debug for ParticleFilter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ParticleFilter");
        s.field("num_particles", &self.ensemble.len())
            .field("state_dim", &self.ensemble.dim())
            .field("cycle", &self.cycle);
        if let Some(last) = &self.last_cycle {
            let min_weight = last.weights.iter().copied().fold(f64::INFINITY, f64::min);
            let max_weight = last.weights.iter().copied().fold(0.0, f64::max);
            s.field("effective_particles", &last.effective_sample_size())
                .field(
                    "weight_range",
                    &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
                );
            match &self.config.column_names {
                Some(names) => s.field("mean_state", &last.named_mean_state(names)),
                None => s.field("mean_state", &last.mean_state.as_slice()),
            };
        }
        s.finish()
    }
}

impl ParticleFilter<StdRng> {
    /// Build a filter from priors, a sensor model and a configuration, using
    /// the default dynamics, noise and kernel.
    pub fn new<S: SensorModel + 'static>(
        priors: Vec<Box<dyn Prior>>,
        sensor: S,
        config: FilterConfig,
    ) -> Result<Self> {
        ParticleFilterBuilder::new(priors, sensor).config(config).build()
    }
}

impl<R: RngCore> ParticleFilter<R> {
    /// Number of particles `N`.
    pub fn n_particles(&self) -> usize {
        self.ensemble.len()
    }
    /// State dimension `D`.
    pub fn state_dim(&self) -> usize {
        self.ensemble.dim()
    }
    /// Current `N x D` ensemble.
    pub fn particles(&self) -> &DMatrix<f64> {
        self.ensemble.particles()
    }
    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
    pub fn column_names(&self) -> Option<&[String]> {
        self.config.column_names.as_deref()
    }
    /// Number of completed cycles.
    pub fn cycle(&self) -> usize {
        self.cycle
    }
    /// Result of the most recent successful cycle.
    pub fn last_cycle(&self) -> Option<&CycleResult> {
        self.last_cycle.as_ref()
    }
    /// Redraw every particle from the priors and forget the last cycle.
    pub fn reinitialize(&mut self) -> Result<()> {
        self.ensemble.initialize(&self.priors, None, &mut self.rng)?;
        self.last_cycle = None;
        Ok(())
    }
    /// Run one predict / weight / resample / inject cycle against `observed`.
    ///
    /// # Errors
    /// * `DimensionMismatch` if a collaborator returns the wrong shape or the
    ///   observation does not broadcast against a hypothesis
    /// * `DegenerateWeights` if every hypothesis was rejected
    ///
    /// On error the ensemble and the last cycle result are left unchanged.
    pub fn update(&mut self, observed: &DVector<f64>) -> Result<CycleResult> {
        let n = self.ensemble.len();
        let dim = self.ensemble.dim();

        let mut predicted = self.ensemble.particles().clone();
        self.dynamics.apply(&mut predicted, &mut self.rng);
        self.noise.apply(&mut predicted, &mut self.rng);
        if predicted.shape() != (n, dim) {
            return Err(FilterError::dimension_mismatch(
                "predicted particles",
                n * dim,
                predicted.len(),
            ));
        }

        let hypotheses = self.sensor.inverse(&predicted);
        if hypotheses.nrows() != n {
            return Err(FilterError::dimension_mismatch(
                "sensor output rows",
                n,
                hypotheses.nrows(),
            ));
        }

        let raw = self.kernel.weight(&hypotheses, observed)?;
        if raw.len() != n {
            return Err(FilterError::dimension_mismatch("kernel output", n, raw.len()));
        }
        let weights = normalize_weights(&raw)?;

        let indices = self
            .config
            .resampling_strategy
            .resample(weights.as_slice(), &mut self.rng);

        let weighted = Ensemble::from_matrix(predicted);
        let mean_state = weighted.weighted_mean(&weights);
        let state_covariance = weighted.weighted_covariance(&weights);
        let mean_hypothesis = hypotheses.tr_mul(&weights);
        let best = weights.imax();
        let best_particle = weighted.particles().row(best).transpose();

        let mut next = weighted;
        next.select(&indices);

        let reinitialized = diversity_mask(n, self.config.resample_proportion, &mut self.rng);
        if reinitialized.iter().any(|&m| m) {
            next.initialize(&self.priors, Some(reinitialized.as_slice()), &mut self.rng)?;
        }

        self.ensemble = next;
        self.cycle += 1;
        let result = CycleResult {
            cycle: self.cycle,
            particles: self.ensemble.particles().clone(),
            weights,
            hypotheses,
            mean_state,
            mean_hypothesis,
            state_covariance,
            best_particle,
            reinitialized,
        };
        debug!(
            "cycle {}: effective sample size {:.1} of {}, {} particles redrawn from priors",
            result.cycle,
            result.effective_sample_size(),
            n,
            result.reinitialized_count()
        );
        self.last_cycle = Some(result.clone());
        Ok(result)
    }
}

/// Clip negative and NaN weights to zero and scale the rest to sum to one.
///
/// Weights are divided by their maximum before summing, so finite weights
/// whose plain sum would overflow still normalize.
///
/// # Errors
/// * `DegenerateWeights` if every clipped weight is zero or one is infinite
pub fn normalize_weights(raw: &DVector<f64>) -> Result<DVector<f64>> {
    let clipped = raw.iter().filter(|w| !(**w >= 0.0)).count();
    if clipped > 0 {
        trace!("clipped {} negative or NaN weights to zero", clipped);
    }
    let weights = raw.map(|w| if w > 0.0 { w } else { 0.0 });
    let max = weights.iter().copied().fold(0.0, f64::max);
    if !(max > 0.0 && max.is_finite()) {
        let sum = weights.sum();
        warn!("degenerate weights: clipped sum is {}", sum);
        return Err(FilterError::DegenerateWeights { sum });
    }
    let scaled = weights / max;
    let sum = scaled.sum();
    Ok(scaled / sum)
}
