//! Generic Sequential Monte Carlo (particle) filter
//!
//! This crate provides a particle filter that tracks a hidden state from a sequence of noisy observations. The
//! filter is generic: it knows nothing about the problem it is solving. The caller supplies the pieces that define
//! the problem (one prior per state dimension, a sensor model that maps a state to the observation it would
//! produce, optional dynamics and process noise, and a similarity kernel that scores predicted observations against
//! the real one) and the filter runs the predict / weight / resample cycle around them.
//!
//! The sensor model is only ever run "forwards" (state to observation); the filter never needs to invert it. This
//! makes the crate a good fit for problems where observations are rich and hard to invert, e.g. tracking an object
//! from rendered images, where each particle's hypothesis is a whole image.
//!
//! This crate is primarily built off of three additional dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Provides the particle matrix and the weighted statistics.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): Provide the
//!   seedable random number generator, the priors and the Gaussian process noise.
//! - [`serde`](https://crates.io/crates/serde): Provides (de)serialization of the filter configuration and of
//!   simulation output.
//!
//! ## Crate overview
//!
//! - [config]: Serializable numeric configuration (particle count, resampling, seed).
//! - [ensemble]: The `N x D` particle matrix, (re)initialization from priors and weighted statistics.
//! - [error]: The crate's error type.
//! - [filter]: The filter engine and its builder.
//! - [kernel]: Weight kernels scoring hypotheses against an observation.
//! - [prior]: Per-dimension prior distributions.
//! - [resample]: Systematic, stratified, multinomial and residual resampling.
//! - [sensor]: Sensor models mapping particles into observation space.
//! - [sim]: A blob tracking simulation used by the `pfilter` binary.
//! - [transform]: Dynamics and process noise.
//!
//! ## Data layout
//!
//! Particles are stored as an `N x D` matrix, one particle per row. Hypotheses are an `N x M` matrix; observations
//! that are naturally multi-dimensional (images) are flattened row-major into `M` columns. Weights are a length `N`
//! vector that sums to one after every successful update.
//!
//! ## Reproducibility
//!
//! Every random draw (priors, noise, resampling, diversity injection) comes from one generator owned by the filter.
//! Two filters built with the same configuration and seed and fed the same observations produce identical results.
pub mod config;
pub mod ensemble;
pub mod error;
pub mod filter;
pub mod kernel;
pub mod prior;
pub mod resample;
pub mod sensor;
pub mod sim;
pub mod transform;

pub use config::FilterConfig;
pub use ensemble::Ensemble;
pub use error::{FilterError, Result};
pub use filter::{CycleResult, ParticleFilter, ParticleFilterBuilder};
pub use kernel::{RbfKernel, WeightKernel};
pub use prior::Prior;
pub use resample::ResamplingStrategy;
pub use sensor::SensorModel;
pub use transform::StateTransform;
