//! Serializable filter configuration.
//!
//! Collaborators (priors, sensor model, kernels) are code and are handed to
//! [`crate::filter::ParticleFilterBuilder`] directly. Everything numeric lives
//! here so a run can be described in a JSON, YAML or TOML file and repeated
//! exactly from the same seed.
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::resample::ResamplingStrategy;

fn default_n_particles() -> usize {
    200
}
fn default_resample_proportion() -> f64 {
    0.05
}
fn default_seed() -> u64 {
    42
}

/// Numeric configuration of a particle filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Number of particles `N`.
    #[serde(default = "default_n_particles")]
    pub n_particles: usize,
    /// Probability that each particle is redrawn from the priors after
    /// resampling (diversity injection), in `[0, 1]`.
    #[serde(default = "default_resample_proportion")]
    pub resample_proportion: f64,
    /// Resampling scheme.
    #[serde(default)]
    pub resampling_strategy: ResamplingStrategy,
    /// Seed for the filter's random number generator.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Optional names of the state dimensions; labels only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_names: Option<Vec<String>>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            n_particles: default_n_particles(),
            resample_proportion: default_resample_proportion(),
            resampling_strategy: ResamplingStrategy::default(),
            seed: default_seed(),
            column_names: None,
        }
    }
}

impl FilterConfig {
    /// Check value ranges that do not depend on the state dimension.
    pub fn validate(&self) -> Result<()> {
        if self.n_particles == 0 {
            return Err(FilterError::InvalidConfiguration(
                "n_particles must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resample_proportion) {
            return Err(FilterError::InvalidConfiguration(format!(
                "resample_proportion must lie in [0, 1], got {}",
                self.resample_proportion
            )));
        }
        Ok(())
    }

    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(config_error)?;
        serde_json::to_writer_pretty(file, self).map_err(config_error)
    }
    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(config_error)?;
        serde_json::from_reader(file).map_err(config_error)
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path).map_err(config_error)?;
        let s = serde_yaml::to_string(self).map_err(config_error)?;
        file.write_all(s.as_bytes()).map_err(config_error)
    }
    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(config_error)?;
        serde_yaml::from_reader(file).map_err(config_error)
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path).map_err(config_error)?;
        let s = toml::to_string(self).map_err(config_error)?;
        file.write_all(s.as_bytes()).map_err(config_error)
    }
    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path).map_err(config_error)?;
        toml::from_str(&s).map_err(config_error)
    }
    /// Read a configuration, choosing the format from the file extension
    /// (`json`, `yaml`/`yml`, `toml`).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Self::from_json(path),
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            Some("toml") => Self::from_toml(path),
            _ => Err(FilterError::Config(format!(
                "unsupported configuration format: {}",
                path.display()
            ))),
        }
    }
}

fn config_error<E: std::fmt::Display>(e: E) -> FilterError {
    FilterError::Config(e.to_string())
}
