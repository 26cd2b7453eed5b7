//! Blob tracking simulation.
//!
//! A filled disk drifts slowly across a small image. Each step the filter is
//! fed the rendered image and estimates the disk's `[row, col, radius]`
//! from it. The hypotheses are whole images, so this exercises the filter
//! with an observation space (`height * width` pixels) much larger than the
//! state space.
use std::error::Error;
use std::io;
use std::path::Path;

use log::info;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::error::Result;
use crate::filter::ParticleFilterBuilder;
use crate::kernel::RbfKernel;
use crate::prior::{self, Prior};
use crate::sensor::SensorModel;
use crate::transform::GaussianNoise;

/// Default image side length in pixels.
pub const IMAGE_SIZE: usize = 32;

/// Renders `[row, col, radius]` particles as filled disks.
///
/// Pixel `(r, c)` is lit when `(r - row)^2 + (c - col)^2 < radius^2`. Images
/// are flattened row-major, so pixel `(r, c)` is column `r * width + c` of the
/// hypothesis matrix. Particles need at least three columns; missing columns
/// read as zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlobSensor {
    width: usize,
    height: usize,
}

impl Default for BlobSensor {
    fn default() -> Self {
        BlobSensor::new(IMAGE_SIZE, IMAGE_SIZE)
    }
}

impl BlobSensor {
    pub fn new(width: usize, height: usize) -> Self {
        BlobSensor { width, height }
    }
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    /// Number of pixels per image.
    pub fn pixels(&self) -> usize {
        self.width * self.height
    }
    /// Render a single disk into a flattened image.
    pub fn render(&self, row: f64, col: f64, radius: f64) -> DVector<f64> {
        let mut image = DVector::zeros(self.pixels());
        self.draw(image.as_mut_slice(), row, col, radius);
        image
    }

    fn draw(&self, image: &mut [f64], row: f64, col: f64, radius: f64) {
        if !(radius > 0.0) || self.pixels() == 0 {
            return;
        }
        // only scan the disk's bounding box, clamped to the image
        let clamp = |v: f64, len: usize| v.max(0.0).min((len - 1) as f64) as usize;
        if row + radius < 0.0 || col + radius < 0.0 {
            return;
        }
        let r0 = clamp((row - radius).floor(), self.height);
        let r1 = clamp((row + radius).ceil(), self.height);
        let c0 = clamp((col - radius).floor(), self.width);
        let c1 = clamp((col + radius).ceil(), self.width);
        let radius2 = radius * radius;
        for r in r0..=r1 {
            for c in c0..=c1 {
                let dr = r as f64 - row;
                let dc = c as f64 - col;
                if dr * dr + dc * dc < radius2 {
                    image[r * self.width + c] = 1.0;
                }
            }
        }
    }
}

impl SensorModel for BlobSensor {
    fn inverse(&self, particles: &DMatrix<f64>) -> DMatrix<f64> {
        let mut hypotheses = DMatrix::zeros(particles.nrows(), self.pixels());
        let mut image = vec![0.0; self.pixels()];
        for (i, particle) in particles.row_iter().enumerate() {
            let value = |k: usize| if k < particle.len() { particle[k] } else { 0.0 };
            image.fill(0.0);
            self.draw(&mut image, value(0), value(1), value(2));
            for (j, &pixel) in image.iter().enumerate() {
                if pixel != 0.0 {
                    hypotheses[(i, j)] = pixel;
                }
            }
        }
        hypotheses
    }
}

/// Priors matching the blob state `[row, col, radius]`: uniform position
/// over the image, gamma(2, 10) radius.
pub fn blob_priors(sensor: &BlobSensor) -> Result<Vec<Box<dyn Prior>>> {
    Ok(vec![
        prior::uniform(0.0, sensor.height() as f64)?,
        prior::uniform(0.0, sensor.width() as f64)?,
        prior::gamma(2.0, 10.0)?,
    ])
}

/// Ground truth for the tracking scenario: a disk moving with constant drift.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobScenario {
    pub sensor: BlobSensor,
    /// `[row, col, radius]`
    pub truth: [f64; 3],
    /// Per-step `(row, col)` displacement
    pub drift: (f64, f64),
}

impl BlobScenario {
    pub fn new(sensor: BlobSensor, truth: [f64; 3], drift: (f64, f64)) -> Self {
        BlobScenario {
            sensor,
            truth,
            drift,
        }
    }
    /// Disk at (12, 18) with a radius drawn from `[3, 6)` and a drift of at
    /// most 0.1 pixel per step along each axis.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let radius = rng.random_range(3.0..6.0);
        let drift = (rng.random_range(-0.1..0.1), rng.random_range(-0.1..0.1));
        BlobScenario::new(BlobSensor::default(), [12.0, 18.0, radius], drift)
    }
    /// Render the current truth.
    pub fn observe(&self) -> DVector<f64> {
        let [row, col, radius] = self.truth;
        self.sensor.render(row, col, radius)
    }
    /// Advance the disk by one step of drift.
    pub fn step(&mut self) {
        self.truth[0] += self.drift.0;
        self.truth[1] += self.drift.1;
    }
}

/// Tuning of the tracking run that is not part of [`FilterConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingOptions {
    pub steps: usize,
    /// RBF bandwidth over the pixel-wise squared error
    pub kernel_sigma: f64,
    /// Random walk standard deviations for `[row, col, radius]`
    pub noise_sigmas: Vec<f64>,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        TrackingOptions {
            steps: 200,
            kernel_sigma: 2.0,
            noise_sigmas: vec![0.3, 0.3, 0.1],
        }
    }
}

/// One row of tracking output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub step: usize,
    pub true_row: f64,
    pub true_col: f64,
    pub true_radius: f64,
    pub est_row: f64,
    pub est_col: f64,
    pub est_radius: f64,
    pub effective_sample_size: f64,
    pub reinitialized: usize,
}

impl TrackingRecord {
    /// Euclidean distance between the true and the estimated centre.
    pub fn position_error(&self) -> f64 {
        (self.true_row - self.est_row).hypot(self.true_col - self.est_col)
    }
}

/// Truth and estimate for every step of a tracking run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackingResult {
    pub records: Vec<TrackingRecord>,
}

impl TrackingResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    /// Root mean square position error over the last `window` steps.
    pub fn position_rmse(&self, window: usize) -> f64 {
        let start = self.records.len().saturating_sub(window);
        let tail = &self.records[start..];
        if tail.is_empty() {
            return 0.0;
        }
        let sum: f64 = tail.iter().map(|r| r.position_error().powi(2)).sum();
        (sum / tail.len() as f64).sqrt()
    }
    /// Write the records to a CSV file with a header row.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
    /// Read records written by [`to_csv`](Self::to_csv).
    pub fn from_csv<P: AsRef<Path>>(path: P) -> std::result::Result<Self, Box<dyn Error>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in reader.deserialize() {
            let record: TrackingRecord = result?;
            records.push(record);
        }
        Ok(TrackingResult { records })
    }
}

/// Track `scenario` for `options.steps` steps.
///
/// The filter uses [`blob_priors`], the scenario's [`BlobSensor`], Gaussian
/// random walk noise and a stabilized RBF kernel. Column names default to
/// `row`, `col`, `radius`.
///
/// # Errors
/// Construction errors from the filter, or an update error (e.g. every
/// hypothesis rejected) at any step.
pub fn run_blob_tracking(
    config: &FilterConfig,
    mut scenario: BlobScenario,
    options: &TrackingOptions,
) -> Result<TrackingResult> {
    let mut config = config.clone();
    if config.column_names.is_none() {
        config.column_names = Some(vec!["row".into(), "col".into(), "radius".into()]);
    }
    let sensor = scenario.sensor;
    let mut pf = ParticleFilterBuilder::new(blob_priors(&sensor)?, sensor)
        .config(config)
        .state_dim(3)
        .noise(GaussianNoise::new(&options.noise_sigmas)?)
        .weight_kernel(RbfKernel::new(options.kernel_sigma)?.stabilized())
        .build()?;

    let mut result = TrackingResult::default();
    for step in 0..options.steps {
        let observed = scenario.observe();
        let cycle = pf.update(&observed)?;
        let [true_row, true_col, true_radius] = scenario.truth;
        let record = TrackingRecord {
            step,
            true_row,
            true_col,
            true_radius,
            est_row: cycle.mean_state[0],
            est_col: cycle.mean_state[1],
            est_radius: cycle.mean_state[2],
            effective_sample_size: cycle.effective_sample_size(),
            reinitialized: cycle.reinitialized_count(),
        };
        if step % 10 == 0 {
            info!(
                "step {}: truth [{:.2}, {:.2}, {:.2}], estimate [{:.2}, {:.2}, {:.2}], ESS {:.1}",
                step,
                true_row,
                true_col,
                true_radius,
                record.est_row,
                record.est_col,
                record.est_radius,
                record.effective_sample_size
            );
        }
        result.records.push(record);
        scenario.step();
    }
    Ok(result)
}
