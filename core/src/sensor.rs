//! Sensor models: map particle states into observation space.
//!
//! A sensor model receives the whole `N x D` particle matrix and returns an
//! `N x M` hypothesis matrix. Row `i` is the observation particle `i` would
//! produce, flattened in row-major order when the natural observation is
//! multi-dimensional (an image becomes `height * width` columns).
use nalgebra::DMatrix;

/// Batched state → predicted observation map.
pub trait SensorModel {
    fn inverse(&self, particles: &DMatrix<f64>) -> DMatrix<f64>;
}

impl<F> SensorModel for F
where
    F: Fn(&DMatrix<f64>) -> DMatrix<f64>,
{
    fn inverse(&self, particles: &DMatrix<f64>) -> DMatrix<f64> {
        self(particles)
    }
}

/// Observes the full state directly (`M == D`).
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentitySensor;

impl SensorModel for IdentitySensor {
    fn inverse(&self, particles: &DMatrix<f64>) -> DMatrix<f64> {
        particles.clone()
    }
}

/// Observes a subset of state dimensions, in the given order.
#[derive(Clone, Debug)]
pub struct SelectSensor {
    columns: Vec<usize>,
}

impl SelectSensor {
    pub fn new(columns: Vec<usize>) -> Self {
        SelectSensor { columns }
    }
}

impl SensorModel for SelectSensor {
    fn inverse(&self, particles: &DMatrix<f64>) -> DMatrix<f64> {
        particles.select_columns(self.columns.iter())
    }
}
