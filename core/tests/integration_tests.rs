//! End-to-end tests of the particle filter through its public API.
//!
//! These run complete filters over synthetic scenarios where the truth is
//! known: a scalar held fixed, a constant velocity target observed by
//! position only, and a sequence containing a bad observation. The
//! tolerances are empirical regression bounds for the given seeds, not
//! theoretical guarantees.
use assert_approx_eq::assert_approx_eq;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use pfilter::ensemble::Ensemble;
use pfilter::kernel::squared_distances;
use pfilter::prior::{normal, uniform};
use pfilter::resample::{effective_sample_size, systematic_resample_from_offset};
use pfilter::sensor::{IdentitySensor, SelectSensor};
use pfilter::transform::{GaussianNoise, LinearDynamics};
use pfilter::{
    FilterConfig, FilterError, ParticleFilter, ParticleFilterBuilder, Prior, RbfKernel,
    ResamplingStrategy,
};

fn constant_velocity_filter(seed: u64) -> ParticleFilter {
    let priors = vec![normal(0.0, 2.0).unwrap(), normal(0.0, 2.0).unwrap()];
    ParticleFilterBuilder::new(priors, SelectSensor::new(vec![0]))
        .n_particles(1000)
        .resample_proportion(0.02)
        .dynamics(LinearDynamics::new(DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0])).unwrap())
        .noise(GaussianNoise::new(&[0.2, 0.05]).unwrap())
        .weight_kernel(RbfKernel::new(0.5).unwrap())
        .column_names(["position", "velocity"])
        .seed(seed)
        .build()
        .unwrap()
}

#[test]
fn particle_count_and_weights_hold_every_cycle() {
    let mut pf = constant_velocity_filter(1);
    for step in 1..=20 {
        let result = pf.update(&DVector::from_element(1, step as f64)).unwrap();
        assert_eq!(result.particles.nrows(), 1000);
        assert_eq!(pf.particles().nrows(), 1000);
        assert_approx_eq!(result.weights.sum(), 1.0, 1e-9);
        assert_eq!(result.hypotheses.shape(), (1000, 1));
        assert_eq!(result.mean_state.len(), 2);
        assert_eq!(result.mean_hypothesis.len(), 1);
    }
}

#[test]
fn hidden_velocity_is_recovered_from_positions() {
    let mut pf = constant_velocity_filter(7);
    let mut last = None;
    for step in 1..=40 {
        last = Some(pf.update(&DVector::from_element(1, step as f64)).unwrap());
    }
    let result = last.unwrap();
    let names = pf.column_names().unwrap();
    let named = result.named_mean_state(names);
    assert_eq!(named[1].0, "velocity");
    assert_approx_eq!(result.mean_state[0], 40.0, 0.5);
    assert_approx_eq!(result.mean_state[1], 1.0, 0.25);
    assert!(result.state_covariance[(1, 1)] < 0.1);
}

#[test]
fn mean_state_converges_to_fixed_observation() {
    let priors = vec![uniform(-10.0, 10.0).unwrap(), uniform(-10.0, 10.0).unwrap()];
    let config = FilterConfig {
        n_particles: 400,
        resample_proportion: 0.05,
        seed: 21,
        ..FilterConfig::default()
    };
    let mut pf = ParticleFilterBuilder::new(priors, IdentitySensor)
        .config(config)
        .noise(GaussianNoise::new(&[0.1, 0.1]).unwrap())
        .weight_kernel(RbfKernel::new(0.5).unwrap())
        .build()
        .unwrap();
    let observed = DVector::from_vec(vec![-4.0, 6.5]);
    let mut last = None;
    for _ in 0..20 {
        last = Some(pf.update(&observed).unwrap());
    }
    let result = last.unwrap();
    assert_approx_eq!(result.mean_state[0], -4.0, 0.2);
    assert_approx_eq!(result.mean_state[1], 6.5, 0.2);
}

#[test]
fn identical_seeds_give_identical_runs() {
    let run = |seed| {
        let mut pf = constant_velocity_filter(seed);
        let mut means = Vec::new();
        for step in 1..=10 {
            means.push(pf.update(&DVector::from_element(1, step as f64)).unwrap().mean_state);
        }
        (pf.particles().clone(), means)
    };
    assert_eq!(run(5), run(5));
    assert_ne!(run(5).0, run(6).0);
}

#[test]
fn failed_cycle_is_rolled_back() {
    // a NaN observation makes every weight NaN, which clips to zero
    let kernel = |hypotheses: &DMatrix<f64>, observed: &DVector<f64>| {
        squared_distances(hypotheses, observed)
            .unwrap()
            .map(|d| (-d / 2.0).exp())
    };
    let priors = vec![uniform(0.0, 1.0).unwrap()];
    let mut pf = ParticleFilterBuilder::new(priors, IdentitySensor)
        .n_particles(50)
        .noise(GaussianNoise::new(&[0.05]).unwrap())
        .weight_kernel(kernel)
        .build()
        .unwrap();
    let good = DVector::from_element(1, 0.5);
    for _ in 0..3 {
        pf.update(&good).unwrap();
    }
    let particles = pf.particles().clone();
    let last = pf.last_cycle().cloned();

    let err = pf.update(&DVector::from_element(1, f64::NAN)).unwrap_err();
    assert!(matches!(err, FilterError::DegenerateWeights { .. }));
    assert_eq!(pf.particles(), &particles);
    assert_eq!(pf.last_cycle().cloned(), last);
    assert_eq!(pf.cycle(), 3);

    let result = pf.update(&good).unwrap();
    assert_eq!(result.cycle, 4);
}

#[test]
fn negative_kernel_outputs_are_clipped() {
    // linear falloff goes negative for hypotheses further than 1 away
    let kernel = |hypotheses: &DMatrix<f64>, observed: &DVector<f64>| {
        squared_distances(hypotheses, observed)
            .unwrap()
            .map(|d| 1.0 - d.sqrt())
    };
    let priors = vec![uniform(0.0, 4.0).unwrap()];
    let mut pf = ParticleFilterBuilder::new(priors, IdentitySensor)
        .n_particles(200)
        .resample_proportion(0.0)
        .weight_kernel(kernel)
        .build()
        .unwrap();
    let result = pf.update(&DVector::from_element(1, 2.0)).unwrap();
    for (h, w) in result.hypotheses.iter().zip(result.weights.iter()) {
        if (h - 2.0).abs() >= 1.0 {
            assert_eq!(*w, 0.0);
        } else {
            assert!(*w > 0.0);
        }
    }
    assert!(result.particles.iter().all(|p| (p - 2.0).abs() < 1.0));
}

#[test]
fn diversity_injection_matches_proportion() {
    let priors = vec![uniform(0.0, 1.0).unwrap()];
    let mut pf = ParticleFilter::new(
        priors,
        IdentitySensor,
        FilterConfig {
            n_particles: 500,
            resample_proportion: 0.1,
            seed: 8,
            ..FilterConfig::default()
        },
    )
    .unwrap();
    let observed = DVector::from_element(1, 0.5);
    let mut redrawn = 0;
    for _ in 0..100 {
        let result = pf.update(&observed).unwrap();
        assert_eq!(result.reinitialized.len(), 500);
        redrawn += result.reinitialized_count();
    }
    assert_approx_eq!(redrawn as f64 / 50_000.0, 0.1, 0.01);
}

#[test]
fn systematic_resampling_reference_cases() {
    let weights = [0.1, 0.2, 0.3, 0.4];
    assert_eq!(systematic_resample_from_offset(&weights, 0.05), vec![0, 1, 2, 3]);
    assert_eq!(
        systematic_resample_from_offset(&[1.0, 0.0, 0.0, 0.0], 0.5),
        vec![0, 0, 0, 0]
    );
    assert_approx_eq!(effective_sample_size(&weights), 1.0 / 0.3);
}

#[test]
fn masked_initialization_keeps_other_rows() {
    let priors: Vec<Box<dyn Prior>> = vec![normal(100.0, 1.0).unwrap(), normal(-100.0, 1.0).unwrap()];
    let mut rng = StdRng::seed_from_u64(2);
    let original = DMatrix::from_fn(6, 2, |i, j| (i * 2 + j) as f64 + 0.125);
    let mut ensemble = Ensemble::from_matrix(original.clone());
    let mask = [false, true, false, false, true, false];
    ensemble.initialize(&priors, Some(&mask[..]), &mut rng).unwrap();
    for (i, &redrawn) in mask.iter().enumerate() {
        let row = ensemble.particles().row(i);
        if redrawn {
            assert!((row[0] - 100.0).abs() < 10.0);
            assert!((row[1] + 100.0).abs() < 10.0);
        } else {
            assert_eq!(row[0].to_bits(), original[(i, 0)].to_bits());
            assert_eq!(row[1].to_bits(), original[(i, 1)].to_bits());
        }
    }
}

#[test]
fn every_strategy_tracks_a_fixed_target() {
    for strategy in [
        ResamplingStrategy::Systematic,
        ResamplingStrategy::Stratified,
        ResamplingStrategy::Multinomial,
        ResamplingStrategy::Residual,
    ] {
        let priors = vec![uniform(-5.0, 5.0).unwrap()];
        let mut pf = ParticleFilterBuilder::new(priors, IdentitySensor)
            .n_particles(300)
            .resampling_strategy(strategy)
            .noise(GaussianNoise::new(&[0.1]).unwrap())
            .weight_kernel(RbfKernel::new(0.5).unwrap())
            .seed(13)
            .build()
            .unwrap();
        let observed = DVector::from_element(1, 1.5);
        let mut mean = 0.0;
        for _ in 0..15 {
            let result = pf.update(&observed).unwrap();
            assert_eq!(result.particles.nrows(), 300);
            mean = result.mean_state[0];
        }
        assert_approx_eq!(mean, 1.5, 0.2);
    }
}

#[test]
fn closures_plug_into_the_builder() {
    // observe the sum of both state dimensions
    let sensor = |particles: &DMatrix<f64>| {
        DMatrix::from_iterator(particles.nrows(), 1, particles.row_iter().map(|r| r.sum()))
    };
    let drift = |particles: &mut DMatrix<f64>, _rng: &mut dyn RngCore| particles.add_scalar_mut(0.0);
    let priors = vec![uniform(0.0, 1.0).unwrap(), uniform(0.0, 1.0).unwrap()];
    let mut pf = ParticleFilterBuilder::new(priors, sensor)
        .dynamics(drift)
        .n_particles(100)
        .build()
        .unwrap();
    let result = pf.update(&DVector::from_element(1, 1.0)).unwrap();
    assert_eq!(result.hypotheses.ncols(), 1);
    assert_approx_eq!(result.mean_hypothesis[0], result.mean_state.sum(), 1e-9);
}

#[test]
fn observation_broadcasts_scalar() {
    let priors = vec![uniform(0.0, 1.0).unwrap(), uniform(0.0, 1.0).unwrap()];
    let mut pf = ParticleFilterBuilder::new(priors, IdentitySensor)
        .n_particles(20)
        .build()
        .unwrap();
    assert!(pf.update(&DVector::from_element(1, 0.5)).is_ok());
    assert!(matches!(
        pf.update(&DVector::zeros(3)),
        Err(FilterError::DimensionMismatch { .. })
    ));
}
