// tests/postprocess_tests.rs
//! Post-processing behaviour: duplicate removal and rate-outlier pruning
//!
//! These passes only see discharge trains and pulse trains, so the tests build
//! motor units directly instead of running a decomposition.

use emg_decomp::config::{DecompositionConfig, OutlierConfig};
use emg_decomp::postprocess::{DuplicateRemover, OutlierRemover};
use emg_decomp::utils::{coefficient_of_variation, discharge_rates, isi_cov};
use emg_decomp::MotorUnit;
use proptest::prelude::*;

const FS: f64 = 2048.0;

fn unit(grid: usize, discharges: Vec<usize>) -> MotorUnit {
    MotorUnit {
        grid,
        pulse_train: vec![1.0; discharges.last().map_or(0, |d| d + 1)],
        cov: isi_cov(&discharges),
        discharges,
        sil: 0.93,
        filter: vec![],
        source_window: 0,
    }
}

fn train(start: usize, step: usize, count: usize) -> Vec<usize> {
    (0..count).map(|k| start + k * step).collect()
}

fn rate_cov(discharges: &[usize]) -> f64 {
    coefficient_of_variation(&discharge_rates(discharges, FS))
}

#[test]
fn test_remover_constants_from_config() {
    let config = DecompositionConfig::default();
    let within = DuplicateRemover::within_grid(&config, FS);
    let between = DuplicateRemover::between_grids(&config, FS);

    // half a millisecond of jitter at 2048 Hz rounds to one sample either side
    let a = train(200, 170, 40);
    let b: Vec<usize> = a.iter().map(|d| d + 30).collect();
    assert_eq!(within.best_lag(&a, &b), Some(30));
    assert_eq!(between.best_lag(&a, &b), Some(30));

    // beyond fs / 40 samples no alignment is attempted
    let far: Vec<usize> = a.iter().map(|d| d + 60).collect();
    assert_eq!(within.best_lag(&a, &far), None);
}

#[test]
fn test_subset_train_counts_as_duplicate() {
    let remover = DuplicateRemover::within_grid(&DecompositionConfig::default(), FS);
    let full = train(100, 180, 50);
    let half: Vec<usize> = full.iter().copied().step_by(2).collect();

    // 25 of 50 shared discharges clears the default 0.3 threshold
    assert!(remover.common_fraction(&full, &half) >= 0.5 - 1e-12);
    assert!(remover.is_duplicate(&unit(0, full.clone()), &unit(0, half)));

    let survivors = remover.remove(vec![unit(0, full.clone()), unit(0, train(101, 180, 50))]);
    assert_eq!(survivors.len(), 1);
}

#[test]
fn test_cross_grid_survivor_keeps_its_grid() {
    let config = DecompositionConfig::default();
    let remover = DuplicateRemover::between_grids(&config, FS);
    let regular = train(100, 200, 40);
    let mut noisy = regular.clone();
    noisy[10] += 40;
    noisy[20] -= 30;

    let survivors = remover.remove_between_grids(vec![unit(0, noisy), unit(1, regular.clone())]);
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].grid, 1);
    assert_eq!(survivors[0].discharges, regular);
}

#[test]
fn test_outlier_pass_removes_doublets() {
    let remover = OutlierRemover::new(&OutlierConfig::default(), FS);
    let mut discharges = train(100, 170, 60);
    let mut pulse = vec![0.0; 12_000];
    for &d in &discharges {
        pulse[d] = 1.0;
    }
    // two doublets a few milliseconds after real discharges
    for &extra in &[100 + 170 * 12 + 9, 100 + 170 * 40 + 7] {
        pulse[extra] = 0.4;
        discharges.push(extra);
    }
    discharges.sort_unstable();

    let report = remover.clean(&mut discharges, &pulse);
    assert_eq!(discharges, train(100, 170, 60));
    assert_eq!(report.removed, 2);
    assert!(report.final_cov < report.initial_cov);
}

proptest! {
    #[test]
    fn prop_outlier_removal_never_raises_cov(
        gaps in prop::collection::vec(5usize..400, 3..80),
        heights in prop::collection::vec(0.1f64..2.0, 80),
    ) {
        let mut discharges = Vec::with_capacity(gaps.len() + 1);
        let mut t = 50;
        discharges.push(t);
        for g in &gaps {
            t += g;
            discharges.push(t);
        }
        let mut pulse = vec![0.0; t + 1];
        for (i, &d) in discharges.iter().enumerate() {
            pulse[d] = heights[i % heights.len()];
        }

        let config = OutlierConfig::default();
        let before = rate_cov(&discharges);
        let report = OutlierRemover::new(&config, FS).clean(&mut discharges, &pulse);

        prop_assert!(report.passes <= config.max_iterations);
        prop_assert!(discharges.windows(2).all(|w| w[1] > w[0]));
        if before.is_finite() {
            prop_assert!(report.final_cov <= before);
            prop_assert!((rate_cov(&discharges) - report.final_cov).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_duplicate_removal_is_idempotent(
        starts in prop::collection::vec(0usize..400, 1..6),
        steps in prop::collection::vec(150usize..400, 6),
    ) {
        let remover = DuplicateRemover::within_grid(&DecompositionConfig::default(), FS);
        let units: Vec<MotorUnit> = starts
            .iter()
            .enumerate()
            .map(|(i, &s)| unit(0, train(s, steps[i % steps.len()], 30)))
            .collect();

        let once = remover.remove(units);
        let twice = remover.remove(once.clone());
        prop_assert_eq!(once.len(), twice.len());
        prop_assert_eq!(once, twice);
    }
}
