// tests/decomposition_scenarios.rs
//! End-to-end decompositions of synthetic recordings
//!
//! The recordings are 10 s, 2048 Hz HD-EMG with one injected motor unit. The
//! configuration keeps the extension target and iteration count small so the
//! runs stay quick in the test profile.

use emg_decomp::segmentation::AnalysisWindow;
use emg_decomp::session::{CollectingSink, DecompositionSession, Observers, ProgressEvent, SessionState};
use emg_decomp::signal::{InjectedUnit, ReferenceProfile, SignalBundle, SyntheticConfig, SyntheticRecording};
use emg_decomp::{decompose, ContrastFunction, DecompositionConfig, Initialization, SegmentationMode};
use std::sync::Arc;

fn quick_config() -> DecompositionConfig {
    DecompositionConfig {
        iterations: 6,
        extended_channels: 128,
        edges_seconds: 0.0,
        ..DecompositionConfig::default()
    }
}

fn recording(grid_channels: Vec<usize>, unit_grids: Vec<usize>) -> SyntheticRecording {
    let config = SyntheticConfig {
        grid_channels,
        units: vec![InjectedUnit {
            grids: unit_grids,
            ..InjectedUnit::default()
        }],
        ..SyntheticConfig::default()
    };
    SyntheticRecording::generate(&config).unwrap()
}

fn collecting() -> (Arc<CollectingSink>, Observers) {
    let sink = Arc::new(CollectingSink::new());
    let observers = Observers::default().with_progress(sink.clone()).with_plot(sink.clone());
    (sink, observers)
}

#[test]
fn test_single_unit_recovered() {
    let synthetic = recording(vec![64], vec![0]);
    let injected = synthetic.discharges[0].len();
    let (sink, observers) = collecting();

    let mut session = DecompositionSession::new(synthetic.bundle, quick_config(), observers).unwrap();
    let result = session.run().unwrap();
    assert_eq!(session.state(), SessionState::Done);

    assert_eq!(result.windows, vec![AnalysisWindow::new(0, 20_480)]);
    assert_eq!(result.total_units(), 1);
    let unit = &result.units_for_grid(0)[0];
    assert!(
        unit.discharge_count().abs_diff(injected) <= 1,
        "found {} discharges, injected {}",
        unit.discharge_count(),
        injected
    );
    assert_eq!(unit.pulse_train.len(), 20_480);
    assert!(unit.discharges.windows(2).all(|w| w[1] > w[0]));
    assert!(unit.cov < 0.2);

    let events = sink.events();
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::Iteration { accepted: true, .. })));
    assert!(matches!(events.last(), Some(ProgressEvent::SessionCompleted { units: 1 })));
    assert!(sink.frame_count() > 0);
}

/// Decompose the default one-unit recording and check that exactly that unit
/// comes back, with its discharge count intact
fn assert_single_unit(config: DecompositionConfig, label: &str) {
    let synthetic = recording(vec![64], vec![0]);
    let injected = synthetic.discharges[0].len();

    let result = decompose(synthetic.bundle, config, Observers::default()).unwrap();
    let counts: Vec<usize> = result.units_for_grid(0).iter().map(|u| u.discharge_count()).collect();
    assert_eq!(counts.len(), 1, "{label}: expected one unit, found discharge counts {counts:?}");
    let unit = &result.units_for_grid(0)[0];
    assert!(
        unit.discharge_count().abs_diff(injected) <= 2,
        "{label}: found {} discharges, injected {}",
        unit.discharge_count(),
        injected
    );
    assert!(unit.sil >= 0.9, "{label}: sil {}", unit.sil);
    assert!(unit.cov < 0.2, "{label}: cov {}", unit.cov);
}

#[test]
fn test_every_contrast_recovers_the_unit() {
    for contrast in [
        ContrastFunction::Square,
        ContrastFunction::Skew,
        ContrastFunction::Exp,
        ContrastFunction::Logcosh,
    ] {
        let config = DecompositionConfig {
            contrast_function: contrast,
            ..quick_config()
        };
        assert_single_unit(config, &format!("{:?}", contrast));
    }
}

#[test]
fn test_random_initialization_recovers_the_unit() {
    let config = DecompositionConfig {
        initialization: Initialization::Random,
        ..quick_config()
    };
    assert_single_unit(config, "random initialization");
}

#[test]
fn test_peeloff_recovers_the_unit() {
    let config = DecompositionConfig {
        peeloff: true,
        ..quick_config()
    };
    assert_single_unit(config, "peel-off");
}

#[test]
fn test_differential_mode_recovers_the_unit() {
    let config = DecompositionConfig {
        differential_mode: true,
        ..quick_config()
    };
    assert_single_unit(config, "differential mode");
}

#[test]
fn test_cov_filter_recovers_the_unit() {
    let config = DecompositionConfig {
        cov_filter: true,
        ..quick_config()
    };
    assert_single_unit(config, "cov filter");
}

#[test]
fn test_three_windows_recover_the_unit_once() {
    let config = DecompositionConfig {
        windows: 3,
        ..quick_config()
    };
    assert_single_unit(config, "three windows");
}

#[test]
fn test_non_finite_channel_is_excluded() {
    let synthetic = recording(vec![64], vec![0]);
    let bundle = &synthetic.bundle;
    let mut data = bundle.data().clone();
    data.row_mut(5).fill(f64::NAN);
    let corrupted = SignalBundle::new(data, bundle.sample_rate(), bundle.grids().to_vec()).unwrap();

    let (sink, observers) = collecting();
    let mut session = DecompositionSession::new(corrupted, quick_config(), observers).unwrap();
    let result = session.run().unwrap();

    assert!(session.bundle().grids()[0].rejected[5]);
    assert!(result.total_units() >= 1);
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::Warning { message } if message.contains("channel"))));
}

#[test]
fn test_duplicate_across_grids_collapsed() {
    let synthetic = recording(vec![32, 32], vec![0, 1]);
    let config = DecompositionConfig {
        duplicates_between_grids: true,
        ..quick_config()
    };
    let (sink, observers) = collecting();

    let result = decompose(synthetic.bundle, config, observers).unwrap();
    assert_eq!(result.grid_count, 2);
    assert_eq!(result.total_units(), 1);
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::CrossGridCompleted { units: 1 })));
}

#[test]
fn test_flat_reference_falls_back_to_equal_windows() {
    let config = SyntheticConfig {
        duration_seconds: 4.0,
        grid_channels: vec![16],
        reference: Some(ReferenceProfile::Flat { level: 5.0 }),
        ..SyntheticConfig::default()
    };
    let synthetic = SyntheticRecording::generate(&config).unwrap();
    let (sink, observers) = collecting();

    let result = decompose(synthetic.bundle, quick_config(), observers).unwrap();
    assert_eq!(result.windows, vec![AnalysisWindow::new(0, 8192)]);

    let events = sink.events();
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::WindowsReady { mode: SegmentationMode::EqualWindows, .. }
    )));
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::Warning { .. })));
}

#[test]
fn test_zero_iterations_yields_no_units() {
    let synthetic = recording(vec![16], vec![0]);
    let config = DecompositionConfig {
        iterations: 0,
        ..quick_config()
    };
    let result = decompose(synthetic.bundle, config, Observers::default()).unwrap();
    assert_eq!(result.total_units(), 0);
    assert!(result.failed_grids.is_empty());
}

#[test]
fn test_plateau_reference_drives_windows() {
    let config = SyntheticConfig {
        duration_seconds: 6.0,
        grid_channels: vec![16],
        reference: Some(ReferenceProfile::Trapezoid {
            ramp_seconds: 1.0,
            plateau_level: 20.0,
        }),
        ..SyntheticConfig::default()
    };
    let synthetic = SyntheticRecording::generate(&config).unwrap();
    let decomp = DecompositionConfig {
        iterations: 0,
        windows: 2,
        ..quick_config()
    };

    let result = decompose(synthetic.bundle, decomp, Observers::default()).unwrap();
    assert_eq!(result.windows.len(), 2);
    // samples at or above 80% of the ramp lie within the plateau run
    assert!(result.windows[0].start >= 1600);
    assert!(result.windows[1].end <= 12_288 - 1600);
}

#[test]
fn test_result_serialises() {
    let synthetic = recording(vec![16], vec![0]);
    let config = DecompositionConfig {
        iterations: 0,
        ..quick_config()
    };
    let result = decompose(synthetic.bundle, config, Observers::default()).unwrap();
    let json = result.to_json().unwrap();
    assert!(json.contains("\"sample_rate\": 2048.0"));
    assert!(json.contains("\"units\""));
}
