
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use emg_decomp::config::DecompositionConfig;
use emg_decomp::postprocess::DuplicateRemover;
use emg_decomp::processing::{extend, whiten, BandPassFilter, Conditioner};
use emg_decomp::segmentation::Segmenter;
use emg_decomp::separation::{BlockContext, SeparationEngine};
use emg_decomp::session::Observers;
use emg_decomp::signal::{GridType, SyntheticConfig, SyntheticRecording};
use emg_decomp::utils::isi_cov;
use emg_decomp::MotorUnit;

const SAMPLE_RATE: f64 = 2048.0;
const CHANNEL_COUNTS: &[usize] = &[16, 32, 64];
const EXTENDED_TARGETS: &[usize] = &[128, 256, 512];

fn synthetic(channels: usize, seconds: f64) -> SyntheticRecording {
    let config = SyntheticConfig {
        duration_seconds: seconds,
        grid_channels: vec![channels],
        ..SyntheticConfig::default()
    };
    SyntheticRecording::generate(&config).expect("synthetic recording")
}

fn benchmark_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("band_pass");
    let filter = BandPassFilter::butterworth(2, 20.0, 500.0, SAMPLE_RATE).expect("filter");

    for &channels in CHANNEL_COUNTS {
        let data = synthetic(channels, 5.0).bundle.grid_block(0);
        group.throughput(Throughput::Elements((channels * data.ncols()) as u64));
        group.bench_with_input(BenchmarkId::new("zero_phase", channels), &data, |b, data| {
            b.iter(|| {
                let mut block = data.clone();
                filter.apply(black_box(&mut block));
                block
            });
        });
    }
    group.finish();
}

fn benchmark_whitening(c: &mut Criterion) {
    let mut group = c.benchmark_group("whitening");
    group.sample_size(10);
    let data = synthetic(32, 5.0).bundle.grid_block(0);

    for &target in EXTENDED_TARGETS {
        let extended = extend(&data, (target / data.nrows()).max(1));
        group.bench_with_input(BenchmarkId::new("extended", target), &extended, |b, extended| {
            b.iter(|| whiten(black_box(extended)).expect("whitening"));
        });
    }
    group.finish();
}

fn benchmark_separation(c: &mut Criterion) {
    let mut group = c.benchmark_group("separation");
    group.sample_size(10);
    let recording = synthetic(32, 10.0);
    let data = recording.bundle.grid_block(0);

    for &target in &EXTENDED_TARGETS[..2] {
        let config = DecompositionConfig {
            iterations: 5,
            extended_channels: target,
            ..DecompositionConfig::default()
        };
        let conditioner = Conditioner::new(&config, GridType::Surface, SAMPLE_RATE).expect("conditioner");
        let mut windows = Segmenter::from_config(&config).segment(None, data.ncols()).expect("windows");
        let block = conditioner.condition(&data, &mut windows, 0).expect("block");
        let engine = SeparationEngine::new(&config, SAMPLE_RATE);
        let observers = Observers::default();

        group.bench_with_input(BenchmarkId::new("five_iterations", target), &block, |b, block| {
            b.iter(|| {
                let context = BlockContext { grid: 0, sample_rate: SAMPLE_RATE, reference: None };
                engine.separate(black_box(block), context, &observers).expect("separation")
            });
        });
    }
    group.finish();
}

fn benchmark_duplicate_removal(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplicates");
    let remover = DuplicateRemover::within_grid(&DecompositionConfig::default(), SAMPLE_RATE);

    for &count in &[10usize, 40, 100] {
        let units: Vec<MotorUnit> = (0..count)
            .map(|i| {
                let step = 150 + (i * 37) % 250;
                let discharges: Vec<usize> = (0..120).map(|k| (i * 13) % 200 + k * step).collect();
                MotorUnit {
                    grid: 0,
                    pulse_train: Vec::new(),
                    cov: isi_cov(&discharges),
                    discharges,
                    sil: 0.92,
                    filter: Vec::new(),
                    source_window: 0,
                }
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("units", count), &units, |b, units| {
            b.iter(|| remover.remove(black_box(units.clone())));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_filtering,
    benchmark_whitening,
    benchmark_separation,
    benchmark_duplicate_removal
);
criterion_main!(benches);
