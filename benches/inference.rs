use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use exoplanet_classifier::inference::InferenceService;
use exoplanet_classifier::schema::{FeatureVector, FEATURE_NAMES};
use exoplanet_classifier::training::{LightGBMConfig, TrainingConfig, TrainingRecord, TrainingService};
use rand::prelude::*;

fn create_records(n_rows: usize, rng: &mut impl Rng) -> Vec<TrainingRecord> {
    let labels = ["CANDIDATE", "CONFIRMED", "FALSE POSITIVE"];
    (0..n_rows)
        .map(|i| {
            let class = i % labels.len();
            TrainingRecord::new(
                labels[class],
                FEATURE_NAMES
                    .iter()
                    .map(|name| (name.to_string(), class as f64 * 3.0 + rng.gen::<f64>() * 4.0)),
            )
        })
        .collect()
}

fn create_candidates(n: usize, rng: &mut impl Rng) -> Vec<FeatureVector> {
    (0..n)
        .map(|_| {
            FEATURE_NAMES
                .iter()
                .map(|name| (name.to_string(), rng.gen::<f64>() * 10.0))
                .collect()
        })
        .collect()
}

fn bench_inference(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.bin");

    let config = TrainingConfig::default()
        .with_lightgbm(LightGBMConfig::default().with_n_estimators(50));
    TrainingService::new(&path, config)
        .train_from_records(&create_records(3000, &mut rng), false)
        .unwrap();

    let service = InferenceService::new(&path);
    service.load().unwrap();

    let mut group = c.benchmark_group("inference");

    let single = create_candidates(1, &mut rng).remove(0);
    group.bench_function("predict_one", |b| {
        b.iter(|| service.predict_one(black_box(&single)).unwrap())
    });

    for batch_size in [16, 256, 4096].iter() {
        let batch = create_candidates(*batch_size, &mut rng);
        group.bench_with_input(
            BenchmarkId::new("predict_batch", batch_size),
            &batch,
            |b, batch| {
                b.iter(|| service.predict_batch(black_box(batch)).unwrap())
            },
        );
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let records = create_records(2000, &mut rng);

    let mut group = c.benchmark_group("training");
    group.sample_size(10);
    group.bench_function("train_2000_rows", |b| {
        b.iter(|| {
            let dir = tempfile::tempdir().unwrap();
            let config = TrainingConfig::default()
                .with_lightgbm(LightGBMConfig::default().with_n_estimators(30));
            TrainingService::new(dir.path().join("model.bin"), config)
                .train_from_records(black_box(&records), false)
                .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_inference, bench_training);
criterion_main!(benches);
