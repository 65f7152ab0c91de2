//! Integration test: train, persist, load and predict

use exoplanet_classifier::error::{ErrorKind, ExoError};
use exoplanet_classifier::inference::{ConfidenceTier, InferenceService, LoadState};
use exoplanet_classifier::schema::{FeatureVector, FEATURE_NAMES};
use exoplanet_classifier::training::{
    LightGBMConfig, TrainingConfig, TrainingOutcome, TrainingRecord, TrainingService,
};
use std::path::PathBuf;

fn feature_values(confirmed: bool, i: usize) -> Vec<(String, f64)> {
    let base = if confirmed { 10.0 } else { 1.0 };
    FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(j, name)| (name.to_string(), base + (i % 7) as f64 * 0.1 + j as f64))
        .collect()
}

fn records(n: usize) -> Vec<TrainingRecord> {
    (0..n)
        .map(|i| {
            let confirmed = i % 10 < 7;
            let label = if confirmed { "CONFIRMED" } else { "CANDIDATE" };
            TrainingRecord::new(label, feature_values(confirmed, i))
        })
        .collect()
}

fn candidate(confirmed: bool, i: usize) -> FeatureVector {
    feature_values(confirmed, i).into_iter().collect()
}

fn trained(dir: &tempfile::TempDir) -> (PathBuf, TrainingOutcome) {
    let path = dir.path().join("model.bin");
    let config = TrainingConfig::default()
        .with_lightgbm(LightGBMConfig::default().with_n_estimators(20));
    let outcome = TrainingService::new(&path, config)
        .train_from_records(&records(100), false)
        .unwrap();
    (path, outcome)
}

#[test]
fn test_loaded_bundle_reproduces_in_memory_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let (path, outcome) = trained(&dir);

    let service = InferenceService::new(&path);
    service.load().unwrap();
    assert!(service.is_loaded());

    for i in 0..10 {
        let features = candidate(i % 2 == 0, i);
        let result = service.predict_one(&features).unwrap();

        let row = outcome.bundle.feature_schema.project(&features).unwrap();
        let (code, probs) = outcome.bundle.pipeline.predict_row(&row).unwrap();

        assert_eq!(result.prediction_code, code);
        assert_eq!(result.prediction, outcome.bundle.label_mapping.label_of(code).unwrap());
        for (label, p) in outcome.bundle.label_mapping.labels().iter().zip(probs.iter()) {
            assert_eq!(result.probabilities[label], *p);
        }
    }
}

#[test]
fn test_prediction_invariants() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = trained(&dir);
    let service = InferenceService::new(&path);
    service.load().unwrap();

    let result = service.predict_one(&candidate(true, 3)).unwrap();

    assert_eq!(result.probabilities.len(), 4);
    let sum: f64 = result.probabilities.values().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!(result.probabilities.values().all(|p| (0.0..=1.0).contains(p)));

    let best = result
        .probabilities
        .iter()
        .fold(f64::MIN, |acc, (_, p)| acc.max(*p));
    assert_eq!(result.max_probability, best);
    assert_eq!(result.probabilities[&result.prediction], result.max_probability);
    assert_eq!(result.confidence, ConfidenceTier::from_probability(result.max_probability));

    // Separable training data: a clear CONFIRMED candidate is classified as such
    assert_eq!(result.prediction, "CONFIRMED");
}

#[test]
fn test_missing_features_are_named_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = trained(&dir);
    let service = InferenceService::new(&path);
    service.load().unwrap();

    let mut features = candidate(true, 0);
    features.remove("temp_planeta");
    features.remove("loc2_dec");
    features.insert("unrelated".to_string(), 1.0);

    match service.predict_one(&features) {
        Err(ExoError::MissingFeatures(names)) => {
            assert_eq!(names, vec!["temp_planeta".to_string(), "loc2_dec".to_string()]);
        }
        other => panic!("expected MissingFeatures, got {:?}", other),
    }
}

#[test]
fn test_batch_reports_each_element() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = trained(&dir);
    let service = InferenceService::new(&path);
    service.load().unwrap();

    let mut broken = candidate(false, 1);
    broken.remove("radio_estrella");
    let batch = vec![candidate(true, 0), broken, candidate(false, 2)];

    let results = service.predict_batch(&batch).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::Schema);
    assert!(results[2].is_ok());

    // Order is preserved
    let single = service.predict_one(&batch[2]).unwrap();
    assert_eq!(results[2].as_ref().unwrap().probabilities, single.probabilities);
}

#[test]
fn test_unloaded_service_rejects_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let service = InferenceService::new(dir.path().join("absent.bin"));
    assert_eq!(service.state(), LoadState::Unloaded);

    let err = service.predict_one(&candidate(true, 0)).unwrap_err();
    assert!(matches!(err, ExoError::ModelNotLoaded(_)));
    assert!(matches!(service.predict_batch(&[candidate(true, 0)]), Err(ExoError::ModelNotLoaded(_))));
}

#[test]
fn test_reload_picks_up_model_trained_later() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let service = InferenceService::new(&path);

    assert!(service.load().is_err());
    assert!(matches!(service.state(), LoadState::LoadFailed { .. }));

    let config = TrainingConfig::default()
        .with_lightgbm(LightGBMConfig::default().with_n_estimators(5));
    TrainingService::new(&path, config)
        .train_from_records(&records(100), false)
        .unwrap();

    // load() keeps the recorded failure, reload() retries
    assert!(service.load().is_err());
    service.reload().unwrap();
    assert_eq!(service.state(), LoadState::Loaded);

    let info = service.model_info().unwrap();
    assert_eq!(info.model_type, "LightGBM");
    assert_eq!(info.num_features, 8);
    assert_eq!(info.labels, vec!["CANDIDATE", "CONFIRMED", "FALSE POSITIVE", "REFUTED"]);
}
