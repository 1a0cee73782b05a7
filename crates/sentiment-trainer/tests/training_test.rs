//! End-to-end fine-tuning on tiny models

mod common;

use sentiment_classifiers::{Classifier, InferenceOptions, ModelArtifact, ModelSource, SequenceClassifier};
use sentiment_trainer::{fine_tune, TrainConfig, Trainer, SMOKE_SENTENCES};
use std::path::Path;

fn tiny_train_config(base: &Path, output: &Path) -> TrainConfig {
    TrainConfig {
        base_model: ModelSource::local(base),
        output_dir: output.to_path_buf(),
        sample_size: 12,
        seed: 42,
        epochs: 2,
        batch_size: 4,
        learning_rate: 1e-3,
        max_length: 32,
        ..Default::default()
    }
}

#[test]
fn test_fine_tune_writes_servable_artifact() {
    let base = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    common::write_base_model(base.path());
    let config = tiny_train_config(base.path(), &output.path().join("model"));

    let mut lines = Vec::new();
    let outcome = fine_tune(&config, &common::toy_reviews(4), |stats| lines.push(stats.to_string())).unwrap();

    assert_eq!(outcome.report.samples, 12);
    assert_eq!(outcome.report.epochs.len(), 2);
    assert_eq!(outcome.report.epochs[0].batches, 3);
    assert!(outcome.report.final_loss().unwrap().is_finite());
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Epoch 1/2, Loss: "), "{}", lines[0]);

    assert_eq!(outcome.smoke.len(), SMOKE_SENTENCES.len());
    assert!(outcome.smoke.iter().all(|p| p.class < 2));

    let artifact = ModelArtifact::open(output.path().join("model")).unwrap();
    assert!(artifact.is_complete());
    assert!(artifact.tokenizer_path().exists());

    let saved = artifact.read_config().unwrap();
    assert_eq!(saved["id2label"]["0"], "LABEL_0");
    assert_eq!(saved["label2id"]["LABEL_1"], 1);
    assert_eq!(saved["architectures"][0], "DistilBertForSequenceClassification");
    assert_eq!(saved["dim"], 8);

    let options = InferenceOptions {
        max_length: 32,
        ..Default::default()
    };
    let classifier = SequenceClassifier::load("trained", &artifact, &options).unwrap();
    let result = classifier.classify("This is Amazing!").unwrap();
    assert!(result.label == "LABEL_0" || result.label == "LABEL_1");
    assert!(result.score >= 0.5 && result.score <= 1.0);
}

#[test]
fn test_saved_model_matches_trainer_predictions() {
    let base = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    common::write_base_model(base.path());
    let config = tiny_train_config(base.path(), output.path());

    let trainer = Trainer::from_config(&config).unwrap();
    trainer.train(&common::toy_reviews(3), |_| {}).unwrap();
    let artifact = trainer.save(output.path()).unwrap();

    let options = InferenceOptions {
        max_length: 32,
        ..Default::default()
    };
    let classifier = SequenceClassifier::load("trained", &artifact, &options).unwrap();
    for text in ["amazing movie !", "hated it ."] {
        let expected = trainer.predict(&[text]).unwrap()[0];
        let result = classifier.classify(text).unwrap();
        assert_eq!(result.label, format!("LABEL_{}", expected));
    }
}

#[test]
fn test_loss_decreases_on_separable_data() {
    let base = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    common::write_base_model(base.path());
    let config = TrainConfig {
        epochs: 20,
        learning_rate: 5e-3,
        ..tiny_train_config(base.path(), output.path())
    };

    let trainer = Trainer::from_config(&config).unwrap();
    let report = trainer.train(&common::toy_reviews(4), |_| {}).unwrap();

    let first = report.epochs.first().unwrap().avg_loss;
    let last = report.final_loss().unwrap();
    assert!(last < first, "loss went from {first} to {last}");
}

#[test]
fn test_oversized_sample_fails_before_training() {
    let base = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    common::write_base_model(base.path());
    let config = TrainConfig {
        sample_size: 100,
        ..tiny_train_config(base.path(), &output.path().join("model"))
    };

    let err = fine_tune(&config, &common::toy_reviews(2), |_| {}).unwrap_err();
    assert!(matches!(err, sentiment_core::Error::Dataset(_)));
    assert!(!output.path().join("model").exists());
}

#[test]
fn test_missing_base_model_is_an_error() {
    let output = tempfile::tempdir().unwrap();
    let config = tiny_train_config(Path::new("/no/such/base/model"), output.path());
    assert!(Trainer::from_config(&config).is_err());
}

#[test]
fn test_checkpoint_without_encoder_weights_is_rejected() {
    let base = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let artifact = common::write_base_model(base.path());

    let unrelated = std::collections::HashMap::from([(
        "lm_head.weight".to_string(),
        candle_core::Tensor::zeros((2, 2), candle_core::DType::F32, &candle_core::Device::Cpu).unwrap(),
    )]);
    candle_core::safetensors::save(&unrelated, artifact.weights_path()).unwrap();

    let config = tiny_train_config(base.path(), output.path());
    assert!(Trainer::from_config(&config).is_err());
}
