//! Integration tests for `ModelLifecycleManager` and hot-swapping under load.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use integrisense_classifier::artifact::ModelArtifact;
use integrisense_classifier::{
    ClassificationEngine, ClassifierSlot, JsonlInboxSource, LogisticModel, ModelError,
    ModelLifecycleManager, ModelMetadata, Normalization, RetrainOutcome,
};
use integrisense_core::classification::ClassificationLabel;
use integrisense_core::guard::GuardPolicy;
use integrisense_core::reading::{Motion, Reading, ReadingSource};
use tokio_util::sync::CancellationToken;

fn lifecycle(dir: &Path) -> (Arc<ModelLifecycleManager>, Arc<ClassifierSlot>) {
    let slot = Arc::new(ClassifierSlot::new());
    let source = Arc::new(JsonlInboxSource::new(dir.join("inbox.jsonl")));
    let manager = ModelLifecycleManager::new(slot.clone(), dir.join("model.json"), source);
    (Arc::new(manager), slot)
}

fn inbox_lines(calm: usize, stressed: usize) -> String {
    let mut out = String::new();
    for i in 0..calm {
        let eda = 1.0 + i as f64 * 0.05;
        out.push_str(&format!(
            "{{\"bvp\":0.3,\"temperature\":33.8,\"eda\":{eda},\"acceleration_magnitude\":0.4,\"label\":\"Calm\"}}\n"
        ));
    }
    for i in 0..stressed {
        let eda = 7.0 - i as f64 * 0.05;
        out.push_str(&format!(
            "{{\"bvp\":1.7,\"temperature\":38.2,\"eda\":{eda},\"acceleration_magnitude\":2.2,\"label\":\"Stressed\"}}\n"
        ));
    }
    out
}

async fn write_artifact(path: &Path, version: u64, bias: f64) {
    ModelArtifact::logistic(
        LogisticModel::new([0.0; 4], bias),
        Normalization::identity(),
        ModelMetadata {
            version,
            trained_at: Utc::now(),
            samples: 10,
        },
    )
    .save(path)
    .await
    .unwrap();
}

fn out_of_guard() -> integrisense_core::reading::CanonicalReading {
    Reading {
        bvp: 1.9,
        temperature: 38.5,
        eda: 7.2,
        motion: Motion::Magnitude(2.3),
        source: ReadingSource::Network,
    }
    .canonicalize(Utc::now())
}

// ---------------------------------------------------------------------------
// Test: missing artifact leaves the slot empty
// ---------------------------------------------------------------------------

#[tokio::test]
async fn startup_without_artifact_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, slot) = lifecycle(dir.path());

    assert!(!manager.load_at_startup().await);
    assert!(!slot.is_loaded());

    let engine = ClassificationEngine::new(GuardPolicy::default(), slot);
    assert_eq!(
        engine.classify(out_of_guard()).label,
        ClassificationLabel::ModelUnavailable
    );
}

// ---------------------------------------------------------------------------
// Test: startup load and reload swap the model
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reload_swaps_in_the_artifact_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, slot) = lifecycle(dir.path());
    let engine = ClassificationEngine::new(GuardPolicy::default(), slot.clone());

    write_artifact(manager.artifact_path(), 1, -8.0).await;
    assert!(manager.load_at_startup().await);
    assert_eq!(engine.classify(out_of_guard()).label, ClassificationLabel::Calm);

    write_artifact(manager.artifact_path(), 2, 8.0).await;
    let metadata = manager.reload().await.unwrap();
    assert_eq!(metadata.version, 2);
    assert_eq!(
        engine.classify(out_of_guard()).label,
        ClassificationLabel::Stressed
    );
}

// ---------------------------------------------------------------------------
// Test: a corrupt artifact on reload keeps the previous model
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_reload_keeps_previous_model() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, slot) = lifecycle(dir.path());

    write_artifact(manager.artifact_path(), 1, 0.0).await;
    manager.reload().await.unwrap();

    tokio::fs::write(manager.artifact_path(), b"{ not json")
        .await
        .unwrap();
    assert_matches!(manager.reload().await, Err(ModelError::Malformed(_)));
    assert_eq!(slot.metadata().unwrap().version, 1);
}

// ---------------------------------------------------------------------------
// Test: retrain with no inbox is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrain_without_data_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, slot) = lifecycle(dir.path());

    assert_eq!(manager.retrain_once().await.unwrap(), RetrainOutcome::NoData);
    assert!(!slot.is_loaded());
    assert!(!manager.artifact_path().exists());
}

// ---------------------------------------------------------------------------
// Test: retrain trains, persists and swaps, then consumes the inbox
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrain_persists_and_swaps_new_model() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, slot) = lifecycle(dir.path());
    tokio::fs::write(dir.path().join("inbox.jsonl"), inbox_lines(15, 15))
        .await
        .unwrap();

    let outcome = manager.retrain_once().await.unwrap();
    let metadata = assert_matches!(outcome, RetrainOutcome::Retrained(m) => m);
    assert_eq!(metadata.version, 1);
    assert_eq!(metadata.samples, 30);

    assert_eq!(slot.metadata().unwrap(), metadata);
    let on_disk = ModelArtifact::load(manager.artifact_path()).await.unwrap();
    assert_eq!(on_disk.metadata, metadata);

    let engine = ClassificationEngine::new(GuardPolicy::default(), slot);
    assert_eq!(
        engine.classify(out_of_guard()).label,
        ClassificationLabel::Stressed
    );

    // The batch was consumed.
    assert_eq!(manager.retrain_once().await.unwrap(), RetrainOutcome::NoData);
}

// ---------------------------------------------------------------------------
// Test: a failing retrain keeps the previous model
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_retrain_keeps_previous_model() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, slot) = lifecycle(dir.path());

    write_artifact(manager.artifact_path(), 4, 0.0).await;
    manager.reload().await.unwrap();

    // Only one label present.
    tokio::fs::write(dir.path().join("inbox.jsonl"), inbox_lines(5, 0))
        .await
        .unwrap();

    assert_matches!(manager.retrain_once().await, Err(ModelError::Training(_)));
    assert_eq!(slot.metadata().unwrap().version, 4);
}

// ---------------------------------------------------------------------------
// Test: an untrainable batch does not block newer data
// ---------------------------------------------------------------------------

#[tokio::test]
async fn untrainable_batch_is_rejected_and_next_batch_trains() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, slot) = lifecycle(dir.path());
    let inbox = dir.path().join("inbox.jsonl");

    tokio::fs::write(&inbox, inbox_lines(5, 0)).await.unwrap();
    assert_matches!(manager.retrain_once().await, Err(ModelError::Training(_)));
    assert!(dir.path().join("inbox.jsonl.rejected").exists());
    assert!(!dir.path().join("inbox.jsonl.processing").exists());

    tokio::fs::write(&inbox, inbox_lines(10, 10)).await.unwrap();
    let outcome = manager.retrain_once().await.unwrap();
    assert_matches!(outcome, RetrainOutcome::Retrained(ref m) if m.samples == 20);
    assert!(slot.is_loaded());
    assert!(!inbox.exists());
}

// ---------------------------------------------------------------------------
// Test: the scheduler runs cycles and stops on cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scheduled_retrain_picks_up_data_and_cancels() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, slot) = lifecycle(dir.path());
    tokio::fs::write(dir.path().join("inbox.jsonl"), inbox_lines(10, 10))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = manager.schedule_retrain(Duration::from_millis(10), cancel.clone());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !slot.is_loaded() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(slot.is_loaded());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: classifications during repeated swaps always see a whole model
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn classify_during_hot_swap_sees_whole_models() {
    let slot = Arc::new(ClassifierSlot::new());
    let engine = ClassificationEngine::new(GuardPolicy::default(), slot.clone());

    let swapper = {
        let slot = slot.clone();
        tokio::spawn(async move {
            for version in 0..500u64 {
                let bias = if version % 2 == 0 { -10.0 } else { 10.0 };
                let artifact = ModelArtifact::logistic(
                    LogisticModel::new([0.0; 4], bias),
                    Normalization::identity(),
                    ModelMetadata {
                        version,
                        trained_at: Utc::now(),
                        samples: 1,
                    },
                );
                slot.swap(artifact.into_handle().unwrap());
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..500 {
                let result = engine.classify(out_of_guard());
                match result.label {
                    ClassificationLabel::ModelUnavailable => {}
                    ClassificationLabel::Calm | ClassificationLabel::Stressed => {
                        // Bias of +/-10 gives a confidence near 1 for either model.
                        assert!(result.confidence.unwrap() > 0.99);
                    }
                    other => panic!("unexpected label {other}"),
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    swapper.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
