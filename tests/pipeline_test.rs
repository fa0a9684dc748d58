//! Integration tests for the capture → transcribe → normalize pipeline.
//!
//! The end-to-end tests need a downloaded model and are marked #[ignore];
//! run them with: cargo test --test pipeline_test -- --ignored

use std::path::PathBuf;
use std::sync::Arc;

use scribekey::model::catalog::{self, Precision};
use scribekey::model::manager::resolve_settings;
use scribekey::model::ModelManager;
use scribekey::system::SystemProfile;
use scribekey::text;
use scribekey::transcription::worker;

fn profile(memory_gb: f64) -> SystemProfile {
    SystemProfile {
        cpu_cores: 8,
        memory_gb,
        is_apple_silicon: false,
    }
}

fn manager_in(dir: &std::path::Path) -> ModelManager {
    ModelManager::with_dirs(
        dir.join("models"),
        dir.join("config.json"),
        profile(16.0),
    )
    .unwrap()
}

#[test]
fn test_wav_round_trip_preserves_count_and_rate() {
    let samples: Vec<i16> = (0..44_100).map(|i| ((i * 37) % 20_000) as i16 - 10_000).collect();

    let file = worker::write_transient_wav(&samples, 44_100).unwrap();

    let reader = hound::WavReader::open(file.path()).unwrap();
    assert_eq!(reader.spec().sample_rate, 44_100);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len() as usize, samples.len());
}

#[test]
fn test_normalizer_matches_documented_example() {
    assert_eq!(
        text::normalize("hello world. this is great!"),
        "Hello world. This is great!"
    );
}

#[test]
fn test_select_absent_tier_does_not_touch_config() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());

    assert!(manager.select_tier("medium").is_err());
    assert!(!dir.path().join("config.json").exists());
    assert!(manager.current_tier().is_none());
}

#[test]
fn test_settings_scenarios_from_both_ends() {
    let tier = catalog::find("small").unwrap();

    // 5-second clip on a well-provisioned machine: higher-precision mode
    let short = resolve_settings(tier, 0.3, 5.0, &profile(16.0), Precision::Float16);
    assert_eq!(short.precision, Precision::Float16);

    // 90-second clip: cheapest precision, thread cap 4
    let long = resolve_settings(tier, 0.3, 90.0, &profile(16.0), Precision::Float16);
    assert_eq!(long.precision, Precision::Int8);
    assert!(long.cpu_threads <= 4);
}

#[test]
fn test_worker_failure_is_contained() {
    // A manager with no selected tier makes every attempt fail; the worker
    // must report that as an outcome, never a panic.
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(manager_in(dir.path()));

    let outcome = worker::run(&[500i16; 44_100], 44_100, &manager);
    assert_eq!(outcome, scribekey::transcription::TranscriptionOutcome::Failed);
}

fn cached_tiny_model() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let snapshots = PathBuf::from(home)
        .join(".scribekey")
        .join("models")
        .join("tiny")
        .join("snapshots");
    for entry in std::fs::read_dir(snapshots).ok()?.filter_map(Result::ok) {
        let weights = entry.path().join("model.bin");
        if weights.is_file() {
            return Some(weights);
        }
    }
    None
}

#[test]
#[ignore = "requires a downloaded tiny model in ~/.scribekey"]
fn test_silence_transcribes_to_no_speech() {
    if cached_tiny_model().is_none() {
        eprintln!("skipping: no tiny model in ~/.scribekey/models");
        return;
    }

    let manager = Arc::new(ModelManager::new().unwrap());
    manager.select_tier("tiny").unwrap();

    // one second of silence at the capture rate
    let outcome = worker::run(&[0i16; 44_100], 44_100, &manager);
    assert_eq!(outcome, scribekey::transcription::TranscriptionOutcome::NoSpeech);

    manager.unload();
}

#[test]
#[ignore = "requires a downloaded tiny model in ~/.scribekey"]
fn test_acquire_identity_until_unload() {
    if cached_tiny_model().is_none() {
        eprintln!("skipping: no tiny model in ~/.scribekey/models");
        return;
    }

    let manager = ModelManager::new().unwrap();
    manager.select_tier("tiny").unwrap();

    let first = manager.acquire().unwrap();
    let second = manager.acquire().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    manager.unload();
    drop((first, second));

    let third = manager.acquire().unwrap();
    assert!(manager.is_loaded());
    drop(third);
    manager.unload();
}
