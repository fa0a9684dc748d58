use anyhow::{Context, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::model::catalog::TierInfo;

const WEIGHTS_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Snapshot directory name for downloads performed by this tool.
///
/// The cache contract only requires *a* snapshot directory containing
/// `model.bin`; downloads land in a fixed one.
pub const SNAPSHOT_NAME: &str = "main";

/// Download chunk granularity for progress reporting
const CHUNK_SIZE: usize = 1024 * 1024;

/// Fetch a tier's weights into `tier_dir` under a fresh snapshot directory.
///
/// The file is written to a `.tmp` sibling first and renamed into place so
/// a partial download never looks like a present model. `on_progress` is
/// called with a fraction in `[0.0, 1.0]` as bytes arrive.
///
/// # Errors
/// Returns error on network failure, non-success HTTP status, or file I/O
/// failure.
pub fn fetch_weights(
    tier: &TierInfo,
    tier_dir: &Path,
    mut on_progress: impl FnMut(f64),
) -> Result<()> {
    let url = format!("{}/{}", WEIGHTS_BASE_URL, tier.weights_filename());

    let snapshot_dir = tier_dir.join("snapshots").join(SNAPSHOT_NAME);
    fs::create_dir_all(&snapshot_dir).context("failed to create snapshot directory")?;

    let model_path = snapshot_dir.join("model.bin");
    let temp_path = model_path.with_extension("tmp");

    tracing::info!(tier = tier.name, url = %url, "downloading model weights");

    let response = reqwest::blocking::get(&url)
        .with_context(|| format!("failed to download model from {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("download failed with status {}: {}", response.status(), url);
    }

    let total_bytes = response
        .content_length()
        .unwrap_or(tier.size_mb * 1024 * 1024);

    let mut reader = response;
    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("failed to create temp file at {}", temp_path.display()))?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let read = reader
            .read(&mut buffer)
            .context("failed to read response body")?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .context("failed to write model to temp file")?;
        written += read as u64;
        on_progress((written as f64 / total_bytes as f64).min(1.0));
    }

    // Drop file handle before rename
    drop(file);

    fs::rename(&temp_path, &model_path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            model_path.display()
        )
    })?;

    tracing::info!(
        tier = tier.name,
        path = %model_path.display(),
        size = written,
        "model weights downloaded"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog;

    #[test]
    fn test_snapshot_layout_paths() {
        let tier = catalog::find("tiny").unwrap();
        assert_eq!(tier.weights_filename(), "ggml-tiny.bin");

        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("snapshots").join(SNAPSHOT_NAME);
        fs::create_dir_all(&snapshot).unwrap();
        assert!(snapshot.exists());
    }

    #[test]
    #[ignore = "requires network access and downloads a large file"]
    fn test_fetch_weights_integration() {
        let tier = catalog::find("tiny").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut last_progress = 0.0;
        let result = fetch_weights(tier, dir.path(), |p| last_progress = p);

        assert!(result.is_ok());
        assert!(last_progress > 0.0);
        let model = dir
            .path()
            .join("snapshots")
            .join(SNAPSHOT_NAME)
            .join("model.bin");
        assert!(model.exists());
        assert!(fs::metadata(&model).unwrap().len() > 0);
    }

    #[test]
    fn test_fetch_invalid_tier_dir_is_created() {
        // create_dir_all makes the snapshot tree even for a fresh tier dir
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("tiny");
        let snapshot = nested.join("snapshots").join(SNAPSHOT_NAME);
        fs::create_dir_all(&snapshot).unwrap();
        assert!(snapshot.is_dir());
    }
}
