use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Prefix for transient recording files written during transcription
pub const TRANSIENT_PREFIX: &str = "scribekey_";

/// Transient files younger than this are considered in use by a live
/// transcription and are left alone
const STALE_AGE: Duration = Duration::from_secs(10 * 60);

/// Remove leftover transient recordings from the system temp directory.
///
/// Transient WAVs are normally removed by their scope guard; a crash can
/// leave them behind, so this sweep runs at startup and shutdown. Failures
/// are logged and never fatal. Returns the number of files removed.
pub fn sweep_transient_files() -> usize {
    let temp_dir = std::env::temp_dir();

    let Ok(entries) = fs::read_dir(&temp_dir) else {
        tracing::warn!(dir = %temp_dir.display(), "could not read temp directory");
        return 0;
    };

    let now = SystemTime::now();
    let stale: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(TRANSIENT_PREFIX))
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
                && is_stale(path, now)
        })
        .collect();

    let mut removed = 0;
    for path in stale {
        match fs::remove_file(&path) {
            Ok(()) => {
                removed += 1;
                tracing::debug!(path = %path.display(), "removed stale transient recording");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to remove transient recording: {e}");
            }
        }
    }

    if removed > 0 {
        tracing::info!(removed, "swept stale transient recordings");
    }
    removed
}

fn is_stale(path: &std::path::Path, now: SystemTime) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    now.duration_since(modified).is_ok_and(|age| age > STALE_AGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_old(path: &std::path::Path) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();
    }

    #[test]
    fn test_sweep_removes_old_matching_files() {
        let temp_dir = std::env::temp_dir();
        let stale = temp_dir.join(format!("{TRANSIENT_PREFIX}test_stale.wav"));
        fs::write(&stale, b"leftover").unwrap();
        make_old(&stale);

        sweep_transient_files();
        assert!(!stale.exists());
    }

    #[test]
    fn test_sweep_keeps_fresh_files() {
        let temp_dir = std::env::temp_dir();
        let fresh = temp_dir.join(format!("{TRANSIENT_PREFIX}test_fresh.wav"));
        fs::write(&fresh, b"in use").unwrap();

        sweep_transient_files();
        assert!(fresh.exists());

        let _ = fs::remove_file(fresh);
    }

    #[test]
    fn test_sweep_ignores_other_files() {
        let temp_dir = std::env::temp_dir();
        let unrelated = temp_dir.join("scribekey_unrelated.txt");
        let foreign = temp_dir.join("other_app.wav");
        fs::write(&unrelated, b"keep").unwrap();
        fs::write(&foreign, b"keep").unwrap();
        make_old(&unrelated);
        make_old(&foreign);

        sweep_transient_files();
        assert!(unrelated.exists());
        assert!(foreign.exists());

        let _ = fs::remove_file(unrelated);
        let _ = fs::remove_file(foreign);
    }
}
