use std::path::Path;
use sysinfo::{Disks, System};
use tracing::{debug, warn};

/// Static capabilities of the host machine, probed once at startup.
#[derive(Debug, Clone)]
pub struct SystemProfile {
    /// CPU cores available for inference threads
    pub cpu_cores: usize,
    /// Total system memory in whole gigabytes
    pub memory_gb: f64,
    /// Apple Silicon (and other non-x86) hosts only support int8 inference
    pub is_apple_silicon: bool,
}

impl SystemProfile {
    /// Probe the host. Falls back to conservative defaults if detection fails.
    #[must_use]
    pub fn detect() -> Self {
        let cpu_cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(2);

        let mut sys = System::new();
        sys.refresh_memory();
        let total = sys.total_memory();
        let memory_gb = if total == 0 {
            warn!("memory detection failed, assuming 8 GB");
            8.0
        } else {
            total as f64 / (1024.0 * 1024.0 * 1024.0)
        };

        let is_apple_silicon = cfg!(all(target_os = "macos", target_arch = "aarch64"));

        let profile = Self {
            cpu_cores,
            memory_gb,
            is_apple_silicon,
        };
        debug!(?profile, "system capabilities detected");
        profile
    }
}

/// Current memory utilization as a fraction in `[0.0, 1.0]`.
///
/// Returns 0.0 if the probe fails, which biases settings decisions toward
/// the tier defaults rather than the degraded path.
#[must_use]
pub fn memory_utilization() -> f64 {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        warn!("memory utilization probe failed");
        return 0.0;
    }
    let used = sys.used_memory();
    let utilization = used as f64 / total as f64;
    debug!(utilization_pct = utilization * 100.0, "memory status");
    utilization
}

/// Free bytes on the volume holding `path`.
///
/// Picks the mounted disk whose mount point is the longest prefix of
/// `path`. `None` if no disk matches (e.g. the path does not exist yet and
/// no mount point prefixes it).
#[must_use]
pub fn free_disk_space(path: &Path) -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(sysinfo::Disk::available_space)
}
