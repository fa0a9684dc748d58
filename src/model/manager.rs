use anyhow::anyhow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{self, Config};
use crate::error::ModelError;
use crate::model::catalog::{self, Precision, TierInfo};
use crate::model::download;
use crate::stats::PerfStats;
use crate::system::{self, SystemProfile};
use crate::transcription::TranscriptionEngine;

/// Unload the resident model after this much inactivity
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Memory utilization above which `ensure_ready_for` forces a reload
const MEMORY_RELOAD_THRESHOLD: f64 = 0.85;

/// Bounded post-download verification polling
const VERIFY_ATTEMPTS: u32 = 5;
const VERIFY_DELAY: Duration = Duration::from_secs(1);

/// Compute settings the engine is loaded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSettings {
    pub cpu_threads: usize,
    pub num_workers: usize,
    pub precision: Precision,
}

/// The resident engine plus its usage bookkeeping
struct ResidentModel {
    engine: Arc<TranscriptionEngine>,
    settings: ModelSettings,
    last_used: Instant,
}

struct ManagerState {
    current_tier: Option<&'static TierInfo>,
    resident: Option<ResidentModel>,
    stats: PerfStats,
}

/// Owns the single resident inference model and decides when to load,
/// reload, and unload it.
///
/// All load/unload/acquire paths go through one internal lock: reload
/// decisions read settings and then conditionally swap the model, which
/// must not interleave between callers.
pub struct ModelManager {
    cache_dir: PathBuf,
    config_path: PathBuf,
    profile: SystemProfile,
    state: Mutex<ManagerState>,
}

impl ModelManager {
    /// Create a manager using the default application directories.
    ///
    /// # Errors
    /// Returns error if the home directory cannot be resolved or the config
    /// file is unreadable.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_dirs(
            config::models_dir()?,
            Config::default_path()?,
            SystemProfile::detect(),
        )
    }

    /// Create a manager rooted at explicit directories.
    ///
    /// # Errors
    /// Returns error if the persisted config exists but cannot be parsed.
    pub fn with_dirs(
        cache_dir: PathBuf,
        config_path: PathBuf,
        profile: SystemProfile,
    ) -> anyhow::Result<Self> {
        let persisted = Config::load_from(&config_path)?;
        let current_tier = persisted.current_model.as_deref().and_then(catalog::find);

        debug!(
            tier = current_tier.map(|t| t.name),
            cache = %cache_dir.display(),
            "model manager initialized"
        );

        Ok(Self {
            cache_dir,
            config_path,
            profile,
            state: Mutex::new(ManagerState {
                current_tier,
                resident: None,
                stats: PerfStats::new(),
            }),
        })
    }

    /// Currently selected tier name, if any
    pub fn current_tier(&self) -> Option<&'static str> {
        self.lock_state().current_tier.map(|t| t.name)
    }

    /// Whether a model is resident right now
    pub fn is_loaded(&self) -> bool {
        self.lock_state().resident.is_some()
    }

    /// Path to the weights file for `name`, if its files are in the cache.
    ///
    /// A tier is present when any snapshot directory beneath it contains a
    /// `model.bin`.
    pub fn locate_model(&self, name: &str) -> Option<PathBuf> {
        locate_in(&self.cache_dir, name)
    }

    /// Select `name` as the active tier and persist the choice.
    ///
    /// # Errors
    /// `InvalidTier` for unknown names; `ModelNotFound` if the tier's files
    /// are not in the cache. The persisted configuration is only written on
    /// success.
    pub fn select_tier(&self, name: &str) -> Result<(), ModelError> {
        let tier =
            catalog::find(name).ok_or_else(|| ModelError::InvalidTier(name.to_owned()))?;

        if self.locate_model(name).is_none() {
            return Err(ModelError::ModelNotFound(name.to_owned()));
        }

        self.lock_state().current_tier = Some(tier);

        let config = Config {
            current_model: Some(tier.name.to_owned()),
        };
        if let Err(e) = config.save_to(&self.config_path) {
            warn!("failed to persist model selection: {e:#}");
        }

        info!(tier = tier.name, "switched active model tier");
        Ok(())
    }

    /// Download `name` into the cache and verify it landed.
    ///
    /// Verification polls the cache (bounded, once per second) because the
    /// filesystem can lag the final rename on some volumes.
    ///
    /// # Errors
    /// `InvalidTier` for unknown names; `DownloadFailed` if the fetch fails
    /// or the files never verify as present.
    pub fn download_tier(
        &self,
        name: &str,
        on_progress: impl FnMut(f64),
    ) -> Result<(), ModelError> {
        let tier =
            catalog::find(name).ok_or_else(|| ModelError::InvalidTier(name.to_owned()))?;

        let tier_dir = self.cache_dir.join(tier.name);
        download::fetch_weights(tier, &tier_dir, on_progress)
            .map_err(|e| ModelError::DownloadFailed(format!("{e:#}")))?;

        for attempt in 0..VERIFY_ATTEMPTS {
            if self.locate_model(name).is_some() {
                info!(tier = name, "model downloaded and verified");
                return Ok(());
            }
            debug!(tier = name, attempt, "model not yet visible, waiting");
            std::thread::sleep(VERIFY_DELAY);
        }

        Err(ModelError::DownloadFailed(
            "model not found after download".to_owned(),
        ))
    }

    /// Compare the tier's required bytes (with safety margin) against free
    /// space on the cache volume. No side effects.
    ///
    /// # Errors
    /// `InvalidTier` for unknown names.
    pub fn check_disk_space(&self, name: &str) -> Result<(bool, String), ModelError> {
        let tier =
            catalog::find(name).ok_or_else(|| ModelError::InvalidTier(name.to_owned()))?;

        let required = tier.required_bytes();
        let Some(free) = system::free_disk_space(&self.cache_dir) else {
            return Ok((false, "could not determine free disk space".to_owned()));
        };

        if free >= required {
            Ok((
                true,
                format!("Sufficient disk space available ({} MB free)", free / (1024 * 1024)),
            ))
        } else {
            Ok((
                false,
                format!(
                    "Insufficient disk space. Need {} MB, but only {} MB available",
                    required / (1024 * 1024),
                    free / (1024 * 1024)
                ),
            ))
        }
    }

    /// Return the resident engine, loading it first if necessary.
    ///
    /// Repeated calls without an intervening unload return the same engine
    /// instance.
    ///
    /// # Errors
    /// `NoTierSelected` if no tier is active; `ModelNotFound` / `LoadFailed`
    /// if loading is required and fails.
    pub fn acquire(&self) -> Result<Arc<TranscriptionEngine>, ModelError> {
        let mut state = self.lock_state();

        if state.resident.is_none() {
            let settings = self.settings_for_locked(&state, 0.0);
            Self::load_locked(&mut state, &self.cache_dir, settings)?;
        }

        // Resident is guaranteed by the branch above
        let resident = state
            .resident
            .as_mut()
            .ok_or_else(|| ModelError::LoadFailed {
                tier: "unknown".to_owned(),
                source: anyhow!("model vanished during acquire"),
            })?;
        resident.last_used = Instant::now();
        Ok(Arc::clone(&resident.engine))
    }

    /// Make sure the resident model matches the settings this audio length
    /// calls for, reloading if they differ or memory pressure is high.
    ///
    /// # Errors
    /// Same failure modes as [`Self::acquire`].
    pub fn ensure_ready_for(&self, audio_secs: f64) -> Result<(), ModelError> {
        let mut state = self.lock_state();

        let desired = self.settings_for_locked(&state, audio_secs);

        if state.resident.is_none() {
            info!("loading model for first use");
            return Self::load_locked(&mut state, &self.cache_dir, desired);
        }

        let memory = system::memory_utilization();
        let current = state
            .resident
            .as_ref()
            .map(|r| r.settings)
            .unwrap_or(desired);

        if current != desired || memory > MEMORY_RELOAD_THRESHOLD {
            info!(
                ?current,
                ?desired,
                memory_pct = memory * 100.0,
                "reloading model with audio-optimized settings"
            );
            Self::unload_locked(&mut state);
            Self::load_locked(&mut state, &self.cache_dir, desired)?;
        }

        Ok(())
    }

    /// Unload the resident model if it has been idle past the timeout.
    /// Called after each completed transcription.
    pub fn release_idle_if_expired(&self) {
        let mut state = self.lock_state();
        let expired = state
            .resident
            .as_ref()
            .is_some_and(|r| r.last_used.elapsed() > IDLE_TIMEOUT);
        if expired {
            debug!("model idle timeout reached");
            Self::unload_locked(&mut state);
        }
    }

    /// Unconditionally release the resident model. Never fails; cleanup
    /// errors are logged and swallowed since this runs on shutdown paths.
    pub fn unload(&self) {
        let mut state = self.lock_state();
        Self::unload_locked(&mut state);
    }

    /// Resolve compute settings for the current tier and audio length using
    /// live memory and capability probes.
    fn settings_for_locked(&self, state: &ManagerState, audio_secs: f64) -> ModelSettings {
        let Some(tier) = state.current_tier else {
            // No tier yet: conservative defaults; load will fail with
            // NoTierSelected before these are used.
            return ModelSettings {
                cpu_threads: 1,
                num_workers: 1,
                precision: Precision::CHEAPEST,
            };
        };
        resolve_settings(
            tier,
            system::memory_utilization(),
            audio_secs,
            &self.profile,
            probe_precision_capability(&self.profile),
        )
    }

    fn load_locked(
        state: &mut ManagerState,
        cache_dir: &Path,
        settings: ModelSettings,
    ) -> Result<(), ModelError> {
        let tier = state.current_tier.ok_or(ModelError::NoTierSelected)?;

        let weights = locate_in(cache_dir, tier.name)
            .ok_or_else(|| ModelError::ModelNotFound(tier.name.to_owned()))?;

        info!(tier = tier.name, ?settings, "loading model");
        let engine = state
            .stats
            .measure("model_load", || TranscriptionEngine::load(&weights, settings))
            .map_err(|e| ModelError::LoadFailed {
                tier: tier.name.to_owned(),
                source: e.into(),
            })?;

        state.resident = Some(ResidentModel {
            engine: Arc::new(engine),
            settings,
            last_used: Instant::now(),
        });
        Ok(())
    }

    fn unload_locked(state: &mut ManagerState) {
        if let Some(resident) = state.resident.take() {
            info!("unloading model from memory");
            if Arc::strong_count(&resident.engine) > 1 {
                // A worker still holds the engine; memory is reclaimed when
                // its clone drops.
                warn!("model still referenced by an in-flight transcription");
            }
            drop(resident);
            info!("model unloaded");
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ManagerState> {
        // A poisoned lock means a panic mid-load; the state itself is still
        // coherent enough to continue (worst case: a stale resident handle).
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn locate_in(cache_dir: &Path, name: &str) -> Option<PathBuf> {
    let snapshots = cache_dir.join(name).join("snapshots");
    let entries = std::fs::read_dir(&snapshots).ok()?;
    for entry in entries.filter_map(Result::ok) {
        let weights = entry.path().join("model.bin");
        if weights.is_file() {
            return Some(weights);
        }
    }
    None
}

/// Deterministic settings decision. Pure function of its inputs.
///
/// 1. Start from the tier's catalog defaults.
/// 2. Memory utilization above the tier threshold: drop a thread (floor 3)
///    and force the cheapest precision.
/// 3. Audio over a minute: cheapest precision, thread cap 4.
/// 4. Otherwise, clips under 10s on machines with at least 8 GB get the
///    higher-precision mode when the CPU supports it.
#[must_use]
pub fn resolve_settings(
    tier: &TierInfo,
    memory_utilization: f64,
    audio_secs: f64,
    profile: &SystemProfile,
    capability: Precision,
) -> ModelSettings {
    let defaults = tier.defaults;
    let mut settings = ModelSettings {
        cpu_threads: defaults.cpu_threads,
        num_workers: defaults.num_workers,
        precision: defaults.precision,
    };

    if memory_utilization > defaults.memory_threshold() {
        if settings.cpu_threads > 3 {
            settings.cpu_threads -= 1;
        }
        settings.precision = Precision::CHEAPEST;
    }

    if audio_secs > 60.0 {
        settings.precision = Precision::CHEAPEST;
        settings.cpu_threads = settings.cpu_threads.min(4);
    } else if audio_secs < 10.0 && profile.memory_gb >= 8.0 {
        settings.precision = Precision::Float16;
    }

    // Capability caps everything: a CPU without float16 falls back
    if capability == Precision::Int8 {
        settings.precision = Precision::Int8;
    }

    settings
}

/// Probe which precision modes this CPU supports. The probe runs once per
/// process and is cached.
pub fn probe_precision_capability(profile: &SystemProfile) -> Precision {
    static CAPABILITY: OnceLock<Precision> = OnceLock::new();
    *CAPABILITY.get_or_init(|| {
        if profile.is_apple_silicon {
            info!("Apple Silicon detected, using int8 compute");
            Precision::Int8
        } else {
            info!("float16 compute supported");
            Precision::Float16
        }
    })
}
