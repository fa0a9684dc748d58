//! Fixed catalog of the five supported model tiers.
//!
//! Tier metadata is immutable at runtime. Each tier carries default compute
//! settings that [`crate::model::ModelManager`] adapts to live memory
//! pressure and audio length.

/// Numeric precision used by the inference engine, ordered by cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Lowest-cost quantized mode, supported everywhere
    Int8,
    /// Half-precision floats, better accuracy where the CPU supports it
    Float16,
}

impl Precision {
    /// Lowest-cost mode, used as the degraded fallback
    pub const CHEAPEST: Self = Self::Int8;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Float16 => "float16",
        }
    }
}

/// Default compute settings for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDefaults {
    pub cpu_threads: usize,
    pub num_workers: usize,
    pub precision: Precision,
    /// Memory utilization fraction above which settings are degraded
    pub memory_threshold_pct: u8,
}

impl TierDefaults {
    #[must_use]
    pub fn memory_threshold(&self) -> f64 {
        f64::from(self.memory_threshold_pct) / 100.0
    }
}

/// Immutable metadata for one model tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierInfo {
    pub name: &'static str,
    pub size_mb: u64,
    pub speed: &'static str,
    pub accuracy: &'static str,
    pub description: &'static str,
    pub defaults: TierDefaults,
}

impl TierInfo {
    /// Required cache bytes including the 20% safety margin
    #[must_use]
    pub fn required_bytes(&self) -> u64 {
        let raw = self.size_mb * 1024 * 1024;
        raw + raw / 5
    }

    /// Filename of the ggml weights for this tier
    #[must_use]
    pub fn weights_filename(&self) -> String {
        format!("ggml-{}.bin", self.name)
    }
}

/// The five supported tiers, smallest to largest
pub static TIERS: [TierInfo; 5] = [
    TierInfo {
        name: "tiny",
        size_mb: 150,
        speed: "Fastest",
        accuracy: "Basic",
        description: "Best for quick tests and weak hardware",
        defaults: TierDefaults {
            cpu_threads: 3,
            num_workers: 1,
            precision: Precision::Int8,
            memory_threshold_pct: 60,
        },
    },
    TierInfo {
        name: "base",
        size_mb: 400,
        speed: "Very Fast",
        accuracy: "Good",
        description: "Good balance for basic transcription",
        defaults: TierDefaults {
            cpu_threads: 4,
            num_workers: 1,
            precision: Precision::Int8,
            memory_threshold_pct: 60,
        },
    },
    TierInfo {
        name: "small",
        size_mb: 900,
        speed: "Fast",
        accuracy: "Better",
        description: "Recommended for most users",
        defaults: TierDefaults {
            cpu_threads: 4,
            num_workers: 1,
            precision: Precision::Int8,
            memory_threshold_pct: 60,
        },
    },
    TierInfo {
        name: "medium",
        size_mb: 3000,
        speed: "Moderate",
        accuracy: "Very Good",
        description: "Best quality for common hardware",
        defaults: TierDefaults {
            cpu_threads: 6,
            num_workers: 1,
            precision: Precision::Int8,
            memory_threshold_pct: 75,
        },
    },
    TierInfo {
        name: "large",
        size_mb: 6000,
        speed: "Slow",
        accuracy: "Best",
        description: "Highest quality, requires powerful hardware",
        defaults: TierDefaults {
            cpu_threads: 4,
            num_workers: 1,
            precision: Precision::Int8,
            memory_threshold_pct: 80,
        },
    },
];

/// Look up a tier by name
#[must_use]
pub fn find(name: &str) -> Option<&'static TierInfo> {
    TIERS.iter().find(|tier| tier.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_five_tiers() {
        assert_eq!(TIERS.len(), 5);
    }

    #[test]
    fn test_find_known_tiers() {
        for name in ["tiny", "base", "small", "medium", "large"] {
            let tier = find(name).unwrap();
            assert_eq!(tier.name, name);
        }
    }

    #[test]
    fn test_find_unknown_tier() {
        assert!(find("enormous").is_none());
        assert!(find("").is_none());
    }

    #[test]
    fn test_required_bytes_includes_margin() {
        let tiny = find("tiny").unwrap();
        // 150 MB * 1.2 = 180 MB
        assert_eq!(tiny.required_bytes(), 180 * 1024 * 1024);
    }

    #[test]
    fn test_weights_filename() {
        assert_eq!(find("small").unwrap().weights_filename(), "ggml-small.bin");
    }

    #[test]
    fn test_tiers_ordered_by_size() {
        for pair in TIERS.windows(2) {
            assert!(pair[0].size_mb < pair[1].size_mb);
        }
    }

    #[test]
    fn test_memory_threshold_fraction() {
        let medium = find("medium").unwrap();
        assert!((medium.defaults.memory_threshold() - 0.75).abs() < f64::EPSILON);
    }
}
