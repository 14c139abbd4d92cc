//! Tunable parameters of the extraction and augmentation
//!
//! The configuration is read from a TOML file.
//! All fields are optional and fall back to the values in [`constants`](crate::constants).
//!
//! ```toml
//! [dataset]
//! items = 100
//! offsets = 10
//!
//! [quality]
//! p_switch = 0.1
//!
//! [generator]
//! duplicates = 4
//! ```

use crate::{constants::*, utils::Probability};
use failure::{Error, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub extractor: ExtractorConfig,
    pub quality: QualityConfig,
    pub generator: GeneratorConfig,
    pub params: ParamsConfig,
}

impl Config {
    pub fn try_load_config(path: &Path) -> Result<Self, Error> {
        let s = misc_utils::fs::read_to_string(path)
            .with_context(|_| format!("Could not read config file '{}'", path.display()))?;
        Ok(toml::from_str(&s)
            .with_context(|_| format!("Invalid config file '{}'", path.display()))?)
    }

    pub fn to_toml(&self) -> Result<String, Error> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Dimensions of the dataset, i.e., which traces exist
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    /// Number of monitored items (videos)
    pub items: u32,
    /// Number of offsets per item
    pub offsets: u32,
    /// Samples per (item, offset) used for parameter extraction
    pub extract_samples: u32,
    /// Samples per (item, offset) which get augmented
    pub augment_samples: u32,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            items: 100,
            offsets: 10,
            extract_samples: 1,
            augment_samples: 10,
        }
    }
}

/// Segment detection in real traces
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    pub marker_min_size: u32,
    pub marker_max_size: u32,
    /// Minimal time between two segment requests
    pub marker_min_gap: i64,
    pub merge_target_base: i64,
    pub merge_target_per_offset: i64,
}

impl ExtractorConfig {
    /// Returns `true` if a client packet of this size is a segment request
    pub fn is_marker_size(&self, size: u32) -> bool {
        self.marker_min_size <= size && size <= self.marker_max_size
    }

    /// Expected number of segments in a trace with the given offset
    ///
    /// Never smaller than one.
    pub fn merge_target(&self, offset: u32) -> usize {
        let target = self.merge_target_base - i64::from(offset) * self.merge_target_per_offset;
        target.max(1) as usize
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            marker_min_size: MARKER_MIN_SIZE,
            marker_max_size: MARKER_MAX_SIZE,
            marker_min_gap: MARKER_MIN_GAP,
            merge_target_base: MERGE_TARGET_BASE,
            merge_target_per_offset: MERGE_TARGET_PER_OFFSET,
        }
    }
}

/// Transition probabilities of the [`QualityModel`](crate::QualityModel)
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Chance of attempting a switch at each segment
    pub p_switch: Probability,
    /// LOW -> HIGH, otherwise LOW -> MEDIUM
    pub p1: Probability,
    /// MEDIUM -> HIGH, otherwise MEDIUM -> LOW
    pub p2: Probability,
    /// HIGH -> MEDIUM, otherwise HIGH -> LOW
    pub p4: Probability,
}

impl Default for QualityConfig {
    fn default() -> Self {
        let prob = |p| Probability::new(p).expect("Default probabilities are in range");
        Self {
            p_switch: prob(SWITCH_PROBABILITY),
            p1: prob(QUALITY_PARAM_LOW),
            p2: prob(QUALITY_PARAM_MEDIUM),
            p4: prob(QUALITY_PARAM_HIGH),
        }
    }
}

/// Synthesis of new traces
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Number of synthetic traces per real trace
    pub duplicates: u32,
    pub bucket_width: i64,
    pub packet_size: u32,
    pub packet_overhead: u32,
    pub max_trace_duration: i64,
    /// Base seed for all random decisions
    pub seed: u64,
}

impl GeneratorConfig {
    /// Maximal payload of a single packet
    ///
    /// At least one byte, even for nonsensical packet sizes.
    pub fn mtu_payload(&self) -> u32 {
        self.packet_size.saturating_sub(self.packet_overhead).max(1)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            duplicates: 1,
            bucket_width: BUCKET_WIDTH,
            packet_size: PACKET_SIZE,
            packet_overhead: PACKET_OVERHEAD,
            max_trace_duration: MAX_TRACE_DURATION,
            seed: 0,
        }
    }
}

/// Location of the distribution files
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParamsConfig {
    pub dir: PathBuf,
}

impl ParamsConfig {
    pub fn durations_path(&self) -> PathBuf {
        self.dir.join(SEGMENT_DURATION_FILE)
    }

    pub fn ipts_path(&self) -> PathBuf {
        self.dir.join(INTER_ARRIVAL_FILE)
    }
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}
