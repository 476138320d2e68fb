/// Engine configuration
///
/// Controls the parallelism policy shared by every operator:
/// - `worker_count`: fixed number of workers per operator phase
/// - `small_input_threshold`: inputs below worker_count * threshold run single-threaded
/// - `hash_reserve_factor`: initial join hash-table capacity = build size * factor
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker threads per operator phase
    pub worker_count: usize,

    /// Small-input short-circuit constant (k)
    pub small_input_threshold: usize,

    /// Join hash-table over-reservation factor
    pub hash_reserve_factor: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            small_input_threshold: 1,
            hash_reserve_factor: 2,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with a custom worker count
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::io_with_path(e.to_string(), path.display().to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            EngineError::io_with_path(
                format!("malformed config: {e}"),
                path.display().to_string(),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> EngineResult<()> {
        if self.worker_count == 0 {
            return Err(EngineError::planning("worker_count must be positive"));
        }
        if self.small_input_threshold == 0 {
            return Err(EngineError::planning("small_input_threshold must be positive"));
        }
        if self.hash_reserve_factor < 2 {
            return Err(EngineError::planning("hash_reserve_factor must be at least 2"));
        }
        Ok(())
    }

    /// Worker count for an input of `rows` rows, applying the
    /// small-input short-circuit
    pub fn workers_for(&self, rows: usize) -> usize {
        if rows < self.worker_count * self.small_input_threshold {
            1
        } else {
            self.worker_count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_count > 0);
        assert_eq!(config.hash_reserve_factor, 2);
    }

    #[test]
    fn rejects_zero_workers() {
        let config = EngineConfig {
            worker_count: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_small_reserve_factor() {
        let config = EngineConfig {
            hash_reserve_factor: 1,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn small_inputs_run_single_threaded() {
        let config = EngineConfig {
            worker_count: 8,
            small_input_threshold: 4,
            ..EngineConfig::default()
        };
        assert_eq!(config.workers_for(0), 1);
        assert_eq!(config.workers_for(31), 1);
        assert_eq!(config.workers_for(32), 8);
        assert_eq!(config.workers_for(1_000_000), 8);
    }

    #[test]
    fn json_round_trip() {
        let config = EngineConfig {
            worker_count: 6,
            small_input_threshold: 2,
            hash_reserve_factor: 3,
        };
        let text = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.worker_count, 6);
        assert_eq!(parsed.small_input_threshold, 2);
        assert_eq!(parsed.hash_reserve_factor, 3);
    }
}
