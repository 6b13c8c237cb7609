//! Scheduler configuration and parallelism policies

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-group worker cap used when nothing else is configured
pub const DEFAULT_MAX_PARALLEL: usize = 3;

/// Decides how many workers may serve one group concurrently.
///
/// The cap is looked up once per group when the scheduler is built. Rate
/// limiting can lower a group's cap afterwards but never raise it.
pub trait ParallelismPolicy: Send + Sync {
    fn max_parallel(&self, grouping_criterion: &str) -> usize;
}

/// Same cap for every grouping criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedParallelism(pub usize);

impl Default for FixedParallelism {
    fn default() -> Self {
        Self(DEFAULT_MAX_PARALLEL)
    }
}

impl ParallelismPolicy for FixedParallelism {
    fn max_parallel(&self, _grouping_criterion: &str) -> usize {
        self.0.max(1)
    }
}

/// Scheduler configuration
///
/// Doubles as a [`ParallelismPolicy`]: `max-parallel` applies to every group
/// unless `overrides` names its grouping criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Default max concurrent workers per group
    #[serde(rename = "max-parallel", default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Per grouping criterion caps
    #[serde(default)]
    pub overrides: BTreeMap<String, usize>,
}

fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            overrides: BTreeMap::new(),
        }
    }
}

impl ParallelismPolicy for SchedulerConfig {
    fn max_parallel(&self, grouping_criterion: &str) -> usize {
        self.overrides
            .get(grouping_criterion)
            .copied()
            .unwrap_or(self.max_parallel)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_parallel, 3);
        assert!(config.overrides.is_empty());
        assert_eq!(config.max_parallel("yahoo"), 3);
    }

    #[test]
    fn test_overrides() {
        let config = SchedulerConfig {
            overrides: BTreeMap::from([("coingecko".to_string(), 1)]),
            ..Default::default()
        };
        assert_eq!(config.max_parallel("coingecko"), 1);
        assert_eq!(config.max_parallel("yahoo"), 3);
    }

    #[test]
    fn test_zero_cap_is_clamped() {
        assert_eq!(FixedParallelism(0).max_parallel("any"), 1);
        let config = SchedulerConfig {
            max_parallel: 0,
            ..Default::default()
        };
        assert_eq!(config.max_parallel("any"), 1);
    }

    #[test]
    fn test_deserialize() {
        let yaml = "max-parallel: 5\noverrides:\n  alphavantage: 2\n";
        let config: SchedulerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_parallel("alphavantage"), 2);
        assert_eq!(config.max_parallel("yahoo"), 5);

        let config: SchedulerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }
}
