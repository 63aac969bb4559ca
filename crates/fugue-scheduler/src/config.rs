//! Scheduler configuration

use crate::balancer::DEFAULT_SAFETY_MARGIN;
use crate::error::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};

/// How conflict groups are fitted to the available cores
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStrategy {
    /// Keep the raw conflict groups, no balancing
    Naive,
    /// Threshold-bounded two-pointer merge, then pairwise smallest merges
    #[default]
    TwoPointer,
    /// Pairwise smallest merges only
    SmallestPairs,
}

/// Scheduler configuration
///
/// Meant to be embedded as a section of a node's config file; every field
/// has a default so an empty section is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Balancing strategy
    #[serde(default)]
    pub strategy: GroupStrategy,
    /// Target number of groups, defaults to the available cores
    #[serde(default)]
    pub target_parallelism: Option<usize>,
    /// Extra divisor slack for the two-pointer threshold
    #[serde(default = "default_safety_margin")]
    pub safety_margin: usize,
}

fn default_safety_margin() -> usize {
    DEFAULT_SAFETY_MARGIN
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: GroupStrategy::default(),
            target_parallelism: None,
            safety_margin: default_safety_margin(),
        }
    }
}

impl SchedulerConfig {
    /// Config with a fixed target parallelism
    pub fn with_parallelism(target: usize) -> Self {
        Self {
            target_parallelism: Some(target),
            ..Self::default()
        }
    }

    /// Set the balancing strategy
    pub fn strategy(mut self, strategy: GroupStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Target parallelism, falling back to the machine's available cores
    pub fn effective_parallelism(&self) -> usize {
        self.target_parallelism.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Check the configuration before any planning happens
    pub fn validate(&self) -> SchedulerResult<()> {
        let target = self.effective_parallelism();
        if target == 0 {
            return Err(SchedulerError::InvalidParallelism(target));
        }
        if target.checked_add(self.safety_margin).is_none() {
            return Err(SchedulerError::InvalidConfig(format!(
                "safety margin {} overflows with target parallelism {}",
                self.safety_margin, target
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> SchedulerResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as a TOML document
    pub fn to_toml_string(&self) -> SchedulerResult<String> {
        toml::to_string_pretty(self).map_err(|e| SchedulerError::InvalidConfig(e.to_string()))
    }
}
