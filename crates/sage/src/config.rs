//! Pipeline configuration
//!
//! Loaded from an optional `config/pinsage.{toml,yaml,json}` file and
//! `PINSAGE_`-prefixed environment variables, e.g.:
//!
//! ```bash
//! export PINSAGE_EMBEDDING_DIM=32
//! export PINSAGE_K_VALUES=1,5,10
//! export PINSAGE_SIMULATION__N_USERS=250
//! ```

use crate::evaluation::CrossValidator;
use crate::simulation::SimulationConfig;
use pinsage_core::{load_layered, ConfigError, ConfigLoader};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const CONFIG_FILE: &str = "config/pinsage";
const ENV_PREFIX: &str = "PINSAGE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SageConfig {
    /// Pin feature and board embedding length
    pub embedding_dim: usize,
    /// Seed for clustering and fold splitting
    pub seed: u64,
    /// Weight of the sub-board signal when propagating
    pub alpha: f32,
    pub max_depth: usize,
    /// Row cap when loading a dataset
    pub max_items: usize,
    pub top_k: usize,
    pub k_values: Vec<usize>,
    pub n_folds: usize,
    pub rebuild_per_fold: bool,
    pub min_clusters: usize,
    pub max_clusters: usize,
    pub simulation: SimulationConfig,
    pub dataset_path: Option<PathBuf>,
}

impl Default for SageConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 16,
            seed: 42,
            alpha: 0.6,
            max_depth: 3,
            max_items: crate::dataset::DEFAULT_MAX_ITEMS,
            top_k: 5,
            k_values: vec![1, 3, 5, 10],
            n_folds: 5,
            rebuild_per_fold: false,
            min_clusters: 2,
            max_clusters: 10,
            simulation: SimulationConfig::default(),
            dataset_path: None,
        }
    }
}

impl SageConfig {
    pub fn cross_validator(&self) -> CrossValidator {
        CrossValidator {
            n_folds: self.n_folds,
            seed: self.seed,
            alpha: self.alpha,
            max_depth: self.max_depth,
            rebuild_per_fold: self.rebuild_per_fold,
        }
    }
}

impl ConfigLoader for SageConfig {
    fn load() -> Result<Self, ConfigError> {
        let config: Self = load_layered(CONFIG_FILE, ENV_PREFIX, &["k_values"])?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dim == 0 {
            return Err(ConfigError::invalid(
                "embedding_dim",
                "embedding_dim must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::invalid(
                "alpha",
                format!("alpha must be within [0, 1], got {}", self.alpha),
            ));
        }

        if self.k_values.is_empty() || self.k_values.contains(&0) {
            return Err(ConfigError::invalid(
                "k_values",
                "k_values must be a non-empty list of positive cutoffs",
            ));
        }

        if self.n_folds < 2 {
            return Err(ConfigError::invalid("n_folds", "n_folds must be at least 2"));
        }

        if self.min_clusters < 2 {
            return Err(ConfigError::invalid(
                "min_clusters",
                "min_clusters must be at least 2",
            ));
        }

        if self.min_clusters > self.max_clusters {
            return Err(ConfigError::invalid(
                "min_clusters",
                format!(
                    "min_clusters ({}) cannot exceed max_clusters ({})",
                    self.min_clusters, self.max_clusters
                ),
            ));
        }

        self.simulation
            .validate()
            .map_err(|e| ConfigError::invalid("simulation", e.to_string()))?;

        Ok(())
    }
}
