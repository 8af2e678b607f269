//! Synthetic implicit-feedback users

use crate::error::{Result, SageError};
use crate::graph::{Graph, PIN_PREFIX};
use crate::types::Interaction;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_users: usize,
    /// Inclusive lower bound on interactions per user
    pub min_per_user: usize,
    /// Exclusive upper bound on interactions per user
    pub max_per_user: usize,
    pub rating_min: f32,
    pub rating_max: f32,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_users: 100,
            min_per_user: 5,
            max_per_user: 20,
            rating_min: 3.0,
            rating_max: 5.0,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_per_user >= self.max_per_user {
            return Err(SageError::invalid(
                "min_per_user",
                format!(
                    "must be below max_per_user ({} >= {})",
                    self.min_per_user, self.max_per_user
                ),
            ));
        }
        if self.rating_min.partial_cmp(&self.rating_max) != Some(Ordering::Less) {
            return Err(SageError::invalid(
                "rating_min",
                format!(
                    "must be below rating_max ({} >= {})",
                    self.rating_min, self.rating_max
                ),
            ));
        }
        Ok(())
    }
}

/// Draw distinct pins for users `1..=n_users`
///
/// Each user gets `n` pins with `n` uniform in `[min_per_user, max_per_user)`,
/// capped at the number of pins, sampled without replacement. Pin ids are
/// returned as raw product keys.
pub fn simulate_interactions(graph: &Graph, config: &SimulationConfig) -> Result<Vec<Interaction>> {
    config.validate()?;

    let keys: Vec<&str> = graph
        .pins()
        .map(|pin| pin.id.strip_prefix(PIN_PREFIX).unwrap_or(&pin.id))
        .collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut interactions = Vec::new();
    if keys.is_empty() {
        return Ok(interactions);
    }

    for user in 1..=config.n_users {
        let n = rng
            .gen_range(config.min_per_user..config.max_per_user)
            .min(keys.len());
        for pick in index::sample(&mut rng, keys.len(), n) {
            let rating = rng.gen_range(config.rating_min..config.rating_max);
            interactions.push(Interaction::new(user.to_string(), keys[pick], rating));
        }
    }

    info!(
        interactions = interactions.len(),
        users = config.n_users,
        "Created simulated user-pin interactions"
    );
    Ok(interactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::{HashMap, HashSet};

    fn graph_with_pins(n: usize) -> Graph {
        let mut graph = Graph::new(1);
        for i in 0..n {
            graph.add_pin(format!("pin_{}", i), array![i as f32]).unwrap();
        }
        graph
    }

    #[test]
    fn test_counts_and_ranges() {
        let graph = graph_with_pins(50);
        let config = SimulationConfig {
            n_users: 10,
            ..SimulationConfig::default()
        };
        let interactions = simulate_interactions(&graph, &config).unwrap();

        let mut per_user: HashMap<&str, HashSet<&str>> = HashMap::new();
        for interaction in &interactions {
            assert!(interaction.rating >= 3.0 && interaction.rating < 5.0);
            assert!(graph.resolve_pin(&interaction.pin_id).is_some());
            assert!(per_user
                .entry(interaction.user_id.as_str())
                .or_default()
                .insert(interaction.pin_id.as_str()));
        }

        assert_eq!(per_user.len(), 10);
        assert!(per_user.values().all(|pins| (5..20).contains(&pins.len())));
    }

    #[test]
    fn test_caps_at_pin_count() {
        let graph = graph_with_pins(3);
        let interactions = simulate_interactions(&graph, &SimulationConfig::default()).unwrap();
        assert_eq!(interactions.len(), 300);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let graph = graph_with_pins(30);
        let config = SimulationConfig::default();
        assert_eq!(
            simulate_interactions(&graph, &config).unwrap(),
            simulate_interactions(&graph, &config).unwrap()
        );
    }

    #[test]
    fn test_rejects_empty_range() {
        let graph = graph_with_pins(3);
        let config = SimulationConfig {
            min_per_user: 5,
            max_per_user: 5,
            ..SimulationConfig::default()
        };
        assert!(simulate_interactions(&graph, &config).is_err());
    }

    #[test]
    fn test_no_pins_no_interactions() {
        let graph = Graph::new(1);
        assert!(simulate_interactions(&graph, &SimulationConfig::default())
            .unwrap()
            .is_empty());
    }
}
