//! Configuration types for a growth run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::MutationId;

/// Which divergence model runs on each accepted birth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationModel {
    /// Poisson-distributed novel mutations, minted from a global counter
    IndependentAlteration,
    /// Transitions restricted to a user-supplied directed graph
    UserDefinedTransition,
}

/// One allowed transition out of a source mutation id
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionEdge {
    /// Mutation id acquired when the transition fires
    pub target: MutationId,
    /// Per-birth firing probability
    pub probability: f64,
    /// Factor applied to the holder's birth rate
    pub multiplier: f64,
}

/// Directed transition graph keyed by source mutation id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionGraph {
    edges: HashMap<MutationId, Vec<TransitionEdge>>,
}

impl TransitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, source: MutationId, target: MutationId, probability: f64, multiplier: f64) {
        self.edges.entry(source).or_default().push(TransitionEdge {
            target,
            probability,
            multiplier,
        });
    }

    /// Outgoing edges of a mutation id, empty if it has none
    pub fn outgoing(&self, source: MutationId) -> &[TransitionEdge] {
        self.edges.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterator over every (source, edge) pair
    pub fn iter(&self) -> impl Iterator<Item = (MutationId, &TransitionEdge)> + '_ {
        self.edges
            .iter()
            .flat_map(|(source, edges)| edges.iter().map(move |edge| (*source, edge)))
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Growth run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of live cells at which the run terminates
    pub target_population: usize,
    /// Birth rate of the founding clone
    pub wild_type_birth_rate: f64,
    /// Death rate of the founding clone (must not exceed the birth rate)
    pub wild_type_death_rate: f64,
    /// Expected mutations per lineage per birth (Independent-Alteration only)
    pub mutation_rate: f64,
    /// Probability that a fresh mutation is a driver (Independent-Alteration only)
    pub driver_probability: f64,
    /// Birth-rate factor applied by each driver mutation
    pub driver_rate_multiplier: f64,
    /// Emit progress log lines while running
    pub verbose: bool,
    /// Steps between progress reports
    pub progress_interval: u64,
    /// Seed for the run's random number generator
    pub seed: u64,
    /// Divergence model selected for the whole run
    pub mutation_model: MutationModel,
    /// Transition graph, required by the user-defined transition model
    pub transition_graph: Option<TransitionGraph>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target_population: 10_000,
            wild_type_birth_rate: 1.0,
            wild_type_death_rate: 0.1,
            mutation_rate: 0.01,
            driver_probability: 0.001,
            driver_rate_multiplier: 1.05,
            verbose: false,
            progress_interval: 500_000,
            seed: 0,
            mutation_model: MutationModel::IndependentAlteration,
            transition_graph: None,
        }
    }
}

impl SimulationConfig {
    /// Reject invalid parameter combinations before any simulation state exists
    pub fn validate(&self) -> Result<()> {
        if self.target_population < 1 {
            return Err(Error::Configuration(
                "target_population must be at least 1".to_string(),
            ));
        }

        let rates = [
            ("wild_type_birth_rate", self.wild_type_birth_rate),
            ("wild_type_death_rate", self.wild_type_death_rate),
            ("mutation_rate", self.mutation_rate),
            ("driver_rate_multiplier", self.driver_rate_multiplier),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Configuration(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.wild_type_death_rate > self.wild_type_birth_rate {
            return Err(Error::Configuration(format!(
                "wild_type_death_rate {} must not exceed wild_type_birth_rate {}",
                self.wild_type_death_rate, self.wild_type_birth_rate
            )));
        }

        // The event selector needs a strictly positive rate bound
        if self.wild_type_birth_rate + self.wild_type_death_rate == 0.0 {
            return Err(Error::Configuration(
                "wild_type_birth_rate and wild_type_death_rate cannot both be zero".to_string(),
            ));
        }

        if !self.driver_probability.is_finite()
            || self.driver_probability < 0.0
            || self.driver_probability > 1.0
        {
            return Err(Error::Configuration(format!(
                "driver_probability must lie in [0, 1], got {}",
                self.driver_probability
            )));
        }

        if self.progress_interval == 0 {
            return Err(Error::Configuration(
                "progress_interval must be at least 1".to_string(),
            ));
        }

        if self.mutation_model == MutationModel::UserDefinedTransition {
            let graph = self.transition_graph.as_ref().ok_or_else(|| {
                Error::Configuration(
                    "the user-defined transition model requires a transition_graph".to_string(),
                )
            })?;
            for (source, edge) in graph.iter() {
                if !edge.probability.is_finite()
                    || edge.probability < 0.0
                    || edge.probability > 1.0
                {
                    return Err(Error::Configuration(format!(
                        "transition {} -> {} has probability {} outside [0, 1]",
                        source, edge.target, edge.probability
                    )));
                }
                if !edge.multiplier.is_finite() || edge.multiplier < 0.0 {
                    return Err(Error::Configuration(format!(
                        "transition {} -> {} has invalid multiplier {}",
                        source, edge.target, edge.multiplier
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.target_population, 10_000);
        assert_eq!(config.mutation_model, MutationModel::IndependentAlteration);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = SimulationConfig::default();
        let mut graph = TransitionGraph::new();
        graph.add_edge(MutationId(0), MutationId(1), 0.5, 2.0);
        config.mutation_model = MutationModel::UserDefinedTransition;
        config.transition_graph = Some(graph);

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.mutation_model, MutationModel::UserDefinedTransition);
        assert_eq!(
            deserialized
                .transition_graph
                .unwrap()
                .outgoing(MutationId(0))[0]
                .target,
            MutationId(1)
        );
    }

    #[test]
    fn test_rejects_zero_target() {
        let config = SimulationConfig {
            target_population: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_death_rate_above_birth_rate() {
        let config = SimulationConfig {
            wild_type_birth_rate: 0.5,
            wild_type_death_rate: 0.6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_and_non_finite_rates() {
        let negative = SimulationConfig {
            mutation_rate: -0.1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let nan = SimulationConfig {
            wild_type_birth_rate: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let negative_multiplier = SimulationConfig {
            driver_rate_multiplier: -1.0,
            ..Default::default()
        };
        assert!(negative_multiplier.validate().is_err());
    }

    #[test]
    fn test_rejects_all_zero_wild_type_rates() {
        let config = SimulationConfig {
            wild_type_birth_rate: 0.0,
            wild_type_death_rate: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_driver_probability_outside_unit_interval() {
        let config = SimulationConfig {
            driver_probability: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_progress_interval() {
        let config = SimulationConfig {
            progress_interval: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_transition_model_without_graph() {
        let config = SimulationConfig {
            mutation_model: MutationModel::UserDefinedTransition,
            transition_graph: None,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_transition_edges() {
        let mut graph = TransitionGraph::new();
        graph.add_edge(MutationId(0), MutationId(1), 1.7, 1.0);
        let config = SimulationConfig {
            mutation_model: MutationModel::UserDefinedTransition,
            transition_graph: Some(graph),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut graph = TransitionGraph::new();
        graph.add_edge(MutationId(0), MutationId(1), 0.5, -2.0);
        let config = SimulationConfig {
            mutation_model: MutationModel::UserDefinedTransition,
            transition_graph: Some(graph),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
