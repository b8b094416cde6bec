//! # Critter NEAT
//!
//! Evolvable feedforward controllers for simulated agents: a validated
//! genome of sensor, actuator, hidden and bias neurons, a compiled phenome
//! evaluated once per tick, and NEAT-style mutation and crossover that never
//! produce an illegal graph.
//!
//! ## Features
//!
//! - **Validated Genomes**: Every edit goes through the Graph Validator and is
//!   all-or-nothing; the structural graph is always a DAG
//! - **Arena-Graph Model**: Cache-friendly `SlotMap` storage for neurons and connections
//! - **Deterministic Compilation**: Kahn ordering with `NeuronId` tie-break and
//!   CSR incoming edges, so equal genomes evaluate bit-identically
//! - **Parallel Ticks**: `ControllerRuntime::tick` evaluates every agent with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use critter_neat::{squash, Connection, Genome, Neuron, NeuronId, Phenome};
//!
//! let s1 = NeuronId(1);
//! let a1 = NeuronId(10);
//! let b1 = NeuronId(30);
//! let genome = Genome::from_parts(
//!     vec![
//!         Neuron::sensor(s1, "food-distance"),
//!         Neuron::actuator(a1, "turn"),
//!         Neuron::bias(b1),
//!     ],
//!     vec![Connection::new(s1, a1, 1.0), Connection::new(b1, a1, 0.5)],
//! )
//! .unwrap();
//!
//! let phenome = Phenome::compile(&genome).unwrap();
//! let out = phenome.evaluate(&HashMap::from([(s1, 1.0)]));
//! assert_eq!(out[&a1], squash(1.5));
//! ```
//!
//! ## Architecture
//!
//! ### Legality
//!
//! A connection is legal when it is not a self-loop, does not duplicate an
//! existing pair in either direction, does not join two sensors or two
//! actuators, does not feed a sensor or bias, does not leave an actuator, and
//! does not close a directed cycle. Disabled connections count for both
//! uniqueness and acyclicity, so toggling a flag can never break a genome.
//!
//! ### Homologous Splits
//!
//! Splitting `a -> b` names the new hidden neuron by hashing the edge, so
//! the same split in two genomes yields the same `NeuronId` and crossover
//! aligns them.

pub mod activation;
pub mod config;
pub mod crossover;
pub mod error;
pub mod gene;
pub mod genome;
pub mod innovation;
pub mod mutation;
pub mod payload;
pub mod phenome;
pub mod runtime;
pub mod topology;
pub mod validator;

// Re-exports for convenience
pub use activation::{squash, BIAS_ACTIVATION};
pub use config::{ControllerConfig, CrossoverConfig, EnablePolicy, MutationConfig};
pub use crossover::{crossover, CrossoverReport, DroppedConnection};
pub use error::{ControllerError, Result, Rule};
pub use gene::{Connection, ConnectionKey, Neuron, NeuronId, NeuronKey, NeuronKind};
pub use genome::{Genome, GenomeRecord, Lineage};
pub use innovation::{split_neuron_id, GenomeId};
pub use mutation::{mutate, mutate_seeded, MutationReport};
pub use payload::{parse_weight, ConnectionTuple, GenomePayload, NeuronTuple};
pub use phenome::Phenome;
pub use runtime::{Actuation, ActuatorReading, AgentController, AgentKey, ControllerRuntime, Reproduction};
pub use topology::GraphTopology;
pub use validator::{validate, GraphIndex};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_phenome_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Phenome>();
        assert_send_sync::<Genome>();
        assert_send_sync::<AgentController>();
    }

    #[test]
    fn test_breed_then_compile() {
        let neurons = || {
            vec![
                Neuron::sensor(NeuronId(1), "food-distance"),
                Neuron::actuator(NeuronId(10), "turn"),
                Neuron::bias(NeuronId(30)),
            ]
        };
        let a = Genome::from_parts(
            neurons(),
            vec![Connection::new(NeuronId(1), NeuronId(10), 0.8)],
        )
        .unwrap();
        let b = Genome::from_parts(
            neurons(),
            vec![Connection::new(NeuronId(30), NeuronId(10), -0.4)],
        )
        .unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (child, _) = crossover(&a, &b, None, &CrossoverConfig::default(), &mut rng).unwrap();
        let (child, _) = mutate(&child, &MutationConfig::structural(), &mut rng);
        assert!(Phenome::compile(&child).is_ok());
    }

    #[test]
    fn test_split_ids_are_deterministic() {
        let first = split_neuron_id(NeuronId(1), NeuronId(10), 0);
        let second = split_neuron_id(NeuronId(1), NeuronId(10), 0);
        assert_eq!(first, second);
        assert_ne!(first, split_neuron_id(NeuronId(10), NeuronId(1), 0));
    }
}
