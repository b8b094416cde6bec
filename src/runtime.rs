//! Controller runtime: one compiled controller per live agent.
//!
//! Genomes change only at explicit boundaries (spawn, replace, mutate,
//! reproduce), and each change recompiles the agent's [`Phenome`] before the
//! agent is touched. [`ControllerRuntime::tick`] only reads phenomes, so it
//! evaluates the whole population in parallel without locks.

use std::sync::Arc;

use rand::Rng;
use rayon::prelude::*;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, info};

use crate::config::ControllerConfig;
use crate::crossover::{crossover, CrossoverReport};
use crate::error::{ControllerError, Result};
use crate::gene::NeuronId;
use crate::genome::Genome;
use crate::mutation::{mutate, MutationReport};
use crate::phenome::Phenome;

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentKey;
}

/// A genome together with its compiled controller.
#[derive(Debug, Clone)]
pub struct AgentController {
    genome: Genome,
    phenome: Arc<Phenome>,
}

impl AgentController {
    /// # Errors
    ///
    /// Whatever [`Phenome::compile`] reports.
    pub fn new(genome: Genome) -> Result<Self> {
        let phenome = Arc::new(Phenome::compile(&genome)?);
        Ok(Self { genome, phenome })
    }

    #[must_use]
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    #[must_use]
    pub fn phenome(&self) -> &Arc<Phenome> {
        &self.phenome
    }
}

/// One actuator output of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorReading {
    pub id: NeuronId,
    pub label: Arc<str>,
    pub value: f64,
}

/// All actuator outputs of one agent for one tick, ascending by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Actuation {
    pub agent: AgentKey,
    pub readings: Vec<ActuatorReading>,
}

impl Actuation {
    /// Value of the first actuator carrying `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<f64> {
        self.readings
            .iter()
            .find(|r| &*r.label == label)
            .map(|r| r.value)
    }

    #[must_use]
    pub fn by_id(&self, id: NeuronId) -> Option<f64> {
        self.readings.iter().find(|r| r.id == id).map(|r| r.value)
    }
}

/// Offspring produced by [`ControllerRuntime::reproduce`].
#[derive(Debug, Clone)]
pub struct Reproduction {
    pub child: AgentKey,
    pub crossover: CrossoverReport,
    pub mutation: MutationReport,
}

/// Owns every live agent's controller.
#[derive(Debug, Default)]
pub struct ControllerRuntime {
    agents: SlotMap<AgentKey, AgentController>,
    config: ControllerConfig,
}

impl ControllerRuntime {
    /// # Errors
    ///
    /// [`ControllerError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            agents: SlotMap::with_key(),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = AgentKey> + '_ {
        self.agents.keys()
    }

    /// Compile `genome` and register a new agent for it.
    ///
    /// # Errors
    ///
    /// Whatever [`Phenome::compile`] reports; nothing is registered.
    pub fn spawn(&mut self, genome: Genome) -> Result<AgentKey> {
        let controller = AgentController::new(genome)?;
        let genome_id = controller.genome.id();
        let key = self.agents.insert(controller);
        info!(agent = ?key, genome = %genome_id, "spawned agent");
        Ok(key)
    }

    /// Remove an agent, handing back its genome.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownAgent`] if the key is stale.
    pub fn despawn(&mut self, key: AgentKey) -> Result<Genome> {
        let controller = self.agents.remove(key).ok_or(ControllerError::UnknownAgent)?;
        debug!(agent = ?key, genome = %controller.genome.id(), "despawned agent");
        Ok(controller.genome)
    }

    #[must_use]
    pub fn get(&self, key: AgentKey) -> Option<&AgentController> {
        self.agents.get(key)
    }

    #[must_use]
    pub fn genome(&self, key: AgentKey) -> Option<&Genome> {
        self.agents.get(key).map(|c| &c.genome)
    }

    /// Shared handle to the agent's compiled controller.
    #[must_use]
    pub fn phenome(&self, key: AgentKey) -> Option<Arc<Phenome>> {
        self.agents.get(key).map(|c| Arc::clone(&c.phenome))
    }

    /// Swap in a new genome, returning the old one.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownAgent`] or a compile error; the agent keeps
    /// its old controller on error.
    pub fn replace_genome(&mut self, key: AgentKey, genome: Genome) -> Result<Genome> {
        let slot = self.agents.get_mut(key).ok_or(ControllerError::UnknownAgent)?;
        let controller = AgentController::new(genome)?;
        let old = std::mem::replace(slot, controller);
        Ok(old.genome)
    }

    /// Mutate an agent's genome in place and recompile it.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownAgent`] if the key is stale.
    pub fn mutate_agent<R: Rng>(&mut self, key: AgentKey, rng: &mut R) -> Result<MutationReport> {
        let current = self.agents.get(key).ok_or(ControllerError::UnknownAgent)?;
        let (genome, report) = mutate(&current.genome, &self.config.mutation, rng);
        self.replace_genome(key, genome)?;
        Ok(report)
    }

    /// Breed two agents, mutate the child and spawn it.
    ///
    /// `fitness` is `(fitness_a, fitness_b)` when the caller tracks it.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownAgent`] for a stale parent key, or
    /// [`ControllerError::IncompatibleParents`].
    pub fn reproduce<R: Rng>(
        &mut self,
        parent_a: AgentKey,
        parent_b: AgentKey,
        fitness: Option<(f64, f64)>,
        rng: &mut R,
    ) -> Result<Reproduction> {
        let a = self.genome(parent_a).ok_or(ControllerError::UnknownAgent)?;
        let b = self.genome(parent_b).ok_or(ControllerError::UnknownAgent)?;

        let (child, crossover_report) = crossover(a, b, fitness, &self.config.crossover, rng)?;
        let (child, mutation_report) = mutate(&child, &self.config.mutation, rng);
        let lineage = child.lineage();

        let key = self.spawn(child)?;
        info!(
            agent = ?key,
            parent_a = ?lineage.parent_a,
            parent_b = ?lineage.parent_b,
            dropped = crossover_report.dropped.len(),
            "reproduced agent"
        );
        Ok(Reproduction {
            child: key,
            crossover: crossover_report,
            mutation: mutation_report,
        })
    }

    /// Evaluate every agent once.
    ///
    /// `sense(agent, label)` supplies each sensor observation. Agents are
    /// evaluated in parallel; the result is in the runtime's iteration order.
    pub fn tick<F>(&self, sense: F) -> Vec<Actuation>
    where
        F: Fn(AgentKey, &str) -> f64 + Sync,
    {
        let agents: Vec<(AgentKey, &Arc<Phenome>)> =
            self.agents.iter().map(|(key, c)| (key, &c.phenome)).collect();

        agents
            .par_iter()
            .map_init(
                || (Vec::new(), Vec::new()),
                |(inputs, scratch): &mut (Vec<f64>, Vec<f64>), &(key, phenome)| {
                    inputs.clear();
                    inputs.extend(phenome.sensors().map(|(_, label)| sense(key, label)));
                    phenome.evaluate_into(inputs.as_slice(), scratch);

                    let readings = phenome
                        .actuator_labels()
                        .zip(phenome.actuator_values(scratch.as_slice()))
                        .map(|((id, label), (_, value))| ActuatorReading {
                            id,
                            label: Arc::clone(label),
                            value,
                        })
                        .collect();
                    Actuation {
                        agent: key,
                        readings,
                    }
                },
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::squash;
    use crate::config::MutationConfig;
    use crate::gene::{Connection, Neuron};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    const S1: NeuronId = NeuronId(1);
    const S2: NeuronId = NeuronId(2);
    const A1: NeuronId = NeuronId(10);
    const B1: NeuronId = NeuronId(30);

    fn forager(weight: f64) -> Genome {
        Genome::from_parts(
            vec![
                Neuron::sensor(S1, "food-distance"),
                Neuron::sensor(S2, "food-angle"),
                Neuron::actuator(A1, "turn"),
                Neuron::bias(B1),
            ],
            vec![Connection::new(S1, A1, weight), Connection::new(B1, A1, 0.5)],
        )
        .unwrap()
    }

    fn sense(_agent: AgentKey, label: &str) -> f64 {
        match label {
            "food-distance" => 1.0,
            _ => 0.0,
        }
    }

    #[test]
    fn test_spawn_and_tick() {
        let mut runtime = ControllerRuntime::default();
        let key = runtime.spawn(forager(1.0)).unwrap();
        assert_eq!(runtime.len(), 1);

        let actuations = runtime.tick(sense);
        assert_eq!(actuations.len(), 1);
        assert_eq!(actuations[0].agent, key);
        assert_eq!(actuations[0].get("turn"), Some(squash(1.5)));
        assert_eq!(actuations[0].by_id(A1), Some(squash(1.5)));
        assert_eq!(actuations[0].get("missing"), None);
    }

    #[test]
    fn test_tick_matches_sequential_evaluation() {
        let mut runtime = ControllerRuntime::default();
        for i in 0..32 {
            runtime.spawn(forager(f64::from(i) * 0.1 - 1.0)).unwrap();
        }
        let actuations = runtime.tick(sense);
        assert_eq!(actuations.len(), 32);

        let inputs: HashMap<NeuronId, f64> = [(S1, 1.0), (S2, 0.0)].into_iter().collect();
        for actuation in &actuations {
            let phenome = runtime.phenome(actuation.agent).unwrap();
            let expected = phenome.evaluate(&inputs)[&A1];
            assert_eq!(actuation.get("turn"), Some(expected));
        }
        // Two ticks over unchanged phenomes are bit-identical.
        assert_eq!(runtime.tick(sense), actuations);
    }

    #[test]
    fn test_despawn_and_stale_keys() {
        let mut runtime = ControllerRuntime::default();
        let key = runtime.spawn(forager(1.0)).unwrap();
        let genome = runtime.despawn(key).unwrap();
        assert_eq!(genome.neuron_count(), 4);
        assert!(runtime.is_empty());
        assert_eq!(runtime.despawn(key).unwrap_err(), ControllerError::UnknownAgent);
        assert!(runtime.genome(key).is_none());
        assert!(matches!(
            runtime.mutate_agent(key, &mut ChaCha8Rng::seed_from_u64(1)),
            Err(ControllerError::UnknownAgent)
        ));
    }

    #[test]
    fn test_replace_genome_recompiles() {
        let mut runtime = ControllerRuntime::default();
        let key = runtime.spawn(forager(1.0)).unwrap();
        let before = runtime.phenome(key).unwrap();
        let old = runtime.replace_genome(key, forager(-1.0)).unwrap();
        assert_eq!(old.connection(S1, A1).unwrap().weight, 1.0);
        let after = runtime.phenome(key).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.weight(S1, A1), Some(-1.0));
    }

    #[test]
    fn test_reproduce_spawns_valid_child() {
        let config = ControllerConfig {
            mutation: MutationConfig::structural(),
            ..ControllerConfig::default()
        };
        let mut runtime = ControllerRuntime::new(config).unwrap();
        let a = runtime.spawn(forager(1.0)).unwrap();
        let b = runtime.spawn(forager(-1.0)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let offspring = runtime.reproduce(a, b, Some((1.0, 0.5)), &mut rng).unwrap();
        assert_eq!(runtime.len(), 3);
        let child = runtime.genome(offspring.child).unwrap();
        assert!(child.validate().is_ok());
        assert_eq!(child.lineage().parent_a, runtime.genome(a).map(Genome::id));
        assert_eq!(offspring.crossover.matched, 2);
    }

    #[test]
    fn test_duplicated_seed_gives_distinct_parents() {
        let mut runtime = ControllerRuntime::default();
        let seed = forager(1.0);
        let a = runtime.spawn(seed.duplicate()).unwrap();
        let b = runtime.spawn(seed.duplicate()).unwrap();
        let id_a = runtime.genome(a).map(Genome::id);
        let id_b = runtime.genome(b).map(Genome::id);
        assert_ne!(id_a, id_b);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let offspring = runtime.reproduce(a, b, None, &mut rng).unwrap();
        let lineage = runtime.genome(offspring.child).unwrap().lineage();
        assert_eq!((lineage.parent_a, lineage.parent_b), (id_a, id_b));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = ControllerConfig::default();
        config.mutation.add_neuron_prob = -0.1;
        assert!(matches!(
            ControllerRuntime::new(config),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
