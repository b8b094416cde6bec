//! Mutation operator.
//!
//! Operations run in a fixed order (weights, toggle, add connection, add
//! neuron), each gated by its own probability. Structural edits go through
//! the genome's validated methods; a rejected attempt is skipped, never
//! retried and never partially applied.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::config::MutationConfig;
use crate::error::Rule;
use crate::gene::{NeuronId, NeuronKind};
use crate::genome::Genome;

/// What one call to [`mutate`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationReport {
    pub weights_perturbed: usize,
    pub weights_replaced: usize,
    pub connections_toggled: usize,
    pub connections_added: usize,
    pub neurons_added: usize,
    /// Rule that rejected the add-connection attempt, if one was rejected.
    pub rejected_connection: Option<Rule>,
    /// Structural attempts abandoned because nothing could be sampled or the
    /// edit was rejected.
    pub skipped: usize,
}

impl MutationReport {
    /// Whether the graph shape changed (toggles count as shape changes).
    #[must_use]
    pub fn changed_structure(&self) -> bool {
        self.connections_toggled + self.connections_added + self.neurons_added > 0
    }
}

/// Mutate a copy of `genome`.
///
/// The result continues the parent's line: it keeps its
/// [`GenomeId`](crate::GenomeId) and lineage. Call
/// [`Genome::duplicate`] first when the mutant should be a separate
/// individual. The result always passes the Graph Validator.
pub fn mutate<R: Rng>(
    genome: &Genome,
    config: &MutationConfig,
    rng: &mut R,
) -> (Genome, MutationReport) {
    let mut child = genome.clone();
    let mut report = MutationReport::default();

    mutate_weights(&mut child, config, rng, &mut report);
    mutate_toggle(&mut child, config, rng, &mut report);
    mutate_add_connection(&mut child, config, rng, &mut report);
    mutate_add_neuron(&mut child, config, rng, &mut report);

    trace!(genome = %child.id(), ?report, "mutation finished");
    (child, report)
}

/// [`mutate`] with a `ChaCha8Rng` seeded from `seed`.
pub fn mutate_seeded(genome: &Genome, config: &MutationConfig, seed: u64) -> (Genome, MutationReport) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    mutate(genome, config, &mut rng)
}

fn fresh_weight<R: Rng>(config: &MutationConfig, rng: &mut R) -> f64 {
    rng.random::<f64>() * 2.0 * config.weight_range - config.weight_range
}

/// Mutate weights of enabled connections. Weights are not clamped.
fn mutate_weights<R: Rng>(
    genome: &mut Genome,
    config: &MutationConfig,
    rng: &mut R,
    report: &mut MutationReport,
) {
    let edges: Vec<(NeuronId, NeuronId, f64)> = genome
        .sorted_connections()
        .into_iter()
        .filter(|c| c.enabled)
        .map(|c| (c.source, c.target, c.weight))
        .collect();

    for (from, to, weight) in edges {
        if rng.random::<f64>() >= config.weight_mutation_prob {
            continue;
        }
        let (new_weight, replaced) = if rng.random::<f64>() < config.weight_replace_prob {
            (fresh_weight(config, rng), true)
        } else {
            let noise = (rng.random::<f64>() * 2.0 - 1.0) * config.weight_mutation_power;
            (weight + noise, false)
        };
        if genome.set_weight(from, to, new_weight).is_ok() {
            if replaced {
                report.weights_replaced += 1;
            } else {
                report.weights_perturbed += 1;
            }
        }
    }
}

/// Flip the enabled flag of one connection.
fn mutate_toggle<R: Rng>(
    genome: &mut Genome,
    config: &MutationConfig,
    rng: &mut R,
    report: &mut MutationReport,
) {
    if rng.random::<f64>() >= config.toggle_prob {
        return;
    }
    let edges: Vec<(NeuronId, NeuronId, bool)> = genome
        .sorted_connections()
        .into_iter()
        .map(|c| (c.source, c.target, c.enabled))
        .collect();
    if edges.is_empty() {
        report.skipped += 1;
        return;
    }

    let (from, to, enabled) = edges[rng.random_range(0..edges.len())];
    if genome.set_enabled(from, to, !enabled).is_ok() {
        trace!(%from, %to, enabled = !enabled, "toggled connection");
        report.connections_toggled += 1;
    }
}

/// Try one random new connection; abandon it if the validator objects.
fn mutate_add_connection<R: Rng>(
    genome: &mut Genome,
    config: &MutationConfig,
    rng: &mut R,
    report: &mut MutationReport,
) {
    if rng.random::<f64>() >= config.add_connection_prob {
        return;
    }

    let neurons = genome.sorted_neurons();
    // Sources: anything but actuators. Targets: hidden or actuator.
    let sources: Vec<NeuronId> = neurons
        .iter()
        .filter(|n| n.kind != NeuronKind::Actuator)
        .map(|n| n.id)
        .collect();
    let targets: Vec<NeuronId> = neurons
        .iter()
        .filter(|n| matches!(n.kind, NeuronKind::Hidden | NeuronKind::Actuator))
        .map(|n| n.id)
        .collect();

    if sources.is_empty() || targets.is_empty() {
        report.skipped += 1;
        return;
    }

    let from = sources[rng.random_range(0..sources.len())];
    let to = targets[rng.random_range(0..targets.len())];
    let weight = fresh_weight(config, rng);

    match genome.add_connection(from, to, weight) {
        Ok(_) => {
            trace!(%from, %to, weight, "added connection");
            report.connections_added += 1;
        }
        Err(err) => {
            debug!(%from, %to, error = %err, "skipped add-connection mutation");
            report.rejected_connection = err.rule();
            report.skipped += 1;
        }
    }
}

/// Split one enabled connection with a new hidden neuron.
fn mutate_add_neuron<R: Rng>(
    genome: &mut Genome,
    config: &MutationConfig,
    rng: &mut R,
    report: &mut MutationReport,
) {
    if rng.random::<f64>() >= config.add_neuron_prob {
        return;
    }

    let enabled: Vec<(NeuronId, NeuronId)> = genome
        .sorted_connections()
        .into_iter()
        .filter(|c| c.enabled)
        .map(|c| (c.source, c.target))
        .collect();
    if enabled.is_empty() {
        report.skipped += 1;
        return;
    }

    let (from, to) = enabled[rng.random_range(0..enabled.len())];
    match genome.split_connection(from, to) {
        Ok(hidden) => {
            trace!(%from, %to, %hidden, "split connection");
            report.neurons_added += 1;
        }
        Err(err) => {
            debug!(%from, %to, error = %err, "skipped add-neuron mutation");
            report.skipped += 1;
        }
    }
}
