//! Crossover operator.
//!
//! Neurons are aligned by [`NeuronId`] and connections by their unordered
//! endpoint pair. The inherited connections are then replayed through a fresh
//! validator index in `(source, target)` order; anything the child cannot
//! legally hold is dropped and reported.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::Rng;
use tracing::debug;

use crate::config::CrossoverConfig;
use crate::error::{ControllerError, Result, Rule};
use crate::gene::{Connection, Neuron, NeuronId};
use crate::genome::{Genome, Lineage};
use crate::innovation::GenomeId;
use crate::validator::GraphIndex;

/// An inherited connection the child could not legally hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedConnection {
    pub from: NeuronId,
    pub to: NeuronId,
    pub rule: Rule,
}

/// What one call to [`crossover`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossoverReport {
    /// Pairs present in both parents.
    pub matched: usize,
    /// Disjoint or excess connections taken from the donor parent.
    pub inherited_disjoint: usize,
    /// Disjoint or excess connections of the other parent, left out.
    pub excluded_disjoint: usize,
    pub dropped: Vec<DroppedConnection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    A,
    B,
}

/// Breed a child from `a` and `b`.
///
/// `fitness`, when given as `(fitness_a, fitness_b)`, makes the fitter
/// parent the donor of disjoint and excess connections. Without it, or on a
/// tie, the donor is chosen uniformly once per call. The child gets a fresh
/// [`GenomeId`] and records both parents in its [`Lineage`].
///
/// # Errors
///
/// [`ControllerError::IncompatibleParents`] if the parents declare the same
/// neuron id with different kinds, or if
/// [`require_matching_interface`](CrossoverConfig::require_matching_interface)
/// is set and their sensor/actuator sets differ.
pub fn crossover<R: Rng>(
    a: &Genome,
    b: &Genome,
    fitness: Option<(f64, f64)>,
    config: &CrossoverConfig,
    rng: &mut R,
) -> Result<(Genome, CrossoverReport)> {
    if config.require_matching_interface && a.interface() != b.interface() {
        return Err(ControllerError::IncompatibleParents {
            reason: format!(
                "sensor/actuator sets of {} and {} differ",
                a.id(),
                b.id()
            ),
        });
    }

    let neurons = merge_neurons(a, b)?;

    let donor = match fitness.and_then(|(fa, fb)| fa.partial_cmp(&fb)) {
        Some(Ordering::Greater) => Parent::A,
        Some(Ordering::Less) => Parent::B,
        _ => {
            if rng.random::<bool>() {
                Parent::A
            } else {
                Parent::B
            }
        }
    };

    let genes_a = by_pair(a);
    let genes_b = by_pair(b);
    let mut pairs: Vec<(NeuronId, NeuronId)> =
        genes_a.keys().chain(genes_b.keys()).copied().collect();
    pairs.sort_unstable();
    pairs.dedup();

    let mut report = CrossoverReport::default();
    let mut candidates = Vec::with_capacity(pairs.len());
    for pair in pairs {
        match (genes_a.get(&pair), genes_b.get(&pair)) {
            (Some(&ca), Some(&cb)) => {
                report.matched += 1;
                let chosen = if rng.random::<bool>() { ca } else { cb };
                let mut conn = chosen.clone();
                conn.enabled = config.enable_policy.resolve(ca.enabled, cb.enabled);
                candidates.push(conn);
            }
            (Some(&ca), None) => {
                inherit_disjoint(ca, donor == Parent::A, &mut candidates, &mut report);
            }
            (None, Some(&cb)) => {
                inherit_disjoint(cb, donor == Parent::B, &mut candidates, &mut report);
            }
            (None, None) => {}
        }
    }

    candidates.sort_by_key(|c| (c.source, c.target));
    let mut index = GraphIndex::with_neurons(neurons.iter())?;
    let mut accepted = Vec::with_capacity(candidates.len());
    for conn in candidates {
        match index.try_insert(&conn) {
            Ok(()) => accepted.push(conn),
            Err(err) => {
                let rule = err.rule().unwrap_or(Rule::Cycle);
                debug!(from = %conn.source, to = %conn.target, %rule, "dropped inherited connection");
                report.dropped.push(DroppedConnection {
                    from: conn.source,
                    to: conn.target,
                    rule,
                });
            }
        }
    }

    let child = Genome::from_trusted(
        GenomeId::fresh(),
        Lineage::bred(a.id(), b.id()),
        neurons,
        accepted,
    );
    debug!(
        child = %child.id(),
        parent_a = %a.id(),
        parent_b = %b.id(),
        matched = report.matched,
        dropped = report.dropped.len(),
        "crossover finished"
    );
    Ok((child, report))
}

fn inherit_disjoint(
    conn: &Connection,
    from_donor: bool,
    candidates: &mut Vec<Connection>,
    report: &mut CrossoverReport,
) {
    if from_donor {
        report.inherited_disjoint += 1;
        candidates.push(conn.clone());
    } else {
        report.excluded_disjoint += 1;
    }
}

/// Union of both parents' neurons, ascending by id. A's copy wins on labels.
fn merge_neurons(a: &Genome, b: &Genome) -> Result<Vec<Neuron>> {
    let mut merged: BTreeMap<NeuronId, Neuron> = BTreeMap::new();
    for neuron in a.neurons().chain(b.neurons()) {
        match merged.get(&neuron.id) {
            Some(existing) if existing.kind != neuron.kind => {
                return Err(ControllerError::IncompatibleParents {
                    reason: format!(
                        "neuron {} is a {} in one parent and a {} in the other",
                        neuron.id, existing.kind, neuron.kind
                    ),
                });
            }
            Some(_) => {}
            None => {
                merged.insert(neuron.id, neuron.clone());
            }
        }
    }
    Ok(merged.into_values().collect())
}

fn by_pair(genome: &Genome) -> BTreeMap<(NeuronId, NeuronId), &Connection> {
    genome.connections().map(|c| (c.pair(), c)).collect()
}
