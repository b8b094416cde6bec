//! Enabled-edge graph snapshot in CSR format.
//!
//! This module provides the compile-time graph algorithms for controller
//! genomes using Compressed Sparse Row (CSR) format, which keeps the per-tick
//! evaluator free of `Vec<Vec<usize>>` indirection.
//!
//! ## Determinism
//!
//! Neurons are given dense indices in ascending [`NeuronId`] order and edges
//! are sorted by `(source, target)` before CSR construction. Kahn's algorithm
//! breaks ties with a min-heap over dense indices, so the topological order
//! depends only on the graph, never on arena or insertion history. Incoming
//! edges are therefore summed in a fixed order, which matters because
//! floating-point addition is not associative.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::gene::{Connection, NeuronId};
use crate::genome::Genome;

/// CSR-format snapshot of a genome's enabled connections.
#[derive(Debug, Clone)]
pub struct GraphTopology {
    /// Dense index -> NeuronId, ascending.
    ids: Vec<NeuronId>,
    /// CSR offsets for forward edges (outgoing). Length = node_count + 1.
    fwd_offsets: Vec<usize>,
    /// Successors of node i are fwd_targets[fwd_offsets[i]..fwd_offsets[i+1]].
    fwd_targets: Vec<usize>,
    /// CSR offsets for reverse edges (incoming). Length = node_count + 1.
    rev_offsets: Vec<usize>,
    /// Predecessors of node i are rev_sources[rev_offsets[i]..rev_offsets[i+1]].
    rev_sources: Vec<usize>,
    /// Weights parallel to rev_sources.
    rev_weights: Vec<f64>,
}

impl GraphTopology {
    /// Build topology from a genome's enabled connections.
    #[must_use]
    pub fn from_genome(genome: &Genome) -> Self {
        let mut ids: Vec<NeuronId> = genome.neurons().map(|n| n.id).collect();
        ids.sort_unstable();

        let mut edges: Vec<(usize, usize, f64)> = genome
            .connections()
            .filter(|c| c.enabled)
            .filter_map(|c| dense_edge(&ids, c))
            .collect();
        edges.sort_by_key(|&(from, to, _)| (from, to));

        let node_count = ids.len();

        let fwd_offsets = offsets(node_count, edges.iter().map(|&(from, _, _)| from));
        let mut fwd_targets = vec![0usize; edges.len()];
        let mut write_pos = fwd_offsets[..node_count].to_vec();
        for &(from, to, _) in &edges {
            fwd_targets[write_pos[from]] = to;
            write_pos[from] += 1;
        }

        // Edges are sorted by source, so each node's incoming slice is too.
        let rev_offsets = offsets(node_count, edges.iter().map(|&(_, to, _)| to));
        let mut rev_sources = vec![0usize; edges.len()];
        let mut rev_weights = vec![0.0f64; edges.len()];
        let mut write_pos = rev_offsets[..node_count].to_vec();
        for &(from, to, weight) in &edges {
            let pos = write_pos[to];
            rev_sources[pos] = from;
            rev_weights[pos] = weight;
            write_pos[to] += 1;
        }

        Self {
            ids,
            fwd_offsets,
            fwd_targets,
            rev_offsets,
            rev_sources,
            rev_weights,
        }
    }

    /// Number of nodes in the topology.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Number of enabled edges.
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.fwd_targets.len()
    }

    /// Get the dense index for a NeuronId.
    #[inline]
    #[must_use]
    pub fn node_index(&self, id: NeuronId) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Get the NeuronId for a dense index.
    #[inline]
    #[must_use]
    pub fn node_id(&self, idx: usize) -> Option<NeuronId> {
        self.ids.get(idx).copied()
    }

    /// Iterate over successors of a node (forward edges).
    #[inline]
    pub fn successors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.fwd_offsets[idx];
        let end = self.fwd_offsets[idx + 1];
        self.fwd_targets[start..end].iter().copied()
    }

    /// Iterate over `(source, weight)` of a node's incoming edges, ascending by source.
    #[inline]
    pub fn incoming(&self, idx: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.rev_offsets[idx];
        let end = self.rev_offsets[idx + 1];
        self.rev_sources[start..end]
            .iter()
            .copied()
            .zip(self.rev_weights[start..end].iter().copied())
    }

    fn in_degree(&self, idx: usize) -> usize {
        self.rev_offsets[idx + 1] - self.rev_offsets[idx]
    }

    /// Topological order of all nodes using Kahn's algorithm.
    ///
    /// Among nodes that become ready at the same time the one with the smallest
    /// NeuronId goes first. Returns `None` if the enabled graph has a cycle.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree: Vec<usize> = (0..self.node_count()).map(|i| self.in_degree(i)).collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.node_count());
        while let Some(Reverse(u)) = ready.pop() {
            order.push(u);
            for v in self.successors(u) {
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    ready.push(Reverse(v));
                }
            }
        }

        if order.len() == self.node_count() {
            Some(order)
        } else {
            None
        }
    }

    /// Detect if the enabled graph contains any cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_none()
    }

    /// Consume the snapshot, yielding the incoming CSR arrays
    /// `(offsets, sources, weights)`.
    pub(crate) fn into_incoming_csr(self) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
        (self.rev_offsets, self.rev_sources, self.rev_weights)
    }
}

fn dense_edge(ids: &[NeuronId], conn: &Connection) -> Option<(usize, usize, f64)> {
    let from = ids.binary_search(&conn.source).ok()?;
    let to = ids.binary_search(&conn.target).ok()?;
    Some((from, to, conn.weight))
}

/// Prefix sums of per-node edge counts. Length = node_count + 1.
fn offsets(node_count: usize, endpoints: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut counts = vec![0usize; node_count];
    for idx in endpoints {
        counts[idx] += 1;
    }
    let mut offsets = Vec::with_capacity(node_count + 1);
    let mut running = 0usize;
    offsets.push(running);
    for count in counts {
        running += count;
        offsets.push(running);
    }
    offsets
}
