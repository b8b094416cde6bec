//! Graph legality checks.
//!
//! [`GraphIndex`] holds the neuron kinds, the set of unordered connected pairs
//! and a directed adjacency of every connection, enabled or not. Candidate
//! edges are checked against it one at a time:
//!
//! 1. no self-loop
//! 2. no second connection on the same unordered pair
//! 3. nothing feeds a sensor (or a bias)
//! 4. nothing reads from an actuator
//! 5. no sensor -> sensor
//! 6. no actuator -> actuator
//! 7. the edge must not close a directed cycle
//!
//! Rules 5 and 6 are tested before 3 and 4 so the more specific rule is the
//! one reported. Rules 1-6 are O(1). The cycle check is an iterative
//! colour-marking DFS from the candidate's target, O(V+E).
//!
//! Disabled connections count for both uniqueness and acyclicity, so toggling
//! an edge's enabled flag can never make a legal graph illegal.

use std::collections::{HashMap, HashSet};

use crate::error::{ControllerError, Result, Rule};
use crate::gene::{unordered_pair, Connection, Neuron, NeuronId, NeuronKind};

/// The kind rules (3 through 6) for an edge between neurons of these kinds.
pub(crate) fn kind_rule(source: NeuronKind, target: NeuronKind) -> Option<Rule> {
    match (source, target) {
        (NeuronKind::Sensor, NeuronKind::Sensor) => Some(Rule::SensorToSensor),
        (NeuronKind::Actuator, NeuronKind::Actuator) => Some(Rule::ActuatorToActuator),
        (_, NeuronKind::Sensor | NeuronKind::Bias) => Some(Rule::IntoSource),
        (NeuronKind::Actuator, _) => Some(Rule::FromActuator),
        _ => None,
    }
}

/// DFS colours.
const WHITE: u8 = 0;
const GRAY: u8 = 1;
const BLACK: u8 = 2;

/// Incrementally built index of a candidate control graph.
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    kinds: HashMap<NeuronId, NeuronKind>,
    pairs: HashSet<(NeuronId, NeuronId)>,
    successors: HashMap<NeuronId, Vec<NeuronId>>,
}

impl GraphIndex {
    /// Index a neuron set with no connections.
    ///
    /// # Errors
    ///
    /// [`ControllerError::DuplicateNeuron`] if two neurons share an id.
    pub fn with_neurons<'a, I>(neurons: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Neuron>,
    {
        let mut index = Self::default();
        for neuron in neurons {
            index.insert_neuron(neuron)?;
        }
        Ok(index)
    }

    /// Index neurons and connections that are already known to be legal.
    ///
    /// No rule is checked; use [`validate`] for untrusted input.
    pub(crate) fn trusted<'a, N, C>(neurons: N, connections: C) -> Self
    where
        N: IntoIterator<Item = &'a Neuron>,
        C: IntoIterator<Item = &'a Connection>,
    {
        let mut index = Self::default();
        for neuron in neurons {
            index.kinds.insert(neuron.id, neuron.kind);
        }
        for conn in connections {
            index.insert_connection(conn);
        }
        index
    }

    /// Register a neuron.
    ///
    /// # Errors
    ///
    /// [`ControllerError::DuplicateNeuron`] if the id is already present.
    pub fn insert_neuron(&mut self, neuron: &Neuron) -> Result<()> {
        if self.kinds.contains_key(&neuron.id) {
            return Err(ControllerError::DuplicateNeuron(neuron.id));
        }
        self.kinds.insert(neuron.id, neuron.kind);
        Ok(())
    }

    /// Kind of a registered neuron.
    #[must_use]
    pub fn kind(&self, id: NeuronId) -> Option<NeuronKind> {
        self.kinds.get(&id).copied()
    }

    /// Whether a connection on the unordered pair `{a, b}` exists.
    #[must_use]
    pub fn is_connected(&self, a: NeuronId, b: NeuronId) -> bool {
        self.pairs.contains(&unordered_pair(a, b))
    }

    /// Record a connection without checking it.
    pub fn insert_connection(&mut self, conn: &Connection) {
        self.pairs.insert(conn.pair());
        self.successors
            .entry(conn.source)
            .or_default()
            .push(conn.target);
    }

    /// Check rules 1 through 6 for the candidate edge `from -> to`.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownNeuron`] if either endpoint is not registered,
    /// otherwise [`ControllerError::InvalidConnection`] naming the first violated rule.
    pub fn check_shape(&self, from: NeuronId, to: NeuronId) -> Result<()> {
        let source = self.kind(from).ok_or(ControllerError::UnknownNeuron(from))?;
        let target = self.kind(to).ok_or(ControllerError::UnknownNeuron(to))?;

        let reject = |rule| ControllerError::InvalidConnection { from, to, rule };

        if from == to {
            return Err(reject(Rule::SelfLoop));
        }
        if self.is_connected(from, to) {
            return Err(reject(Rule::Duplicate));
        }
        kind_rule(source, target).map_or(Ok(()), |rule| Err(reject(rule)))
    }

    /// Check every rule for the candidate edge `from -> to`.
    ///
    /// # Errors
    ///
    /// See [`check_shape`](Self::check_shape); additionally [`Rule::Cycle`].
    pub fn check(&self, from: NeuronId, to: NeuronId) -> Result<()> {
        self.check_shape(from, to)?;
        if self.would_create_cycle(from, to) {
            return Err(ControllerError::InvalidConnection {
                from,
                to,
                rule: Rule::Cycle,
            });
        }
        Ok(())
    }

    /// Check a candidate and record it if legal.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check). The index is unchanged on error.
    pub fn try_insert(&mut self, conn: &Connection) -> Result<()> {
        self.check(conn.source, conn.target)?;
        self.insert_connection(conn);
        Ok(())
    }

    /// Whether adding `from -> to` would close a directed cycle.
    ///
    /// Walks forward from `to`; reaching `from` means the new edge closes a
    /// loop. Meeting a node that is still on the DFS stack means the existing
    /// graph already has a cycle, which is reported the same way.
    #[must_use]
    pub fn would_create_cycle(&self, from: NeuronId, to: NeuronId) -> bool {
        if from == to {
            return true;
        }

        let mut color: HashMap<NeuronId, u8> = HashMap::with_capacity(self.kinds.len());
        // (node, index of the next successor to visit)
        let mut stack: Vec<(NeuronId, usize)> = vec![(to, 0)];
        color.insert(to, GRAY);

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let successors = self.successors.get(&node).map_or(&[][..], Vec::as_slice);
            if let Some(&succ) = successors.get(top.1) {
                top.1 += 1;
                if succ == from {
                    return true;
                }
                match color.get(&succ).copied().unwrap_or(WHITE) {
                    WHITE => {
                        color.insert(succ, GRAY);
                        stack.push((succ, 0));
                    }
                    GRAY => return true,
                    _ => {}
                }
            } else {
                color.insert(node, BLACK);
                stack.pop();
            }
        }

        false
    }

    /// Whether the indexed graph contains any directed cycle.
    ///
    /// Independent of how the graph was built; starts a colour-marking DFS from
    /// every unvisited neuron so disconnected components are covered.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        let mut starts: Vec<NeuronId> = self.successors.keys().copied().collect();
        starts.sort_unstable();

        let mut color: HashMap<NeuronId, u8> = HashMap::with_capacity(self.kinds.len());
        let mut stack: Vec<(NeuronId, usize)> = Vec::new();

        for start in starts {
            if color.get(&start).copied().unwrap_or(WHITE) != WHITE {
                continue;
            }
            color.insert(start, GRAY);
            stack.push((start, 0));

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                let successors = self.successors.get(&node).map_or(&[][..], Vec::as_slice);
                if let Some(&succ) = successors.get(top.1) {
                    top.1 += 1;
                    match color.get(&succ).copied().unwrap_or(WHITE) {
                        WHITE => {
                            color.insert(succ, GRAY);
                            stack.push((succ, 0));
                        }
                        GRAY => return true,
                        _ => {}
                    }
                } else {
                    color.insert(node, BLACK);
                    stack.pop();
                }
            }
        }

        false
    }
}

/// Decide whether a neuron/connection set is a legal control graph.
///
/// Connections are checked one by one in ascending `(source, target)` order,
/// each against the ones accepted before it. Nothing is repaired: the first
/// offending edge rejects the whole set.
///
/// # Errors
///
/// [`ControllerError::DuplicateNeuron`], [`ControllerError::UnknownNeuron`] or
/// [`ControllerError::InvalidConnection`] identifying the offending edge.
pub fn validate(neurons: &[Neuron], connections: &[Connection]) -> Result<()> {
    let mut index = GraphIndex::with_neurons(neurons)?;

    let mut ordered: Vec<&Connection> = connections.iter().collect();
    ordered.sort_by_key(|c| (c.source, c.target));

    for conn in ordered {
        index.try_insert(conn)?;
    }
    Ok(())
}
