//! Controller genome with arena-allocated graph storage.
//!
//! The [`Genome`] stores neurons and connections in `SlotMap` arenas and is
//! the single owned, mutable aggregate for one control graph. Every mutating
//! operation goes through the [`validator`](crate::validator) and is
//! all-or-nothing: a rejected edit leaves the genome untouched.
//!
//! Two id maps sit beside the arenas, so lookups by [`NeuronId`] or by
//! connection endpoints and the shape rules of a candidate edge are O(1).

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{trace, warn};

use crate::error::{ControllerError, Result, Rule};
use crate::gene::{
    unordered_pair, Connection, ConnectionKey, Neuron, NeuronId, NeuronKey, NeuronKind,
};
use crate::innovation::{observe_neuron_id, split_neuron_id, GenomeId};
use crate::validator::{self, kind_rule, GraphIndex};

/// Weight of the upstream half of a split connection.
pub const SPLIT_INPUT_WEIGHT: f64 = 1.0;

/// The genomes a genome was bred from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub parent_a: Option<GenomeId>,
    pub parent_b: Option<GenomeId>,
}

impl Lineage {
    /// Lineage of a crossover child.
    #[must_use]
    pub fn bred(parent_a: GenomeId, parent_b: GenomeId) -> Self {
        Self {
            parent_a: Some(parent_a),
            parent_b: Some(parent_b),
        }
    }

    /// Lineage of a copy taken from a single parent.
    #[must_use]
    pub fn copied(parent: GenomeId) -> Self {
        Self {
            parent_a: Some(parent),
            parent_b: None,
        }
    }
}

/// Flat, order-stable form of a genome used for serialization.
///
/// Converting a record back into a [`Genome`] re-validates it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord {
    #[serde(default = "GenomeId::fresh")]
    pub id: GenomeId,
    #[serde(default)]
    pub lineage: Lineage,
    pub neurons: Vec<Neuron>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// An evolvable control graph.
///
/// The [`GenomeId`] names a line of descent rather than one snapshot:
/// [`Clone`] and [`mutate`](crate::mutate) keep it, while
/// [`duplicate`](Self::duplicate) and crossover start a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GenomeRecord", into = "GenomeRecord")]
pub struct Genome {
    id: GenomeId,
    lineage: Lineage,
    neurons: SlotMap<NeuronKey, Neuron>,
    connections: SlotMap<ConnectionKey, Connection>,
    neuron_keys: HashMap<NeuronId, NeuronKey>,
    /// Keyed by unordered pair; at most one connection per pair.
    connection_keys: HashMap<(NeuronId, NeuronId), ConnectionKey>,
}

impl Default for Genome {
    fn default() -> Self {
        Self::empty()
    }
}

impl Genome {
    /// A genome with no neurons and no connections.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            id: GenomeId::fresh(),
            lineage: Lineage::default(),
            neurons: SlotMap::with_key(),
            connections: SlotMap::with_key(),
            neuron_keys: HashMap::new(),
            connection_keys: HashMap::new(),
        }
    }

    /// Build a genome from an explicit neuron list and connection list.
    ///
    /// # Errors
    ///
    /// Rejects the whole input if any neuron id repeats or any connection is
    /// illegal; the error names the offending neuron or edge.
    pub fn from_parts(neurons: Vec<Neuron>, connections: Vec<Connection>) -> Result<Self> {
        if let Err(err) = validator::validate(&neurons, &connections) {
            warn!(error = %err, "rejected genome import");
            return Err(err);
        }
        Ok(Self::from_trusted(
            GenomeId::fresh(),
            Lineage::default(),
            neurons,
            connections,
        ))
    }

    /// Assemble a genome from parts that have already been validated.
    pub(crate) fn from_trusted(
        id: GenomeId,
        lineage: Lineage,
        neurons: Vec<Neuron>,
        connections: Vec<Connection>,
    ) -> Self {
        let mut genome = Self {
            id,
            lineage,
            neurons: SlotMap::with_capacity_and_key(neurons.len()),
            connections: SlotMap::with_capacity_and_key(connections.len()),
            neuron_keys: HashMap::with_capacity(neurons.len()),
            connection_keys: HashMap::with_capacity(connections.len()),
        };
        for neuron in neurons {
            genome.insert_neuron(neuron);
        }
        for conn in connections {
            genome.insert_connection(conn);
        }
        genome
    }

    /// A copy of this genome under a fresh [`GenomeId`], recording this one
    /// as its parent.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            id: GenomeId::fresh(),
            lineage: Lineage::copied(self.id),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn id(&self) -> GenomeId {
        self.id
    }

    #[must_use]
    pub fn lineage(&self) -> Lineage {
        self.lineage
    }

    /// Number of neurons.
    #[must_use]
    pub fn neuron_count(&self) -> usize {
        self.neurons.len()
    }

    /// Number of connections, enabled or not.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of enabled connections.
    #[must_use]
    pub fn enabled_connection_count(&self) -> usize {
        self.connections.values().filter(|c| c.enabled).count()
    }

    /// Iterate over neurons in arena order.
    pub fn neurons(&self) -> impl Iterator<Item = &Neuron> + '_ {
        self.neurons.values()
    }

    /// Iterate over connections in arena order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.values()
    }

    /// Neurons sorted by ascending id.
    #[must_use]
    pub fn sorted_neurons(&self) -> Vec<&Neuron> {
        let mut neurons: Vec<&Neuron> = self.neurons.values().collect();
        neurons.sort_by_key(|n| n.id);
        neurons
    }

    /// Connections sorted by ascending `(source, target)`.
    #[must_use]
    pub fn sorted_connections(&self) -> Vec<&Connection> {
        let mut conns: Vec<&Connection> = self.connections.values().collect();
        conns.sort_by_key(|c| (c.source, c.target));
        conns
    }

    /// Look up a neuron by id.
    #[must_use]
    pub fn neuron(&self, id: NeuronId) -> Option<&Neuron> {
        self.neuron_key(id).map(|key| &self.neurons[key])
    }

    /// Whether a neuron with this id exists.
    #[must_use]
    pub fn contains_neuron(&self, id: NeuronId) -> bool {
        self.neuron(id).is_some()
    }

    /// Look up the connection `from -> to` (direction matters).
    #[must_use]
    pub fn connection(&self, from: NeuronId, to: NeuronId) -> Option<&Connection> {
        self.connection_key(from, to).map(|key| &self.connections[key])
    }

    /// Sensor neurons sorted by id.
    #[must_use]
    pub fn sensors(&self) -> Vec<&Neuron> {
        self.of_kind(NeuronKind::Sensor)
    }

    /// Actuator neurons sorted by id.
    #[must_use]
    pub fn actuators(&self) -> Vec<&Neuron> {
        self.of_kind(NeuronKind::Actuator)
    }

    fn of_kind(&self, kind: NeuronKind) -> Vec<&Neuron> {
        let mut found: Vec<&Neuron> = self.neurons.values().filter(|n| n.kind == kind).collect();
        found.sort_by_key(|n| n.id);
        found
    }

    /// Ids of the fixed external interface: every sensor and actuator.
    #[must_use]
    pub fn interface(&self) -> BTreeSet<NeuronId> {
        self.neurons
            .values()
            .filter(|n| matches!(n.kind, NeuronKind::Sensor | NeuronKind::Actuator))
            .map(|n| n.id)
            .collect()
    }

    /// Add a neuron.
    ///
    /// # Errors
    ///
    /// [`ControllerError::DuplicateNeuron`] if the id is already taken.
    pub fn add_neuron(&mut self, neuron: Neuron) -> Result<NeuronId> {
        if self.contains_neuron(neuron.id) {
            return Err(ControllerError::DuplicateNeuron(neuron.id));
        }
        let id = neuron.id;
        self.insert_neuron(neuron);
        Ok(id)
    }

    /// Add an enabled connection `from -> to`.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownNeuron`] if an endpoint is missing, or
    /// [`ControllerError::InvalidConnection`] with the violated rule. The
    /// genome is unchanged on error.
    pub fn add_connection(
        &mut self,
        from: NeuronId,
        to: NeuronId,
        weight: f64,
    ) -> Result<ConnectionKey> {
        self.check_shape(from, to)?;
        if self.index().would_create_cycle(from, to) {
            return Err(ControllerError::InvalidConnection {
                from,
                to,
                rule: Rule::Cycle,
            });
        }
        Ok(self.insert_connection(Connection::new(from, to, weight)))
    }

    /// Remove a neuron and every connection touching it.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownNeuron`] if no such neuron exists.
    pub fn remove_neuron(&mut self, id: NeuronId) -> Result<Neuron> {
        let key = self
            .neuron_key(id)
            .ok_or(ControllerError::UnknownNeuron(id))?;
        let touching: Vec<ConnectionKey> = self
            .connections
            .iter()
            .filter(|(_, c)| c.touches(id))
            .map(|(key, _)| key)
            .collect();
        for &conn_key in &touching {
            self.remove_connection_at(conn_key);
        }
        trace!(neuron = %id, removed = touching.len(), "cascaded connection removal");
        self.neuron_keys.remove(&id);
        self.neurons
            .remove(key)
            .ok_or(ControllerError::UnknownNeuron(id))
    }

    /// Remove the connection `from -> to`.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownConnection`] if no such connection exists.
    pub fn remove_connection(&mut self, from: NeuronId, to: NeuronId) -> Result<Connection> {
        let key = self
            .connection_key(from, to)
            .ok_or(ControllerError::UnknownConnection { from, to })?;
        self.remove_connection_at(key)
            .ok_or(ControllerError::UnknownConnection { from, to })
    }

    /// Replace the weight of `from -> to`.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownConnection`] if no such connection exists.
    pub fn set_weight(&mut self, from: NeuronId, to: NeuronId, weight: f64) -> Result<()> {
        let key = self
            .connection_key(from, to)
            .ok_or(ControllerError::UnknownConnection { from, to })?;
        self.connections[key].weight = weight;
        Ok(())
    }

    /// Set the enabled flag of `from -> to`, returning the previous value.
    ///
    /// Disabled edges already count toward uniqueness and acyclicity, so this
    /// cannot make the graph illegal.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownConnection`] if no such connection exists.
    pub fn set_enabled(&mut self, from: NeuronId, to: NeuronId, enabled: bool) -> Result<bool> {
        let key = self
            .connection_key(from, to)
            .ok_or(ControllerError::UnknownConnection { from, to })?;
        let conn = &mut self.connections[key];
        let previous = conn.enabled;
        conn.enabled = enabled;
        Ok(previous)
    }

    /// Split the connection `from -> to` by inserting a new hidden neuron.
    ///
    /// The original connection is disabled and two new connections are created:
    /// `from -> hidden` (weight 1.0) and `hidden -> to` (original weight). The
    /// hidden neuron id is derived from the split edge, so the same split in two
    /// genomes yields homologous neurons.
    ///
    /// Refining an edge of an acyclic graph cannot create a cycle, so only the
    /// kind rules are re-checked.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownConnection`] if no such connection exists, or
    /// [`ControllerError::InvalidConnection`] if a shape rule fails.
    pub fn split_connection(&mut self, from: NeuronId, to: NeuronId) -> Result<NeuronId> {
        let key = self
            .connection_key(from, to)
            .ok_or(ControllerError::UnknownConnection { from, to })?;
        let weight = self.connections[key].weight;
        let source_kind = self.kind_of(from)?;
        let target_kind = self.kind_of(to)?;

        let mut salt = 0u32;
        let mut hidden_id = split_neuron_id(from, to, salt);
        while self.contains_neuron(hidden_id) {
            salt += 1;
            hidden_id = split_neuron_id(from, to, salt);
        }

        let upstream = Connection::new(from, hidden_id, SPLIT_INPUT_WEIGHT);
        let downstream = Connection::new(hidden_id, to, weight);
        let checks = [
            (&upstream, kind_rule(source_kind, NeuronKind::Hidden)),
            (&downstream, kind_rule(NeuronKind::Hidden, target_kind)),
        ];
        for (conn, rule) in checks {
            if let Some(rule) = rule {
                return Err(ControllerError::InvalidConnection {
                    from: conn.source,
                    to: conn.target,
                    rule,
                });
            }
        }

        self.connections[key].enabled = false;
        self.insert_neuron(Neuron::hidden(hidden_id));
        self.insert_connection(upstream);
        self.insert_connection(downstream);
        Ok(hidden_id)
    }

    /// Re-check the whole genome against every legality rule.
    ///
    /// # Errors
    ///
    /// The first violation found, as [`validator::validate`] reports it.
    pub fn validate(&self) -> Result<()> {
        let neurons: Vec<Neuron> = self.neurons.values().cloned().collect();
        let connections: Vec<Connection> = self.connections.values().cloned().collect();
        validator::validate(&neurons, &connections)
    }

    /// Check whether the connections contain a directed cycle.
    ///
    /// Independent of the validator's incremental checks.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        GraphIndex::trusted(self.neurons.values(), self.connections.values()).has_cycle()
    }

    /// Index of the current graph for checking candidate edits.
    #[must_use]
    pub fn index(&self) -> GraphIndex {
        GraphIndex::trusted(self.neurons.values(), self.connections.values())
    }

    /// Rules 1 through 6 for `from -> to`, answered from the id maps.
    fn check_shape(&self, from: NeuronId, to: NeuronId) -> Result<()> {
        let source = self.kind_of(from)?;
        let target = self.kind_of(to)?;
        let rule = if from == to {
            Some(Rule::SelfLoop)
        } else if self.connection_keys.contains_key(&unordered_pair(from, to)) {
            Some(Rule::Duplicate)
        } else {
            kind_rule(source, target)
        };
        match rule {
            Some(rule) => Err(ControllerError::InvalidConnection { from, to, rule }),
            None => Ok(()),
        }
    }

    fn kind_of(&self, id: NeuronId) -> Result<NeuronKind> {
        self.neuron(id)
            .map(|n| n.kind)
            .ok_or(ControllerError::UnknownNeuron(id))
    }

    fn neuron_key(&self, id: NeuronId) -> Option<NeuronKey> {
        self.neuron_keys.get(&id).copied()
    }

    fn connection_key(&self, from: NeuronId, to: NeuronId) -> Option<ConnectionKey> {
        self.connection_keys
            .get(&unordered_pair(from, to))
            .copied()
            .filter(|&key| self.connections[key].source == from)
    }

    fn insert_neuron(&mut self, neuron: Neuron) {
        observe_neuron_id(neuron.id);
        let id = neuron.id;
        let key = self.neurons.insert(neuron);
        self.neuron_keys.insert(id, key);
    }

    fn insert_connection(&mut self, conn: Connection) -> ConnectionKey {
        let pair = conn.pair();
        let key = self.connections.insert(conn);
        self.connection_keys.insert(pair, key);
        key
    }

    fn remove_connection_at(&mut self, key: ConnectionKey) -> Option<Connection> {
        let conn = self.connections.remove(key)?;
        self.connection_keys.remove(&conn.pair());
        Some(conn)
    }
}

impl From<Genome> for GenomeRecord {
    fn from(genome: Genome) -> Self {
        let mut neurons: Vec<Neuron> = genome.neurons.into_iter().map(|(_, n)| n).collect();
        neurons.sort_by_key(|n| n.id);
        let mut connections: Vec<Connection> =
            genome.connections.into_iter().map(|(_, c)| c).collect();
        connections.sort_by_key(|c| (c.source, c.target));
        Self {
            id: genome.id,
            lineage: genome.lineage,
            neurons,
            connections,
        }
    }
}

impl TryFrom<GenomeRecord> for Genome {
    type Error = ControllerError;

    fn try_from(record: GenomeRecord) -> Result<Self> {
        if let Err(err) = validator::validate(&record.neurons, &record.connections) {
            warn!(genome = %record.id, error = %err, "rejected genome record");
            return Err(err);
        }
        Ok(Self::from_trusted(
            record.id,
            record.lineage,
            record.neurons,
            record.connections,
        ))
    }
}
