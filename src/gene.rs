//! Gene types for controller genomes.
//!
//! This module defines the fundamental building blocks of a control graph:
//! - [`Neuron`]: a sensor, actuator, hidden or bias unit
//! - [`Connection`]: a weighted directed edge between two neurons

use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Arena slot of a neuron inside one genome.
    ///
    /// Slots are local to a genome; use [`NeuronId`] for identity across genomes.
    pub struct NeuronKey;

    /// Arena slot of a connection inside one genome.
    pub struct ConnectionKey;
}

/// Durable identity of a neuron.
///
/// Two neurons from different genomes with the same id are homologous: crossover
/// aligns them as the same gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeuronId(pub u64);

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The role of a neuron in the control graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NeuronKind {
    /// Receives an external observation. Never has incoming connections.
    Sensor,
    /// Exposes a control output. Never has outgoing connections.
    Actuator,
    /// Internal computation, usually inserted by a split mutation.
    Hidden,
    /// Constant 1.0 source. Never has incoming connections.
    Bias,
}

impl fmt::Display for NeuronKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sensor => "sensor",
            Self::Actuator => "actuator",
            Self::Hidden => "hidden",
            Self::Bias => "bias",
        };
        f.write_str(name)
    }
}

/// A neuron gene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neuron {
    /// Identity used for genetic alignment.
    pub id: NeuronId,
    /// Role in the graph.
    pub kind: NeuronKind,
    /// Semantic name of the sensor or actuator (e.g. `"nearest-food-distance"`).
    /// Carries no meaning for hidden and bias neurons.
    pub label: String,
}

impl Neuron {
    /// Create a neuron with an explicit id.
    #[must_use]
    pub fn new(id: NeuronId, kind: NeuronKind, label: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
        }
    }

    /// Create a sensor neuron.
    #[must_use]
    pub fn sensor(id: NeuronId, label: impl Into<String>) -> Self {
        Self::new(id, NeuronKind::Sensor, label)
    }

    /// Create an actuator neuron.
    #[must_use]
    pub fn actuator(id: NeuronId, label: impl Into<String>) -> Self {
        Self::new(id, NeuronKind::Actuator, label)
    }

    /// Create a hidden neuron.
    #[must_use]
    pub fn hidden(id: NeuronId) -> Self {
        Self::new(id, NeuronKind::Hidden, "hidden")
    }

    /// Create a bias neuron.
    #[must_use]
    pub fn bias(id: NeuronId) -> Self {
        Self::new(id, NeuronKind::Bias, "bias")
    }
}

/// A connection gene: a weighted edge `source -> target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Upstream neuron.
    pub source: NeuronId,
    /// Downstream neuron.
    pub target: NeuronId,
    /// Edge weight. Unconstrained; extreme values are a modelling choice.
    pub weight: f64,
    /// Disabled connections are skipped during evaluation but preserved for crossover.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Connection {
    /// Create a new enabled connection.
    #[must_use]
    pub fn new(source: NeuronId, target: NeuronId, weight: f64) -> Self {
        Self {
            source,
            target,
            weight,
            enabled: true,
        }
    }

    /// Create a disabled connection.
    #[must_use]
    pub fn disabled(source: NeuronId, target: NeuronId, weight: f64) -> Self {
        Self {
            enabled: false,
            ..Self::new(source, target, weight)
        }
    }

    /// The unordered endpoint pair, smaller id first.
    ///
    /// An edge and its reverse share the same pair.
    #[inline]
    #[must_use]
    pub fn pair(&self) -> (NeuronId, NeuronId) {
        unordered_pair(self.source, self.target)
    }

    /// Whether this connection touches `id` at either end.
    #[inline]
    #[must_use]
    pub fn touches(&self, id: NeuronId) -> bool {
        self.source == id || self.target == id
    }
}

/// Order two endpoints so that `(a, b)` and `(b, a)` map to the same key.
#[inline]
#[must_use]
pub fn unordered_pair(a: NeuronId, b: NeuronId) -> (NeuronId, NeuronId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
