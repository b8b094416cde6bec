//! Error types for genome editing, compilation and breeding.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gene::{NeuronId, NeuronKind};

/// A structural legality rule of the control graph.
///
/// Rules are checked in the order of declaration; the first violated rule is
/// the one reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    /// `source == target`.
    SelfLoop,
    /// Another connection already joins the same unordered pair.
    Duplicate,
    /// Sensor feeding a sensor.
    SensorToSensor,
    /// Actuator feeding an actuator.
    ActuatorToActuator,
    /// Target is a source neuron: a sensor or a bias.
    IntoSource,
    /// Source is an actuator.
    FromActuator,
    /// The edge would close a directed cycle.
    Cycle,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::SelfLoop => "a neuron cannot connect to itself",
            Self::Duplicate => "the neurons are already connected",
            Self::SensorToSensor => "sensors cannot connect to sensors",
            Self::ActuatorToActuator => "actuators cannot connect to actuators",
            Self::IntoSource => "target cannot be a sensor or bias",
            Self::FromActuator => "source cannot be an actuator",
            Self::Cycle => "connection would create a cycle",
        };
        f.write_str(text)
    }
}

/// Errors raised by controller operations.
///
/// Every variant is recoverable: the operation that raised it leaves its
/// input unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    /// The edge `from -> to` violates a legality rule.
    #[error("invalid connection {from} -> {to}: {rule}")]
    InvalidConnection {
        from: NeuronId,
        to: NeuronId,
        rule: Rule,
    },
    #[error("unknown neuron {0}")]
    UnknownNeuron(NeuronId),
    #[error("neuron {0} already exists")]
    DuplicateNeuron(NeuronId),
    #[error("no connection {from} -> {to}")]
    UnknownConnection { from: NeuronId, to: NeuronId },
    /// Weight text from the editor is not a signed decimal.
    #[error("malformed weight {text:?}: expected a signed decimal")]
    MalformedWeight { text: String },
    /// A neuron is referenced with a kind different from its declaration.
    #[error("neuron {id} is declared as {declared} but referenced as {referenced}")]
    KindMismatch {
        id: NeuronId,
        declared: NeuronKind,
        referenced: NeuronKind,
    },
    /// The enabled graph has no topological order.
    #[error("genome contains cycles; feedforward evaluation requires an acyclic graph")]
    CyclicGenome,
    #[error("incompatible parents: {reason}")]
    IncompatibleParents { reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown agent")]
    UnknownAgent,
}

impl ControllerError {
    /// The violated rule, if this is an [`InvalidConnection`](Self::InvalidConnection).
    #[must_use]
    pub fn rule(&self) -> Option<Rule> {
        match self {
            Self::InvalidConnection { rule, .. } => Some(*rule),
            _ => None,
        }
    }
}

pub type Result<T, E = ControllerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_connection_display_names_edge_and_rule() {
        let err = ControllerError::InvalidConnection {
            from: NeuronId(3),
            to: NeuronId(1),
            rule: Rule::Cycle,
        };
        let msg = err.to_string();
        assert!(msg.contains("n3 -> n1"), "{msg}");
        assert!(msg.contains("cycle"), "{msg}");
        assert_eq!(err.rule(), Some(Rule::Cycle));
    }

    #[test]
    fn test_rule_accessor_on_other_variants() {
        assert_eq!(ControllerError::UnknownNeuron(NeuronId(9)).rule(), None);
    }
}
