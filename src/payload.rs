//! Genome construction from the editor's payload.
//!
//! The editor groups the neurons it placed by kind and lists the drawn
//! connections with the weight still as text, exactly as typed. Parsing the
//! text is a separate, recoverable failure from graph legality.

use serde::{Deserialize, Serialize};

use crate::error::{ControllerError, Result};
use crate::gene::{Connection, Neuron, NeuronId, NeuronKind};
use crate::genome::Genome;

/// A neuron as the editor describes it: `(id, label, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuronTuple {
    pub id: NeuronId,
    pub label: String,
    pub kind: NeuronKind,
}

impl NeuronTuple {
    #[must_use]
    pub fn new(id: NeuronId, label: impl Into<String>, kind: NeuronKind) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
        }
    }
}

/// A drawn connection: `(source, target, weight_text)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTuple {
    pub source: NeuronTuple,
    pub target: NeuronTuple,
    pub weight_text: String,
}

/// Everything the editor submits when the user releases an organism.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomePayload {
    #[serde(default)]
    pub sensors: Vec<NeuronTuple>,
    #[serde(default)]
    pub actuators: Vec<NeuronTuple>,
    #[serde(default)]
    pub hidden: Vec<NeuronTuple>,
    #[serde(default)]
    pub bias: Vec<NeuronTuple>,
    #[serde(default)]
    pub connections: Vec<ConnectionTuple>,
}

impl GenomePayload {
    /// Convert the payload into a validated genome.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::KindMismatch`] if a tuple sits in the wrong group or a
    ///   connection endpoint disagrees with the declared neuron.
    /// - [`ControllerError::MalformedWeight`] if a weight text does not parse.
    /// - Any error of [`Genome::from_parts`].
    pub fn into_genome(self) -> Result<Genome> {
        let groups = [
            (NeuronKind::Sensor, self.sensors),
            (NeuronKind::Actuator, self.actuators),
            (NeuronKind::Hidden, self.hidden),
            (NeuronKind::Bias, self.bias),
        ];

        let mut neurons = Vec::new();
        for (group, tuples) in groups {
            for tuple in tuples {
                if tuple.kind != group {
                    return Err(ControllerError::KindMismatch {
                        id: tuple.id,
                        declared: group,
                        referenced: tuple.kind,
                    });
                }
                neurons.push(Neuron::new(tuple.id, tuple.kind, tuple.label));
            }
        }

        let mut connections = Vec::with_capacity(self.connections.len());
        for tuple in &self.connections {
            for end in [&tuple.source, &tuple.target] {
                let declared = neurons
                    .iter()
                    .find(|n| n.id == end.id)
                    .ok_or(ControllerError::UnknownNeuron(end.id))?;
                if declared.kind != end.kind {
                    return Err(ControllerError::KindMismatch {
                        id: end.id,
                        declared: declared.kind,
                        referenced: end.kind,
                    });
                }
            }
            let weight = parse_weight(&tuple.weight_text)?;
            connections.push(Connection::new(tuple.source.id, tuple.target.id, weight));
        }

        Genome::from_parts(neurons, connections)
    }
}

impl TryFrom<GenomePayload> for Genome {
    type Error = ControllerError;

    fn try_from(payload: GenomePayload) -> Result<Self> {
        payload.into_genome()
    }
}

/// Parse a signed decimal such as `"0"`, `"-1.5"`, `"+.25"` or `"3."`.
///
/// Surrounding whitespace is ignored. Exponents, `inf` and `nan` are rejected,
/// as is a decimal too large for a finite `f64`. The magnitude is not clamped.
///
/// # Errors
///
/// [`ControllerError::MalformedWeight`] carrying the original text.
pub fn parse_weight(text: &str) -> Result<f64> {
    let malformed = || ControllerError::MalformedWeight {
        text: text.to_owned(),
    };

    let trimmed = text.trim();
    let unsigned = trimmed
        .strip_prefix(['+', '-'])
        .unwrap_or(trimmed);

    let mut digits = 0usize;
    let mut dots = 0usize;
    for ch in unsigned.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return Err(malformed()),
        }
    }
    if digits == 0 || dots > 1 {
        return Err(malformed());
    }

    trimmed
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite())
        .ok_or_else(malformed)
}
