//! Compiled controller and its evaluator.
//!
//! A [`Phenome`] is the disposable, evaluation-ready form of a [`Genome`]. It
//! holds one deterministic topological order and the enabled edges in CSR
//! form. Evaluation takes `&self`, so one phenome can be read by any number of
//! worker threads at once; per-call state lives in a caller-owned scratch
//! buffer and nothing survives from one tick to the next.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::activation::{squash, BIAS_ACTIVATION};
use crate::error::{ControllerError, Result};
use crate::gene::{NeuronId, NeuronKind};
use crate::genome::Genome;
use crate::innovation::GenomeId;
use crate::topology::GraphTopology;

/// A compiled, evaluation-ready representation of a genome.
#[derive(Debug, Clone)]
pub struct Phenome {
    genome_id: GenomeId,
    /// Dense index -> NeuronId, ascending.
    ids: Vec<NeuronId>,
    kinds: Vec<NeuronKind>,
    labels: Vec<Arc<str>>,
    /// Topological order over every neuron.
    order: Vec<usize>,
    /// Hidden and actuator neurons, in topological order.
    eval_order: Vec<usize>,
    // CSR format for incoming connections.
    // For node i, incoming connections are at indices [csr_offsets[i]..csr_offsets[i+1]).
    csr_offsets: Vec<usize>,
    csr_sources: Vec<usize>,
    csr_weights: Vec<f64>,
    /// `(source, target) -> weight` for every enabled edge.
    weights: BTreeMap<(NeuronId, NeuronId), f64>,
    sensor_indices: Vec<usize>,
    actuator_indices: Vec<usize>,
    bias_indices: Vec<usize>,
}

impl Phenome {
    /// Compile a genome.
    ///
    /// The genome is re-validated first; callers that only edit genomes through
    /// [`Genome`]'s methods never see an error here.
    ///
    /// # Errors
    ///
    /// Whatever [`Genome::validate`] reports, or [`ControllerError::CyclicGenome`].
    pub fn compile(genome: &Genome) -> Result<Self> {
        genome.validate()?;

        let topo = GraphTopology::from_genome(genome);
        let order = topo
            .topological_order()
            .ok_or(ControllerError::CyclicGenome)?;

        let neurons = genome.sorted_neurons();
        let ids: Vec<NeuronId> = neurons.iter().map(|n| n.id).collect();
        let kinds: Vec<NeuronKind> = neurons.iter().map(|n| n.kind).collect();
        let labels: Vec<Arc<str>> = neurons.iter().map(|n| Arc::from(n.label.as_str())).collect();

        let indices_of = |kind: NeuronKind| -> Vec<usize> {
            kinds
                .iter()
                .enumerate()
                .filter(|&(_, &k)| k == kind)
                .map(|(idx, _)| idx)
                .collect()
        };
        let sensor_indices = indices_of(NeuronKind::Sensor);
        let actuator_indices = indices_of(NeuronKind::Actuator);
        let bias_indices = indices_of(NeuronKind::Bias);

        let eval_order: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&idx| matches!(kinds[idx], NeuronKind::Hidden | NeuronKind::Actuator))
            .collect();

        let weights: BTreeMap<(NeuronId, NeuronId), f64> = genome
            .connections()
            .filter(|c| c.enabled)
            .map(|c| ((c.source, c.target), c.weight))
            .collect();

        let (csr_offsets, csr_sources, csr_weights) = topo.into_incoming_csr();

        Ok(Self {
            genome_id: genome.id(),
            ids,
            kinds,
            labels,
            order,
            eval_order,
            csr_offsets,
            csr_sources,
            csr_weights,
            weights,
            sensor_indices,
            actuator_indices,
            bias_indices,
        })
    }

    /// Id of the genome this phenome was compiled from.
    #[must_use]
    pub fn genome_id(&self) -> GenomeId {
        self.genome_id
    }

    #[must_use]
    pub fn neuron_count(&self) -> usize {
        self.ids.len()
    }

    /// Number of enabled connections taking part in evaluation.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.csr_sources.len()
    }

    /// Evaluation order over every neuron.
    pub fn order(&self) -> impl Iterator<Item = NeuronId> + '_ {
        self.order.iter().map(|&idx| self.ids[idx])
    }

    /// Weight of the enabled edge `from -> to`.
    #[must_use]
    pub fn weight(&self, from: NeuronId, to: NeuronId) -> Option<f64> {
        self.weights.get(&(from, to)).copied()
    }

    /// Sensors as `(id, label)`, ascending by id.
    ///
    /// This is the order expected by [`evaluate_into`](Self::evaluate_into).
    pub fn sensors(&self) -> impl Iterator<Item = (NeuronId, &str)> + '_ {
        self.sensor_indices
            .iter()
            .map(|&idx| (self.ids[idx], &*self.labels[idx]))
    }

    /// Actuators as `(id, label)`, ascending by id.
    pub fn actuators(&self) -> impl Iterator<Item = (NeuronId, &str)> + '_ {
        self.actuator_indices
            .iter()
            .map(|&idx| (self.ids[idx], &*self.labels[idx]))
    }

    #[must_use]
    pub fn num_sensors(&self) -> usize {
        self.sensor_indices.len()
    }

    #[must_use]
    pub fn num_actuators(&self) -> usize {
        self.actuator_indices.len()
    }

    pub(crate) fn actuator_labels(&self) -> impl Iterator<Item = (NeuronId, &Arc<str>)> + '_ {
        self.actuator_indices
            .iter()
            .map(|&idx| (self.ids[idx], &self.labels[idx]))
    }

    /// Evaluate into a caller-owned scratch buffer.
    ///
    /// `sensor_inputs[i]` feeds the i-th sensor of [`sensors`](Self::sensors);
    /// missing trailing inputs read as 0.0 and extra ones are ignored. On
    /// return `activations` holds one value per neuron in dense (ascending id)
    /// order; read actuators with [`actuator_values`](Self::actuator_values).
    pub fn evaluate_into(&self, sensor_inputs: &[f64], activations: &mut Vec<f64>) {
        activations.clear();
        activations.resize(self.ids.len(), 0.0);

        for (i, &idx) in self.sensor_indices.iter().enumerate() {
            activations[idx] = sensor_inputs.get(i).copied().unwrap_or(0.0);
        }
        for &idx in &self.bias_indices {
            activations[idx] = BIAS_ACTIVATION;
        }

        // Forward propagation in topological order - O(N+E) using CSR format.
        for &node_idx in &self.eval_order {
            let start = self.csr_offsets[node_idx];
            let end = self.csr_offsets[node_idx + 1];
            let mut sum = 0.0;
            for i in start..end {
                sum += activations[self.csr_sources[i]] * self.csr_weights[i];
            }
            activations[node_idx] = squash(sum);
        }
    }

    /// Actuator `(id, value)` pairs from a buffer filled by
    /// [`evaluate_into`](Self::evaluate_into), ascending by id.
    pub fn actuator_values<'a>(
        &'a self,
        activations: &'a [f64],
    ) -> impl Iterator<Item = (NeuronId, f64)> + 'a {
        self.actuator_indices
            .iter()
            .map(move |&idx| (self.ids[idx], activations.get(idx).copied().unwrap_or(0.0)))
    }

    /// Evaluate the controller for one set of observations.
    ///
    /// Sensors absent from `sensor_values` read as 0.0; entries for non-sensor
    /// ids are ignored. Every neuron's activation is returned, although only
    /// actuators are meaningful to callers.
    #[must_use]
    pub fn evaluate(&self, sensor_values: &HashMap<NeuronId, f64>) -> BTreeMap<NeuronId, f64> {
        let inputs: Vec<f64> = self
            .sensor_indices
            .iter()
            .map(|&idx| sensor_values.get(&self.ids[idx]).copied().unwrap_or(0.0))
            .collect();

        let mut activations = Vec::with_capacity(self.ids.len());
        self.evaluate_into(&inputs, &mut activations);

        self.ids.iter().copied().zip(activations).collect()
    }

    /// Kind of the neuron with this id.
    #[must_use]
    pub fn kind(&self, id: NeuronId) -> Option<NeuronKind> {
        self.ids
            .binary_search(&id)
            .ok()
            .map(|idx| self.kinds[idx])
    }
}
