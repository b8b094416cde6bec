//! Integration tests for critter-neat.

use std::collections::HashMap;

use critter_neat::{
    crossover, mutate, mutate_seeded, squash, Connection, ControllerConfig, ControllerError,
    ControllerRuntime, CrossoverConfig, Genome, GenomePayload, GenomeRecord, MutationConfig,
    Neuron, NeuronId, NeuronKind, NeuronTuple, Phenome, Rule,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const S1: NeuronId = NeuronId(1);
const S2: NeuronId = NeuronId(2);
const A1: NeuronId = NeuronId(10);
const A2: NeuronId = NeuronId(11);
const H1: NeuronId = NeuronId(20);
const B1: NeuronId = NeuronId(30);

fn interface() -> Vec<Neuron> {
    vec![
        Neuron::sensor(S1, "food-distance"),
        Neuron::sensor(S2, "food-angle"),
        Neuron::actuator(A1, "turn"),
        Neuron::actuator(A2, "speed"),
        Neuron::bias(B1),
    ]
}

fn seed_genome() -> Genome {
    Genome::from_parts(
        interface(),
        vec![Connection::new(S1, A1, 1.0), Connection::new(B1, A1, 0.5)],
    )
    .unwrap()
}

fn record(genome: &Genome) -> GenomeRecord {
    GenomeRecord::from(genome.clone())
}

/// Grow a population of structurally diverse genomes from one seed.
fn population(size: usize, rng: &mut ChaCha8Rng) -> Vec<Genome> {
    let config = MutationConfig::structural();
    (0..size)
        .map(|_| {
            let mut genome = seed_genome();
            for _ in 0..rng.random_range(5..25) {
                genome = mutate(&genome, &config, rng).0;
            }
            genome
        })
        .collect()
}

#[test]
fn test_bias_scenario_evaluates_to_squash_one_point_five() {
    let phenome = Phenome::compile(&seed_genome()).unwrap();
    let inputs = HashMap::from([(S1, 1.0), (S2, 0.0)]);
    let out = phenome.evaluate(&inputs);
    assert_eq!(out[&A1], squash(1.5));
}

#[test]
fn test_actuator_to_sensor_rejected() {
    let mut genome = seed_genome();
    let before = record(&genome);
    let err = genome.add_connection(A1, S1, 1.0).unwrap_err();
    assert!(matches!(
        err.rule(),
        Some(Rule::IntoSource | Rule::FromActuator)
    ));
    assert_eq!(record(&genome), before);
}

#[test]
fn test_back_edge_from_actuator_rejected() {
    let mut neurons = interface();
    neurons.push(Neuron::hidden(H1));
    let mut genome = Genome::from_parts(
        neurons,
        vec![Connection::new(S1, H1, 1.0), Connection::new(H1, A1, 1.0)],
    )
    .unwrap();

    // The pair is already used by H1 -> A1.
    let err = genome.add_connection(A1, H1, 1.0).unwrap_err();
    assert_eq!(err.rule(), Some(Rule::Duplicate));

    // Without the duplicate, the actuator rule fires before the cycle check.
    genome.remove_connection(H1, A1).unwrap();
    let err = genome.add_connection(A1, H1, 1.0).unwrap_err();
    assert_eq!(err.rule(), Some(Rule::FromActuator));

    // Both rules agree: the validator sees the cycle on its own too.
    genome.add_connection(H1, A1, 1.0).unwrap();
    assert!(genome.index().would_create_cycle(A1, H1));
}

#[test]
fn test_split_scenario_keeps_weight() {
    let mut genome = Genome::from_parts(interface(), vec![Connection::new(S1, A1, 2.0)]).unwrap();
    let hidden = genome.split_connection(S1, A1).unwrap();

    let upstream = genome.connection(S1, hidden).unwrap();
    let downstream = genome.connection(hidden, A1).unwrap();
    assert!(upstream.weight == 2.0 || downstream.weight == 2.0);
    assert!(!genome.has_cycle());
    assert!(genome.validate().is_ok());

    let phenome = Phenome::compile(&genome).unwrap();
    let out = phenome.evaluate(&HashMap::from([(S1, 0.5)]));
    assert_eq!(out[&A1], squash(squash(0.5) * 2.0));
}

#[test]
fn test_duplicate_add_is_idempotent_failure() {
    let mut genome = Genome::from_parts(interface(), vec![]).unwrap();
    genome.add_connection(S2, A2, 0.3).unwrap();
    let before = record(&genome);
    let err = genome.add_connection(S2, A2, 0.3).unwrap_err();
    assert_eq!(
        err,
        ControllerError::InvalidConnection {
            from: S2,
            to: A2,
            rule: Rule::Duplicate
        }
    );
    assert_eq!(record(&genome), before);
}

#[test]
fn test_mutation_never_produces_invalid_genome() {
    let config = MutationConfig::structural();
    for seed in 0..50u64 {
        let mut genome = seed_genome();
        for step in 0..40u64 {
            genome = mutate_seeded(&genome, &config, seed * 1000 + step).0;
            assert!(genome.validate().is_ok(), "seed {seed} step {step}");
            assert!(!genome.has_cycle());
        }
    }
}

#[test]
fn test_crossover_never_produces_invalid_child() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let parents = population(24, &mut rng);
    let config = CrossoverConfig::default();

    for _ in 0..200 {
        let a = &parents[rng.random_range(0..parents.len())];
        let b = &parents[rng.random_range(0..parents.len())];
        let fitness = if rng.random::<bool>() {
            Some((rng.random::<f64>(), rng.random::<f64>()))
        } else {
            None
        };
        let (child, report) = crossover(a, b, fitness, &config, &mut rng).unwrap();
        assert!(child.validate().is_ok());
        assert!(!child.has_cycle());
        assert_eq!(
            child.connection_count() + report.dropped.len(),
            report.matched + report.inherited_disjoint
        );
        assert!(Phenome::compile(&child).is_ok());
    }
}

#[test]
fn test_compile_and_evaluate_are_deterministic() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for genome in population(10, &mut rng) {
        let first = Phenome::compile(&genome).unwrap();
        let second = Phenome::compile(&genome).unwrap();
        assert_eq!(first.order().collect::<Vec<_>>(), second.order().collect::<Vec<_>>());
        for conn in genome.connections().filter(|c| c.enabled) {
            assert_eq!(first.weight(conn.source, conn.target), Some(conn.weight));
            assert_eq!(
                first.weight(conn.source, conn.target),
                second.weight(conn.source, conn.target)
            );
        }

        let inputs = HashMap::from([(S1, 0.37), (S2, -0.81)]);
        let a = first.evaluate(&inputs);
        let b = first.evaluate(&inputs);
        assert_eq!(a, b);
        assert_eq!(a, second.evaluate(&inputs));
    }
}

#[test]
fn test_serialization_preserves_behavior() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for genome in population(5, &mut rng) {
        let json = serde_json::to_string(&genome).expect("Serialization failed");
        let restored: Genome = serde_json::from_str(&json).expect("Deserialization failed");
        assert_eq!(record(&genome), record(&restored));

        let inputs = HashMap::from([(S1, 0.2), (S2, 0.9)]);
        let original = Phenome::compile(&genome).unwrap().evaluate(&inputs);
        let reloaded = Phenome::compile(&restored).unwrap().evaluate(&inputs);
        assert_eq!(original, reloaded);
    }
}

#[test]
fn test_editor_payload_to_controller() {
    let json = r#"{
        "sensors": [{"id": 1, "label": "food-distance", "kind": "Sensor"}],
        "actuators": [{"id": 10, "label": "turn", "kind": "Actuator"}],
        "bias": [{"id": 30, "label": "bias", "kind": "Bias"}],
        "connections": [
            {
                "source": {"id": 1, "label": "food-distance", "kind": "Sensor"},
                "target": {"id": 10, "label": "turn", "kind": "Actuator"},
                "weight_text": "1.0"
            },
            {
                "source": {"id": 30, "label": "bias", "kind": "Bias"},
                "target": {"id": 10, "label": "turn", "kind": "Actuator"},
                "weight_text": "+0.5"
            }
        ]
    }"#;
    let payload: GenomePayload = serde_json::from_str(json).unwrap();
    assert_eq!(
        payload.sensors[0],
        NeuronTuple::new(S1, "food-distance", NeuronKind::Sensor)
    );
    let genome = payload.into_genome().unwrap();

    let mut runtime = ControllerRuntime::default();
    let key = runtime.spawn(genome).unwrap();
    let actuations = runtime.tick(|_, label| if label == "food-distance" { 1.0 } else { 0.0 });
    assert_eq!(actuations[0].agent, key);
    assert_eq!(actuations[0].get("turn"), Some(squash(1.5)));
}

#[test]
fn test_population_generations() {
    let config = ControllerConfig::from_json_str(
        r#"{"mutation": {"add_connection_prob": 0.4, "add_neuron_prob": 0.2}}"#,
    )
    .unwrap();
    let mut runtime = ControllerRuntime::new(config).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    for _ in 0..8 {
        runtime.spawn(seed_genome()).unwrap();
    }

    for _ in 0..5 {
        let keys: Vec<_> = runtime.keys().collect();
        for &key in &keys {
            runtime.mutate_agent(key, &mut rng).unwrap();
        }
        for pair in keys.chunks_exact(2) {
            runtime.reproduce(pair[0], pair[1], None, &mut rng).unwrap();
        }
        let actuations = runtime.tick(|_, _| 0.5);
        assert_eq!(actuations.len(), runtime.len());
        for actuation in &actuations {
            for reading in &actuation.readings {
                assert!(reading.value.is_finite());
                assert!(reading.value.abs() <= 1.0);
            }
        }
        // Keep the population bounded.
        let survivors: Vec<_> = runtime.keys().collect();
        for &key in survivors.iter().take(survivors.len() / 2) {
            runtime.despawn(key).unwrap();
        }
    }
    assert!(!runtime.is_empty());
}
