//! Benchmarks for critter-neat.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use critter_neat::{
    crossover, mutate, Connection, ControllerRuntime, CrossoverConfig, Genome, MutationConfig,
    Neuron, NeuronId, Phenome,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn seed_genome() -> Genome {
    let sensors: Vec<Neuron> = (1..=6)
        .map(|i| Neuron::sensor(NeuronId(i), format!("sensor-{i}")))
        .collect();
    let actuators: Vec<Neuron> = (10..=12)
        .map(|i| Neuron::actuator(NeuronId(i), format!("actuator-{i}")))
        .collect();
    let mut connections = Vec::new();
    for s in &sensors {
        for a in &actuators {
            connections.push(Connection::new(s.id, a.id, 0.1 * (s.id.0 as f64) - 0.3));
        }
    }
    let mut neurons = sensors;
    neurons.extend(actuators);
    neurons.push(Neuron::bias(NeuronId(30)));
    Genome::from_parts(neurons, connections).expect("seed genome is legal")
}

fn grown_genome(rng: &mut ChaCha8Rng) -> Genome {
    let config = MutationConfig::structural();
    let mut genome = seed_genome();
    for _ in 0..30 {
        genome = mutate(&genome, &config, rng).0;
    }
    genome
}

fn bench_mutation(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&mut rng);
    let config = MutationConfig::structural();

    c.bench_function("genome_mutation", |b| {
        b.iter(|| black_box(mutate(&genome, &config, &mut rng)));
    });
}

fn bench_crossover(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let parent1 = grown_genome(&mut rng);
    let parent2 = grown_genome(&mut rng);
    let config = CrossoverConfig::default();

    c.bench_function("genome_crossover", |b| {
        b.iter(|| black_box(crossover(&parent1, &parent2, None, &config, &mut rng)));
    });
}

fn bench_compile_and_evaluate(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&mut rng);

    c.bench_function("phenome_compile", |b| {
        b.iter(|| black_box(Phenome::compile(&genome)));
    });

    let phenome = Phenome::compile(&genome).expect("grown genome compiles");
    let inputs = [0.1, -0.2, 0.3, -0.4, 0.5, -0.6];
    let mut scratch = Vec::new();
    c.bench_function("phenome_evaluate_into", |b| {
        b.iter(|| {
            phenome.evaluate_into(black_box(&inputs), &mut scratch);
            black_box(&scratch);
        });
    });
}

fn bench_runtime_tick(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut runtime = ControllerRuntime::default();
    for _ in 0..1000 {
        runtime
            .spawn(grown_genome(&mut rng))
            .expect("grown genome compiles");
    }

    c.bench_function("runtime_tick_1000_agents", |b| {
        b.iter(|| black_box(runtime.tick(|_, label| label.len() as f64 * 0.01)));
    });
}

criterion_group!(
    benches,
    bench_mutation,
    bench_crossover,
    bench_compile_and_evaluate,
    bench_runtime_tick,
);
criterion_main!(benches);
