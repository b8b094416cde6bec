//! Foraging example: evolve controllers that steer critters toward food.
//!
//! Each critter senses its distance and bearing to a food pellet at the
//! origin and drives two actuators, `turn` and `speed`. After every episode
//! the closest half breeds and the rest is culled.
//!
//! Run with: `RUST_LOG=critter_neat=debug cargo run --example foraging`

use std::f64::consts::PI;

use critter_neat::{
    AgentKey, ConnectionTuple, ControllerConfig, ControllerRuntime, GenomePayload, NeuronId,
    NeuronKind, NeuronTuple,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use slotmap::SecondaryMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

const POPULATION: usize = 40;
const GENERATIONS: usize = 30;
const TICKS_PER_EPISODE: usize = 60;

#[derive(Debug, Clone, Copy)]
struct Critter {
    x: f64,
    y: f64,
    heading: f64,
}

impl Critter {
    fn spawn<R: Rng>(rng: &mut R) -> Self {
        let angle = rng.random::<f64>() * 2.0 * PI;
        Self {
            x: 10.0 * angle.cos(),
            y: 10.0 * angle.sin(),
            heading: rng.random::<f64>() * 2.0 * PI,
        }
    }

    fn distance(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Bearing of the food relative to the heading, in [-1, 1].
    fn bearing(&self) -> f64 {
        let to_food = (-self.y).atan2(-self.x);
        let mut delta = to_food - self.heading;
        while delta > PI {
            delta -= 2.0 * PI;
        }
        while delta < -PI {
            delta += 2.0 * PI;
        }
        delta / PI
    }

    fn sense(&self, label: &str) -> f64 {
        match label {
            "food-distance" => (self.distance() / 10.0).min(1.0),
            "food-bearing" => self.bearing(),
            _ => 0.0,
        }
    }

    fn step(&mut self, turn: f64, speed: f64) {
        self.heading += turn * 0.3;
        let speed = (speed + 1.0) * 0.25;
        self.x += self.heading.cos() * speed;
        self.y += self.heading.sin() * speed;
    }
}

/// The seed genome, as the editor would submit it.
fn seed_payload() -> GenomePayload {
    let distance = NeuronTuple::new(NeuronId(1), "food-distance", NeuronKind::Sensor);
    let bearing = NeuronTuple::new(NeuronId(2), "food-bearing", NeuronKind::Sensor);
    let turn = NeuronTuple::new(NeuronId(10), "turn", NeuronKind::Actuator);
    let speed = NeuronTuple::new(NeuronId(11), "speed", NeuronKind::Actuator);
    let bias = NeuronTuple::new(NeuronId(30), "bias", NeuronKind::Bias);

    let link = |source: &NeuronTuple, target: &NeuronTuple, weight: &str| ConnectionTuple {
        source: source.clone(),
        target: target.clone(),
        weight_text: weight.to_owned(),
    };

    GenomePayload {
        connections: vec![
            link(&bearing, &turn, "0.1"),
            link(&distance, &speed, "0.1"),
            link(&bias, &speed, "0.0"),
        ],
        sensors: vec![distance, bearing],
        actuators: vec![turn, speed],
        bias: vec![bias],
        hidden: vec![],
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ControllerConfig::from_json_str(
        r#"{"mutation": {"add_connection_prob": 0.3, "add_neuron_prob": 0.1}}"#,
    )?;
    let mut runtime = ControllerRuntime::new(config)?;
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let seed = seed_payload().into_genome()?;
    for _ in 0..POPULATION {
        let key = runtime.spawn(seed.duplicate())?;
        runtime.mutate_agent(key, &mut rng)?;
    }

    for generation in 0..GENERATIONS {
        let mut world: SecondaryMap<AgentKey, Critter> = SecondaryMap::new();
        for key in runtime.keys() {
            world.insert(key, Critter::spawn(&mut rng));
        }

        for _ in 0..TICKS_PER_EPISODE {
            let actuations = runtime.tick(|agent, label| {
                world.get(agent).map_or(0.0, |critter| critter.sense(label))
            });
            for actuation in actuations {
                if let Some(critter) = world.get_mut(actuation.agent) {
                    critter.step(
                        actuation.get("turn").unwrap_or(0.0),
                        actuation.get("speed").unwrap_or(0.0),
                    );
                }
            }
        }

        // Rank by final distance to the food, closest first.
        let mut ranked: Vec<(AgentKey, f64)> =
            world.iter().map(|(key, critter)| (key, critter.distance())).collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = ranked.first().map_or(f64::NAN, |r| r.1);
        let mean = ranked.iter().map(|r| r.1).sum::<f64>() / ranked.len() as f64;
        info!(generation, best, mean, "episode finished");

        let (survivors, culled) = ranked.split_at(ranked.len() / 2);
        for &(key, _) in culled {
            runtime.despawn(key)?;
        }
        let survivors: Vec<(AgentKey, f64)> = survivors.to_vec();
        while runtime.len() < POPULATION {
            let (a, fa) = survivors[rng.random_range(0..survivors.len())];
            let (b, fb) = survivors[rng.random_range(0..survivors.len())];
            // Closer is fitter.
            runtime.reproduce(a, b, Some((-fa, -fb)), &mut rng)?;
        }
    }

    if let Some(key) = runtime.keys().next() {
        if let Some(genome) = runtime.genome(key) {
            info!(
                neurons = genome.neuron_count(),
                connections = genome.enabled_connection_count(),
                "sample controller"
            );
            println!("{}", serde_json::to_string_pretty(genome)?);
        }
    }
    Ok(())
}
