use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use std::hint::black_box;

use pssa::callback::{NoopProgressCallback, NoopReactionCallback};
use pssa::config::{GridConfig, InitialPopulation, Method, SimulationConfig};
use pssa::kernel::Simulation;
use pssa::rng::DefaultRng;
use pssa::{Network, SpeciesTerm};

fn decay_network() -> Network {
    let mut net = Network::new();
    let a = net.add_species("A", 1_000);
    let b = net.add_species("B", 0);
    net.add_reaction(0.3, &[SpeciesTerm::new(a, 1)], &[SpeciesTerm::new(b, 1)])
        .unwrap();
    net
}

fn dimerisation_network() -> Network {
    let mut net = Network::new();
    let a = net.add_species("A", 500);
    let a2 = net.add_species("A2", 0);
    net.add_reaction(
        0.01,
        &[SpeciesTerm::new(a, 1), SpeciesTerm::new(a, 1)],
        &[SpeciesTerm::new(a2, 1)],
    )
    .unwrap();
    net.add_reaction(1.0, &[SpeciesTerm::new(a2, 1)], &[SpeciesTerm::new(a, 1), SpeciesTerm::new(a, 1)])
        .unwrap();
    net
}

fn run(net: &Network, method: Method, samples_total: usize) {
    let grid = GridConfig::single_subvolume();
    let config = SimulationConfig {
        time_end: 20.0,
        samples_total,
        method,
        initial_population: InitialPopulation::Default,
        ..SimulationConfig::default()
    };
    let sim = Simulation::new(net, &grid, &config);
    let mut rng = DefaultRng::seed_from_u64(black_box(0));
    sim.run(&mut rng, NoopReactionCallback, NoopProgressCallback, None, None)
        .unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    let decay = decay_network();
    c.bench_function("decay, DM", |b| b.iter(|| run(&decay, Method::Dm, 10)));
    c.bench_function("decay, PDM", |b| b.iter(|| run(&decay, Method::Pdm, 10)));
    c.bench_function("decay, PSSA-CR", |b| {
        b.iter(|| run(&decay, Method::PssaCr, 10))
    });

    let dimers = dimerisation_network();
    c.bench_function("dimerisation, DM", |b| b.iter(|| run(&dimers, Method::Dm, 10)));
    c.bench_function("dimerisation, PSSA-CR", |b| {
        b.iter(|| run(&dimers, Method::PssaCr, 10))
    });
}

criterion_group! {
    name = benches; config = Criterion::default().sample_size(10); targets = criterion_benchmark
}
criterion_main!(benches);
