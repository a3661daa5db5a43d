use criterion::{
    BenchmarkGroup, Criterion, Throughput, black_box, criterion_group, criterion_main,
    measurement::WallTime,
};
use dtnsim_core::{
    host::HostId,
    network::Network,
    router::{Router, RouterConfig, chooser::ChooserKind},
};
use std::time::Duration;

const MESSAGE_SIZE: u64 = 10 * 1_024;
const STEP: Duration = Duration::from_millis(100);

fn populate(network: &mut Network, prototype: &Router, size: usize) -> Vec<HostId> {
    let hosts: Vec<HostId> = (0..size).map(|_| network.new_host(prototype).build()).collect();

    // every host creates one message for each other host
    for sender in hosts.iter().copied() {
        for receiver in hosts.iter().copied().filter(|id| id != &sender) {
            let message = network
                .new_message()
                .from(sender)
                .to(receiver)
                .size(MESSAGE_SIZE)
                .build()
                .unwrap();
            network.create_message(message).unwrap();
        }
    }
    hosts
}

fn contact(c: &mut Criterion) {
    let prototype = Router::new(RouterConfig::default()).unwrap();
    let mut network = Network::new();
    let hosts = populate(&mut network, &prototype, 20);

    c.bench_function("contact", |b| {
        b.iter(|| {
            network.connect(hosts[0], black_box(hosts[1])).apply().unwrap();
            network.disconnect(hosts[0], hosts[1]).unwrap();
        })
    });
}

fn bench_advance_size(group: &mut BenchmarkGroup<'_, WallTime>, chooser: ChooserKind, size: usize) {
    let prototype = Router::new(RouterConfig {
        chooser,
        ..RouterConfig::default()
    })
    .unwrap();
    let mut network = Network::new();
    let hosts = populate(&mut network, &prototype, size);

    // a chain of contacts, so most messages are relayed
    for pair in hosts.windows(2) {
        network.connect(pair[0], pair[1]).apply().unwrap();
    }

    group.throughput(Throughput::Elements(size as u64));
    group.bench_function(format!("{chooser:?}/{size}"), |b| {
        b.iter(|| network.advance_with(black_box(STEP), |_| ()).unwrap())
    });
}

fn advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");

    for chooser in [ChooserKind::Epidemic, ChooserKind::Utility] {
        for size in [10, 50, 100] {
            bench_advance_size(&mut group, chooser, size);
        }
    }

    group.finish();
}

criterion_group!(benches, contact, advance);
criterion_main!(benches);
