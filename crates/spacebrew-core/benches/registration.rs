//! Registration parsing benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spacebrew_core::{parse_registration, Channel, ClientDescriptor};

const STRUCTURED: &str = "ExampleClient_3f9a2c, An example client with multiple publishers and subscribers, \
     pubs(button:boolean, slider:range, text_out:string), subs(led:boolean, display:string, servo:range)";

const LEGACY: &str = "VirtualLight, A light bulb, switch, brightness";

fn structured_benchmark(c: &mut Criterion) {
    c.bench_function("parse_structured_registration", |b| {
        b.iter(|| black_box(parse_registration(black_box(STRUCTURED)).unwrap()))
    });
}

fn legacy_benchmark(c: &mut Criterion) {
    c.bench_function("parse_legacy_registration", |b| {
        b.iter(|| black_box(parse_registration(black_box(LEGACY)).unwrap()))
    });
}

fn announcement_benchmark(c: &mut Criterion) {
    let mut client = ClientDescriptor::new("Panel", "Control panel");
    for i in 0..16 {
        client = client
            .with_publisher(Channel::new(format!("fader{}", i), "range"))
            .with_subscriber(Channel::new(format!("meter{}", i), "range"));
    }

    c.bench_function("render_and_parse_announcement", |b| {
        b.iter(|| black_box(parse_registration(&client.announcement()).unwrap()))
    });
}

criterion_group!(
    benches,
    structured_benchmark,
    legacy_benchmark,
    announcement_benchmark
);
criterion_main!(benches);
