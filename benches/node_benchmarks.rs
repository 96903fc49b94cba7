use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gleichklang::capability::CapabilityCache;
use gleichklang::faker::fake_constant_source_node;
use gleichklang::host::{HostContext, Quirks, SoftwareHost};
use gleichklang::node::{AudioNode, AudioScheduledSourceNode, Destination};
use gleichklang::options::ConstantSourceOptions;
use gleichklang::primitive::create_native_constant_source_node;

fn context(quirks: Quirks) -> HostContext {
    HostContext::new(SoftwareHost::new(48000.0).with_quirks(quirks))
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("ConstantSource native, 1 quantum", |b| {
        let context = context(Quirks::conformant());
        let node = create_native_constant_source_node(&context, &ConstantSourceOptions::default()).unwrap();
        node.connect(Destination::node(&context.destination()), 0).unwrap();
        node.start(0.0).unwrap();

        b.iter(|| context.advance(black_box(1)).unwrap())
    });

    c.bench_function("ConstantSource faked, 1 quantum", |b| {
        let context = context(Quirks::legacy());
        let cache = CapabilityCache::new();
        let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
        node.connect(Destination::node(&context.destination()), 0).unwrap();
        node.start(0.0).unwrap();

        b.iter(|| context.advance(black_box(1)).unwrap())
    });

    c.bench_function("fake_constant_source_node()", |b| {
        let context = context(Quirks::legacy());
        let cache = CapabilityCache::new();

        b.iter(|| fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
