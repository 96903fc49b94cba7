use std::cell::Cell;
use std::rc::Rc;

use gleichklang::capability::{probes, CapabilityCache, STOP_METHOD_CONSECUTIVE_CALLS_SUPPORT};
use gleichklang::event::{Event, EventKind, ListenerOptions};
use gleichklang::faker::fake_constant_source_node;
use gleichklang::host::{HostContext, Quirks, SoftwareHost, RENDER_QUANTUM_SIZE};
use gleichklang::node::{
    AudioBufferSourceNode, AudioNode, AudioScheduledSourceNode, ConstantSourceNode, Destination,
    Disconnect,
};
use gleichklang::options::{AudioBufferSourceOptions, ConstantSourceOptions, GainOptions};
use gleichklang::primitive::{
    create_native_audio_buffer_source_node, create_native_constant_source_node,
    create_native_gain_node,
};
use gleichklang::wrapper::wrap_stop_method_consecutive_calls;
use gleichklang::ErrorKind;
use rtrb::{Consumer, RingBuffer};

const SAMPLE_RATE: f32 = 48000.0;
const EPSILON: f32 = 1e-6;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A mono context whose destination output lands in the returned consumer.
fn capturing_context(quirks: Quirks) -> (HostContext, Consumer<f32>) {
    init_tracing();
    let (producer, consumer) = RingBuffer::<f32>::new(RENDER_QUANTUM_SIZE * 4);
    let host = SoftwareHost::new(SAMPLE_RATE)
        .with_channels(1)
        .with_capture(producer)
        .with_quirks(quirks);
    (HostContext::new(host), consumer)
}

/// Render `secs` seconds and collect everything the destination produced.
fn play(context: &HostContext, consumer: &mut Consumer<f32>, secs: f64) -> Vec<f32> {
    let quanta = (secs * SAMPLE_RATE as f64 / RENDER_QUANTUM_SIZE as f64).round() as usize;
    let mut captured = Vec::with_capacity(quanta * RENDER_QUANTUM_SIZE);

    for _ in 0..quanta {
        context.advance(1).unwrap();
        while let Ok(sample) = consumer.pop() {
            captured.push(sample);
        }
    }
    captured
}

fn frame_at(secs: f64) -> usize {
    (secs * SAMPLE_RATE as f64).round() as usize
}

fn assert_all(samples: &[f32], expected: f32) {
    for (i, sample) in samples.iter().enumerate() {
        assert!(
            (sample - expected).abs() < EPSILON,
            "frame {i}: expected {expected}, got {sample}"
        );
    }
}

/// A looping source of ones.
fn looping_ones(context: &HostContext) -> AudioBufferSourceNode {
    let mut buffer = context.create_buffer(1, 2, SAMPLE_RATE).unwrap();
    buffer.fill(1.0);
    let options = AudioBufferSourceOptions::default()
        .with_buffer(buffer)
        .with_loop(true);
    create_native_audio_buffer_source_node(context, &options).unwrap()
}

#[test]
/// A faked constant source at 0.5 emits 0.5 at every frame
fn faked_constant_source_emits_offset() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();
    let options = ConstantSourceOptions::default().with_offset(0.5);

    let node = fake_constant_source_node(&context, &cache, &options).unwrap();
    node.connect(Destination::node(&context.destination()), 0).unwrap();
    node.start(0.0).unwrap();

    let samples = play(&context, &mut consumer, 0.1);
    assert_eq!(samples.len(), frame_at(0.1));
    assert_all(&samples, 0.5);
}

#[test]
/// Without an offset the faked source emits the native default of 1
fn faked_constant_source_defaults_to_one() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
    node.connect(Destination::node(&context.destination()), 0).unwrap();
    node.start(0.0).unwrap();

    assert_all(&play(&context, &mut consumer, 0.05), 1.0);
}

#[test]
/// Nothing is heard before start time
fn faked_constant_source_honours_start_time() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
    node.connect(Destination::node(&context.destination()), 0).unwrap();
    node.start(0.5).unwrap();

    let samples = play(&context, &mut consumer, 1.0);
    assert_all(&samples[..frame_at(0.5)], 0.0);
    assert_all(&samples[frame_at(0.5)..], 1.0);
}

#[test]
/// A wrapped node survives stop(1); stop(2) and is silent from 2 on
fn wrapped_stop_twice_goes_silent() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());

    let source = looping_ones(&context);
    wrap_stop_method_consecutive_calls(&source, &context).unwrap();
    source.connect(Destination::node(&context.destination()), 0).unwrap();

    source.start(0.0).unwrap();
    source.stop(1.0).unwrap();
    source.stop(2.0).unwrap();

    let samples = play(&context, &mut consumer, 2.5);
    assert_all(&samples[..frame_at(1.0)], 1.0);
    assert_all(&samples[frame_at(2.0)..], 0.0);
}

#[test]
/// Without the wrapper the same host rejects the second stop
fn unwrapped_stop_twice_throws_on_legacy_host() {
    let (context, _consumer) = capturing_context(Quirks::legacy());

    let source = looping_ones(&context);
    source.start(0.0).unwrap();
    source.stop(1.0).unwrap();
    assert_eq!(source.stop(2.0).unwrap_err().kind(), ErrorKind::InvalidState);
}

#[test]
/// The faker hides the stop defect of its internal source
fn faked_constant_source_can_be_stopped_twice() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
    node.connect(Destination::node(&context.destination()), 0).unwrap();
    node.start(0.0).unwrap();
    node.stop(0.5).unwrap();
    node.stop(0.25).unwrap();

    let samples = play(&context, &mut consumer, 1.0);
    assert_all(&samples[..frame_at(0.25)], 1.0);
    assert_all(&samples[frame_at(0.5)..], 0.0);
}

#[test]
/// Probing twice runs the experiment once
fn probe_runs_once_per_context() {
    let (context, _consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();
    let runs = Cell::new(0);

    for _ in 0..4 {
        let supported = cache
            .resolve(STOP_METHOD_CONSECUTIVE_CALLS_SUPPORT, &context, |ctx| {
                runs.set(runs.get() + 1);
                probes::test_stop_method_consecutive_calls_support(ctx)
            })
            .unwrap();
        assert!(!supported);
    }
    assert_eq!(runs.get(), 1);

    let (other, _consumer) = capturing_context(Quirks::conformant());
    let supported = cache
        .resolve(STOP_METHOD_CONSECUTIVE_CALLS_SUPPORT, &other, |ctx| {
            runs.set(runs.get() + 1);
            probes::test_stop_method_consecutive_calls_support(ctx)
        })
        .unwrap();
    assert!(supported);
    assert_eq!(runs.get(), 2);
}

#[test]
/// connect(x); disconnect(x) leaves no trace
fn connect_disconnect_round_trip() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
    let baseline = context.connection_count();
    let destination = context.destination();

    node.connect(Destination::node(&destination), 0).unwrap();
    node.disconnect(Disconnect::Node(&destination)).unwrap();
    assert_eq!(context.connection_count(), baseline);

    node.start(0.0).unwrap();
    assert_all(&play(&context, &mut consumer, 0.05), 0.0);

    // a second disconnect fails the way a native one does
    let err = node.disconnect(Disconnect::Node(&destination)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAccess);
}

#[test]
/// The faker drives a parameter like a native constant source
fn faked_constant_source_modulates_params() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let carrier = looping_ones(&context);
    let vca = create_native_gain_node(&context, &GainOptions::default().with_gain(0.0)).unwrap();
    carrier
        .connect(Destination::node(&vca), 0)
        .unwrap()
        .unwrap()
        .connect(Destination::node(&context.destination()), 0)
        .unwrap();

    let options = ConstantSourceOptions::default().with_offset(0.25);
    let modulator = fake_constant_source_node(&context, &cache, &options).unwrap();
    let level = vca.gain();
    let returned = modulator.connect(Destination::param(&level), 0).unwrap();
    assert!(returned.is_none());

    carrier.start(0.0).unwrap();
    modulator.start(0.0).unwrap();
    assert_all(&play(&context, &mut consumer, 0.05), 0.25);
}

#[test]
/// Offset automation on the facade shows up in the output
fn faked_offset_follows_automation() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
    node.connect(Destination::node(&context.destination()), 0).unwrap();
    node.offset().set_value_at_time(0.75, 0.5).unwrap();
    node.start(0.0).unwrap();

    let samples = play(&context, &mut consumer, 1.0);
    assert_all(&samples[..frame_at(0.5)], 1.0);
    assert_all(&samples[frame_at(0.5)..], 0.75);
}

#[test]
/// Native and faked constant sources sound the same
fn native_and_faked_match() {
    let (native_ctx, mut native_out) = capturing_context(Quirks::conformant());
    let (faked_ctx, mut faked_out) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();
    let options = ConstantSourceOptions::default().with_offset(-0.3);

    let native = create_native_constant_source_node(&native_ctx, &options).unwrap();
    let faked = fake_constant_source_node(&faked_ctx, &cache, &options).unwrap();

    for (node, ctx) in [
        (&native as &dyn ConstantSourceNode, &native_ctx),
        (&faked as &dyn ConstantSourceNode, &faked_ctx),
    ] {
        node.connect(Destination::node(&ctx.destination()), 0).unwrap();
        node.start(0.1).unwrap();
        node.stop(0.4).unwrap();
    }

    let a = play(&native_ctx, &mut native_out, 0.5);
    let b = play(&faked_ctx, &mut faked_out, 0.5);
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(&b).enumerate() {
        assert!((x - y).abs() < EPSILON, "frame {i}: native {x}, faked {y}");
    }
}

#[test]
/// "ended" reaches listeners registered on the facade
fn faked_constant_source_fires_ended() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
    let ended = Rc::new(Cell::new(0));
    let counter = Rc::clone(&ended);
    node.add_event_listener(
        EventKind::Ended,
        Rc::new(move |_| counter.set(counter.get() + 1)),
        ListenerOptions::default(),
    );

    node.start(0.0).unwrap();
    node.stop(0.01).unwrap();
    play(&context, &mut consumer, 0.1);

    assert_eq!(ended.get(), 1);
}

#[test]
/// After close, every graph operation reports the host's InvalidStateError
fn closed_context_errors_pass_through() {
    let (context, _consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
    node.start(0.0).unwrap();
    context.close().unwrap();

    let destination = context.destination();
    let kind = |r: Result<(), gleichklang::HostError>| r.unwrap_err().kind();

    assert_eq!(kind(node.stop(1.0)), ErrorKind::InvalidState);
    assert_eq!(
        kind(node.connect(Destination::node(&destination), 0).map(|_| ())),
        ErrorKind::InvalidState
    );
    assert_eq!(
        kind(node.offset().set_value_at_time(0.0, 1.0).map(|_| ())),
        ErrorKind::InvalidState
    );
    assert_eq!(kind(context.advance(1)), ErrorKind::InvalidState);
}

#[test]
/// Nodes of one context cannot be wired into another
fn cross_context_connections_are_rejected() {
    let (a, _consumer_a) = capturing_context(Quirks::legacy());
    let (b, _consumer_b) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&a, &cache, &ConstantSourceOptions::default()).unwrap();
    let err = node.connect(Destination::node(&b.destination()), 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAccess);
}

#[test]
/// Dropping every handle lets the host reclaim the private subgraph
fn dropped_facade_is_reclaimed() {
    let (context, _consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
    assert_eq!(context.node_count(), 4);
    drop(node);

    assert_eq!(context.node_count(), 1);
    assert_eq!(context.connection_count(), 0);
}

#[test]
/// Only the host finishing playback detaches internals, not a dispatched event
fn dispatched_ended_event_keeps_a_facade_audible() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();

    let node = fake_constant_source_node(&context, &cache, &ConstantSourceOptions::default()).unwrap();
    node.connect(Destination::node(&context.destination()), 0).unwrap();
    node.start(0.0).unwrap();
    assert_eq!(context.connection_count(), 3);

    node.dispatch_event(&Event::ended());
    assert_eq!(context.connection_count(), 3);
    assert_all(&play(&context, &mut consumer, 0.01), 1.0);
}

#[test]
/// Stopped and dropped sources give back every node they fed
fn finished_sources_do_not_accumulate() {
    let (context, mut consumer) = capturing_context(Quirks::legacy());
    let cache = CapabilityCache::new();
    let destination = context.destination();
    let options = ConstantSourceOptions::default();

    for _ in 0..10 {
        let node = fake_constant_source_node(&context, &cache, &options).unwrap();
        node.connect(Destination::node(&destination), 0).unwrap();
        node.start(0.0).unwrap();
        node.stop(0.0).unwrap();
    }
    for _ in 0..10 {
        let node = create_native_constant_source_node(&context, &options).unwrap();
        node.connect(Destination::node(&destination), 0).unwrap();
        node.start(0.0).unwrap();
        node.stop(0.0).unwrap();
    }

    play(&context, &mut consumer, 0.01);
    assert_eq!(context.node_count(), 1);
    assert_eq!(context.connection_count(), 0);
}
