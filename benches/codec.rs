//! Criterion benchmarks for the record codecs and I/Q de-interleave.
//!
//! Capture read-back de-interleaves up to 4096 samples per buffer, three
//! buffers per capture, so `decode_iq` is the hot path.
//!
//! Run with: cargo bench --bench codec

use adrv9025_dpd::actuator::ExtDpdModel;
use adrv9025_dpd::capture::codec::{decode_config, decode_iq, encode_config};
use adrv9025_dpd::capture::CaptureConfig;
use adrv9025_dpd::{GpioPin, TxChannel};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn iq_deinterleave(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_iq");

    for samples in [256usize, 1024, 4096] {
        let bytes: Vec<u8> = (0..samples * 4).map(|n| (n % 251) as u8).collect();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &bytes, |b, bytes| {
            b.iter(|| decode_iq(black_box(bytes)));
        });
    }

    group.finish();
}

fn capture_record(c: &mut Criterion) {
    let config = CaptureConfig::default();
    let record = encode_config(&config);

    c.bench_function("capture_config_encode", |b| {
        b.iter(|| encode_config(black_box(&config)));
    });
    c.bench_function("capture_config_decode", |b| {
        b.iter(|| {
            decode_config(black_box(&record), GpioPin::INVALID, GpioPin::INVALID).unwrap()
        });
    });
}

fn model_record(c: &mut Criterion) {
    let model = ExtDpdModel::default();
    let record = model.encode(TxChannel::Tx2);

    c.bench_function("model_encode", |b| {
        b.iter(|| black_box(&model).encode(TxChannel::Tx2));
    });
    c.bench_function("model_decode", |b| {
        b.iter(|| ExtDpdModel::decode(black_box(&record)).unwrap());
    });
}

criterion_group!(benches, iq_deinterleave, capture_record, model_record);
criterion_main!(benches);
