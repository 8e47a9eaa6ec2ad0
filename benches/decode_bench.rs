// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Benchmarks for VLP-16 packet decoding and scan accumulation.
//!
//! Measures:
//! - Block decoding with range gating
//! - Azimuth interpolation over one scan
//! - Full accumulation cycles from an in-memory packet loop
//! - PointCloud2 packing of an emitted scan
//!
//! Run with: cargo bench --bench decode_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use edgefirst_velodynepub::{
    LoopingTestSource, ModelParameters, ModelType, ScanAccumulator,
    azimuth::{azimuth_from_raw, interpolate},
    formats::format_range_scan,
    packet::{BLOCK_FLAG, PacketSlice, decode_block},
};

/// Packet `n` of a sweep rotating 0.2° per block with varied ranges.
fn sweep_packet(n: usize) -> Vec<u8> {
    let mut raw = Vec::with_capacity(1206);
    for b in 0..12 {
        let azimuth = (((n * 12 + b) * 20) % 36000) as u16;
        raw.extend_from_slice(&BLOCK_FLAG.to_le_bytes());
        raw.extend_from_slice(&azimuth.to_le_bytes());
        for channel in 0..32usize {
            // Every eighth channel is below the minimum range
            let distance = if channel % 8 == 0 {
                50
            } else {
                (500 + (n * 37 + b * 11 + channel * 13) % 20_000) as u16
            };
            raw.extend_from_slice(&distance.to_le_bytes());
            raw.push((channel * 7 % 101) as u8);
        }
    }
    raw.extend_from_slice(&((n * 1327) as u32).to_le_bytes());
    raw.push(0x37);
    raw.push(0x22);
    raw
}

fn bench_decode(c: &mut Criterion) {
    let params = ModelParameters::resolve(ModelType::Vlp16);
    let gate = params.range_gate();
    let packet = sweep_packet(0);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(
        (params.blocks_per_packet * params.channels_per_block) as u64,
    ));

    group.bench_function("packet", |b| {
        b.iter(|| {
            let slice = PacketSlice::from_slice(std::hint::black_box(&packet), &params).unwrap();
            let mut sum = 0u32;
            for block in slice.blocks() {
                for (range, _) in decode_block(block, gate) {
                    sum += range as u32;
                }
            }
            std::hint::black_box(sum)
        });
    });

    group.finish();
}

fn bench_interpolate(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate");

    for packets in [5usize, 10, 20] {
        let samples: Vec<f64> = (0..=packets * 12)
            .map(|i| azimuth_from_raw(((i * 20) % 36000) as u16))
            .collect();

        group.throughput(Throughput::Elements(2 * (samples.len() - 1) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(packets), &samples, |b, s| {
            b.iter(|| std::hint::black_box(interpolate(s)));
        });
    }

    group.finish();
}

fn bench_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let packets: Vec<_> = (0..300).map(sweep_packet).collect();
    let mut group = c.benchmark_group("cycle");

    for k in [5usize, 10, 30] {
        let mut acc = ScanAccumulator::new(ModelType::Vlp16, k).unwrap();
        acc.start(LoopingTestSource::new(packets.clone())).unwrap();
        // Capture the first carried packet outside the measurement
        rt.block_on(acc.run_cycle()).unwrap();

        group.throughput(Throughput::Elements((k * 12 * 32) as u64));
        group.bench_with_input(BenchmarkId::new("packets_per_scan", k), &k, |b, _| {
            b.iter(|| {
                let scan = rt.block_on(acc.run_cycle()).unwrap();
                std::hint::black_box(scan)
            });
        });
    }

    group.finish();
}

fn bench_format(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let packets: Vec<_> = (0..11).map(sweep_packet).collect();
    let mut acc = ScanAccumulator::new(ModelType::Vlp16, 5).unwrap();
    acc.start(LoopingTestSource::new(packets)).unwrap();
    rt.block_on(acc.run_cycle()).unwrap();
    let scan = rt.block_on(acc.run_cycle()).unwrap().unwrap();

    let mut group = c.benchmark_group("format");
    group.throughput(Throughput::Elements((scan.slices() * scan.beams()) as u64));
    group.bench_function("range_scan", |b| {
        b.iter(|| std::hint::black_box(format_range_scan(&scan)));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_decode,
    bench_interpolate,
    bench_cycle,
    bench_format,
);
criterion_main!(benches);
