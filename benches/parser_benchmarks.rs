// benches/parser_benchmarks.rs
//! Throughput of the host stream parser and the shared decoder

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use modular_bci::acquisition::RawFrame;
use modular_bci::config::constants::protocol::SYNC_BYTES;
use modular_bci::decoder::{sign_extend_24, SampleDecoder};
use modular_bci::session::StreamParser;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

const CHANNEL_COUNTS: &[usize] = &[8, 32];
const FRAMES_PER_RUN: usize = 1000;

fn stream(channels: usize, frames: usize, noise_every: Option<usize>, rng: &mut StdRng) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * (3 + channels * 3));
    for i in 0..frames {
        if noise_every.is_some_and(|n| i % n == 0) {
            bytes.push(rng.gen_range(0x01..0xC0));
        }
        bytes.extend_from_slice(&SYNC_BYTES);
        for _ in 0..channels * 3 {
            bytes.push(rng.gen());
        }
    }
    bytes
}

fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_parser");
    let mut rng = StdRng::seed_from_u64(0x1299);

    for &channels in CHANNEL_COUNTS {
        let clean = stream(channels, FRAMES_PER_RUN, None, &mut rng);
        let noisy = stream(channels, FRAMES_PER_RUN, Some(10), &mut rng);
        group.throughput(Throughput::Bytes(clean.len() as u64));

        group.bench_with_input(BenchmarkId::new("clean", channels), &clean, |b, bytes| {
            b.iter(|| {
                let mut parser = StreamParser::new(channels, SampleDecoder::default());
                let blocks = parser.feed_all(black_box(bytes));
                parser.drain_blocks().for_each(drop);
                blocks
            });
        });

        group.bench_with_input(BenchmarkId::new("noisy", channels), &noisy, |b, bytes| {
            b.iter(|| {
                let mut parser = StreamParser::new(channels, SampleDecoder::default());
                let blocks = parser.feed_all(black_box(bytes));
                parser.drain_blocks().for_each(drop);
                blocks
            });
        });
    }

    group.finish();
}

fn benchmark_decoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoder");
    let mut rng = StdRng::seed_from_u64(7);
    let triplets: Vec<[u8; 3]> = (0..4096).map(|_| rng.gen()).collect();

    group.throughput(Throughput::Elements(triplets.len() as u64));
    group.bench_function("sign_extend_24", |b| {
        b.iter(|| {
            triplets
                .iter()
                .map(|t| sign_extend_24(t[0], t[1], t[2]) as i64)
                .sum::<i64>()
        });
    });

    let mut frame = RawFrame::new(4).unwrap();
    rng.fill(frame.as_mut_bytes());
    let decoder = SampleDecoder::default();
    group.bench_function("daisy_frame_samples", |b| {
        b.iter(|| black_box(&frame).samples(&decoder));
    });

    group.finish();
}

criterion_group!(benches, benchmark_parser, benchmark_decoder);
criterion_main!(benches);
