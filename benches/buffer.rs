// SPDX-License-Identifier: Apache-2.0

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use bufseq::{Builder, Commitable, ReadCursor};

const SIZE: usize = 8192;

fn append(c: &mut Criterion) {
	let mut group = c.benchmark_group("append");
	group.bench_function("single", |b| {
		b.iter(|| {
			let buf = Builder::for_bytes().build_read_write();
			for i in 0..SIZE {
				buf.append(black_box(i as u8));
			}
			buf.len()
		})
	});

	let data = vec![0xa5u8; SIZE];
	group.bench_function("slice", |b| {
		b.iter(|| {
			let buf = Builder::for_bytes().build_read_write();
			buf.append_slice(black_box(&data), 0, data.len())
		})
	});
	group.finish();
}

fn freeze_and_read(c: &mut Criterion) {
	let data = vec![0x5au8; SIZE];
	c.bench_function("freeze_and_read", |b| {
		b.iter(|| {
			let buf = Builder::for_bytes().build_read_write();
			buf.append_slice(&data, 0, data.len());
			let frozen = buf.freeze();
			let mut out = vec![0u8; SIZE];
			frozen.start().read_into(&mut out, 0, SIZE)
		})
	});
}

fn channel_round_trip(c: &mut Criterion) {
	let data: Vec<u8> = (0..SIZE).map(|i| i as u8).collect();
	c.bench_function("channel_round_trip", |b| {
		b.iter(|| {
			let (writer, reader) = Builder::for_bytes().build_channel(64);
			let mut out = vec![0u8; SIZE];
			let mut cur = reader.start();
			let mut i = 0;
			while i < data.len() {
				let j = (i + 32).min(data.len());
				i += writer.append_slice(&data, i, j);
				writer.commit(&writer.end());
				let n = cur.read_into(&mut out, i - 32.min(i), 32);
				cur = cur.advance(n).expect("just read that span");
				reader.commit(&cur);
			}
			black_box(out)
		})
	});
}

criterion_group!(benches, append, freeze_and_read, channel_round_trip);
criterion_main!(benches);
