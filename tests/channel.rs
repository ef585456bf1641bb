// SPDX-License-Identifier: Apache-2.0

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use bufseq::{
	Builder, Checkpointable, Commitable, Cursor, PCmp, ReadCursor, RefTransport, TBool,
	WriteCursor,
};

const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Runs `f` on a worker thread and fails the test if it has not finished
/// within `secs` seconds (a deadlocked channel would otherwise hang the
/// whole suite).
fn within<T: Send + 'static>(secs: u64, f: impl FnOnce() -> T + Send + 'static) -> T {
	let (tx, rx) = mpsc::channel();
	thread::spawn(move || {
		let _ = tx.send(f());
	});
	rx.recv_timeout(Duration::from_secs(secs))
		.expect("timed out or worker panicked")
}

#[test]
fn alphabet_one_at_a_time_refs() {
	for capacity in 2..=6 {
		let (writer, reader) = Builder::<RefTransport<String>>::for_refs().build_channel(capacity);
		let (out, closed) = within(10, move || {
			let producer = thread::spawn(move || {
				for c in 'A'..='Z' {
					writer.append(c.to_string());
					writer.commit(&writer.end());
				}
				writer.close();
			});
			let consumer = thread::spawn(move || {
				let mut out = String::new();
				let mut cur = reader.start();
				while let Some(s) = cur.read() {
					out.push_str(&s);
					match cur.advance(1) {
						Some(next) => {
							cur = next;
							reader.commit(&cur);
						}
						None => break,
					}
				}
				reader.close();
				(out, reader.is_closed())
			});
			producer.join().expect("producer panicked");
			consumer.join().expect("consumer panicked")
		});
		assert!(closed);
		assert_eq!(out, ALPHABET, "capacity {capacity}");
	}
}

#[test]
fn alphabet_one_at_a_time_chars() {
	for capacity in 2..=6 {
		let (writer, reader) = Builder::for_chars().build_channel(capacity);
		let out = within(10, move || {
			let producer = thread::spawn(move || {
				for c in ALPHABET.bytes() {
					writer.append(u16::from(c));
					writer.commit(&writer.end());
				}
				writer.close();
			});
			let consumer = thread::spawn(move || {
				let mut out = Vec::new();
				let mut cur = reader.start();
				while let Some(unit) = cur.read() {
					out.push(unit);
					match cur.advance(1) {
						Some(next) => {
							cur = next;
							reader.commit(&cur);
						}
						None => break,
					}
				}
				reader.close();
				out
			});
			producer.join().expect("producer panicked");
			consumer.join().expect("consumer panicked")
		});
		assert_eq!(String::from_utf16(&out).unwrap(), ALPHABET, "capacity {capacity}");
	}
}

#[test]
fn alphabet_in_uneven_bulk_chunks() {
	for capacity in [7, 9, 11, 13] {
		let src: Vec<u16> = ALPHABET.bytes().map(u16::from).collect();
		let (writer, reader) = Builder::for_chars().build_channel(capacity);
		let out = within(10, move || {
			let producer = thread::spawn(move || {
				let mut i = 0;
				let mut chunk = 1;
				while i < src.len() {
					let j = (i + chunk).min(src.len());
					let mut done = 0;
					while i + done < j {
						done += writer.append_slice(&src, i + done, j);
					}
					writer.commit(&writer.end());
					i = j;
					chunk = chunk % 4 + 1;
				}
				writer.close();
			});
			let consumer = thread::spawn(move || {
				let mut out = Vec::new();
				let mut cur = reader.start();
				loop {
					let mut dest = [0u16; 5];
					let n = cur.read_into(&mut dest, 1, 4);
					if n == 0 {
						break;
					}
					out.extend_from_slice(&dest[1..1 + n]);
					cur = cur.advance(n).expect("just read that span");
					reader.commit(&cur);
				}
				reader.close();
				out
			});
			producer.join().expect("producer panicked");
			consumer.join().expect("consumer panicked")
		});
		assert_eq!(String::from_utf16(&out).unwrap(), ALPHABET, "capacity {capacity}");
	}
}

#[test]
fn bulk_transfer_preserves_order_and_count() {
	let values: Vec<i32> = (0..1000).collect();
	let src = values.clone();
	let (writer, reader) = Builder::for_ints().build_channel(16);
	let out = within(10, move || {
		let producer = thread::spawn(move || {
			let mut i = 0;
			while i < src.len() {
				let j = (i + 7).min(src.len());
				let mut done = 0;
				while i + done < j {
					done += writer.append_slice(&src, i + done, j);
				}
				writer.commit(&writer.end());
				i = j;
			}
			writer.close();
		});
		let consumer = thread::spawn(move || {
			let mut out = Vec::new();
			let mut cur = reader.start();
			loop {
				let mut dest = [0i32; 16];
				let n = cur.read_into(&mut dest, 0, 16);
				if n == 0 {
					break;
				}
				out.extend_from_slice(&dest[..n]);
				cur = cur.advance(n).expect("just read that span");
				reader.commit(&cur);
			}
			out
		});
		producer.join().expect("producer panicked");
		consumer.join().expect("consumer panicked")
	});
	assert_eq!(out, values);
}

#[test]
fn nothing_is_visible_before_commit() {
	let (writer, reader) = Builder::for_ints().build_channel(4);
	writer.append(1);
	writer.append(2);

	assert_eq!(reader.start(), reader.end());
	assert!(reader.start().advance(1).is_none());
	assert_eq!(reader.start().count_between_exceeds(&reader.end(), 1), TBool::False);

	writer.commit(&writer.end());
	assert_eq!(reader.start().count_between_exceeds(&reader.end(), 2), TBool::True);
	assert_eq!(reader.start().read(), Some(1));
	assert_eq!(reader.start().advance(1).expect("committed").read(), Some(2));
}

#[test]
fn writer_restore_discards_uncommitted_suffix() {
	let (writer, reader) = Builder::for_bytes().build_channel(8);

	// A rollback to a snapshot of the empty written region drops everything.
	let empty_mark = writer.snapshot();
	writer.append(b'Z');
	writer.restore(&empty_mark);

	writer.append_slice(b"AB", 0, 2);
	writer.commit(&writer.end());

	let mark = writer.snapshot();
	writer.append_slice(b"XY", 0, 2);
	writer.restore(&mark);

	writer.append_slice(b"CD", 0, 2);
	writer.commit(&writer.end());
	writer.close();

	let mut out = [0u8; 8];
	let n = reader.start().read_into(&mut out, 0, 8);
	assert_eq!(&out[..n], b"ABCD");
}

#[test]
fn writes_after_close_are_ignored() {
	let (writer, reader) = Builder::for_ints().build_channel(4);
	writer.append(1);
	writer.commit(&writer.end());
	writer.close();
	assert!(writer.is_closed());

	writer.append(2);
	assert_eq!(writer.append_slice(&[3, 4], 0, 2), 0);
	writer.commit(&writer.end());

	// The committed prefix still drains, then end-of-stream.
	let cur = reader.start();
	assert_eq!(cur.read(), Some(1));
	let next = cur.advance(1).expect("committed");
	assert_eq!(next.read(), None);
}

#[test]
fn need_capacity_reports_free_cells() {
	let (writer, reader) = Builder::for_ints().build_channel(4);
	assert_eq!(writer.end().need_capacity(1), 4);
	writer.append(1);
	writer.append(2);
	assert_eq!(writer.end().need_capacity(1), 2);
	writer.close();
	assert_eq!(writer.end().need_capacity(1), 0);
	drop(reader);
}

#[test]
fn cursors_of_different_channels_are_unrelated() {
	let (writer_a, reader_a) = Builder::for_ints().build_channel(4);
	let (_writer_b, reader_b) = Builder::for_ints().build_channel(4);

	assert_eq!(reader_a.start().pcmp(&reader_b.start()), PCmp::Unrelated);
	assert_eq!(reader_a.start().count_between_exceeds(&reader_b.start(), 0), TBool::Fail);

	// The ring can never hold more than its capacity.
	writer_a.append(1);
	writer_a.commit(&writer_a.end());
	assert_eq!(reader_a.start().count_between_exceeds(&reader_a.end(), 5), TBool::False);
	assert_eq!(reader_a.end().count_between_exceeds(&reader_a.start(), 0), TBool::Fail);
}

#[test]
fn reader_commit_releases_retained_handles() {
	let payload = Arc::new("payload".to_owned());
	let (writer, reader) =
		Builder::<RefTransport<Option<Arc<String>>>>::for_refs().build_channel(4);

	writer.append(Some(Arc::clone(&payload)));
	writer.commit(&writer.end());
	assert_eq!(Arc::strong_count(&payload), 2);

	let cur = reader.start();
	assert!(cur.read().expect("committed").is_some());
	let next = cur.advance(1).expect("committed");
	reader.commit(&next);
	assert_eq!(Arc::strong_count(&payload), 1);
}

#[test]
fn reader_snapshot_cannot_rewind() {
	let (writer, reader) = Builder::for_ints().build_channel(4);
	writer.append(7);
	writer.commit(&writer.end());

	let mark = reader.snapshot();
	assert_eq!(mark, reader.start());
	// Restore validates the cursor but consumption cannot be undone.
	reader.restore(&mark);
	assert_eq!(reader.start().read(), Some(7));
}

#[test]
fn dropping_the_writer_unblocks_the_reader() {
	let (writer, reader) = Builder::for_ints().build_channel(2);
	let out = within(5, move || {
		let consumer = thread::spawn(move || reader.start().read());
		drop(writer);
		consumer.join().expect("consumer panicked")
	});
	assert_eq!(out, None);
}

#[test]
fn dropping_the_reader_unblocks_the_writer() {
	let (writer, reader) = Builder::for_ints().build_channel(2);
	let wrote = within(5, move || {
		writer.append(1);
		writer.append(2);
		let producer = thread::spawn(move || {
			// The ring is full; this blocks until the reader goes away.
			writer.append(3);
			writer.is_closed()
		});
		thread::sleep(Duration::from_millis(50));
		drop(reader);
		producer.join().expect("producer panicked")
	});
	assert!(wrote);
}
