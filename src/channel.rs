// SPDX-License-Identifier: Apache-2.0

//! A bounded single-producer/single-consumer channel.
//!
//! The channel is a circular buffer split into three regions laid out from the
//! read start: readable (committed by the producer, not yet released by the
//! consumer), written (appended but uncommitted), and free. Appending claims
//! free cells into the written region; a writer commit publishes a written
//! prefix into the readable region; a reader commit returns a readable prefix
//! to the free region. Nothing the producer appends is visible to the consumer
//! before the producer commits.
//!
//! Cursor positions are absolute element counts (`cycle * capacity + index`),
//! so positions stay unambiguous as the ring wraps; the storage cell for a
//! position is simply `position % capacity`.
//!
//! One mutex guards the region tuple and the element cells; two condvars hang
//! off it, one per direction. Every waiter re-checks state on wakeup, every
//! mutation that feeds a direction notifies it, and closing broadcasts both,
//! so blocked operations terminate in bounded time once the peer closes or
//! drops its side.
//!
//! A single producer thread and a single consumer thread are assumed; nothing
//! depends on thread identity, so callers may hand a side to another thread as
//! long as each side keeps one user at a time.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};
use crate::cursor::{Checkpointable, Commitable, Cursor, ReadCursor, WriteCursor};
use crate::transport::Transport;
use crate::truth::{PCmp, TBool};

/// Region tuple plus the shared element cells, all guarded by one mutex.
struct RingState<T: Transport> {
	/// Absolute position of the first readable element.
	read_start: u64,
	n_readable: usize,
	n_written: usize,
	closed: bool,
	/// `None` once the channel closed and drained.
	storage: Option<T::Mut>,
}

struct Ring<T: Transport> {
	transport: T,
	capacity: usize,
	state: Mutex<RingState<T>>,
	/// Consumers wait here; producers signal it.
	readable: Condvar,
	/// Producers wait here; consumers signal it.
	writable: Condvar,
}

impl<T: Transport> Ring<T> {
	fn lock(&self) -> MutexGuard<'_, RingState<T>> {
		self.state.lock().expect("ring mutex poisoned")
	}

	fn wait_readable<'a>(&self, guard: MutexGuard<'a, RingState<T>>) -> MutexGuard<'a, RingState<T>> {
		self.readable.wait(guard).expect("ring mutex poisoned")
	}

	fn wait_writable<'a>(&self, guard: MutexGuard<'a, RingState<T>>) -> MutexGuard<'a, RingState<T>> {
		self.writable.wait(guard).expect("ring mutex poisoned")
	}

	fn cell(&self, pos: u64) -> usize {
		(pos % self.capacity as u64) as usize
	}

	/// Drops retained handles in `n` cells starting at `left_pos`, wrapping
	/// across the ring seam when needed.
	fn release_span(&self, state: &mut RingState<T>, left_pos: u64, n: usize) {
		if n == 0 {
			return;
		}
		let Some(storage) = state.storage.as_mut() else { return };
		let left = self.cell(left_pos);
		let right = left + n;
		if right <= self.capacity {
			self.transport.release(storage, left, right);
		} else {
			self.transport.release(storage, left, self.capacity);
			self.transport.release(storage, 0, right - self.capacity);
		}
		trace!(n, "released ring cells");
	}

	/// Sticky close: discards the uncommitted written region and wakes both
	/// sides.
	fn close(&self) {
		let mut state = self.lock();
		if !state.closed {
			state.closed = true;
			let write_start = state.read_start + state.n_readable as u64;
			let dropped = state.n_written;
			state.n_written = 0;
			self.release_span(&mut state, write_start, dropped);
			debug!(dropped, "channel closed");
		}
		drop(state);
		self.readable.notify_all();
		self.writable.notify_all();
	}

	fn is_closed(&self) -> bool {
		self.lock().closed
	}
}

/// Builds the two sides over a pre-sized storage.
pub(crate) fn channel<T: Transport>(
	transport: T, mut storage: T::Mut, capacity: usize,
) -> (ChanWriter<T>, ChanReader<T>) {
	assert!(capacity >= 2, "channel capacity must be at least 2");
	transport.ensure_capacity(&mut storage, capacity);
	transport.set_len(&mut storage, capacity);
	let ring = Arc::new(Ring {
		transport,
		capacity,
		state: Mutex::new(RingState {
			read_start: 0,
			n_readable: 0,
			n_written: 0,
			closed: false,
			storage: Some(storage),
		}),
		readable: Condvar::new(),
		writable: Condvar::new(),
	});
	(ChanWriter { ring: Arc::clone(&ring) }, ChanReader { ring })
}

/// The producer side of a channel.
///
/// Dropping the writer closes the channel, so an abandoned producer can never
/// strand a blocked consumer.
pub struct ChanWriter<T: Transport> {
	ring: Arc<Ring<T>>,
}

impl<T: Transport> ChanWriter<T> {
	pub fn capacity(&self) -> usize {
		self.ring.capacity
	}

	pub fn is_closed(&self) -> bool {
		self.ring.is_closed()
	}

	/// Appends one element into the written region, blocking while the ring
	/// is full. Silently a no-op once the channel is closed.
	pub fn append(&self, value: T::Elem) {
		let ring = &*self.ring;
		let mut state = ring.lock();
		loop {
			if state.closed {
				return;
			}
			if state.n_readable + state.n_written < ring.capacity {
				break;
			}
			state = ring.wait_writable(state);
		}
		let pos = state.read_start + (state.n_readable + state.n_written) as u64;
		let cell = ring.cell(pos);
		let storage = state.storage.as_mut().expect("storage released while open");
		ring.transport.write(storage, cell, value);
		state.n_written += 1;
		drop(state);
		ring.readable.notify_all();
	}

	/// Appends `slice[left..right]`, taking as much contiguous free space as
	/// is available per round. Blocks only while nothing has been written yet;
	/// returns the count appended, which is short when the channel closes or
	/// fills after partial progress.
	pub fn append_slice(&self, slice: &[T::Elem], left: usize, right: usize) -> usize {
		assert!(left <= right && right <= slice.len());
		let ring = &*self.ring;
		let mut left = left;
		let mut total = 0;
		let mut state = ring.lock();
		while left < right {
			if state.closed {
				break;
			}
			let used = state.n_readable + state.n_written;
			let may_write = ring.capacity - used;
			if may_write == 0 {
				if total != 0 {
					break;
				}
				state = ring.wait_writable(state);
				continue;
			}
			let n = may_write.min(right - left);
			let cell = ring.cell(state.read_start + used as u64);
			let storage = state.storage.as_mut().expect("storage released while open");
			if cell + n <= ring.capacity {
				ring.transport.bulk_write(storage, cell, slice, left, left + n);
			} else {
				let head = ring.capacity - cell;
				ring.transport.bulk_write(storage, cell, slice, left, left + head);
				ring.transport.bulk_write(storage, 0, slice, left + head, left + n);
			}
			state.n_written += n;
			left += n;
			total += n;
		}
		drop(state);
		if total != 0 {
			ring.readable.notify_all();
		}
		total
	}

	/// A cursor at the write end (one past the last written element).
	pub fn end(&self) -> Wcur<T> {
		let state = self.ring.lock();
		let pos = state.read_start + (state.n_readable + state.n_written) as u64;
		Wcur { ring: Arc::clone(&self.ring), pos }
	}

	/// Closes the channel: later writes become no-ops, readers drain what was
	/// committed and then observe end-of-stream.
	pub fn close(&self) {
		self.ring.close();
	}
}

impl<T: Transport> Checkpointable for ChanWriter<T> {
	type Mark<'a> = Wcur<T> where Self: 'a;

	fn snapshot(&self) -> Wcur<T> {
		self.end()
	}

	/// Rolls the written region back to the cursor, discarding everything
	/// appended after it. Only uncommitted elements can be rolled back.
	fn restore<'a>(&'a self, mark: &Wcur<T>) {
		assert!(Arc::ptr_eq(&self.ring, &mark.ring), "cursor from a different channel");
		let ring = &*self.ring;
		let mut state = ring.lock();
		if state.closed {
			return;
		}
		let write_start = state.read_start + state.n_readable as u64;
		let write_end = write_start + state.n_written as u64;
		assert!(
			write_start <= mark.pos && mark.pos <= write_end,
			"cursor outside the written region",
		);
		let kept = (mark.pos - write_start) as usize;
		let dropped = state.n_written - kept;
		state.n_written = kept;
		if dropped != 0 {
			trace!(dropped, "rolled back written elements");
		}
	}
}

impl<T: Transport> Commitable for ChanWriter<T> {
	/// Publishes the written prefix up to the cursor into the readable region
	/// and wakes the consumer.
	fn commit<'a>(&'a self, mark: &Wcur<T>) {
		assert!(Arc::ptr_eq(&self.ring, &mark.ring), "cursor from a different channel");
		let ring = &*self.ring;
		let mut state = ring.lock();
		if state.closed {
			return;
		}
		let write_start = state.read_start + state.n_readable as u64;
		let write_end = write_start + state.n_written as u64;
		assert!(
			write_start <= mark.pos && mark.pos <= write_end,
			"cursor outside the written region",
		);
		let n = (mark.pos - write_start) as usize;
		if n != 0 {
			state.n_written -= n;
			state.n_readable += n;
			drop(state);
			ring.readable.notify_all();
		}
	}
}

impl<T: Transport> Drop for ChanWriter<T> {
	fn drop(&mut self) {
		self.ring.close();
	}
}

/// The consumer side of a channel.
///
/// Dropping the reader closes the channel and releases whatever was still
/// buffered.
pub struct ChanReader<T: Transport> {
	ring: Arc<Ring<T>>,
}

impl<T: Transport> ChanReader<T> {
	pub fn capacity(&self) -> usize {
		self.ring.capacity
	}

	pub fn is_closed(&self) -> bool {
		self.ring.is_closed()
	}

	/// A cursor at the first readable element.
	pub fn start(&self) -> Rcur<T> {
		let state = self.ring.lock();
		Rcur { ring: Arc::clone(&self.ring), pos: state.read_start }
	}

	/// A cursor one past the last readable element.
	pub fn end(&self) -> Rcur<T> {
		let state = self.ring.lock();
		Rcur { ring: Arc::clone(&self.ring), pos: state.read_start + state.n_readable as u64 }
	}

	/// Closes the channel and commits the end cursor, releasing any remaining
	/// readable content.
	pub fn close(&self) {
		self.ring.close();
		let end = self.end();
		self.commit(&end);
	}
}

impl<T: Transport> Checkpointable for ChanReader<T> {
	type Mark<'a> = Rcur<T> where Self: 'a;

	/// The reader's snapshot is its current start.
	fn snapshot(&self) -> Rcur<T> {
		self.start()
	}

	/// Consumption cannot be undone; only validates the cursor.
	fn restore<'a>(&'a self, mark: &Rcur<T>) {
		assert!(Arc::ptr_eq(&self.ring, &mark.ring), "cursor from a different channel");
	}
}

impl<T: Transport> Commitable for ChanReader<T> {
	/// Releases the readable prefix up to the cursor back to the free region
	/// and wakes the producer. Once the channel is closed and fully drained,
	/// the shared storage itself is released.
	fn commit<'a>(&'a self, mark: &Rcur<T>) {
		assert!(Arc::ptr_eq(&self.ring, &mark.ring), "cursor from a different channel");
		let ring = &*self.ring;
		let mut state = ring.lock();
		assert!(mark.pos >= state.read_start, "cursor precedes the readable region");
		let delta = (mark.pos - state.read_start) as usize;
		assert!(delta <= state.n_readable, "cursor outside the readable region");
		if delta == 0 {
			return;
		}
		let left = state.read_start;
		state.read_start += delta as u64;
		state.n_readable -= delta;
		if state.closed && state.n_readable == 0 {
			state.storage = None;
			debug!("released channel storage");
		} else {
			self.ring.release_span(&mut state, left, delta);
		}
		drop(state);
		ring.writable.notify_all();
	}
}

impl<T: Transport> Drop for ChanReader<T> {
	fn drop(&mut self) {
		self.close();
	}
}

/// A write cursor into a channel: `(ring identity, absolute position)`.
pub struct Wcur<T: Transport> {
	ring: Arc<Ring<T>>,
	pos: u64,
}

impl<T: Transport> Clone for Wcur<T> {
	fn clone(&self) -> Self {
		Self { ring: Arc::clone(&self.ring), pos: self.pos }
	}
}

impl<T: Transport> PartialEq for Wcur<T> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.ring, &other.ring) && self.pos == other.pos
	}
}

impl<T: Transport> fmt::Debug for Wcur<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Wcur").field("pos", &self.pos).finish()
	}
}

impl<T: Transport> Cursor for Wcur<T> {
	fn pcmp(&self, other: &Self) -> PCmp {
		if !Arc::ptr_eq(&self.ring, &other.ring) {
			return PCmp::Unrelated;
		}
		PCmp::from(self.pos.cmp(&other.pos))
	}
}

impl<T: Transport> WriteCursor for Wcur<T> {
	/// Blocks until at least one free cell exists and returns the free cell
	/// count, or 0 once the channel is closed.
	fn need_capacity(&self, _n: usize) -> usize {
		let ring = &*self.ring;
		let mut state = ring.lock();
		loop {
			if state.closed {
				return 0;
			}
			let available = ring.capacity - state.n_readable - state.n_written;
			if available != 0 {
				return available;
			}
			state = ring.wait_writable(state);
		}
	}
}

/// A read cursor into a channel: `(ring identity, absolute position)`.
pub struct Rcur<T: Transport> {
	ring: Arc<Ring<T>>,
	pos: u64,
}

impl<T: Transport> Clone for Rcur<T> {
	fn clone(&self) -> Self {
		Self { ring: Arc::clone(&self.ring), pos: self.pos }
	}
}

impl<T: Transport> PartialEq for Rcur<T> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.ring, &other.ring) && self.pos == other.pos
	}
}

impl<T: Transport> fmt::Debug for Rcur<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Rcur").field("pos", &self.pos).finish()
	}
}

impl<T: Transport> Cursor for Rcur<T> {
	fn pcmp(&self, other: &Self) -> PCmp {
		if !Arc::ptr_eq(&self.ring, &other.ring) {
			return PCmp::Unrelated;
		}
		PCmp::from(self.pos.cmp(&other.pos))
	}
}

impl<T: Transport> ReadCursor for Rcur<T> {
	type Elem = T::Elem;

	/// Moves forward within the currently readable region; never blocks.
	fn advance(&self, delta: usize) -> Option<Self> {
		if delta == 0 {
			return Some(self.clone());
		}
		let state = self.ring.lock();
		let readable_end = state.read_start + state.n_readable as u64;
		let pos = self.pos + delta as u64;
		(pos <= readable_end).then(|| Rcur { ring: Arc::clone(&self.ring), pos })
	}

	/// Blocks until the element under the cursor is committed, the channel
	/// closes (`None` once past the readable end), or the cursor is found to
	/// be stale.
	fn read(&self) -> Option<T::Elem> {
		let ring = &*self.ring;
		let mut state = ring.lock();
		loop {
			assert!(self.pos >= state.read_start, "cursor precedes the readable region");
			if self.pos < state.read_start + state.n_readable as u64 {
				let storage = state.storage.as_ref().expect("storage released while readable");
				return Some(ring.transport.read_from_mut(storage, ring.cell(self.pos)));
			}
			if state.closed {
				return None;
			}
			state = ring.wait_readable(state);
		}
	}

	/// Copies up to `n_wanted` elements into `dest` at `di`, taking the
	/// largest contiguous span per round (two copies across the ring seam).
	/// Blocks only while nothing has been read yet and the channel is open.
	fn read_into(&self, dest: &mut [T::Elem], di: usize, n_wanted: usize) -> usize {
		let ring = &*self.ring;
		let mut pos = self.pos;
		let mut di = di;
		let mut n_read = 0;
		let mut state = ring.lock();
		while n_read < n_wanted {
			assert!(pos >= state.read_start, "cursor precedes the readable region");
			let available = (state.read_start + state.n_readable as u64 - pos) as usize;
			let room = dest.len().saturating_sub(di);
			let n = available.min(n_wanted - n_read).min(room);
			if n == 0 {
				if available == 0 && room != 0 && n_read == 0 && !state.closed {
					state = ring.wait_readable(state);
					continue;
				}
				break;
			}
			let storage = state.storage.as_ref().expect("storage released while readable");
			let cell = ring.cell(pos);
			if cell + n <= ring.capacity {
				ring.transport.bulk_read_from_mut(storage, cell, dest, di, n);
			} else {
				let head = ring.capacity - cell;
				ring.transport.bulk_read_from_mut(storage, cell, dest, di, head);
				ring.transport.bulk_read_from_mut(storage, 0, dest, di + head, n - head);
			}
			pos += n as u64;
			di += n;
			n_read += n;
			if state.closed {
				break;
			}
		}
		n_read
	}

	fn count_between_exceeds(&self, other: &Self, n: usize) -> TBool {
		if !Arc::ptr_eq(&self.ring, &other.ring) || other.pos < self.pos {
			return TBool::Fail;
		}
		// The ring can never host more than `capacity` live elements, so any
		// larger n is a definite no.
		if n as u64 > self.ring.capacity as u64 {
			return TBool::False;
		}
		TBool::of(other.pos - self.pos >= n as u64)
	}
}
