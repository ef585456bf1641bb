// SPDX-License-Identifier: Apache-2.0

//! Read-only buffers over frozen storage.

use std::fmt;
use std::ptr;
use crate::cursor::{Checkpointable, Cursor, ReadCursor};
use crate::transport::Transport;
use crate::truth::{PCmp, TBool};

/// A frozen view of immutable storage. Cursors are plain indices into the
/// fixed length; the end index is the one-past-the-last sentinel.
pub struct RoBuf<T: Transport> {
	transport: T,
	data: T::Imu,
	len: usize,
}

impl<T: Transport> RoBuf<T> {
	pub(crate) fn new(transport: T, data: T::Imu) -> Self {
		let len = transport.len_of_imu(&data);
		Self { transport, data, len }
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// A cursor at the first element.
	pub fn start(&self) -> RoCur<'_, T> {
		RoCur { buf: self, index: 0 }
	}

	/// The end sentinel cursor.
	pub fn end(&self) -> RoCur<'_, T> {
		RoCur { buf: self, index: self.len }
	}

	fn read_at(&self, index: usize) -> Option<T::Elem> {
		(index < self.len).then(|| self.transport.read_from_imu(&self.data, index))
	}
}

impl<T: Transport> Checkpointable for RoBuf<T> {
	type Mark<'a> = RoCur<'a, T> where Self: 'a;

	fn snapshot(&self) -> RoCur<'_, T> {
		self.start()
	}

	/// Nothing to roll back; only validates that the cursor is one of ours.
	fn restore<'a>(&'a self, mark: &RoCur<'a, T>) {
		assert!(ptr::eq(self, mark.buf), "cursor from a different buffer");
	}
}

/// A read cursor into a [`RoBuf`].
pub struct RoCur<'b, T: Transport> {
	buf: &'b RoBuf<T>,
	index: usize,
}

impl<T: Transport> Clone for RoCur<'_, T> {
	fn clone(&self) -> Self { *self }
}

impl<T: Transport> Copy for RoCur<'_, T> {}

impl<T: Transport> PartialEq for RoCur<'_, T> {
	fn eq(&self, other: &Self) -> bool {
		ptr::eq(self.buf, other.buf) && self.index == other.index
	}
}

impl<T: Transport> fmt::Debug for RoCur<'_, T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RoCur").field("index", &self.index).finish()
	}
}

impl<T: Transport> Cursor for RoCur<'_, T> {
	fn pcmp(&self, other: &Self) -> PCmp {
		if !ptr::eq(self.buf, other.buf) {
			return PCmp::Unrelated;
		}
		PCmp::from(self.index.cmp(&other.index))
	}
}

impl<T: Transport> ReadCursor for RoCur<'_, T> {
	type Elem = T::Elem;

	fn advance(&self, delta: usize) -> Option<Self> {
		let index = self.index + delta;
		(index <= self.buf.len).then_some(Self { buf: self.buf, index })
	}

	fn read(&self) -> Option<T::Elem> {
		self.buf.read_at(self.index)
	}

	fn read_into(&self, dest: &mut [T::Elem], di: usize, n: usize) -> usize {
		self.buf.transport.bulk_read_from_imu(&self.buf.data, self.index, dest, di, n)
	}

	fn count_between_exceeds(&self, other: &Self, n: usize) -> TBool {
		if !ptr::eq(self.buf, other.buf) || other.index < self.index {
			return TBool::Fail;
		}
		TBool::of(other.index - self.index >= n)
	}
}
