// SPDX-License-Identifier: Apache-2.0

//! The cursor protocol shared by every buffer kind, and the snapshot /
//! rollback / commit discipline built on top of it.
//!
//! Cursors are immutable value types: advancing yields a new cursor, and
//! equality is by (buffer identity, position), never object identity. A cursor
//! is only meaningful against the buffer that issued it; questions across
//! buffers answer [`PCmp::Unrelated`] or [`TBool::Fail`].

use crate::truth::{PCmp, TBool};

/// A position within a buffer, partially comparable with other cursors of the
/// same type.
pub trait Cursor {
	/// Partial comparison by position. Cursors into different buffers are
	/// [`PCmp::Unrelated`].
	fn pcmp(&self, other: &Self) -> PCmp;
}

/// A cursor that can be advanced and read through.
pub trait ReadCursor: Cursor + Sized {
	type Elem;

	/// Returns a cursor `delta` elements forward, or `None` if that would pass
	/// the end of the readable region.
	fn advance(&self, delta: usize) -> Option<Self>;

	/// Advances by a single element.
	fn step(&self) -> Option<Self> {
		self.advance(1)
	}

	/// Reads the element under the cursor, or `None` at the end of the
	/// readable region. On a channel this blocks until an element is
	/// committed or the channel closes.
	fn read(&self) -> Option<Self::Elem>;

	/// Bulk-reads up to `n` elements into `dest` starting at `di`, returning
	/// the count actually copied. Copies never pass the readable end nor the
	/// end of `dest`.
	fn read_into(&self, dest: &mut [Self::Elem], di: usize, n: usize) -> usize;

	/// `True` iff `other` indexes the same buffer, does not precede this
	/// cursor, and at least `n` elements lie between the two. `Fail` iff the
	/// cursors index different buffers or `other` precedes this cursor.
	/// `False` otherwise.
	fn count_between_exceeds(&self, other: &Self, n: usize) -> TBool;
}

/// A cursor positioned at the append end of a writable buffer.
pub trait WriteCursor: Cursor {
	/// Makes room to append. For plain buffers this grows the backing storage
	/// and returns the resulting capacity. For channels it blocks until at
	/// least one free cell exists and returns the free cell count, or 0 once
	/// the channel is closed.
	fn need_capacity(&self, n: usize) -> usize;
}

/// A structure whose position can be snapshotted and rolled back.
///
/// `restore` is the rollback primitive behind fail-pure control flow: a failed
/// speculative computation restores the snapshot it took and leaves no
/// observable effect behind. Both operations are O(1).
pub trait Checkpointable {
	/// The cursor type handed out as a snapshot. In-place buffers issue
	/// cursors borrowing the buffer; channel sides issue owned cursors.
	type Mark<'a> where Self: 'a;

	/// Captures the current position.
	fn snapshot(&self) -> Self::Mark<'_>;

	/// Rolls back to a snapshot previously taken from this value.
	///
	/// # Panics
	///
	/// Panics if `mark` was issued by a different buffer, or lies outside the
	/// range that can still be rolled back.
	fn restore<'a>(&'a self, mark: &Self::Mark<'a>);
}

/// A [`Checkpointable`] that can renounce rollback up to a cursor, publishing
/// everything before it.
pub trait Commitable: Checkpointable {
	/// Invalidates snapshots preceding `mark`. On a channel writer this moves
	/// written elements into the readable region; on a reader it returns
	/// consumed elements to the free region.
	///
	/// # Panics
	///
	/// Panics if `mark` was issued by a different buffer or lies outside the
	/// committable range.
	fn commit<'a>(&'a self, mark: &Self::Mark<'a>);
}
