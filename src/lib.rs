// SPDX-License-Identifier: Apache-2.0

//! ## How it works
//!
//! Every container here is an append-only sequence reached through *cursors*:
//! opaque positions that advance, read singly or in bulk, and compare
//! partially (cursors of different buffers are unrelated). On top of the
//! cursor protocol sits one snapshot discipline: `snapshot` captures a
//! position, `restore` rolls back to it with no other side effect, and on
//! channels `commit` renounces rollback and publishes progress to the other
//! side.
//!
//! Storage concerns live behind a *transport*, a stateless capability over one
//! element family. [`RefTransport`] stores owning handles, [`ValueTransport`]
//! stores packed primitives (bytes, UTF-16 units, integers, floats), and
//! [`BitTransport`] packs eight booleans per byte, MSB first. Buffers are
//! generic over their transport, so one buffer implementation serves every
//! family.
//!
//! Three buffer kinds come out of a [`Builder`]: a frozen [`RoBuf`], an
//! append-only [`IoBuf`] whose `restore` truncates and whose `freeze` produces
//! an `RoBuf`, and a bounded SPSC channel split into a [`ChanWriter`] and a
//! [`ChanReader`]. The channel is a circular buffer in three regions
//! (readable, written-but-uncommitted, free); writers block while it is full,
//! readers while it is empty, and nothing becomes readable until the producer
//! commits.
//!
//! Questions that can be ill-posed answer in three or four states rather than
//! panicking: see [`TBool`] and [`PCmp`].

mod builder;
mod channel;
mod cursor;
mod iobuf;
mod robuf;
mod transport;
mod truth;
mod unit;

pub use builder::{Builder, KindError};
pub use channel::{ChanReader, ChanWriter, Rcur, Wcur};
pub use cursor::{Checkpointable, Commitable, Cursor, ReadCursor, WriteCursor};
pub use iobuf::{IoBuf, IoCur};
pub use robuf::{RoBuf, RoCur};
pub use transport::{
	BitStorage, BitTransport, FrozenBits, PackedStorage, PackedValue, RefTransport, Transport,
	ValueTransport,
};
pub use truth::{PCmp, TBool};
pub use unit::{CodeUnitKind, PrimKind};
