// SPDX-License-Identifier: Apache-2.0

//! Factories wiring a transport to an initial storage and materializing one of
//! the three buffer kinds.

use crate::channel::{channel, ChanReader, ChanWriter};
use crate::iobuf::IoBuf;
use crate::robuf::RoBuf;
use crate::transport::bit::BitStorage;
use crate::transport::packed::PackedStorage;
use crate::transport::{BitTransport, PackedValue, RefTransport, Transport, ValueTransport};
use crate::unit::{CodeUnitKind, PrimKind};

/// The requested code-unit kind cannot describe the requested primitive
/// storage (wrong width family, or a variable-width kind like UTF-8 that no
/// packed storage can hold).
#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("code-unit kind {kind:?} cannot describe {prim:?} storage")]
pub struct KindError {
	pub kind: CodeUnitKind,
	pub prim: PrimKind,
}

/// Which primitive families each fixed-width kind admits.
fn kind_admits(kind: CodeUnitKind, prim: PrimKind) -> bool {
	use CodeUnitKind as K;
	use PrimKind as P;
	matches!(
		(kind, prim),
		(K::Bit, P::Bool)
			| (K::Byte, P::Byte)
			| (K::Utf16, P::Char16 | P::Short)
			| (K::Int32 | K::Utf32, P::Int32)
			| (K::Int64, P::Int64)
			| (K::Float32, P::Float32)
			| (K::Float64, P::Float64)
	)
}

/// A factory tying a transport to a storage instance. Terminal calls consume
/// the builder: the storage becomes the buffer's.
#[derive(Debug)]
pub struct Builder<T: Transport> {
	transport: T,
	storage: T::Mut,
}

impl<T: Transport> Builder<T> {
	/// Freezes the initial contents into a read-only buffer.
	pub fn build_read_only(self) -> RoBuf<T> {
		let len = self.transport.len_of_mut(&self.storage);
		let data = self.transport.freeze(&self.storage, 0, len);
		RoBuf::new(self.transport, data)
	}

	/// An append-only buffer seeded with the initial contents.
	pub fn build_read_write(self) -> IoBuf<T> {
		IoBuf::new(self.transport, self.storage)
	}

	/// A bounded SPSC channel; `capacity` must be at least 2. The channel
	/// starts empty regardless of initial contents.
	pub fn build_channel(self, capacity: usize) -> (ChanWriter<T>, ChanReader<T>) {
		channel(self.transport, self.storage, capacity)
	}
}

impl<E: Clone + Default> Builder<RefTransport<E>> {
	/// Builder over owning handles.
	pub fn for_refs() -> Self {
		let transport = RefTransport::new();
		let storage = transport.create_storage();
		Self { transport, storage }
	}

	/// Builder over owning handles, seeded with `initial`.
	pub fn for_refs_with(initial: impl IntoIterator<Item = E>) -> Self {
		Self {
			transport: RefTransport::new(),
			storage: initial.into_iter().collect(),
		}
	}
}

impl Builder<BitTransport> {
	/// Builder over single bits.
	pub fn for_bits() -> Self {
		Self { transport: BitTransport, storage: BitTransport.create_storage() }
	}

	/// Builder over single bits, seeded from packed bytes; each byte expands
	/// to eight bits, most significant first.
	pub fn for_bits_with(packed: &[u8]) -> Self {
		Self { transport: BitTransport, storage: BitStorage::from_packed(packed) }
	}
}

impl<P: PackedValue> Builder<ValueTransport<P>> {
	/// Generic entry point for packed value storage of the given kind.
	pub fn for_values(kind: CodeUnitKind) -> Result<Self, KindError> {
		Self::for_values_with(kind, &[])
	}

	/// Generic entry point, seeded with `initial`.
	pub fn for_values_with(kind: CodeUnitKind, initial: &[P]) -> Result<Self, KindError> {
		if !kind_admits(kind, P::PRIM) {
			return Err(KindError { kind, prim: P::PRIM });
		}
		Ok(Self {
			transport: ValueTransport::new(kind),
			storage: PackedStorage::from_slice(initial),
		})
	}
}

macro_rules! value_builders {
	($($(#[$doc:meta])+ $ty:ty, $kind:ident, $empty:ident, $with:ident;)+) => {
		$(
		impl Builder<ValueTransport<$ty>> {
			$(#[$doc])+
			pub fn $empty() -> Self {
				Self::$with(&[])
			}

			$(#[$doc])+
			///
			/// Seeded with `initial`.
			pub fn $with(initial: &[$ty]) -> Self {
				Self {
					transport: ValueTransport::new(CodeUnitKind::$kind),
					storage: PackedStorage::from_slice(initial),
				}
			}
		}
		)+
	};
}

value_builders! {
	/// Builder over octets.
	u8, Byte, for_bytes, for_bytes_with;
	/// Builder over UTF-16 code units.
	u16, Utf16, for_chars, for_chars_with;
	/// Builder over signed 16-bit values.
	i16, Utf16, for_shorts, for_shorts_with;
	/// Builder over signed 32-bit values.
	i32, Int32, for_ints, for_ints_with;
	/// Builder over unsigned 32-bit values.
	u32, Utf32, for_uints, for_uints_with;
	/// Builder over signed 64-bit values.
	i64, Int64, for_longs, for_longs_with;
	/// Builder over 32-bit floats.
	f32, Float32, for_floats, for_floats_with;
	/// Builder over 64-bit floats.
	f64, Float64, for_doubles, for_doubles_with;
}
