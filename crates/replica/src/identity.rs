//! Identity keys for cross-reference tracking.
//!
//! An [`IdentityKey`] decides whether two encounters during one session refer
//! to "the same source object". Objects exposing a stable id are keyed by
//! value; everything else is keyed by allocation address.

use std::fmt;

use uuid::Uuid;

use crate::Duplicate;
use crate::shared::Shared;


/// Persistent unique id of a domain object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StableId(u128);

impl StableId {
	pub const fn new(raw: u128) -> Self {
		Self(raw)
	}

	pub const fn get(self) -> u128 {
		self.0
	}
}

impl fmt::Display for StableId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:032x}", self.0)
	}
}

impl From<Uuid> for StableId {
	fn from(id: Uuid) -> Self {
		Self(id.as_u128())
	}
}

impl From<u128> for StableId {
	fn from(raw: u128) -> Self {
		Self(raw)
	}
}

impl From<u64> for StableId {
	fn from(raw: u64) -> Self {
		Self(u128::from(raw))
	}
}

/// Field types usable as a stable identity (`#[duplicate(identity)]`).
pub trait AsStableId {
	/// Returns the id, or `None` when the object has none yet.
	fn as_stable_id(&self) -> Option<StableId>;
}

impl AsStableId for StableId {
	fn as_stable_id(&self) -> Option<StableId> {
		Some(*self)
	}
}

impl AsStableId for Uuid {
	fn as_stable_id(&self) -> Option<StableId> {
		(!self.is_nil()).then(|| StableId::from(*self))
	}
}

impl AsStableId for u128 {
	fn as_stable_id(&self) -> Option<StableId> {
		Some(StableId(*self))
	}
}

impl AsStableId for u64 {
	fn as_stable_id(&self) -> Option<StableId> {
		Some(StableId::from(*self))
	}
}

impl<T: AsStableId> AsStableId for Option<T> {
	fn as_stable_id(&self) -> Option<StableId> {
		self.as_ref().and_then(AsStableId::as_stable_id)
	}
}

/// Key under which a source object is tracked in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKey {
	/// Key of the null reference. Sessions never store or match it.
	Null,
	/// Value-compared stable id.
	Stable(StableId),
	/// Allocation address of the node.
	Address(usize),
}

impl IdentityKey {
	/// Derives the key of `object`.
	///
	/// Falls back to the address when the node cannot be borrowed to read
	/// its id; the duplicator reports that borrow conflict separately.
	pub fn of<T: Duplicate>(object: &Shared<T>) -> Self {
		match object.try_borrow() {
			Ok(inner) => inner
				.stable_id()
				.map_or(IdentityKey::Address(object.addr()), IdentityKey::Stable),
			Err(_) => IdentityKey::Address(object.addr()),
		}
	}

	/// Derives the key of a nullable reference.
	pub fn of_option<T: Duplicate>(object: Option<&Shared<T>>) -> Self {
		object.map_or(IdentityKey::Null, Self::of)
	}

	#[inline]
	pub const fn is_null(self) -> bool {
		matches!(self, IdentityKey::Null)
	}
}

impl fmt::Display for IdentityKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IdentityKey::Null => f.write_str("null"),
			IdentityKey::Stable(id) => write!(f, "id:{id}"),
			IdentityKey::Address(addr) => write!(f, "addr:{addr:#x}"),
		}
	}
}
