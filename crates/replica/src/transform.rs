//! The value-transform rule.
//!
//! [`Transform`] applies a resolved [`Policy`] to one field or element value.
//! Leaf implementations live here: primitives and text, `Option`, pairs,
//! and [`Shared`] graph references. Containers are implemented in
//! [`crate::container`], derived types by `#[derive(Duplicate)]`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::trace;
use uuid::Uuid;

use crate::descriptor::ValueKind;
use crate::duplicator::{Duplicate, Duplicator};
use crate::error::DuplicateError;
use crate::identity::StableId;
use crate::policy::{Elements, Policy, PolicyDecl};
use crate::shared::Shared;

/// Allocation of a zero value without running construction logic.
pub trait Blank: Sized {
	/// Returns the zero value of the same concrete shape as `self`.
	///
	/// Enums keep their variant and fixed-size containers keep their length.
	/// Fails with [`DuplicateError::Instantiation`] when no zero value exists.
	fn blank_like(&self) -> Result<Self, DuplicateError>;
}

/// Applies a policy to a value.
pub trait Transform: Blank + 'static {
	/// Declarations carried by the type.
	const POLICY: PolicyDecl = PolicyDecl::NONE;
	/// Shape of the value.
	const KIND: ValueKind;

	/// Transforms `self` under `policy`.
	///
	/// `elements` supplies the policies for contents of containers and
	/// pairs. `Ok(None)` tells the caller to skip the assignment.
	fn transform(
		&self,
		policy: Policy,
		elements: Elements,
		cx: &mut Duplicator<'_>,
	) -> Result<Option<Self>, DuplicateError>;
}

/// Values without identity copy under every policy that does not skip.
///
/// A plain [`Policy::Map`] never resolves a value with no identity, so it
/// leaves the target at its zero value like [`Policy::DoNotCopy`].
macro_rules! value_transform {
	($($ty:ty => $zero:expr),* $(,)?) => {$(
		impl Blank for $ty {
			#[inline]
			fn blank_like(&self) -> Result<Self, DuplicateError> {
				Ok($zero)
			}
		}

		impl Transform for $ty {
			const KIND: ValueKind = ValueKind::Value;

			#[inline]
			fn transform(
				&self,
				policy: Policy,
				_: Elements,
				_: &mut Duplicator<'_>,
			) -> Result<Option<Self>, DuplicateError> {
				Ok((!policy.skips_unmapped()).then(|| self.clone()))
			}
		}
	)*};
}

value_transform! {
	() => (),
	bool => false,
	char => '\0',
	i8 => 0,
	i16 => 0,
	i32 => 0,
	i64 => 0,
	i128 => 0,
	isize => 0,
	u8 => 0,
	u16 => 0,
	u32 => 0,
	u64 => 0,
	u128 => 0,
	usize => 0,
	f32 => 0.0,
	f64 => 0.0,
	String => String::new(),
	&'static str => "",
	Rc<str> => Rc::from(""),
	Arc<str> => Arc::from(""),
	Uuid => Uuid::nil(),
	StableId => StableId::default(),
}

impl<T> Blank for Option<T> {
	#[inline]
	fn blank_like(&self) -> Result<Self, DuplicateError> {
		Ok(None)
	}
}

impl<T: Transform> Transform for Option<T> {
	const POLICY: PolicyDecl = T::POLICY;
	const KIND: ValueKind = T::KIND;

	fn transform(
		&self,
		policy: Policy,
		elements: Elements,
		cx: &mut Duplicator<'_>,
	) -> Result<Option<Self>, DuplicateError> {
		match self {
			Some(value) => Ok(value.transform(policy, elements, cx)?.map(Some)),
			// The null key never resolves, so a plain map skips like DoNotCopy.
			None if policy.skips_unmapped() => Ok(None),
			None => Ok(Some(None)),
		}
	}
}

impl<K: Blank, V: Blank> Blank for (K, V) {
	fn blank_like(&self) -> Result<Self, DuplicateError> {
		Ok((self.0.blank_like()?, self.1.blank_like()?))
	}
}

/// Paired entry: key and value transform independently under the key and
/// value policies; the pair is dropped when either side is skipped.
impl<K: Transform, V: Transform> Transform for (K, V) {
	const POLICY: PolicyDecl = PolicyDecl::entries_of(K::POLICY, V::POLICY);
	const KIND: ValueKind = ValueKind::Composite;

	fn transform(
		&self,
		policy: Policy,
		elements: Elements,
		cx: &mut Duplicator<'_>,
	) -> Result<Option<Self>, DuplicateError> {
		if policy.skips_unmapped() {
			return Ok(None);
		}
		let Some(key) = self.0.transform(elements.key, elements, cx)? else {
			return Ok(None);
		};
		Ok(self
			.1
			.transform(elements.value, elements, cx)?
			.map(|value| (key, value)))
	}
}

thread_local! {
	static BLANKING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// The zero value of a required reference is a fresh, unregistered node
/// holding the blank of the source node.
///
/// Required references that close a cycle have no such value.
impl<T: Duplicate> Blank for Shared<T> {
	fn blank_like(&self) -> Result<Self, DuplicateError> {
		let addr = self.addr();
		let entered = BLANKING.with_borrow_mut(|stack| {
			if stack.contains(&addr) {
				return false;
			}
			stack.push(addr);
			true
		});
		if !entered {
			return Err(DuplicateError::instantiation::<Self>(
				"required references form a cycle",
			));
		}
		let blank = self
			.try_borrow()
			.map_err(|_| DuplicateError::borrowed::<T>())
			.and_then(|source| source.blank_like());
		BLANKING.with_borrow_mut(|stack| stack.retain(|&a| a != addr));
		blank.map(Shared::new)
	}
}

impl<T: Duplicate> Transform for Shared<T> {
	const POLICY: PolicyDecl = T::POLICY;
	const KIND: ValueKind = ValueKind::Reference;

	fn transform(
		&self,
		policy: Policy,
		elements: Elements,
		cx: &mut Duplicator<'_>,
	) -> Result<Option<Self>, DuplicateError> {
		match policy {
			Policy::Copy => Ok(Some(self.clone())),
			Policy::DoNotCopy => Ok(None),
			Policy::Duplicate => cx.duplicate_node(self, elements).map(Some),
			Policy::Map | Policy::MapOrCopy | Policy::MapOrDuplicate => {
				if let Some(mapped) = cx.lookup(self) {
					return Ok(Some(mapped));
				}
				match policy.fallback() {
					Some(fallback) => self.transform(fallback, elements, cx),
					None => {
						trace!(
							ty = std::any::type_name::<T>(),
							node = self.addr(),
							"unresolved map reference left unset"
						);
						Ok(None)
					}
				}
			}
		}
	}
}
