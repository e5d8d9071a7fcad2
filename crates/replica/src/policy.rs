//! Copy policies and their resolution.
//!
//! A [`Policy`] says what happens to one value when its owner is duplicated.
//! Policies are declared on fields (`#[duplicate(Duplicate)]`), on types
//! (`#[duplicate(policy = Map)]`), or fall back to a structural default.
//!
//! # Resolution Order
//!
//! 1. Field-level declaration
//! 2. Declaration on the field's own type
//! 3. Structural default: [`Policy::DoNotCopy`] when the owner is a container
//!    kind, [`Policy::Copy`] otherwise
//!
//! Element, key and value policies of container fields resolve the same way,
//! except that an element policy left open is filled at run time with the
//! duplicator's default element policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::{ContainerKind, FieldDescriptor};


/// Behavior applied to a value while its owner is duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
	/// Assign the same reference or value.
	#[default]
	Copy,
	/// Leave the target at its zero value.
	DoNotCopy,
	/// Produce a new, independent copy.
	Duplicate,
	/// Resolve through the session map; leave unset when unresolved.
	Map,
	/// Resolve through the session map; fall back to [`Policy::Copy`].
	MapOrCopy,
	/// Resolve through the session map; fall back to [`Policy::Duplicate`].
	MapOrDuplicate,
}

impl Policy {
	/// Every policy, in declaration order.
	pub const ALL: [Policy; 6] = [
		Policy::Copy,
		Policy::DoNotCopy,
		Policy::Duplicate,
		Policy::Map,
		Policy::MapOrCopy,
		Policy::MapOrDuplicate,
	];

	/// Returns true for the policies that consult the session map.
	#[inline]
	pub const fn is_map(self) -> bool {
		matches!(self, Policy::Map | Policy::MapOrCopy | Policy::MapOrDuplicate)
	}

	/// Returns true for the policies that leave a value without identity
	/// unset: [`Policy::DoNotCopy`], and [`Policy::Map`] since such a value
	/// is never found in the session map.
	#[inline]
	pub const fn skips_unmapped(self) -> bool {
		matches!(self, Policy::DoNotCopy | Policy::Map)
	}

	/// Policy applied after a map lookup misses.
	///
	/// `None` means the value is skipped. Non-map policies return themselves.
	#[inline]
	pub const fn fallback(self) -> Option<Policy> {
		match self {
			Policy::Map => None,
			Policy::MapOrCopy => Some(Policy::Copy),
			Policy::MapOrDuplicate => Some(Policy::Duplicate),
			other => Some(other),
		}
	}

	/// Returns the snake_case name used in configuration files.
	pub const fn as_str(self) -> &'static str {
		match self {
			Policy::Copy => "copy",
			Policy::DoNotCopy => "do_not_copy",
			Policy::Duplicate => "duplicate",
			Policy::Map => "map",
			Policy::MapOrCopy => "map_or_copy",
			Policy::MapOrDuplicate => "map_or_duplicate",
		}
	}
}

impl fmt::Display for Policy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a string names no policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown duplication policy: {0}")]
pub struct ParsePolicyError(pub String);

impl FromStr for Policy {
	type Err = ParsePolicyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Policy::ALL
			.into_iter()
			.find(|p| p.as_str() == s)
			.ok_or_else(|| ParsePolicyError(s.to_string()))
	}
}

/// Policies declared on a field or carried by a type.
///
/// The same shape serves both sides of resolution: attributes written on a
/// field, and the declarations a field type exposes through
/// [`Transform::POLICY`](crate::Transform::POLICY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyDecl {
	/// Policy for the value itself.
	pub own: Option<Policy>,
	/// Policy for sequential elements.
	pub element: Option<Policy>,
	/// Policy for keys of paired entries.
	pub key: Option<Policy>,
	/// Policy for values of paired entries.
	pub value: Option<Policy>,
}

impl PolicyDecl {
	/// No declarations.
	pub const NONE: PolicyDecl = PolicyDecl {
		own: None,
		element: None,
		key: None,
		value: None,
	};

	/// Declares only the value's own policy.
	pub const fn own(policy: Policy) -> Self {
		PolicyDecl {
			own: Some(policy),
			..Self::NONE
		}
	}

	/// Declarations of a sequence whose items declare `item`.
	///
	/// The item's own policy becomes the element policy; key and value
	/// declarations pass through for sequences of pairs.
	pub const fn elements_of(item: PolicyDecl) -> Self {
		PolicyDecl {
			own: None,
			element: or(item.own, item.element),
			key: item.key,
			value: item.value,
		}
	}

	/// Declarations of a paired-entry container.
	pub const fn entries_of(key: PolicyDecl, value: PolicyDecl) -> Self {
		PolicyDecl {
			own: None,
			element: None,
			key: key.own,
			value: value.own,
		}
	}

	/// Returns true if any element, key or value policy is declared.
	pub const fn declares_contents(&self) -> bool {
		self.element.is_some() || self.key.is_some() || self.value.is_some()
	}
}

/// Element policies of a container field, possibly left open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementPolicy {
	pub element: Option<Policy>,
	pub key: Option<Policy>,
	pub value: Option<Policy>,
}

impl ElementPolicy {
	/// Fills open slots with `default`. Keys and values inherit the element policy.
	#[inline]
	pub const fn resolve(self, default: Policy) -> Elements {
		let element = match self.element {
			Some(p) => p,
			None => default,
		};
		Elements {
			element,
			key: match self.key {
				Some(p) => p,
				None => element,
			},
			value: match self.value {
				Some(p) => p,
				None => element,
			},
		}
	}
}

/// Concrete element, key and value policies used by the container specializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elements {
	pub element: Policy,
	pub key: Policy,
	pub value: Policy,
}

impl Elements {
	/// Shallow copy of every element.
	pub const COPY: Elements = Elements::uniform(Policy::Copy);

	/// Same policy for elements, keys and values.
	pub const fn uniform(policy: Policy) -> Self {
		Elements {
			element: policy,
			key: policy,
			value: policy,
		}
	}
}

impl Default for Elements {
	fn default() -> Self {
		Self::COPY
	}
}

/// Resolved policies for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPolicy {
	/// Policy for the field's value.
	pub field: Policy,
	/// Policies for the field's contents if it holds a container.
	pub elements: ElementPolicy,
}

/// Resolves the policies of `field` on an owner of the given container kind.
///
/// Deterministic and free of side effects; derived types evaluate it at
/// compile time so duplication never repeats the lookup.
pub const fn resolve_field_policy(
	field: &FieldDescriptor,
	container: Option<ContainerKind>,
) -> FieldPolicy {
	let declared = field.declared;
	let carried = field.type_policy;

	let structural = match container {
		Some(_) => Policy::DoNotCopy,
		None => Policy::Copy,
	};
	let policy = match or(declared.own, carried.own) {
		Some(p) => p,
		None => structural,
	};

	let element = or(declared.element, carried.element);
	FieldPolicy {
		field: policy,
		elements: ElementPolicy {
			element,
			key: or(or(declared.key, carried.key), element),
			value: or(or(declared.value, carried.value), element),
		},
	}
}

const fn or(first: Option<Policy>, second: Option<Policy>) -> Option<Policy> {
	match first {
		Some(_) => first,
		None => second,
	}
}
