//! Type registry.
//!
//! Every `#[derive(Duplicate)]` type submits its [`TypeDescriptor`] through
//! `inventory`. The registry indexes them by qualified id (`module::Name`)
//! and by bare name, and audits their policy declarations.
//!
//! ```rust,ignore
//! let material = replica::registry::find("Material").unwrap();
//! for conflict in replica::registry::audit() {
//!     eprintln!("{conflict}");
//! }
//! ```

use std::fmt;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::descriptor::{TypeDescriptor, ValueKind};
use crate::policy::{Policy, resolve_field_policy};


/// Inventory wrapper for a derived type's descriptor.
pub struct TypeReg(pub &'static TypeDescriptor);

inventory::collect!(TypeReg);

/// Indexed collection of registered descriptors.
pub struct TypeIndex {
	items: Vec<&'static TypeDescriptor>,
	by_key: FxHashMap<String, &'static TypeDescriptor>,
}

impl TypeIndex {
	/// Builds an index, sorted by qualified id.
	///
	/// When two types share a bare name the first one by id keeps the
	/// name; both stay reachable by qualified id.
	pub fn build(defs: impl IntoIterator<Item = &'static TypeDescriptor>) -> Self {
		let mut items: Vec<_> = defs.into_iter().collect();
		items.sort_by_cached_key(|d| d.qualified_name());
		items.dedup_by(|a, b| std::ptr::eq(*a, *b));

		let mut by_key = FxHashMap::default();
		for def in &items {
			by_key.insert(def.qualified_name(), *def);
		}
		for def in &items {
			if let Some(existing) = by_key.get(def.name) {
				if !std::ptr::eq(*existing, *def) {
					warn!(
						name = def.name,
						kept = %existing.qualified_name(),
						ignored = %def.qualified_name(),
						"duplicable type name collision"
					);
				}
				continue;
			}
			by_key.insert(def.name.to_string(), *def);
		}

		Self { items, by_key }
	}

	/// Looks up a descriptor by qualified id or bare name.
	pub fn get(&self, key: &str) -> Option<&'static TypeDescriptor> {
		self.by_key.get(key).copied()
	}

	pub fn items(&self) -> &[&'static TypeDescriptor] {
		&self.items
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &'static TypeDescriptor> + '_ {
		self.items.iter().copied()
	}
}

static TYPES: LazyLock<TypeIndex> =
	LazyLock::new(|| TypeIndex::build(inventory::iter::<TypeReg>.into_iter().map(|reg| reg.0)));

/// Returns the index of every registered type.
pub fn types() -> &'static TypeIndex {
	&TYPES
}

/// Looks up a registered type by qualified id or bare name.
pub fn find(key: &str) -> Option<&'static TypeDescriptor> {
	TYPES.get(key)
}

/// Why a declaration has no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
	/// A non-copy policy on a primitive or text value; behaves as `Copy`.
	PolicyOnValue,
	/// `Map` on a value without identity; the field is always left unset.
	MapWithoutIdentity,
	/// Element, key or value policies on a field without contents.
	ContentsOnLeaf,
}

/// A declaration that duplication treats as a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConflict {
	pub type_name: &'static str,
	pub field: &'static str,
	pub policy: Policy,
	pub reason: ConflictReason,
}

impl fmt::Display for PolicyConflict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.reason {
			ConflictReason::PolicyOnValue => write!(
				f,
				"{}.{}: `{}` on a plain value behaves as `copy`",
				self.type_name, self.field, self.policy
			),
			ConflictReason::MapWithoutIdentity => write!(
				f,
				"{}.{}: `{}` never resolves a value without identity; the field stays unset",
				self.type_name, self.field, self.policy
			),
			ConflictReason::ContentsOnLeaf => write!(
				f,
				"{}.{}: element policy `{}` on a field without contents is ignored",
				self.type_name, self.field, self.policy
			),
		}
	}
}

/// Reports the ineffective declarations of one type.
pub fn audit_descriptor(desc: &'static TypeDescriptor) -> Vec<PolicyConflict> {
	let mut conflicts = Vec::new();
	for field in desc.fields {
		let resolved = resolve_field_policy(field, desc.container);
		let reason = match (field.kind, resolved.field) {
			(ValueKind::Reference, _) | (_, Policy::Copy | Policy::DoNotCopy) => None,
			(_, Policy::Map) => Some(ConflictReason::MapWithoutIdentity),
			(ValueKind::Value, _) => Some(ConflictReason::PolicyOnValue),
			_ => None,
		};
		if let Some(reason) = reason {
			conflicts.push(PolicyConflict {
				type_name: desc.name,
				field: field.name,
				policy: resolved.field,
				reason,
			});
		}
		if !field.kind.has_contents() {
			let declared = field.declared;
			if let Some(policy) = declared.element.or(declared.key).or(declared.value) {
				conflicts.push(PolicyConflict {
					type_name: desc.name,
					field: field.name,
					policy,
					reason: ConflictReason::ContentsOnLeaf,
				});
			}
		}
	}
	conflicts
}

/// Audits every registered type and logs each conflict.
pub fn audit() -> Vec<PolicyConflict> {
	let conflicts: Vec<_> = TYPES.iter().flat_map(audit_descriptor).collect();
	for conflict in &conflicts {
		warn!(%conflict, "ineffective duplication policy");
	}
	conflicts
}
