//! Per-type descriptor tables.
//!
//! `#[derive(Duplicate)]` emits one static [`TypeDescriptor`] per type, listing
//! every field with its declared policies and the declarations carried by the
//! field's type. The table is built once at compile time and registered with
//! the [type registry](crate::registry).

use crate::policy::{FieldPolicy, Policy, PolicyDecl, resolve_field_policy};

/// Container shapes understood by the container specializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
	/// Appendable sequence (`Vec`, sets, user sequences).
	Sequence,
	/// Fixed-size sequence written by position (arrays, boxed slices).
	Fixed,
	/// Key/value entries (`HashMap`, `BTreeMap`, user maps).
	Associative,
}

/// Broad shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
	/// Primitive or text value; already independent when copied.
	Value,
	/// Graph reference with identity ([`Shared`](crate::Shared)).
	Reference,
	/// Container owned by value.
	Container(ContainerKind),
	/// Struct, enum or pair owned by value.
	Composite,
}

impl ValueKind {
	/// Returns true if element, key or value policies apply to this kind.
	pub const fn has_contents(self) -> bool {
		matches!(self, ValueKind::Container(_) | ValueKind::Composite)
	}
}

/// One field of a duplicable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
	/// Field name; tuple fields use their index, enum fields `Variant.field`.
	pub name: &'static str,
	/// Declared type as written in source.
	pub type_name: &'static str,
	/// Policies attached directly to the field.
	pub declared: PolicyDecl,
	/// Policies carried by the field's type.
	pub type_policy: PolicyDecl,
	/// Shape of the field's value.
	pub kind: ValueKind,
	/// Field holds the owner's stable identity.
	pub identity: bool,
}

/// Descriptor table of a duplicable type.
#[derive(Debug)]
pub struct TypeDescriptor {
	/// Type name.
	pub name: &'static str,
	/// Module path the type was declared in.
	pub module: &'static str,
	/// Type-level default policy for fields of this type.
	pub policy: Option<Policy>,
	/// Container kind if the type is a user-defined container.
	pub container: Option<ContainerKind>,
	/// Fields in declaration order.
	pub fields: &'static [FieldDescriptor],
	/// Type declares a post-duplication hook.
	pub has_hook: bool,
}

impl TypeDescriptor {
	/// Looks up a field by name.
	pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
		self.fields.iter().find(|f| f.name == name)
	}

	/// Resolves the policies of the named field.
	pub fn field_policy(&self, name: &str) -> Option<FieldPolicy> {
		self.field(name)
			.map(|f| resolve_field_policy(f, self.container))
	}

	/// Returns the field carrying the stable identity, if any.
	pub fn identity_field(&self) -> Option<&'static FieldDescriptor> {
		self.fields.iter().find(|f| f.identity)
	}

	/// Fully qualified `module::Name` identifier.
	pub fn qualified_name(&self) -> String {
		format!("{}::{}", self.module, self.name)
	}
}
