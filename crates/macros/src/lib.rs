//! Procedural macros for replica.
//!
//! Provides `#[derive(Duplicate)]`, which turns a struct or enum into a
//! duplicable graph type by emitting its descriptor table and the
//! `Blank`/`Transform`/`Duplicate` impls.

use proc_macro::TokenStream;

/// Attribute parsing.
mod attrs;
/// Derive expansion.
mod duplicate;

/// Derives `replica::Duplicate`.
///
/// ```ignore
/// #[derive(Duplicate)]
/// #[duplicate(hook = rebuild_index)]
/// pub struct Section {
///     #[duplicate(identity)]
///     id: Uuid,
///     name: String,
///     #[duplicate(Duplicate, elements = Duplicate)]
///     plates: Vec<Shared<Plate>>,
///     #[duplicate(MapOrCopy)]
///     material: Option<Shared<Material>>,
///     #[duplicate(skip)]
///     index: HashMap<String, usize>,
/// }
/// ```
///
/// # Type Attributes
///
/// - `policy = <Policy>` - Default policy for fields of this type
/// - `hook = <method>` - `fn(&mut self)` run after the duplicate is populated
/// - `blank = <path>` - `fn(&Self) -> Self` allocating the blank duplicate
/// - `sequence` / `associative` / `fixed` - User container; contents are
///   populated through the matching container trait and fields default to
///   `DoNotCopy`
///
/// # Field Attributes
///
/// - `<Policy>` or `policy = <Policy>` - Field policy
/// - `skip` - Same as `DoNotCopy`
/// - `elements = <Policy>`, `keys = <Policy>`, `values = <Policy>` -
///   Container content policies
/// - `identity` - Field holds the stable id used for cross-references
///
/// Policies: `Copy`, `DoNotCopy`, `Duplicate`, `Map`, `MapOrCopy`,
/// `MapOrDuplicate`.
#[proc_macro_derive(Duplicate, attributes(duplicate))]
pub fn derive_duplicate(input: TokenStream) -> TokenStream {
	duplicate::derive_duplicate(input)
}
