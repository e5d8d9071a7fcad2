use proc_macro2::Span;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Ident, Path, Result};

const POLICIES: &[&str] = &[
	"Copy",
	"DoNotCopy",
	"Duplicate",
	"Map",
	"MapOrCopy",
	"MapOrDuplicate",
];

/// `#[duplicate(...)]` on the type.
#[derive(Default)]
pub struct TypeAttrs {
	pub policy: Option<Ident>,
	pub hook: Option<Ident>,
	pub blank: Option<Path>,
	pub container: Option<Ident>,
}

/// `#[duplicate(...)]` on a field.
#[derive(Default)]
pub struct FieldAttrs {
	pub policy: Option<Ident>,
	pub elements: Option<Ident>,
	pub keys: Option<Ident>,
	pub values: Option<Ident>,
	pub identity: bool,
}

fn parse_policy(meta: &ParseNestedMeta<'_>) -> Result<Ident> {
	let ident: Ident = meta.value()?.parse()?;
	check_policy(meta, ident)
}

fn check_policy(meta: &ParseNestedMeta<'_>, ident: Ident) -> Result<Ident> {
	if POLICIES.iter().any(|p| ident == p) {
		Ok(ident)
	} else {
		Err(meta.error(format!(
			"unknown policy `{ident}`; expected one of {}",
			POLICIES.join(", ")
		)))
	}
}

fn set_once<T>(meta: &ParseNestedMeta<'_>, slot: &mut Option<T>, value: T, what: &str) -> Result<()> {
	if slot.is_some() {
		return Err(meta.error(format!("{what} declared twice")));
	}
	*slot = Some(value);
	Ok(())
}

impl TypeAttrs {
	pub fn parse(attrs: &[Attribute]) -> Result<Self> {
		let mut out = Self::default();
		for attr in attrs.iter().filter(|a| a.path().is_ident("duplicate")) {
			attr.parse_nested_meta(|meta| {
				if meta.path.is_ident("policy") {
					let policy = parse_policy(&meta)?;
					set_once(&meta, &mut out.policy, policy, "policy")
				} else if meta.path.is_ident("hook") {
					let hook: Ident = meta.value()?.parse()?;
					set_once(&meta, &mut out.hook, hook, "hook")
				} else if meta.path.is_ident("blank") {
					let path: Path = meta.value()?.parse()?;
					set_once(&meta, &mut out.blank, path, "blank")
				} else if let Some(ident) = meta.path.get_ident()
					&& (ident == "sequence" || ident == "associative" || ident == "fixed")
				{
					set_once(&meta, &mut out.container, ident.clone(), "container kind")
				} else {
					Err(meta.error("unknown type attribute"))
				}
			})?;
		}
		Ok(out)
	}
}

impl FieldAttrs {
	pub fn parse(attrs: &[Attribute]) -> Result<Self> {
		let mut out = Self::default();
		for attr in attrs.iter().filter(|a| a.path().is_ident("duplicate")) {
			attr.parse_nested_meta(|meta| {
				if meta.path.is_ident("skip") {
					let policy = Ident::new("DoNotCopy", Span::call_site());
					set_once(&meta, &mut out.policy, policy, "policy")
				} else if meta.path.is_ident("identity") {
					out.identity = true;
					Ok(())
				} else if meta.path.is_ident("policy") {
					let policy = parse_policy(&meta)?;
					set_once(&meta, &mut out.policy, policy, "policy")
				} else if meta.path.is_ident("elements") {
					let policy = parse_policy(&meta)?;
					set_once(&meta, &mut out.elements, policy, "elements")
				} else if meta.path.is_ident("keys") {
					let policy = parse_policy(&meta)?;
					set_once(&meta, &mut out.keys, policy, "keys")
				} else if meta.path.is_ident("values") {
					let policy = parse_policy(&meta)?;
					set_once(&meta, &mut out.values, policy, "values")
				} else if let Some(ident) = meta.path.get_ident() {
					let policy = check_policy(&meta, ident.clone())?;
					set_once(&meta, &mut out.policy, policy, "policy")
				} else {
					Err(meta.error("unknown field attribute"))
				}
			})?;
		}
		Ok(out)
	}
}
