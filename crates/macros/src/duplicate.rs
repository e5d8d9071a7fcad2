//! `#[derive(Duplicate)]` expansion.
//!
//! Emits, inside an anonymous const block:
//! * the field descriptor table and the type's static descriptor,
//! * the compile-time resolved `FieldPolicy` of every field,
//! * the `inventory` registration,
//! * `Blank`, `Transform` and `Duplicate` impls.
//!
//! Enum fields are numbered across all variants so one table covers the
//! whole type; their descriptor names read `Variant.field`.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Ident, Member, Type, parse_macro_input};

use crate::attrs::{FieldAttrs, TypeAttrs};

pub fn derive_duplicate(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	match expand(&input) {
		Ok(tokens) => tokens.into(),
		Err(err) => err.to_compile_error().into(),
	}
}

struct Field {
	index: usize,
	member: Member,
	binding: Ident,
	ty: Type,
	name: String,
	attrs: FieldAttrs,
}

struct Variant {
	ident: Ident,
	fields: Vec<Field>,
}

enum Shape {
	Struct(Vec<Field>),
	Enum(Vec<Variant>),
}

impl Shape {
	fn fields(&self) -> Box<dyn Iterator<Item = &Field> + '_> {
		match self {
			Shape::Struct(fields) => Box::new(fields.iter()),
			Shape::Enum(variants) => Box::new(variants.iter().flat_map(|v| v.fields.iter())),
		}
	}
}

fn collect_fields(fields: &Fields, prefix: Option<&Ident>, next: &mut usize) -> syn::Result<Vec<Field>> {
	let mut out = Vec::new();
	for (index, field) in fields.iter().enumerate() {
		let member = match &field.ident {
			Some(ident) => Member::Named(ident.clone()),
			None => Member::Unnamed(index.into()),
		};
		let local = match &field.ident {
			Some(ident) => ident.to_string(),
			None => index.to_string(),
		};
		let name = match prefix {
			Some(variant) => format!("{variant}.{local}"),
			None => local,
		};
		out.push(Field {
			index: *next,
			member,
			binding: format_ident!("__replica_{}", *next),
			ty: field.ty.clone(),
			name,
			attrs: FieldAttrs::parse(&field.attrs)?,
		});
		*next += 1;
	}

	let mut identities = out.iter().filter(|f| f.attrs.identity);
	if identities.next().is_some()
		&& let Some(extra) = identities.next()
	{
		return Err(syn::Error::new_spanned(
			&extra.ty,
			"only one field can be marked `identity`",
		));
	}
	Ok(out)
}

fn parse_shape(input: &DeriveInput) -> syn::Result<Shape> {
	let mut next = 0;
	match &input.data {
		Data::Struct(data) => Ok(Shape::Struct(collect_fields(&data.fields, None, &mut next)?)),
		Data::Enum(data) => {
			if data.variants.is_empty() {
				return Err(syn::Error::new_spanned(
					&input.ident,
					"Duplicate cannot be derived for an enum without variants",
				));
			}
			let mut variants = Vec::new();
			for variant in &data.variants {
				variants.push(Variant {
					ident: variant.ident.clone(),
					fields: collect_fields(&variant.fields, Some(&variant.ident), &mut next)?,
				});
			}
			Ok(Shape::Enum(variants))
		}
		Data::Union(_) => Err(syn::Error::new_spanned(
			&input.ident,
			"Duplicate cannot be derived for unions",
		)),
	}
}

fn policy_opt(policy: Option<&Ident>) -> TokenStream2 {
	match policy {
		Some(policy) => quote!(::core::option::Option::Some(::replica::Policy::#policy)),
		None => quote!(::core::option::Option::None),
	}
}

/// Container kind variant and population function for `sequence`,
/// `associative` and `fixed` types.
fn container_parts(kind: Option<&Ident>) -> Option<(Ident, Ident)> {
	let kind = kind?;
	let (variant, populate) = if kind == "sequence" {
		("Sequence", "populate_sequence")
	} else if kind == "associative" {
		("Associative", "populate_associative")
	} else {
		("Fixed", "populate_fixed")
	};
	Some((Ident::new(variant, Span::call_site()), Ident::new(populate, Span::call_site())))
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
	if !input.generics.params.is_empty() {
		return Err(syn::Error::new_spanned(
			&input.generics,
			"Duplicate cannot be derived for generic types",
		));
	}

	let name = &input.ident;
	let attrs = TypeAttrs::parse(&input.attrs)?;
	let shape = parse_shape(input)?;
	let container = container_parts(attrs.container.as_ref());

	let descriptors = shape.fields().map(field_descriptor);
	let field_count = shape.fields().count();
	let indices = 0..field_count;

	let container_kind = match &container {
		Some((variant, _)) => quote!(::core::option::Option::Some(::replica::ContainerKind::#variant)),
		None => quote!(::core::option::Option::None),
	};
	let value_kind = match &container {
		Some((variant, _)) => quote!(::replica::ValueKind::Container(::replica::ContainerKind::#variant)),
		None => quote!(::replica::ValueKind::Composite),
	};
	let type_policy = match &attrs.policy {
		Some(policy) => quote!(::replica::PolicyDecl::own(::replica::Policy::#policy)),
		None => quote!(::replica::PolicyDecl::NONE),
	};
	let declared_policy = policy_opt(attrs.policy.as_ref());
	let has_hook = attrs.hook.is_some();

	let blank = expand_blank(&shape, attrs.blank.as_ref());
	let shallow = expand_shallow(&shape);
	let populate = expand_populate(&shape);
	let populate_contents = container.as_ref().map(|(_, populate)| {
		quote!(::replica::container::#populate(self, target, elements, cx)?;)
	});
	let stable_id = expand_stable_id(&shape);
	let after_duplicate = attrs.hook.as_ref().map(|hook| {
		quote! {
			fn after_duplicate(&mut self) {
				Self::#hook(self)
			}
		}
	});

	Ok(quote! {
		const _: () = {
			const FIELDS: &[::replica::FieldDescriptor] = &[#(#descriptors),*];
			const CONTAINER: ::core::option::Option<::replica::ContainerKind> = #container_kind;

			#[allow(dead_code)]
			const POLICIES: [::replica::FieldPolicy; #field_count] = [
				#(::replica::resolve_field_policy(&FIELDS[#indices], CONTAINER)),*
			];

			static DESCRIPTOR: ::replica::TypeDescriptor = ::replica::TypeDescriptor {
				name: ::core::stringify!(#name),
				module: ::core::module_path!(),
				policy: #declared_policy,
				container: CONTAINER,
				fields: FIELDS,
				has_hook: #has_hook,
			};

			::replica::inventory::submit! {
				::replica::registry::TypeReg(&DESCRIPTOR)
			}

			impl ::replica::Blank for #name {
				fn blank_like(&self) -> ::core::result::Result<Self, ::replica::DuplicateError> {
					#blank
				}
			}

			impl ::replica::Transform for #name {
				const POLICY: ::replica::PolicyDecl = #type_policy;
				const KIND: ::replica::ValueKind = #value_kind;

				fn transform(
					&self,
					policy: ::replica::Policy,
					elements: ::replica::Elements,
					cx: &mut ::replica::Duplicator<'_>,
				) -> ::core::result::Result<::core::option::Option<Self>, ::replica::DuplicateError> {
					match policy {
						::replica::Policy::DoNotCopy | ::replica::Policy::Map => {
							::core::result::Result::Ok(::core::option::Option::None)
						}
						::replica::Policy::Copy | ::replica::Policy::MapOrCopy => {
							#shallow
						}
						::replica::Policy::Duplicate | ::replica::Policy::MapOrDuplicate => cx
							.duplicate_value_with(self, elements)
							.map(::core::option::Option::Some),
					}
				}
			}

			impl ::replica::Duplicate for #name {
				const HAS_HOOK: bool = #has_hook;

				fn descriptor() -> ::core::option::Option<&'static ::replica::TypeDescriptor> {
					::core::option::Option::Some(&DESCRIPTOR)
				}

				#stable_id

				#[allow(unused_variables, irrefutable_let_patterns)]
				fn populate(
					&self,
					target: &::core::cell::RefCell<Self>,
					elements: ::replica::Elements,
					cx: &mut ::replica::Duplicator<'_>,
				) -> ::core::result::Result<(), ::replica::DuplicateError> {
					#populate
					#populate_contents
					::core::result::Result::Ok(())
				}

				#after_duplicate
			}
		};
	})
}

fn field_descriptor(field: &Field) -> TokenStream2 {
	let name = &field.name;
	let ty = &field.ty;
	let own = policy_opt(field.attrs.policy.as_ref());
	let element = policy_opt(field.attrs.elements.as_ref());
	let key = policy_opt(field.attrs.keys.as_ref());
	let value = policy_opt(field.attrs.values.as_ref());
	let identity = field.attrs.identity;
	quote! {
		::replica::FieldDescriptor {
			name: #name,
			type_name: ::core::stringify!(#ty),
			declared: ::replica::PolicyDecl {
				own: #own,
				element: #element,
				key: #key,
				value: #value,
			},
			type_policy: <#ty as ::replica::Transform>::POLICY,
			kind: <#ty as ::replica::Transform>::KIND,
			identity: #identity,
		}
	}
}

/// Builds `Self { .. }` (or one match arm per variant) whose fields are
/// produced by `value` from the source field expression.
fn rebuild(shape: &Shape, value: impl Fn(TokenStream2) -> TokenStream2) -> TokenStream2 {
	match shape {
		Shape::Struct(fields) => {
			let members = fields.iter().map(|f| &f.member);
			let values = fields.iter().map(|f| {
				let member = &f.member;
				value(quote!(&self.#member))
			});
			quote!(::core::result::Result::Ok(Self { #(#members: #values),* }))
		}
		Shape::Enum(variants) => {
			let arms = variants.iter().map(|variant| {
				let ident = &variant.ident;
				let members: Vec<_> = variant.fields.iter().map(|f| &f.member).collect();
				let bindings = variant.fields.iter().map(|f| &f.binding);
				let values = variant.fields.iter().map(|f| {
					let binding = &f.binding;
					value(quote!(#binding))
				});
				quote! {
					Self::#ident { #(#members: #bindings),* } => {
						::core::result::Result::Ok(Self::#ident { #(#members: #values),* })
					}
				}
			});
			quote!(match self { #(#arms)* })
		}
	}
}

fn expand_blank(shape: &Shape, blank: Option<&syn::Path>) -> TokenStream2 {
	match blank {
		Some(path) => quote!(::core::result::Result::Ok(#path(self))),
		None => rebuild(shape, |source| quote!(::replica::Blank::blank_like(#source)?)),
	}
}

fn expand_shallow(shape: &Shape) -> TokenStream2 {
	let copied = rebuild(shape, |source| quote!(cx.copy_field(#source)?));
	quote!((#copied).map(::core::option::Option::Some))
}

fn expand_populate(shape: &Shape) -> TokenStream2 {
	match shape {
		Shape::Struct(fields) => {
			let steps = fields.iter().map(|field| {
				let member = &field.member;
				let name = &field.name;
				let index = field.index;
				quote! {
					if let ::core::option::Option::Some(value) =
						cx.transform_field(&self.#member, &POLICIES[#index], #name)?
					{
						::replica::target_mut(target)?.#member = value;
					}
				}
			});
			quote!(#(#steps)*)
		}
		Shape::Enum(variants) => {
			let arms = variants.iter().map(|variant| {
				let ident = &variant.ident;
				let members = variant.fields.iter().map(|f| &f.member);
				let bindings = variant.fields.iter().map(|f| &f.binding);
				let steps = variant.fields.iter().map(|field| {
					let member = &field.member;
					let binding = &field.binding;
					let name = &field.name;
					let index = field.index;
					quote! {
						if let ::core::option::Option::Some(value) =
							cx.transform_field(#binding, &POLICIES[#index], #name)?
						{
							if let Self::#ident { #member: slot, .. } = &mut *::replica::target_mut(target)? {
								*slot = value;
							}
						}
					}
				});
				quote! {
					Self::#ident { #(#members: #bindings),* } => {
						#(#steps)*
					}
				}
			});
			quote!(match self { #(#arms)* })
		}
	}
}

fn expand_stable_id(shape: &Shape) -> Option<TokenStream2> {
	let body = match shape {
		Shape::Struct(fields) => {
			let member = &fields.iter().find(|f| f.attrs.identity)?.member;
			quote!(::replica::AsStableId::as_stable_id(&self.#member))
		}
		Shape::Enum(variants) => {
			if !variants.iter().any(|v| v.fields.iter().any(|f| f.attrs.identity)) {
				return None;
			}
			let arms = variants.iter().map(|variant| {
				let ident = &variant.ident;
				match variant.fields.iter().find(|f| f.attrs.identity) {
					Some(field) => {
						let member = &field.member;
						quote!(Self::#ident { #member: id, .. } => ::replica::AsStableId::as_stable_id(id),)
					}
					None => quote!(Self::#ident { .. } => ::core::option::Option::None,),
				}
			});
			quote!(match self { #(#arms)* })
		}
	};
	Some(quote! {
		fn stable_id(&self) -> ::core::option::Option<::replica::StableId> {
			#body
		}
	})
}
