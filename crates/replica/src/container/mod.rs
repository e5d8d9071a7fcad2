//! Container specializer.
//!
//! Fills a freshly allocated, empty duplicate container from its source,
//! applying the element policy to every element (or the key and value
//! policies to every entry) in the source's iteration order.
//!
//! Three shapes are supported:
//! * [`Sequence`] - appendable; skipped elements are omitted
//! * [`FixedSequence`] - pre-sized and written by position; skipped slots
//!   keep their blank value
//! * [`Associative`] - key/value entries; an entry is omitted when its key
//!   or its value is skipped
//!
//! A container owned by value has no identity, so under `Map` it is skipped,
//! under `MapOrCopy` copied and under `MapOrDuplicate` duplicated. A
//! container inside a [`Shared`](crate::Shared) node is duplicated as a graph
//! node and populated through [`Duplicate::populate`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};

use indexmap::{IndexMap, IndexSet};

use crate::descriptor::{ContainerKind, ValueKind};
use crate::duplicator::{Duplicate, Duplicator, target_mut};
use crate::error::DuplicateError;
use crate::policy::{Elements, Policy, PolicyDecl};
use crate::transform::{Blank, Transform};


/// Appendable container.
pub trait Sequence: 'static {
	type Item: Transform;

	/// Elements in iteration order.
	fn items(&self) -> impl Iterator<Item = &Self::Item>;

	/// Appends one element.
	fn push_item(&mut self, item: Self::Item);
}

/// Fixed-size container addressed by position.
pub trait FixedSequence: 'static {
	type Item: Transform;

	fn slots(&self) -> &[Self::Item];

	fn slots_mut(&mut self) -> &mut [Self::Item];
}

/// Container of key/value entries.
pub trait Associative: 'static {
	type Key: Transform;
	type Value: Transform;

	/// Entries in iteration order.
	fn entries(&self) -> impl Iterator<Item = (&Self::Key, &Self::Value)>;

	fn insert_entry(&mut self, key: Self::Key, value: Self::Value);
}

/// Appends the transformed elements of `source` to `target`.
pub fn populate_sequence<C: Sequence>(
	source: &C,
	target: &RefCell<C>,
	elements: Elements,
	cx: &mut Duplicator<'_>,
) -> Result<(), DuplicateError> {
	transform_items(source.items(), elements, cx, |item| {
		target_mut(target)?.push_item(item);
		Ok(())
	})
}

/// Overwrites each slot of the pre-sized `target` with the transformed slot
/// of `source` at the same position.
pub fn populate_fixed<C: FixedSequence>(
	source: &C,
	target: &RefCell<C>,
	elements: Elements,
	cx: &mut Duplicator<'_>,
) -> Result<(), DuplicateError> {
	if target_mut(target)?.slots().len() != source.slots().len() {
		return Err(DuplicateError::instantiation::<C>(
			"fixed-size duplicate was not sized like its source",
		));
	}
	for (index, slot) in source.slots().iter().enumerate() {
		match slot.transform(elements.element, elements, cx)? {
			Some(item) => target_mut(target)?.slots_mut()[index] = item,
			None => cx.note_skip(),
		}
	}
	Ok(())
}

/// Inserts the transformed entries of `source` into `target`.
pub fn populate_associative<C: Associative>(
	source: &C,
	target: &RefCell<C>,
	elements: Elements,
	cx: &mut Duplicator<'_>,
) -> Result<(), DuplicateError> {
	transform_entries(source.entries(), elements, cx, |key, value| {
		target_mut(target)?.insert_entry(key, value);
		Ok(())
	})
}

/// Element policies for a container owned by value, or `None` to skip it.
fn owned_elements(policy: Policy, elements: Elements) -> Option<Elements> {
	match policy {
		Policy::DoNotCopy | Policy::Map => None,
		Policy::Copy | Policy::MapOrCopy => Some(Elements::COPY),
		Policy::Duplicate | Policy::MapOrDuplicate => Some(elements),
	}
}

fn transform_items<'a, E: Transform>(
	items: impl Iterator<Item = &'a E>,
	elements: Elements,
	cx: &mut Duplicator<'_>,
	mut sink: impl FnMut(E) -> Result<(), DuplicateError>,
) -> Result<(), DuplicateError> {
	for item in items {
		match item.transform(elements.element, elements, cx)? {
			Some(item) => sink(item)?,
			None => cx.note_skip(),
		}
	}
	Ok(())
}

fn transform_entries<'a, K: Transform, V: Transform>(
	entries: impl Iterator<Item = (&'a K, &'a V)>,
	elements: Elements,
	cx: &mut Duplicator<'_>,
	mut sink: impl FnMut(K, V) -> Result<(), DuplicateError>,
) -> Result<(), DuplicateError> {
	for (key, value) in entries {
		let Some(key) = key.transform(elements.key, elements, cx)? else {
			cx.note_skip();
			continue;
		};
		let Some(value) = value.transform(elements.value, elements, cx)? else {
			cx.note_skip();
			continue;
		};
		sink(key, value)?;
	}
	Ok(())
}

fn transform_slots<E: Transform>(
	source: &[E],
	elements: Elements,
	cx: &mut Duplicator<'_>,
) -> Result<Vec<E>, DuplicateError> {
	let mut slots = Vec::with_capacity(source.len());
	for slot in source {
		match slot.transform(elements.element, elements, cx)? {
			Some(item) => slots.push(item),
			None => {
				cx.note_skip();
				slots.push(slot.blank_like()?);
			}
		}
	}
	Ok(slots)
}

macro_rules! sequence_container {
	($($ty:ident<$($g:ident),+> where [$($bounds:tt)*] => $push:ident;)*) => {$(
		impl<$($g),+> Sequence for $ty<$($g),+> where $($bounds)* {
			type Item = E;

			fn items(&self) -> impl Iterator<Item = &E> {
				self.iter()
			}

			fn push_item(&mut self, item: E) {
				self.$push(item);
			}
		}

		impl<$($g),+> Blank for $ty<$($g),+> where $($bounds)* {
			fn blank_like(&self) -> Result<Self, DuplicateError> {
				Ok(Self::default())
			}
		}

		impl<$($g),+> Transform for $ty<$($g),+> where $($bounds)* {
			const POLICY: PolicyDecl = PolicyDecl::elements_of(E::POLICY);
			const KIND: ValueKind = ValueKind::Container(ContainerKind::Sequence);

			fn transform(
				&self,
				policy: Policy,
				elements: Elements,
				cx: &mut Duplicator<'_>,
			) -> Result<Option<Self>, DuplicateError> {
				let Some(elements) = owned_elements(policy, elements) else {
					return Ok(None);
				};
				let mut out = Self::default();
				transform_items(self.iter(), elements, cx, |item| {
					out.$push(item);
					Ok(())
				})?;
				Ok(Some(out))
			}
		}

		impl<$($g),+> Duplicate for $ty<$($g),+> where $($bounds)* {
			fn populate(
				&self,
				target: &RefCell<Self>,
				elements: Elements,
				cx: &mut Duplicator<'_>,
			) -> Result<(), DuplicateError> {
				populate_sequence(self, target, elements, cx)
			}
		}
	)*};
}

sequence_container! {
	Vec<E> where [E: Transform] => push;
	VecDeque<E> where [E: Transform] => push_back;
	BTreeSet<E> where [E: Transform + Ord] => insert;
	HashSet<E, S> where [E: Transform + Eq + Hash, S: BuildHasher + Default + 'static] => insert;
	IndexSet<E, S> where [E: Transform + Eq + Hash, S: BuildHasher + Default + 'static] => insert;
}

macro_rules! associative_container {
	($($ty:ident<$($g:ident),+> where [$($bounds:tt)*];)*) => {$(
		impl<$($g),+> Associative for $ty<$($g),+> where $($bounds)* {
			type Key = K;
			type Value = V;

			fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
				self.iter()
			}

			fn insert_entry(&mut self, key: K, value: V) {
				self.insert(key, value);
			}
		}

		impl<$($g),+> Blank for $ty<$($g),+> where $($bounds)* {
			fn blank_like(&self) -> Result<Self, DuplicateError> {
				Ok(Self::default())
			}
		}

		impl<$($g),+> Transform for $ty<$($g),+> where $($bounds)* {
			const POLICY: PolicyDecl = PolicyDecl::entries_of(K::POLICY, V::POLICY);
			const KIND: ValueKind = ValueKind::Container(ContainerKind::Associative);

			fn transform(
				&self,
				policy: Policy,
				elements: Elements,
				cx: &mut Duplicator<'_>,
			) -> Result<Option<Self>, DuplicateError> {
				let Some(elements) = owned_elements(policy, elements) else {
					return Ok(None);
				};
				let mut out = Self::default();
				transform_entries(self.iter(), elements, cx, |key, value| {
					out.insert(key, value);
					Ok(())
				})?;
				Ok(Some(out))
			}
		}

		impl<$($g),+> Duplicate for $ty<$($g),+> where $($bounds)* {
			fn populate(
				&self,
				target: &RefCell<Self>,
				elements: Elements,
				cx: &mut Duplicator<'_>,
			) -> Result<(), DuplicateError> {
				populate_associative(self, target, elements, cx)
			}
		}
	)*};
}

associative_container! {
	HashMap<K, V, S> where [K: Transform + Eq + Hash, V: Transform, S: BuildHasher + Default + 'static];
	BTreeMap<K, V> where [K: Transform + Ord, V: Transform];
	IndexMap<K, V, S> where [K: Transform + Eq + Hash, V: Transform, S: BuildHasher + Default + 'static];
}

impl<E: Transform, const N: usize> FixedSequence for [E; N] {
	type Item = E;

	fn slots(&self) -> &[E] {
		self
	}

	fn slots_mut(&mut self) -> &mut [E] {
		self
	}
}

impl<E: Blank, const N: usize> Blank for [E; N] {
	fn blank_like(&self) -> Result<Self, DuplicateError> {
		let slots = self
			.iter()
			.map(Blank::blank_like)
			.collect::<Result<Vec<_>, _>>()?;
		slots
			.try_into()
			.map_err(|_| DuplicateError::instantiation::<Self>("slot count changed"))
	}
}

impl<E: Transform, const N: usize> Transform for [E; N] {
	const POLICY: PolicyDecl = PolicyDecl::elements_of(E::POLICY);
	const KIND: ValueKind = ValueKind::Container(ContainerKind::Fixed);

	fn transform(
		&self,
		policy: Policy,
		elements: Elements,
		cx: &mut Duplicator<'_>,
	) -> Result<Option<Self>, DuplicateError> {
		let Some(elements) = owned_elements(policy, elements) else {
			return Ok(None);
		};
		transform_slots(self, elements, cx)?
			.try_into()
			.map(Some)
			.map_err(|_| DuplicateError::instantiation::<Self>("slot count changed"))
	}
}

impl<E: Transform, const N: usize> Duplicate for [E; N] {
	fn populate(
		&self,
		target: &RefCell<Self>,
		elements: Elements,
		cx: &mut Duplicator<'_>,
	) -> Result<(), DuplicateError> {
		populate_fixed(self, target, elements, cx)
	}
}

impl<E: Transform> FixedSequence for Box<[E]> {
	type Item = E;

	fn slots(&self) -> &[E] {
		self
	}

	fn slots_mut(&mut self) -> &mut [E] {
		self
	}
}

impl<E: Blank> Blank for Box<[E]> {
	fn blank_like(&self) -> Result<Self, DuplicateError> {
		self.iter().map(Blank::blank_like).collect()
	}
}

impl<E: Transform> Transform for Box<[E]> {
	const POLICY: PolicyDecl = PolicyDecl::elements_of(E::POLICY);
	const KIND: ValueKind = ValueKind::Container(ContainerKind::Fixed);

	fn transform(
		&self,
		policy: Policy,
		elements: Elements,
		cx: &mut Duplicator<'_>,
	) -> Result<Option<Self>, DuplicateError> {
		let Some(elements) = owned_elements(policy, elements) else {
			return Ok(None);
		};
		Ok(Some(transform_slots(self, elements, cx)?.into_boxed_slice()))
	}
}

impl<E: Transform> Duplicate for Box<[E]> {
	fn populate(
		&self,
		target: &RefCell<Self>,
		elements: Elements,
		cx: &mut Duplicator<'_>,
	) -> Result<(), DuplicateError> {
		populate_fixed(self, target, elements, cx)
	}
}
