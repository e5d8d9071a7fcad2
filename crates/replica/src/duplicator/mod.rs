//! The graph duplicator.
//!
//! Duplication is a depth-first walk. For every node it:
//!
//! 1. returns the session's existing duplicate if the node was seen before,
//! 2. allocates a blank instance of the node's concrete type,
//! 3. registers `source -> duplicate` in the session *before* touching any
//!    field, so references back to the node terminate on the registration,
//! 4. transforms every field under its resolved policy,
//! 5. lets the container specializer fill container contents,
//! 6. runs the post-duplication hook.

use std::cell::{RefCell, RefMut};

use tracing::{debug, trace, trace_span};

use crate::descriptor::TypeDescriptor;
use crate::error::DuplicateError;
use crate::hook;
use crate::identity::{IdentityKey, StableId};
use crate::policy::{Elements, FieldPolicy, Policy};
use crate::session::Session;
use crate::shared::Shared;
use crate::transform::Transform;


/// Types whose instances can be duplicated as graph nodes.
///
/// Implemented by `#[derive(Duplicate)]` for structs and enums and by this
/// crate for standard containers.
pub trait Duplicate: Transform {
	/// Type declares a post-duplication hook.
	const HAS_HOOK: bool = false;

	/// Descriptor table of derived types.
	fn descriptor() -> Option<&'static TypeDescriptor> {
		None
	}

	/// Stable identity used instead of the allocation address.
	fn stable_id(&self) -> Option<StableId> {
		None
	}

	/// Fills the blank `target` from `self`.
	///
	/// `target` is already registered in the session; `elements` carries
	/// the element policies of container types.
	fn populate(
		&self,
		target: &RefCell<Self>,
		elements: Elements,
		cx: &mut Duplicator<'_>,
	) -> Result<(), DuplicateError>;

	/// Post-duplication fix-up, run once the duplicate's own fields are set.
	///
	/// Other duplicates in a cycle may still be incomplete at this point.
	fn after_duplicate(&mut self) {}
}

/// Mutably borrows a duplicate under construction.
#[doc(hidden)]
pub fn target_mut<T: 'static>(target: &RefCell<T>) -> Result<RefMut<'_, T>, DuplicateError> {
	target
		.try_borrow_mut()
		.map_err(|_| DuplicateError::borrowed::<T>())
}

/// Duplicates one root object against a fresh session.
pub fn duplicate<T: Duplicate>(source: &Shared<T>) -> Result<Shared<T>, DuplicateError> {
	Session::new().duplicate(source)
}

/// Runs duplications against one [`Session`].
///
/// Sharing a session across root calls keeps references between the roots
/// consistent in the duplicates. The session is borrowed exclusively for
/// the duplicator's lifetime.
pub struct Duplicator<'s> {
	session: &'s mut Session,
	element_policy: Policy,
	max_depth: Option<usize>,
	depth: usize,
}

impl<'s> Duplicator<'s> {
	/// Creates a duplicator using the session's configuration.
	pub fn new(session: &'s mut Session) -> Self {
		let config = *session.config();
		Self {
			session,
			element_policy: config.default_element_policy,
			max_depth: config.max_depth,
			depth: 0,
		}
	}

	/// Overrides the default element policy for open element slots.
	pub fn with_element_policy(mut self, policy: Policy) -> Self {
		self.element_policy = policy;
		self
	}

	/// Returns the session.
	pub fn session(&self) -> &Session {
		self.session
	}

	/// Default element policy in effect.
	pub fn element_policy(&self) -> Policy {
		self.element_policy
	}

	/// Duplicates a root object.
	///
	/// On failure the session forgets every entry registered by this call.
	pub fn duplicate<T: Duplicate>(&mut self, source: &Shared<T>) -> Result<Shared<T>, DuplicateError> {
		let mark = self.session.mark();
		let elements = Elements::uniform(self.element_policy);
		let result = self.duplicate_node(source, elements);
		match &result {
			Ok(_) => {
				let stats = self.session.stats().since(mark.stats());
				debug!(
					ty = std::any::type_name::<T>(),
					duplicated = stats.duplicated,
					mapped = stats.mapped,
					skipped = stats.skipped,
					hooks = stats.hooks,
					"duplicated root"
				);
			}
			Err(err) => {
				debug!(ty = std::any::type_name::<T>(), %err, "duplication aborted");
				self.session.rollback(mark);
			}
		}
		result
	}

	/// Duplicates a nullable root; `None` duplicates to `None`.
	pub fn duplicate_option<T: Duplicate>(
		&mut self,
		source: Option<&Shared<T>>,
	) -> Result<Option<Shared<T>>, DuplicateError> {
		source.map(|s| self.duplicate(s)).transpose()
	}

	/// Duplicates a value owned outside any [`Shared`] node.
	///
	/// The value has no identity and is not registered, but references it
	/// holds are duplicated and mapped through the session as usual.
	pub fn duplicate_value<T: Duplicate>(&mut self, source: &T) -> Result<T, DuplicateError> {
		let elements = Elements::uniform(self.element_policy);
		self.duplicate_value_with(source, elements)
	}

	#[doc(hidden)]
	pub fn duplicate_value_with<T: Duplicate>(
		&mut self,
		source: &T,
		elements: Elements,
	) -> Result<T, DuplicateError> {
		self.enter::<T>()?;
		let result = self.populate_value(source, elements);
		self.depth -= 1;
		result
	}

	fn populate_value<T: Duplicate>(&mut self, source: &T, elements: Elements) -> Result<T, DuplicateError> {
		let target = RefCell::new(source.blank_like()?);
		source.populate(&target, elements, self)?;
		hook::invoke(&target, self.session.stats_mut())?;
		Ok(target.into_inner())
	}

	/// Returns the duplicate already mapped for `source`, if any.
	pub fn lookup<T: Duplicate>(&mut self, source: &Shared<T>) -> Option<Shared<T>> {
		let key = IdentityKey::of(source);
		match self.session.resolve::<T>(key) {
			Ok(Some(mapped)) => {
				self.session.stats_mut().mapped += 1;
				trace!(%key, "map hit");
				Some(mapped)
			}
			Ok(None) => None,
			Err(err) => {
				trace!(%err, "map entry of another type ignored");
				None
			}
		}
	}

	/// Duplicates a graph node, or returns its existing duplicate.
	pub fn duplicate_node<T: Duplicate>(
		&mut self,
		source: &Shared<T>,
		elements: Elements,
	) -> Result<Shared<T>, DuplicateError> {
		let key = IdentityKey::of(source);
		if let Some(existing) = self.session.resolve::<T>(key)? {
			self.session.stats_mut().mapped += 1;
			return Ok(existing);
		}

		self.enter::<T>()?;
		let span = trace_span!("duplicate", ty = std::any::type_name::<T>(), depth = self.depth);
		let _guard = span.enter();
		let result = self.duplicate_fresh(source, key, elements);
		self.depth -= 1;
		result
	}

	fn duplicate_fresh<T: Duplicate>(
		&mut self,
		source: &Shared<T>,
		key: IdentityKey,
		elements: Elements,
	) -> Result<Shared<T>, DuplicateError> {
		let original = source
			.try_borrow()
			.map_err(|_| DuplicateError::borrowed::<T>())?;
		let duplicate = Shared::new(original.blank_like()?);
		self.session.register(key, source, &duplicate)?;
		self.session.stats_mut().duplicated += 1;

		original.populate(duplicate.cell(), elements, self)?;
		drop(original);

		hook::invoke(duplicate.cell(), self.session.stats_mut())?;
		Ok(duplicate)
	}

	/// Transforms one field value under its resolved policy.
	#[doc(hidden)]
	pub fn transform_field<F: Transform>(
		&mut self,
		value: &F,
		policy: &FieldPolicy,
		field: &'static str,
	) -> Result<Option<F>, DuplicateError> {
		let elements = policy.elements.resolve(self.element_policy);
		let transformed = value.transform(policy.field, elements, self)?;
		if transformed.is_none() {
			self.note_skip();
			trace!(field, policy = %policy.field, "field left unset");
		}
		Ok(transformed)
	}

	/// Shallow copy of one field, used when a composite value is copied.
	#[doc(hidden)]
	pub fn copy_field<F: Transform>(&mut self, value: &F) -> Result<F, DuplicateError> {
		match value.transform(Policy::Copy, Elements::COPY, self)? {
			Some(copied) => Ok(copied),
			None => value.blank_like(),
		}
	}

	pub(crate) fn note_skip(&mut self) {
		self.session.stats_mut().skipped += 1;
	}

	fn enter<T>(&mut self) -> Result<(), DuplicateError> {
		if let Some(limit) = self.max_depth
			&& self.depth >= limit
		{
			return Err(DuplicateError::DepthLimit {
				limit,
				type_name: std::any::type_name::<T>(),
			});
		}
		self.depth += 1;
		Ok(())
	}
}
