//! Reference-identity graph nodes.

use std::any::Any;
use std::cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Shared, mutable graph node with reference identity.
///
/// Cloning the handle aliases the same object. Equality and hashing compare
/// allocation addresses, never contents, so handles can key maps even when
/// the graph is cyclic.
pub struct Shared<T: ?Sized>(Rc<RefCell<T>>);

impl<T> Shared<T> {
	/// Allocates a new node.
	pub fn new(value: T) -> Self {
		Self(Rc::new(RefCell::new(value)))
	}
}

impl<T: ?Sized> Shared<T> {
	/// Immutably borrows the node.
	///
	/// # Panics
	///
	/// Panics if the node is mutably borrowed.
	#[inline]
	pub fn borrow(&self) -> Ref<'_, T> {
		self.0.borrow()
	}

	/// Mutably borrows the node.
	///
	/// # Panics
	///
	/// Panics if the node is already borrowed.
	#[inline]
	pub fn borrow_mut(&self) -> RefMut<'_, T> {
		self.0.borrow_mut()
	}

	#[inline]
	pub fn try_borrow(&self) -> Result<Ref<'_, T>, BorrowError> {
		self.0.try_borrow()
	}

	#[inline]
	pub fn try_borrow_mut(&self) -> Result<RefMut<'_, T>, BorrowMutError> {
		self.0.try_borrow_mut()
	}

	/// Returns true if both handles point at the same node.
	#[inline]
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}

	/// Allocation address, stable while any handle is alive.
	#[inline]
	pub fn addr(&self) -> usize {
		Rc::as_ptr(&self.0).cast::<()>() as usize
	}

	/// Number of handles to this node.
	pub fn strong_count(&self) -> usize {
		Rc::strong_count(&self.0)
	}

	pub(crate) fn cell(&self) -> &RefCell<T> {
		&self.0
	}
}

impl<T: 'static> Shared<T> {
	pub(crate) fn to_any(&self) -> Rc<dyn Any> {
		self.0.clone()
	}

	pub(crate) fn from_any(node: Rc<dyn Any>) -> Option<Self> {
		node.downcast::<RefCell<T>>().ok().map(Self)
	}
}

impl<T: ?Sized> Clone for Shared<T> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<T: ?Sized> PartialEq for Shared<T> {
	fn eq(&self, other: &Self) -> bool {
		Self::ptr_eq(self, other)
	}
}

impl<T: ?Sized> Eq for Shared<T> {}

impl<T: ?Sized> Hash for Shared<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.addr().hash(state);
	}
}

// Contents are not printed: the graph may be cyclic.
impl<T: ?Sized> fmt::Debug for Shared<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Shared({:#x})", self.addr())
	}
}

impl<T> From<T> for Shared<T> {
	fn from(value: T) -> Self {
		Self::new(value)
	}
}
