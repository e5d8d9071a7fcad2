//! Duplication sessions.
//!
//! A [`Session`] maps the identity of every source object duplicated so far
//! to its duplicate. Reusing one session across several root calls makes
//! objects shared between those roots stay shared in the duplicates.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use tracing::warn;

use crate::config::DuplicateConfig;
use crate::duplicator::{Duplicate, Duplicator};
use crate::error::DuplicateError;
use crate::identity::IdentityKey;
use crate::shared::Shared;


/// Counters accumulated over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
	/// Nodes allocated and registered.
	pub duplicated: usize,
	/// References resolved to an existing duplicate.
	pub mapped: usize,
	/// Fields and elements left unset.
	pub skipped: usize,
	/// Post-duplication hooks run.
	pub hooks: usize,
}

impl SessionStats {
	/// Counts accumulated since `earlier`.
	pub fn since(&self, earlier: &SessionStats) -> SessionStats {
		SessionStats {
			duplicated: self.duplicated - earlier.duplicated,
			mapped: self.mapped - earlier.mapped,
			skipped: self.skipped - earlier.skipped,
			hooks: self.hooks - earlier.hooks,
		}
	}
}

struct Entry {
	/// Keeps the source alive so its address cannot be reused as a key.
	_source: Rc<dyn Any>,
	duplicate: Rc<dyn Any>,
	type_name: &'static str,
}

/// Session state restored when a root call fails.
pub(crate) struct Mark {
	len: usize,
	stats: SessionStats,
}

impl Mark {
	pub(crate) fn stats(&self) -> &SessionStats {
		&self.stats
	}
}

/// Identity map of one duplication operation.
///
/// Once a key is mapped, every later lookup in the session returns the same
/// duplicate. Entries are kept in registration order.
#[derive(Default)]
pub struct Session {
	entries: IndexMap<IdentityKey, Entry, FxBuildHasher>,
	stats: SessionStats,
	config: DuplicateConfig,
}

impl Session {
	/// Creates an empty session with the default configuration.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates an empty session with the given configuration.
	pub fn with_config(config: DuplicateConfig) -> Self {
		Self {
			config,
			..Self::default()
		}
	}

	pub fn config(&self) -> &DuplicateConfig {
		&self.config
	}

	/// Returns a duplicator borrowing this session.
	pub fn duplicator(&mut self) -> Duplicator<'_> {
		Duplicator::new(self)
	}

	/// Duplicates one root object against this session.
	pub fn duplicate<T: Duplicate>(&mut self, source: &Shared<T>) -> Result<Shared<T>, DuplicateError> {
		self.duplicator().duplicate(source)
	}

	/// Duplicates several roots in order against this session.
	///
	/// Each root is its own rollback unit: if one fails, roots duplicated
	/// before it stay mapped.
	pub fn duplicate_all<'a, T, I>(&mut self, roots: I) -> Result<Vec<Shared<T>>, DuplicateError>
	where
		T: Duplicate,
		I: IntoIterator<Item = &'a Shared<T>>,
	{
		let mut duplicator = self.duplicator();
		roots
			.into_iter()
			.map(|root| duplicator.duplicate(root))
			.collect()
	}

	/// Returns the duplicate mapped for `source`.
	pub fn get<T: Duplicate>(&self, source: &Shared<T>) -> Option<Shared<T>> {
		self.resolve(IdentityKey::of(source)).ok().flatten()
	}

	/// Returns true if `source` is mapped.
	pub fn contains<T: Duplicate>(&self, source: &Shared<T>) -> bool {
		self.contains_key(IdentityKey::of(source))
	}

	/// Returns true if `key` is mapped.
	pub fn contains_key(&self, key: IdentityKey) -> bool {
		!key.is_null() && self.entries.contains_key(&key)
	}

	/// Seeds a mapping from `source` to `duplicate`.
	///
	/// Returns false and leaves the session unchanged if `source` is
	/// already mapped.
	pub fn insert<T: Duplicate>(&mut self, source: &Shared<T>, duplicate: &Shared<T>) -> bool {
		let key = IdentityKey::of(source);
		if self.entries.contains_key(&key) {
			warn!(%key, ty = std::any::type_name::<T>(), "identity already mapped; seed ignored");
			return false;
		}
		self.entries.insert(key, Entry::new(source, duplicate));
		true
	}

	/// Number of mapped identities.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Mapped identities in registration order.
	pub fn keys(&self) -> impl Iterator<Item = IdentityKey> + '_ {
		self.entries.keys().copied()
	}

	/// Counters accumulated by every duplication run against this session.
	pub fn stats(&self) -> &SessionStats {
		&self.stats
	}

	pub(crate) fn stats_mut(&mut self) -> &mut SessionStats {
		&mut self.stats
	}

	/// Looks up the duplicate of `key` as a `Shared<T>`.
	///
	/// Fails with [`DuplicateError::IdentityConflict`] when the key is
	/// mapped to a duplicate of another type.
	pub(crate) fn resolve<T: Duplicate>(&self, key: IdentityKey) -> Result<Option<Shared<T>>, DuplicateError> {
		if key.is_null() {
			return Ok(None);
		}
		let Some(entry) = self.entries.get(&key) else {
			return Ok(None);
		};
		Shared::from_any(Rc::clone(&entry.duplicate))
			.map(Some)
			.ok_or_else(|| DuplicateError::IdentityConflict {
				key,
				existing: entry.type_name,
				requested: std::any::type_name::<T>(),
			})
	}

	/// Registers a fresh duplicate. Existing entries are never overwritten.
	pub(crate) fn register<T: Duplicate>(
		&mut self,
		key: IdentityKey,
		source: &Shared<T>,
		duplicate: &Shared<T>,
	) -> Result<(), DuplicateError> {
		if key.is_null() {
			return Ok(());
		}
		if let Some(entry) = self.entries.get(&key) {
			return Err(DuplicateError::IdentityConflict {
				key,
				existing: entry.type_name,
				requested: std::any::type_name::<T>(),
			});
		}
		self.entries.insert(key, Entry::new(source, duplicate));
		Ok(())
	}

	pub(crate) fn mark(&self) -> Mark {
		Mark {
			len: self.entries.len(),
			stats: self.stats,
		}
	}

	/// Forgets entries and counters recorded after `mark`.
	pub(crate) fn rollback(&mut self, mark: Mark) {
		self.entries.truncate(mark.len);
		self.stats = mark.stats;
	}
}

impl Entry {
	fn new<T: Duplicate>(source: &Shared<T>, duplicate: &Shared<T>) -> Self {
		Self {
			_source: source.to_any(),
			duplicate: duplicate.to_any(),
			type_name: std::any::type_name::<T>(),
		}
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("len", &self.entries.len())
			.field("stats", &self.stats)
			.field("config", &self.config)
			.finish()
	}
}
