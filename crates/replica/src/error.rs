use thiserror::Error;

use crate::identity::IdentityKey;

/// Errors that abort a duplication.
///
/// Any error leaves the source graph untouched; the session drops the
/// entries registered by the failed root call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DuplicateError {
	/// The concrete type offers no way to allocate a blank instance.
	#[error("cannot allocate a blank `{type_name}`: {reason}")]
	Instantiation {
		type_name: &'static str,
		reason: &'static str,
	},
	/// A source or duplicate is mutably borrowed elsewhere.
	#[error("`{type_name}` is already mutably borrowed")]
	Borrowed { type_name: &'static str },
	/// The identity is already mapped to a duplicate of another type.
	#[error("identity {key} is mapped to a `{existing}`, cannot map a `{requested}`")]
	IdentityConflict {
		key: IdentityKey,
		existing: &'static str,
		requested: &'static str,
	},
	/// Recursion went deeper than the configured limit.
	#[error("duplicating `{type_name}` exceeded the depth limit of {limit}")]
	DepthLimit {
		limit: usize,
		type_name: &'static str,
	},
}

impl DuplicateError {
	pub(crate) fn instantiation<T: ?Sized>(reason: &'static str) -> Self {
		DuplicateError::Instantiation {
			type_name: std::any::type_name::<T>(),
			reason,
		}
	}

	pub(crate) fn borrowed<T: ?Sized>() -> Self {
		DuplicateError::Borrowed {
			type_name: std::any::type_name::<T>(),
		}
	}
}

/// Errors raised while loading a [`DuplicateConfig`](crate::DuplicateConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("invalid duplication config: {0}")]
	Toml(#[from] toml::de::Error),
}
