//! Duplication configuration.
//!
//! ```toml
//! default-element-policy = "duplicate"
//! max-depth = 4096
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policy::Policy;

/// Settings applied by every duplicator created from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DuplicateConfig {
	/// Policy for container elements no declaration covers.
	pub default_element_policy: Policy,
	/// Maximum recursion depth; unlimited when unset.
	///
	/// Correct policy configurations terminate on their own. The limit turns
	/// a misconfigured policy into [`DuplicateError::DepthLimit`] instead of
	/// a stack overflow.
	///
	/// [`DuplicateError::DepthLimit`]: crate::DuplicateError::DepthLimit
	pub max_depth: Option<usize>,
}

impl DuplicateConfig {
	/// Parses a configuration from TOML.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}

	pub fn with_default_element_policy(mut self, policy: Policy) -> Self {
		self.default_element_policy = policy;
		self
	}

	pub fn with_max_depth(mut self, limit: usize) -> Self {
		self.max_depth = Some(limit);
		self
	}
}
