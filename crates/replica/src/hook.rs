//! Post-duplication hook invocation.

use std::cell::RefCell;

use tracing::trace;

use crate::duplicator::{Duplicate, target_mut};
use crate::error::DuplicateError;
use crate::session::SessionStats;

/// Runs the hook of a duplicate whose own fields and elements are complete.
///
/// Runs exactly once per duplicate. Duplicates reachable through a cycle may
/// still be under construction.
pub(crate) fn invoke<T: Duplicate>(
	target: &RefCell<T>,
	stats: &mut SessionStats,
) -> Result<(), DuplicateError> {
	if !T::HAS_HOOK {
		return Ok(());
	}
	target_mut(target)?.after_duplicate();
	stats.hooks += 1;
	trace!(ty = std::any::type_name::<T>(), "post-duplication hook ran");
	Ok(())
}
