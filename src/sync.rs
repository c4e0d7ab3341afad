//! Mutex helpers shared by the task-facing modules.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `m`, taking the data even if a previous holder panicked.
///
/// Every guarded value here stays consistent between statements, so a
/// poisoned lock carries no torn state.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
