//! Testing utilities
//!
//! Scripted implementations of every collaborator trait so wizard phases can
//! be exercised without a terminal, a platform account or the `claude` CLI.

mod generator;
mod interaction;
mod platform;
mod secrets;

pub use generator::MockGenerator;
pub use interaction::MockUserInteraction;
pub use platform::{MockPlatform, MockRun};
pub use secrets::MockSecretStore;

use std::sync::{Mutex, MutexGuard};

/// Lock a mock's state, ignoring poisoning from a panicking test
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
