//! Shared helpers for configuration integration tests.

use std::sync::Mutex;

use once_cell::sync::Lazy;

/// Serialises tests that mutate process environment variables.
pub static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
