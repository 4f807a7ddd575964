//! Services the daemon registers alongside application services.

mod system;

pub use system::{SYSTEM_SERVICE, system_service};
