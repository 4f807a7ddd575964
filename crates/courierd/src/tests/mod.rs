//! Test suites for the courier daemon.

mod console_behaviour;
pub(crate) mod support;
