//! Host interaction: process execution and TCP reachability checks

pub mod probe;
pub mod shell;

pub use shell::{Shell, SystemShell};
