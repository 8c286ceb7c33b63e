//! I/O collaborators used by achievements and session setup.

pub mod config;
pub mod exec;
pub mod process;
