//! Deterministic, pure logic shared by the engine.
//!
//! Core modules must be free of I/O side effects. They operate on the
//! in-memory knowledge base and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod consistency;
pub mod registry;
pub mod types;
