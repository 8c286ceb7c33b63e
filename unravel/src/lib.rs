//! Self-healing achievement engine.
//!
//! Callers declare named *achievements* (idempotent goals such as "toolchain is
//! installed") together with a knowledge base mapping failure symptoms to root
//! causes and root causes to fixes. When an achievement fails with a recognized
//! error signature, the [`session::Session`] looks up the cause, applies the
//! registered fix and retries, bounded by a retry limit and guarded against the
//! same cause coming back.
//!
//! - **[`core`]**: Pure logic (registry, classification, consistency checks).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (configuration, subprocesses).
//!
//! [`session`] drives the retry state machine and [`dsl`] is the registration
//! surface used to populate the knowledge base.

pub mod core;
pub mod dsl;
pub mod error;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::registry::{Action, Fix, Registry};
pub use crate::core::types::{Arity, ErrorContext, ErrorKind, FixableError};
pub use crate::error::{ActionError, UnravelError};
pub use crate::io::config::UnravelConfig;
pub use crate::io::exec::{Exec, ExecError};
pub use crate::session::Session;
