//! Test-only helpers: scripted actions, counting fixes, captured logs and
//! temp configs.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::Dispatch;

use crate::core::registry::{Action, Fix};
use crate::core::types::{Arity, ErrorKind};
use crate::error::ActionError;
use crate::session::Session;

/// One scripted outcome of an action invocation.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    ReturnFalse,
    Raise(ErrorKind, String),
}

impl Step {
    pub fn raise(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        Step::Raise(kind.into(), message.into())
    }
}

/// Shared invocation counter.
#[derive(Debug, Clone, Default)]
pub struct Calls(Rc<Cell<usize>>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.get()
    }

    fn bump(&self) -> usize {
        let n = self.0.get();
        self.0.set(n + 1);
        n
    }
}

/// Build a zero-argument action replaying `steps` in order. The last step
/// repeats once the script runs out.
pub fn scripted(steps: Vec<Step>) -> (Action, Calls) {
    let calls = Calls::default();
    let counter = calls.clone();
    let action = Action::new(move |_| {
        let n = counter.bump();
        let step = steps
            .get(n)
            .or_else(|| steps.last())
            .cloned()
            .unwrap_or(Step::Succeed);
        run_step(step)
    });
    (action, calls)
}

/// Build an action accepting `arity` arguments that records every argument
/// list it is called with and succeeds.
pub fn recording(arity: Arity) -> (Action, Rc<RefCell<Vec<Vec<String>>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let record = move |_: &Session, args: &[String]| -> Result<bool, ActionError> {
        sink.borrow_mut().push(args.to_vec());
        Ok(true)
    };
    let action = match arity {
        Arity::Exact(n) => Action::with_args(n, record),
        Arity::Variadic => Action::variadic(record),
    };
    (action, seen)
}

/// A fix that only counts its invocations.
pub fn counting_fix() -> (Fix, Calls) {
    let calls = Calls::default();
    let counter = calls.clone();
    let fix = Fix::run(move |_, _| {
        counter.bump();
        Ok(())
    });
    (fix, calls)
}

fn run_step(step: Step) -> Result<bool, ActionError> {
    match step {
        Step::Succeed => Ok(true),
        Step::ReturnFalse => Ok(false),
        Step::Raise(kind, message) => Err(ActionError::new(kind, message)),
    }
}

/// In-memory log sink for asserting on emitted events.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// A plain-text fmt subscriber writing into this buffer.
    pub fn dispatch(&self) -> Dispatch {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        Dispatch::new(subscriber)
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Config file written into a temporary directory that lives as long as this value.
pub struct TempConfig {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TempConfig {
    pub fn new(contents: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let path = dir.path().join("unravel.toml");
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(Self { _dir: dir, path })
    }
}
