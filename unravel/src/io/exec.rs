//! Subprocess collaborator for achievement actions.
//!
//! [`Exec::run`] and [`Exec::capture`] turn a failing command into an
//! [`ExecError`] whose message carries the diagnostic text symptom patterns
//! are matched against. Converted into an action error it has kind
//! [`ErrorKind::EXEC`](crate::core::types::ErrorKind::EXEC).

use std::ffi::OsStr;
use std::io;
use std::process::Command;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::io::config::ExecConfig;
use crate::io::process::{CommandOutput, run_command};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command")]
    EmptyCommand,

    #[error("{program}: not found")]
    NotFound { program: String },

    #[error("failed to run {program}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Non-zero exit; carries stderr (or stdout for `capture` when stderr is blank).
    #[error("{}", String::from_utf8_lossy(.output))]
    Failed { code: Option<i32>, output: Vec<u8> },

    /// Non-zero exit with nothing on stderr.
    #[error("{}", String::from_utf8_lossy(&silent_text(.code, .stdout)))]
    Silent { code: Option<i32>, stdout: Vec<u8> },
}

impl ExecError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecError::Failed { code, .. } | ExecError::Silent { code, .. } => *code,
            _ => None,
        }
    }

    /// Diagnostic text as raw bytes, without lossy UTF-8 decoding of the
    /// child's output.
    pub fn diagnostic(&self) -> Vec<u8> {
        match self {
            ExecError::Failed { output, .. } => output.clone(),
            ExecError::Silent { code, stdout } => silent_text(code, stdout),
            other => other.to_string().into_bytes(),
        }
    }
}

fn silent_text(code: &Option<i32>, stdout: &[u8]) -> Vec<u8> {
    let mut lines: Vec<&[u8]> = stdout.split(|&b| b == b'\n').collect();
    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    let mut buf = b"No stderr available: ".to_vec();
    if lines.len() > 1 {
        for line in lines {
            buf.extend_from_slice(b"\n  stdout: ");
            buf.extend_from_slice(line);
        }
        buf.push(b'\n');
    } else {
        buf.extend_from_slice(format!("stdout: \"{}\"", stdout.escape_ascii()).as_bytes());
    }
    let status = code.map_or_else(|| "a signal".to_string(), |c| c.to_string());
    buf.extend_from_slice(format!(" (exited with {status})").as_bytes());
    buf
}

/// Runs external commands on behalf of achievements.
#[derive(Debug, Clone, Default)]
pub struct Exec {
    config: ExecConfig,
}

impl Exec {
    pub fn new(config: ExecConfig) -> Self {
        Self { config }
    }

    /// Run a command for its effect.
    ///
    /// Returns `Ok(true)` on a zero exit status, so an action can end with
    /// `Ok(exec.run(&[...])?)`.
    #[instrument(skip_all, fields(program = %program_name(args)))]
    pub fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<bool, ExecError> {
        let output = self.spawn(args)?;
        if output.status.success() {
            return Ok(true);
        }
        debug!(stderr = %output.stderr_lossy(), "errors from command");
        let code = output.status.code();
        if output.stderr.trim_ascii().is_empty() {
            return Err(ExecError::Silent {
                code,
                stdout: output.stdout,
            });
        }
        Err(ExecError::Failed {
            code,
            output: output.stderr,
        })
    }

    /// Run a command and return its stdout.
    #[instrument(skip_all, fields(program = %program_name(args)))]
    pub fn capture<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<String, ExecError> {
        let output = self.spawn(args)?;
        if output.status.success() {
            return Ok(output.stdout_lossy());
        }
        debug!(stderr = %output.stderr_lossy(), "errors from command");
        let code = output.status.code();
        let error = if output.stderr.trim_ascii().is_empty() {
            output.stdout
        } else {
            output.stderr
        };
        Err(ExecError::Failed {
            code,
            output: error,
        })
    }

    fn spawn<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<CommandOutput, ExecError> {
        let (program, rest) = args.split_first().ok_or(ExecError::EmptyCommand)?;
        let program_display = program.as_ref().to_string_lossy().into_owned();
        debug!(args = ?display_args(args), "running");

        let mut cmd = Command::new(program);
        cmd.args(rest);
        let output = run_command(cmd, self.config.output_limit_bytes).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ExecError::NotFound {
                    program: program_display.clone(),
                }
            } else {
                ExecError::Io {
                    program: program_display.clone(),
                    source,
                }
            }
        })?;
        debug!(stdout = %output.stdout_lossy(), "output from command");
        Ok(output)
    }
}

fn program_name<S: AsRef<OsStr>>(args: &[S]) -> String {
    args.first()
        .map(|p| p.as_ref().to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn display_args<S: AsRef<OsStr>>(args: &[S]) -> Vec<String> {
    args.iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect()
}
