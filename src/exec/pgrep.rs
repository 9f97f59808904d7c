// src/exec/pgrep.rs

//! Production process counter backed by `pgrep -c`.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::CountFailure;
use crate::exec::backend::{CountOutcome, ProcessCounter};
use crate::exec::output::parse_counts;
use crate::types::{ProcessPattern, UserScope};

pub const DEFAULT_PROGRAM: &str = "pgrep";

/// `pgrep` exits with 1 when nothing matched; `-c` still prints `0` then.
pub const DEFAULT_OK_EXIT_CODES: &[i32] = &[0, 1];

/// Exit status a shell or launcher reports for a command it could not find.
const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Counts processes by running `pgrep -c [-u uids] <pattern>`.
///
/// The command is built as an argument vector; the pattern is never passed
/// through a shell.
#[derive(Debug, Clone)]
pub struct PgrepCounter {
    program: PathBuf,
    ok_exit_codes: Vec<i32>,
    uid: u32,
}

impl PgrepCounter {
    /// Counter running `program`, filtering by the uid of this process.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ok_exit_codes: DEFAULT_OK_EXIT_CODES.to_vec(),
            uid: current_uid(),
        }
    }

    pub fn with_ok_exit_codes(mut self, codes: impl Into<Vec<i32>>) -> Self {
        self.ok_exit_codes = codes.into();
        self
    }

    /// Override the uid used for `self` scopes.
    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments passed to the count tool for `scope` and `pattern`.
    pub fn args(&self, scope: UserScope, pattern: &ProcessPattern) -> Vec<String> {
        let mut args = Vec::with_capacity(4);
        match scope {
            UserScope::CurrentUser => {
                args.push("-u".to_string());
                args.push(self.uid.to_string());
            }
            UserScope::CurrentUserAndRoot => {
                args.push("-u".to_string());
                if self.uid == 0 {
                    args.push("0".to_string());
                } else {
                    args.push(format!("{},0", self.uid));
                }
            }
            UserScope::All => {}
        }
        args.push("-c".to_string());
        args.push(pattern.as_str().to_string());
        args
    }

    async fn run(&self, scope: UserScope, pattern: &ProcessPattern) -> CountOutcome {
        let args = self.args(scope, pattern);
        debug!(program = ?self.program, ?args, "running process count query");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_failure(&self.program, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let counts = classify_exit(
            &self.program,
            output.status,
            &stdout,
            &stderr,
            &self.ok_exit_codes,
        );

        match &counts {
            Ok(counts) => debug!(?counts, "process count query finished"),
            Err(failure) => warn!(error = %failure, "process count query failed"),
        }
        counts
    }
}

impl ProcessCounter for PgrepCounter {
    fn count<'a>(
        &'a self,
        scope: UserScope,
        pattern: &'a ProcessPattern,
    ) -> Pin<Box<dyn Future<Output = CountOutcome> + Send + 'a>> {
        Box::pin(self.run(scope, pattern))
    }
}

/// Turn a finished query into counts or a failure.
///
/// Kept separate from the spawning so the exit-status policy can be tested
/// without a real tool.
pub fn classify_exit(
    program: &Path,
    status: ExitStatus,
    stdout: &str,
    stderr: &str,
    ok_exit_codes: &[i32],
) -> CountOutcome {
    let Some(code) = status.code() else {
        return Err(CountFailure::QueryExecutionFailed(format!(
            "{} was terminated by a signal",
            program.display()
        )));
    };

    if code == EXIT_COMMAND_NOT_FOUND {
        return Err(CountFailure::QueryToolMissing(format!(
            "{} exited with status {code} (command not found)",
            program.display()
        )));
    }

    if !ok_exit_codes.contains(&code) {
        return Err(CountFailure::QueryExecutionFailed(format!(
            "{} exited with status {code}: {}",
            program.display(),
            stderr.trim()
        )));
    }

    parse_counts(stdout)
}

fn spawn_failure(program: &Path, err: io::Error) -> CountFailure {
    match err.kind() {
        io::ErrorKind::NotFound => {
            CountFailure::QueryToolMissing(format!("{}: {err}", program.display()))
        }
        _ => CountFailure::QueryExecutionFailed(format!(
            "spawning {}: {err}",
            program.display()
        )),
    }
}

#[cfg(unix)]
fn current_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}
