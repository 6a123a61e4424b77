//! External command execution utilities.
//!
//! Provides a Builder-based API for running a program with stdin piping,
//! captured stdout, and an optional wall-clock timeout.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let webp = Cmd::new("magick")
//!     .args(["-", "-quality", "85", "webp:-"])
//!     .stdin(png_bytes)
//!     .timeout(Duration::from_secs(60))
//!     .run()?;
//! ```

use std::{
    ffi::{OsStr, OsString},
    io::{self, Read, Write},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;

/// How often a child with a deadline is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to run `{program}`")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{program}` timed out after {limit:?}")]
    Timeout { program: String, limit: Duration },
}

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    stdin_data: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    /// Pipe data to stdin.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin_data = Some(data.into());
        self
    }

    /// Kill the process if it runs longer than `limit`.
    pub const fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Run to completion and return stdout.
    pub fn run(self) -> Result<Vec<u8>, ExecError> {
        let program = self.program.to_string_lossy().into_owned();
        let io_err = |source| ExecError::Io {
            program: program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(if self.stdin_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_err)?;

        // Pipes are serviced on helper threads so a full pipe never blocks the wait.
        let writer = child
            .stdin
            .take()
            .zip(self.stdin_data)
            .map(|(mut stdin, data)| {
                thread::spawn(move || {
                    // A child that exits early closes the pipe; its status reports why.
                    let _ = stdin.write_all(&data);
                })
            });
        let stdout = child.stdout.take().map(|out| thread::spawn(|| read_all(out)));
        let stderr = child.stderr.take().map(|err| thread::spawn(|| read_all(err)));

        let status = match self.timeout {
            Some(limit) => wait_with_timeout(&mut child, limit).map_err(io_err)?,
            None => Some(child.wait().map_err(io_err)?),
        };

        let Some(status) = status else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::Timeout {
                program,
                limit: self.timeout.unwrap_or_default(),
            });
        };

        if let Some(handle) = writer {
            let _ = handle.join();
        }
        let stdout = stdout.map(join_output).unwrap_or_default();
        let stderr = stderr.map(join_output).unwrap_or_default();

        if !status.success() {
            return Err(ExecError::Failed {
                program,
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

fn read_all(mut reader: impl Read) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf);
    buf
}

fn join_output(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

/// Poll until the child exits or `limit` elapses (`None` on timeout).
fn wait_with_timeout(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= limit {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
