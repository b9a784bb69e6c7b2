//! # Process spawn descriptor.
//!
//! [`ProcessSpec`] describes how to launch the external worker: program,
//! arguments, environment, working directory. The job turns it into a
//! [`tokio::process::Command`] with all three standard streams piped.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

/// Spawn descriptor for a shard's worker process.
///
/// ## Example
/// ```
/// use shardvisor::ProcessSpec;
///
/// let spec = ProcessSpec::new("python3")
///     .arg("-u")
///     .arg("worker.py")
///     .env("WORKER_MODE", "shard")
///     .current_dir("/srv/worker");
/// assert_eq!(spec.program(), "python3");
/// ```
#[derive(Clone, Debug)]
pub struct ProcessSpec {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    cwd: Option<PathBuf>,
}

impl ProcessSpec {
    /// Creates a descriptor for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets one environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Sets the child's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The program to execute.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Builds the command: stdin/stdout/stderr piped, killed on drop so a
    /// dropped job cannot leak its child.
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}
