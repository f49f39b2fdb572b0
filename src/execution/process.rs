//! Subprocess-backed command adapter.
//!
//! [`ProcessAdapter`] launches the provisioning tool as a local process,
//! appending the invocation's arguments to a fixed program and base argument
//! list.
//!
//! ```rust
//! use nodeconf::ProcessAdapter;
//! use std::time::Duration;
//!
//! let adapter = ProcessAdapter::builder("./bin/ybcloud.sh")
//!     // Base arguments come first, then the invocation's own arguments.
//!     .args(["onprem", "--node_metadata", "/opt/metadata.json"])
//!     .env("ANSIBLE_HOST_KEY_CHECKING", "False")
//!     .timeout(Duration::from_secs(1800))
//!     .build();
//!
//! assert_eq!(adapter.program(), "./bin/ybcloud.sh");
//! ```
//!
//! # Timeouts
//!
//! When the timeout expires the child is killed (`kill_on_drop`) and the call
//! returns [`AdapterError::Timeout`]. The remote side gets no chance to clean
//! up; playbooks must tolerate being re-run.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::adapter::{AdapterError, CommandAdapter, CommandOutput, Invocation};
use crate::core::environment::Environment;

/// Runs the provisioning tool as a child process.
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    /// Program to execute
    program: String,
    /// Arguments placed before the invocation's own arguments
    base_args: Vec<String>,
    /// Environment variables
    environment: Environment,
    /// Working directory
    working_dir: Option<PathBuf>,
    /// Execution timeout
    timeout: Option<Duration>,
}

impl ProcessAdapter {
    /// Create a new builder for a process adapter.
    pub fn builder(program: impl Into<String>) -> ProcessAdapterBuilder {
        ProcessAdapterBuilder::new(program)
    }

    /// Get the program being executed.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the base arguments.
    pub fn base_args(&self) -> &[String] {
        &self.base_args
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Get the timeout duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args);
        cmd.args(invocation.to_args());

        for (key, value) in self.environment.iter() {
            cmd.env(key, value);
        }
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CommandAdapter for ProcessAdapter {
    fn name(&self) -> &str {
        &self.program
    }

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, AdapterError> {
        let mut cmd = self.command(invocation);
        debug!(program = %self.program, node_id = %invocation.node_id, "spawning provisioning command");

        let output = match self.timeout {
            Some(duration) => timeout(duration, cmd.output())
                .await
                .map_err(|_| AdapterError::Timeout(duration))?
                .map_err(|e| AdapterError::Spawn(e.to_string()))?,
            None => cmd
                .output()
                .await
                .map_err(|e| AdapterError::Spawn(e.to_string()))?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        match output.status.code() {
            Some(code) => Ok(CommandOutput {
                exit_code: code,
                stdout,
                stderr,
            }),
            None => Err(AdapterError::Terminated { stdout, stderr }),
        }
    }
}

/// Builder for creating `ProcessAdapter` instances.
#[derive(Debug, Clone)]
pub struct ProcessAdapterBuilder {
    program: String,
    base_args: Vec<String>,
    environment: Environment,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ProcessAdapterBuilder {
    /// Create a new builder with the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            environment: Environment::default(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Add a single base argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.base_args.push(arg.into());
        self
    }

    /// Add multiple base arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set environment variables.
    pub fn environment(mut self, env: Environment) -> Self {
        self.environment = env;
        self
    }

    /// Add a single environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment = self.environment.with_var(key, value);
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Build the `ProcessAdapter`.
    pub fn build(self) -> ProcessAdapter {
        ProcessAdapter {
            program: self.program,
            base_args: self.base_args,
            environment: self.environment,
            working_dir: self.working_dir,
            timeout: self.timeout,
        }
    }
}
