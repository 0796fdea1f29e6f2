//! External command execution
//!
//! The one-shot tools the engine talks to (xinput, synclient, gsettings) all
//! go through [`CommandRunner`] so tests can substitute an in-memory system.
//! Long-lived children (`gsettings monitor`, the confirmation dialog) are
//! managed by their own modules. Inside the daemon every child is a
//! `tokio::process` child reaped on the runtime.

use crate::error::CommandError;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Executes external programs
pub trait CommandRunner {
    /// Run a program to completion and return its stdout.
    ///
    /// Non-zero exit and empty stdout are both reported as errors.
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError>;

    /// Run a program to completion, ignoring its output
    fn execute(&self, program: &str, args: &[&str]) -> Result<(), CommandError>;

    /// Start a program without waiting for it. Only spawn failure is reported.
    fn spawn(&self, program: &str, args: &[&str]) -> Result<(), CommandError>;

    /// Read a file (used for /proc listings)
    fn read_file(&self, path: &str) -> Result<String, CommandError>;
}

/// Runs real processes on the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        debug!("exec: {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CommandError::from_io(program, e))?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(CommandError::EmptyOutput(program.to_string()));
        }
        Ok(stdout)
    }

    fn execute(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
        debug!("exec: {} {}", program, args.join(" "));

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| CommandError::from_io(program, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Failed {
                program: program.to_string(),
                status: status.to_string(),
            })
        }
    }

    fn spawn(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
        debug!("spawn: {} {}", program, args.join(" "));

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // One-shot CLI run: the child is reparented once we exit
            Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| CommandError::from_io(program, e))?;
            return Ok(());
        };

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CommandError::from_io(program, e))?;

        // Reap on the runtime so fire-and-forget calls don't leave zombies
        let name = program.to_string();
        handle.spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => warn!("'{}' exited with {}", name, status),
                Ok(_) => {}
                Err(e) => warn!("Failed to wait for '{}': {}", name, e),
            }
        });

        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<String, CommandError> {
        let content = std::fs::read_to_string(path).map_err(|e| CommandError::from_io(path, e))?;
        if content.trim().is_empty() {
            return Err(CommandError::EmptyOutput(path.to_string()));
        }
        Ok(content)
    }
}
