//! Subprocess plumbing for the external tools osforge drives.
//!
//! Every tool call in the crate goes through [`run`], [`run_with_stdin`]
//! or [`run_in_chroot`] so logging and failure reporting stay uniform:
//! the full command line at debug level, stdout/stderr captured, and a
//! non-zero exit mapped to [`ExecError::CommandFailed`] carrying the
//! tool name and trimmed stderr.

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::errors::ExecError;

/// A fully assembled external tool invocation.
///
/// Keeps the program and its arguments together so the exact command
/// line can be logged before it runs and quoted in error messages.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: String,
    args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Render the invocation for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Captured output of a successfully finished tool.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run a tool to completion, capturing stdout and stderr.
pub fn run(invocation: &ToolInvocation) -> Result<ToolOutput, ExecError> {
    tracing::debug!(command = %invocation.command_line(), "running tool");
    let output = invocation
        .command()
        .output()
        .map_err(|e| ExecError::spawn(invocation.program(), e))?;
    finish(invocation, output)
}

/// Run a tool feeding `input` to its stdin.
pub fn run_with_stdin(invocation: &ToolInvocation, input: &str) -> Result<ToolOutput, ExecError> {
    tracing::debug!(command = %invocation.command_line(), "running tool with stdin script");
    let mut child = invocation
        .command()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ExecError::spawn(invocation.program(), e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|e| ExecError::spawn(invocation.program(), e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| ExecError::spawn(invocation.program(), e))?;
    finish(invocation, output)
}

/// Run a tool inside a chroot at `root`.
///
/// Failures are attributed to the inner tool, not to `chroot`.
pub fn run_in_chroot(root: &Path, invocation: &ToolInvocation) -> Result<ToolOutput, ExecError> {
    let chrooted = ToolInvocation::new("chroot")
        .arg(root)
        .arg(invocation.program())
        .args(invocation.args.iter().cloned());
    tracing::debug!(command = %chrooted.command_line(), "running tool in chroot");
    let output = chrooted
        .command()
        .output()
        .map_err(|e| ExecError::spawn(invocation.program(), e))?;
    finish(invocation, output)
}

fn finish(invocation: &ToolInvocation, output: Output) -> Result<ToolOutput, ExecError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        tracing::debug!(
            command = %invocation.command_line(),
            status = ?output.status.code(),
            stderr = %stderr.trim(),
            "tool failed"
        );
        return Err(ExecError::failed(
            invocation.program(),
            output.status.code(),
            stderr.trim(),
        ));
    }

    tracing::debug!(command = %invocation.command_line(), "tool succeeded");
    Ok(ToolOutput { stdout, stderr })
}
