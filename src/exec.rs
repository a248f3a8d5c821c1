//! Process execution shared by every collaborator that shells out.
//!
//! Each call blocks until the child exits and returns its captured output;
//! interpreting the exit status is left to the caller, since for some tools
//! (`iptables -C`, `systemctl is-active`) a non-zero exit is an answer rather
//! than a failure.

use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

/// Captured result of a finished external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Best diagnostic text for an error report: stderr, then stdout, then the exit code.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }

        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }

        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// How privileged operations are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Prefix the program with `sudo`.
    Sudo,
    /// Run the program as the current user (already root, or tests).
    Direct,
}

impl Privilege {
    pub fn from_settings(use_sudo: bool) -> Self {
        if use_sudo { Privilege::Sudo } else { Privilege::Direct }
    }

    /// Build a command for `program`, escalated when required.
    pub fn command(self, program: &str) -> Command {
        match self {
            Privilege::Sudo => {
                let mut cmd = Command::new("sudo");
                cmd.arg(program);
                cmd
            }
            Privilege::Direct => Command::new(program),
        }
    }
}

/// Render a command line for logs and error messages.
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Run a command to completion, capturing stdout and stderr.
pub fn run(cmd: &mut Command) -> Result<CommandOutput> {
    let line = describe(cmd);
    debug!("exec: {}", line);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute {}", line))?;

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a command with `input` fed to its stdin, capturing stdout and stderr.
pub fn run_with_input(cmd: &mut Command, input: &str) -> Result<CommandOutput> {
    let line = describe(cmd);
    debug!("exec (with stdin): {}", line);

    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to execute {}", line))?;

    // written from a thread: a child echoing stdin (`tee`) blocks once stdout fills
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.to_string();
        thread::spawn(move || stdin.write_all(input.as_bytes()))
    });

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to wait for {}", line))?;

    if let Some(writer) = writer {
        writer
            .join()
            .map_err(|_| anyhow!("stdin writer for {} panicked", line))?
            .with_context(|| format!("Failed to write stdin of {}", line))?;
    }

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
