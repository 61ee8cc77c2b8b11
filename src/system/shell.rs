//! External command execution
//!
//! Every call out to apt-get, curl, gpg and systemctl goes through [`Shell`],
//! so the proxy and service logic can run against a recording fake in tests.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::debug;

/// Result of a command whose stdout was captured
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

pub trait Shell {
    /// Run with inherited stdio and report whether it exited successfully
    fn run(&self, program: &str, args: &[&str]) -> Result<bool>;

    /// Run and capture stdout
    fn capture(&self, program: &str, args: &[&str]) -> Result<Captured>;

    /// Run with `input` written to stdin
    fn feed(&self, program: &str, args: &[&str], input: &[u8]) -> Result<bool>;

    /// Check whether a binary resolves on PATH
    fn has_binary(&self, name: &str) -> bool;
}

/// The real host
pub struct SystemShell;

impl Shell for SystemShell {
    fn run(&self, program: &str, args: &[&str]) -> Result<bool> {
        debug!("running {} {}", program, args.join(" "));

        let status = Command::new(program)
            .args(args)
            .status()
            .context(format!("Failed to execute {}", program))?;

        Ok(status.success())
    }

    fn capture(&self, program: &str, args: &[&str]) -> Result<Captured> {
        debug!("capturing {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .context(format!("Failed to execute {}", program))?;

        Ok(Captured {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn feed(&self, program: &str, args: &[&str], input: &[u8]) -> Result<bool> {
        debug!("feeding {} bytes to {} {}", input.len(), program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .context(format!("Failed to execute {}", program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .context(format!("Failed to write to {} stdin", program))?;
            // Close stdin to signal EOF
            drop(stdin);
        }

        let status = child
            .wait()
            .context(format!("Failed to wait for {}", program))?;

        Ok(status.success())
    }

    fn has_binary(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_shell_reports_exit_status() {
        let shell = SystemShell;
        assert!(shell.run("true", &[]).unwrap());
        assert!(!shell.run("false", &[]).unwrap());
    }

    #[test]
    fn test_system_shell_captures_stdout() {
        let captured = SystemShell.capture("echo", &["hello"]).unwrap();
        assert!(captured.success);
        assert_eq!(String::from_utf8_lossy(&captured.stdout).trim(), "hello");
    }

    #[test]
    fn test_missing_program_is_an_error() {
        assert!(SystemShell.run("omc-definitely-not-a-binary", &[]).is_err());
        assert!(!SystemShell.has_binary("omc-definitely-not-a-binary"));
    }
}
