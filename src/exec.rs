// External command invocation.
//
// Every OS interaction that shells out (powercfg, tasklist, taskkill) goes
// through the `CommandRunner` trait so the stores can be exercised in tests
// with canned output. There is deliberately no timeout: a hung external
// command hangs the calling flow (known limitation).

use std::process::Command;

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use crate::error::Error;

/// Keeps the transient console window from flashing up on Windows.
#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Captured result of a single-shot command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best error text available: stderr, then stdout, then a placeholder.
    pub fn error_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr;
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout;
        }
        "unknown error"
    }
}

pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, Error>;
}

/// Production runner backed by `std::process::Command`.
pub struct OsCommandRunner;

impl CommandRunner for OsCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, Error> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        #[cfg(target_os = "windows")]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let output = cmd
            .output()
            .map_err(|e| Error::Command(format!("{}: {}", program, e)))?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
