// SPDX-License-Identifier: GPL-3.0-only

//! External tool invocation

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use which::which;

use crate::context::ScanContext;
use crate::error::{Result, SysError};

/// Captured output of a finished tool invocation
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn from_stdout(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let stdout = String::from_utf8_lossy(&self.stdout);
        let stderr = String::from_utf8_lossy(&self.stderr);
        format!("{}\n{}", stdout.trim(), stderr.trim())
            .trim()
            .to_string()
    }
}

/// Runs an external introspection tool.
///
/// Implementations must honour the context: cancellation surfaces as
/// [`SysError::Cancelled`] and an elapsed deadline as [`SysError::Timeout`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, ctx: &ScanContext, program: &str, args: &[String])
    -> Result<CommandOutput>;
}

/// Locate `tool` in PATH
pub fn locate(tool: &str) -> Result<PathBuf> {
    let path = which(tool).map_err(|_| SysError::ToolNotFound {
        tool: tool.to_string(),
    })?;
    debug!("Found {} binary at {:?}", tool, path);
    Ok(path)
}

/// Runs tools found in PATH with `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        ctx: &ScanContext,
        program: &str,
        args: &[String],
    ) -> Result<CommandOutput> {
        ctx.check()?;
        let path = locate(program)?;
        let command_line = format!("{} {}", path.display(), args.join(" "));
        debug!("Running {}", command_line);

        let mut command = Command::new(&path);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        let output = ctx
            .run(async { command.output().await.map_err(SysError::from) })
            .await?;

        if !output.status.success() {
            return Err(SysError::CommandFailed {
                command: command_line,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_output_joins_streams() {
        let output = CommandOutput {
            stdout: b"lsblk from util-linux 2.39.3\n".to_vec(),
            stderr: Vec::new(),
        };
        assert_eq!(output.combined(), "lsblk from util-linux 2.39.3");

        let output = CommandOutput {
            stdout: Vec::new(),
            stderr: b"warning\n".to_vec(),
        };
        assert_eq!(output.combined(), "warning");
    }

    #[test]
    fn missing_tool_is_reported() {
        let err = locate("definitely-not-a-real-tool-4242").expect_err("tool should be missing");
        assert!(matches!(err, SysError::ToolNotFound { ref tool } if tool == "definitely-not-a-real-tool-4242"));
    }

    #[tokio::test]
    async fn runner_captures_stdout() {
        if locate("echo").is_err() {
            return;
        }
        let ctx = ScanContext::default();
        let output = SystemCommandRunner
            .run(&ctx, "echo", &["hello".to_string()])
            .await
            .expect("echo should run");
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn runner_reports_non_zero_exit() {
        if locate("false").is_err() {
            return;
        }
        let ctx = ScanContext::default();
        let err = SystemCommandRunner
            .run(&ctx, "false", &[])
            .await
            .expect_err("false should fail");
        assert!(matches!(err, SysError::CommandFailed { .. }));
        assert!(err.is_retryable());
    }
}
