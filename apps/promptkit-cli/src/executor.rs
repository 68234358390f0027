//! Executors available from the command line.

use anyhow::{Context, Result};
use promptkit_core::PromptExecutor;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Pipes each prompt to a shell command's stdin and returns its stdout.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: String,
}

impl CommandExecutor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl PromptExecutor for CommandExecutor {
    async fn execute(&self, prompt: &str) -> Result<String> {
        tracing::debug!(command = %self.command, bytes = prompt.len(), "spawning executor command");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.command))?;

        let mut stdin = child.stdin.take().context("executor stdin unavailable")?;
        let input = prompt.to_string();
        let writer = tokio::spawn(async move {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("failed to wait for `{}`", self.command))?;

        // A command that ignores stdin closes the pipe early; that is not an error.
        if let Ok(Err(e)) = writer.await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e).context("failed to write prompt to executor stdin");
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

/// Returns every prompt unchanged. Useful to preview what a chain would send.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoExecutor;

impl PromptExecutor for EchoExecutor {
    async fn execute(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

/// Executor selected by `--exec` or `--echo`.
#[derive(Debug, Clone)]
pub enum CliExecutor {
    Command(CommandExecutor),
    Echo(EchoExecutor),
}

impl PromptExecutor for CliExecutor {
    async fn execute(&self, prompt: &str) -> Result<String> {
        match self {
            CliExecutor::Command(executor) => executor.execute(prompt).await,
            CliExecutor::Echo(executor) => executor.execute(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_executor() {
        assert_eq!(EchoExecutor.execute("hello").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_command_executor_pipes_stdin() {
        let executor = CommandExecutor::new("tr a-z A-Z");
        assert_eq!(executor.execute("shout").await.unwrap(), "SHOUT");
    }

    #[tokio::test]
    async fn test_command_executor_reports_failure() {
        let executor = CommandExecutor::new("echo boom >&2; exit 3");
        let err = executor.execute("ignored").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
