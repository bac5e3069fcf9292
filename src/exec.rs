//! External process execution for command modules.
//!
//! Commands describe the work as a [`Script`] and hand it to a [`Runner`].
//! The real runner spawns `bash -c <body>` through tokio and captures both
//! streams; tests substitute a runner that returns canned output.
//!
//! There is no timeout: a hung tool hangs the invocation.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::errors::CommandError;

/// A shell script plus the environment it runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    /// Short label used in diagnostics, e.g. `cast send`.
    pub label: String,
    pub body: String,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Positional parameters (`$1`, `$2`, ...).
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl Script {
    pub fn new(label: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turn a non-zero exit into `CommandError::External`, keeping both streams.
    pub fn check(self, label: &str) -> Result<Self, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandError::External {
                program: label.to_string(),
                status: self.status,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }
}

/// Abstraction over process execution for testability.
/// Real implementation: `ShellRunner`.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, script: &Script) -> Result<ProcessOutput>;
}

/// Runs scripts with `bash -c`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl Runner for ShellRunner {
    async fn run(&self, script: &Script) -> Result<ProcessOutput> {
        let mut cmd = Command::new(&self.shell);
        // `$0` is the label so scripts can name themselves in their own errors.
        cmd.arg("-c")
            .arg(&script.body)
            .arg(&script.label)
            .args(&script.args)
            .stdin(if script.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &script.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &script.env {
            cmd.env(key, value);
        }

        tracing::debug!(label = %script.label, shell = %self.shell, "spawning external step");

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {} for '{}'", self.shell, script.label))?;

        if let Some(input) = &script.stdin
            && let Some(mut stdin) = child.stdin.take()
        {
            // A script may exit without reading its input.
            match stdin.write_all(input.as_bytes()).await {
                Err(err) if err.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(err)
                        .with_context(|| format!("Failed to write stdin of '{}'", script.label));
                }
                _ => {}
            }
            // stdin is dropped here, closing the pipe
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for '{}'", script.label))?;

        let result = ProcessOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(
            label = %script.label,
            status = ?result.status,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "external step finished"
        );

        Ok(result)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_runner_captures_both_streams() {
        let runner = ShellRunner::default();
        let script = Script::new("echo", "echo out; echo err >&2");
        let output = runner.run(&script).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_shell_runner_passes_env_args_and_stdin() {
        let runner = ShellRunner::default();
        let script = Script::new("vars", r#"read line; echo "$GREETING $1 $2 $line""#)
            .env("GREETING", "hello")
            .args(["a", "b"])
            .stdin("piped\n");
        let output = runner.run(&script).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello a b piped");
    }

    #[tokio::test]
    async fn test_shell_runner_reports_exit_status() {
        let runner = ShellRunner::default();
        let output = runner
            .run(&Script::new("fail", "echo nope >&2; exit 3"))
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.status, Some(3));

        let err = output.check("fail").unwrap_err();
        match err {
            CommandError::External { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr.trim(), "nope");
            }
            other => panic!("Expected External, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shell_runner_honours_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let runner = ShellRunner::default();
        let output = runner
            .run(&Script::new("ls", "ls").current_dir(dir.path()))
            .await
            .unwrap();
        assert!(output.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let runner = ShellRunner::new("definitely-not-a-shell-xyz");
        assert!(runner.run(&Script::new("x", "true")).await.is_err());
    }
}
