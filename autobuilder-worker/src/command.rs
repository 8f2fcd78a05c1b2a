//! External command execution
//!
//! Every build tool (parser, renderer, publisher, git, cp) is run through
//! [`CommandRunner`], so stage adapters only translate job data into
//! command lines and results back into stage results.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// A command to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; the worker's own when `None`
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// File whose contents are fed to stdin
    pub stdin_file: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
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

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(path.into());
        self
    }

    /// Shell-like rendering for job command logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands
///
/// `Err` means the command could not be started; a command that ran and
/// exited non-zero is an `Ok` with its exit code.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as child processes of the worker
#[derive(Debug, Default, Clone)]
pub struct ProcessCommandRunner;

impl ProcessCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!("Executing: {}", spec.command_line());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let stdin = match &spec.stdin_file {
            Some(path) => Some(
                tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read stdin file {}", path.display()))?,
            ),
            None => None,
        };
        command.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to execute '{}'", spec.program))?;

        // Stdin is fed while output is drained
        let pipe = child.stdin.take();
        let feed = async move {
            if let (Some(input), Some(mut pipe)) = (stdin, pipe) {
                match pipe.write_all(&input).await {
                    // The child may exit without reading all of its input
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
                // Close stdin so the child sees EOF
                drop(pipe);
            }
            Ok::<(), std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed.context("Failed to write command stdin")?;
        let output = output.with_context(|| format!("Failed to wait for '{}'", spec.program))?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if result.success() {
            debug!(
                "Command completed successfully: stdout_len={}, stderr_len={}",
                result.stdout.len(),
                result.stderr.len()
            );
        } else {
            debug!(
                "Command failed: cmd={} exit_code={} stderr='{}'",
                spec.program,
                result.exit_code,
                result.stderr.trim()
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let spec = CommandSpec::new("mut-publish")
            .arg("public")
            .args(["bucket", "--stage"])
            .cwd("/tmp/repo");
        assert_eq!(spec.command_line(), "mut-publish public bucket --stage");
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp/repo")));
    }

    #[tokio::test]
    async fn test_runs_process_and_captures_output() {
        let runner = ProcessCommandRunner::new();
        let output = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_stdin_file_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        std::fs::write(&input, "from file").unwrap();

        let output = ProcessCommandRunner::new()
            .run(
                &CommandSpec::new("sh")
                    .args(["-c", "cat; printf \" $GREETING\""])
                    .env("GREETING", "hello")
                    .stdin_file(input.clone()),
            )
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "from file hello");
    }

    #[tokio::test]
    async fn test_large_stdin_echoed_back() {
        // Far beyond a pipe buffer in both directions
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("big.patch");
        let body = "+ line of a large patch\n".repeat(64 * 1024);
        std::fs::write(&input, &body).unwrap();

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ProcessCommandRunner::new().run(&CommandSpec::new("cat").stdin_file(input)),
        )
        .await
        .expect("cat stalled on a large stdin")
        .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.len(), body.len());
    }

    #[tokio::test]
    async fn test_child_ignoring_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("big.patch");
        std::fs::write(&input, "x".repeat(1024 * 1024)).unwrap();

        let output = ProcessCommandRunner::new()
            .run(&CommandSpec::new("true").stdin_file(input))
            .await
            .unwrap();
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let result = ProcessCommandRunner::new()
            .run(&CommandSpec::new("definitely-not-a-real-binary-xyz"))
            .await;
        assert!(result.is_err());
    }
}
