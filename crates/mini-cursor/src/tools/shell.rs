use std::env;
use std::process::{Output, Stdio};

use mini_cursor_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

/// Input of [`ShellTool`].
#[derive(Deserialize, JsonSchema)]
pub struct ShellToolParameters {
    #[schemars(description = "The command to run in the terminal.")]
    command: String,
}

/// Decides whether output on stderr means the command failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StderrPolicy {
    /// Any stderr output is a failure, even if the command exits with 0.
    ///
    /// Commands that print warnings to stderr while succeeding are
    /// reported as failed.
    #[default]
    TreatAsFailure,
    /// Only the exit status decides. Stderr is appended to the output.
    Ignore,
}

/// A tool for running shell commands.
pub struct ShellTool {
    parameter_schema: Value,
    stderr_policy: StderrPolicy,
}

impl ShellTool {
    /// Creates a new shell tool.
    #[inline]
    pub fn new(stderr_policy: StderrPolicy) -> Self {
        ShellTool {
            parameter_schema: schema_for!(ShellToolParameters).to_value(),
            stderr_policy,
        }
    }
}

impl Default for ShellTool {
    #[inline]
    fn default() -> Self {
        Self::new(StderrPolicy::default())
    }
}

impl Tool for ShellTool {
    type Input = ShellToolParameters;

    fn name(&self) -> &str {
        "executeCommand"
    }

    fn description(&self) -> &str {
        "Executes a single shell command on the user's machine and returns \
        its output. Use it to create folders and files, or to inspect the \
        system."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ShellToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let stderr_policy = self.stderr_policy;
        async move {
            debug!("running: {}", input.command);
            let output = shell_command(&input.command)
                .output()
                .await
                .map_err(|err| {
                    ToolError::execution_error()
                        .with_reason(format!("cannot run the command: {err}"))
                })?;
            report(&output, stderr_policy)
        }
    }
}

fn shell_command(command: &str) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C");
        cmd
    } else {
        let shell = env::var_os("SHELL").unwrap_or_else(|| "/bin/sh".into());
        let mut cmd = Command::new(shell);
        cmd.arg("-c");
        cmd
    };
    cmd.arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

fn report(output: &Output, stderr_policy: StderrPolicy) -> ToolResult {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if stderr_policy == StderrPolicy::TreatAsFailure && !stderr.is_empty() {
        let reason = match stderr.trim_end() {
            "" => "the command wrote to stderr",
            text => text,
        };
        return Err(ToolError::execution_error().with_reason(reason));
    }
    if !output.status.success() {
        let mut reason = format!("command failed with {}", output.status);
        for text in [&stdout, &stderr] {
            if !text.trim().is_empty() {
                reason.push('\n');
                reason.push_str(text.trim_end());
            }
        }
        return Err(ToolError::execution_error().with_reason(reason));
    }

    let mut text = stdout.into_owned();
    if !stderr.is_empty() {
        text.push_str(&stderr);
    }
    if text.trim().is_empty() {
        return Ok("Success: (no output)".to_owned());
    }
    Ok(format!("Success: {text}"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    async fn run(command: &str, stderr_policy: StderrPolicy) -> ToolResult {
        ShellTool::new(stderr_policy)
            .execute(ShellToolParameters {
                command: command.to_owned(),
            })
            .await
    }

    #[tokio::test]
    async fn test_stdout_only() {
        let result = run("echo 'Hello, World!'", StderrPolicy::TreatAsFailure)
            .await
            .unwrap();
        assert_eq!(result, "Success: Hello, World!\n");
    }

    #[tokio::test]
    async fn test_no_output() {
        let result = run("true", StderrPolicy::TreatAsFailure).await.unwrap();
        assert_eq!(result, "Success: (no output)");
    }

    #[tokio::test]
    async fn test_stderr_fails_even_on_success_exit() {
        // A successful command that only logs a warning still counts as a
        // failure under the default policy.
        let err = run(
            "echo done; echo 'warning: deprecated' >&2; exit 0",
            StderrPolicy::TreatAsFailure,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "warning: deprecated");
    }

    #[tokio::test]
    async fn test_blank_stderr_still_has_a_reason() {
        let err = run("echo >&2", StderrPolicy::TreatAsFailure)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "the command wrote to stderr");
    }

    #[tokio::test]
    async fn test_stderr_ignored() {
        let result = run(
            "echo done; echo 'warning: deprecated' >&2",
            StderrPolicy::Ignore,
        )
        .await
        .unwrap();
        assert_eq!(result, "Success: done\nwarning: deprecated\n");
    }

    #[tokio::test]
    async fn test_exit_status() {
        for policy in [StderrPolicy::TreatAsFailure, StderrPolicy::Ignore] {
            let err = run("echo partial; exit 3", policy).await.unwrap_err();
            let reason = err.to_string();
            assert!(reason.contains("exit status: 3"), "{reason}");
            assert!(reason.ends_with("partial"), "{reason}");
        }
    }
}
