//! Shell command runner (v0.1)
//!
//! Injected capability of shell-executing cog kinds, not of the
//! scheduler. Runs `sh -c` via tokio, pipes optional stdin content,
//! streams stdout/stderr line by line to optional handlers, and kills
//! the child on timeout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::EngineError;

/// Default timeout for shell commands (60 seconds)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-line callback for streamed output.
pub type LineHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// One command execution request.
#[derive(Clone)]
pub struct CommandRequest {
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub stdin: Option<String>,
    pub timeout: Duration,
    pub stdout_handler: Option<LineHandler>,
    pub stderr_handler: Option<LineHandler>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            stdin: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            stdout_handler: None,
            stderr_handler: None,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn stdin(mut self, content: impl Into<String>) -> Self {
        self.stdin = Some(content.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn on_stdout(mut self, handler: LineHandler) -> Self {
        self.stdout_handler = Some(handler);
        self
    }

    pub fn on_stderr(mut self, handler: LineHandler) -> Self {
        self.stderr_handler = Some(handler);
        self
    }
}

impl std::fmt::Debug for CommandRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRequest")
            .field("command", &self.command)
            .field("working_dir", &self.working_dir)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; -1 when the process was killed by a signal.
    pub status: i32,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Executes shell commands. Stateless; cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, request), fields(command = %request.command))]
    pub async fn execute(&self, request: CommandRequest) -> Result<CommandOutcome, EngineError> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&request.command)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        command.stdin(if request.stdin.is_some() {
            std::process::Stdio::piped()
        } else {
            std::process::Stdio::null()
        });
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;

        if let Some(content) = &request.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(content.as_bytes()).await?;
                // closing stdin lets line-reading children terminate
                drop(stdin);
            }
        }

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_handler = request.stdout_handler.clone();
        let stderr_handler = request.stderr_handler.clone();

        let run = async move {
            let (stdout, stderr) = tokio::join!(
                read_stream(stdout_pipe, stdout_handler),
                read_stream(stderr_pipe, stderr_handler),
            );
            let status = child.wait().await?;
            Ok::<_, std::io::Error>(CommandOutcome {
                stdout,
                stderr,
                status: status.code().unwrap_or(-1),
            })
        };

        match tokio::time::timeout(request.timeout, run).await {
            Ok(outcome) => {
                let outcome = outcome?;
                debug!(status = outcome.status, "command finished");
                Ok(outcome)
            }
            // dropping the run future drops the child; kill_on_drop
            // reaps it
            Err(_) => Err(EngineError::Timeout {
                seconds: request.timeout.as_secs(),
            }),
        }
    }
}

async fn read_stream(
    pipe: Option<impl AsyncRead + Unpin>,
    handler: Option<LineHandler>,
) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut lines = BufReader::new(pipe).lines();
    let mut captured = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(handler) = &handler {
            handler(&line);
        }
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn captures_stdout_and_status() {
        let runner = CommandRunner::new();
        let outcome = runner
            .execute(CommandRequest::new("echo hello"))
            .await
            .unwrap();
        assert_eq!(outcome.stdout, "hello\n");
        assert_eq!(outcome.status, 0);
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn captures_stderr_and_nonzero_status() {
        let runner = CommandRunner::new();
        let outcome = runner
            .execute(CommandRequest::new("echo oops >&2; exit 3"))
            .await
            .unwrap();
        assert_eq!(outcome.stderr, "oops\n");
        assert_eq!(outcome.status, 3);
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn pipes_stdin_content() {
        let runner = CommandRunner::new();
        let outcome = runner
            .execute(CommandRequest::new("tr a-z A-Z").stdin("quiet\n"))
            .await
            .unwrap();
        assert_eq!(outcome.stdout, "QUIET\n");
    }

    #[tokio::test]
    async fn respects_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

        let runner = CommandRunner::new();
        let outcome = runner
            .execute(CommandRequest::new("ls").working_dir(dir.path()))
            .await
            .unwrap();
        assert_eq!(outcome.stdout.trim(), "marker.txt");
    }

    #[tokio::test]
    async fn times_out_long_commands() {
        let runner = CommandRunner::new();
        let err = runner
            .execute(CommandRequest::new("sleep 5").timeout(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }));
    }

    #[tokio::test]
    async fn streams_lines_to_handlers() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let runner = CommandRunner::new();
        runner
            .execute(
                CommandRequest::new("printf 'one\\ntwo\\n'")
                    .on_stdout(Arc::new(move |line| sink.lock().push(line.to_string()))),
            )
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec!["one".to_string(), "two".to_string()]);
    }
}
