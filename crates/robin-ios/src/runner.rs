//! External process execution with log capture.
//!
//! [`SystemRunner::run`] starts a toolchain command with stdout and stderr
//! piped, and a single background task drains both streams line by line into
//! the log file (and optionally the console) while the caller waits for the
//! process. The step outcome is only reported after the drain task has seen
//! end-of-stream on both pipes and flushed the log.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ProcessError;

/// First token of the line appended to a log when its process fails.
pub const FAILURE_MARKER: &str = "** ROBIN FAILED **";

/// How long the drain may keep reading after a process is killed.
/// Descendants of the killed process can hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name or path.
    pub program: PathBuf,

    /// Arguments, in order.
    pub args: Vec<OsString>,

    /// Directory the process starts in.
    pub working_dir: PathBuf,

    /// Kill the process when it runs longer than this.
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program name for messages.
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Whether any argument equals `needle`.
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program_name())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

/// Executes toolchain commands on behalf of the orchestrator.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `invocation`, writing its combined output to `log_path` (created or
    /// truncated first) and, when `echo` is set, to stdout.
    ///
    /// Returns `Ok(())` only for exit code 0.
    async fn run(
        &self,
        invocation: &Invocation,
        log_path: &Path,
        echo: bool,
    ) -> Result<(), ProcessError>;

    /// Run `invocation` and return its stdout followed by its stderr.
    /// Nothing is persisted.
    async fn capture(&self, invocation: &Invocation) -> Result<String, ProcessError>;
}

/// [`ProcessRunner`] backed by real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        log_path: &Path,
        echo: bool,
    ) -> Result<(), ProcessError> {
        let program = invocation.program_name();
        let log = File::create(log_path)
            .await
            .map_err(|source| ProcessError::LogCreation {
                path: log_path.to_path_buf(),
                source,
            })?;

        debug!(command = %invocation.display(), log = %log_path.display(), "Spawning process");
        let mut child = invocation
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = merged_output(&mut child).map_err(|source| ProcessError::Capture {
            program: program.clone(),
            source,
        })?;
        let mut drain = tokio::spawn(drain_output(output, log, echo));
        let deadline = invocation.timeout.map(|limit| Instant::now() + limit);

        let waited = wait_until(&mut child, deadline).await;

        // After a kill or a failed wait a stray descendant may still hold the
        // pipes open, so the drain only gets a short grace period.
        let drain_deadline = match waited {
            Ok(Some(_)) => deadline,
            _ => Some(Instant::now() + DRAIN_GRACE),
        };
        let lines = match join_drain(&mut drain, drain_deadline).await {
            Some(drained) => drained.map_err(|source| ProcessError::Capture {
                program: program.clone(),
                source,
            })?,
            None if matches!(waited, Ok(Some(_))) => {
                warn!(program = %program, "Process exited but its output stayed open past the deadline");
                let limit = invocation.timeout.unwrap_or_default();
                return Err(timed_out(
                    program,
                    limit,
                    log_path,
                    "left its output open past the deadline",
                )
                .await);
            }
            None => {
                warn!(program = %program, "Output drain did not finish after kill, abandoning it");
                0
            }
        };
        debug!(program = %program, lines, "Output drained");

        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                let limit = invocation.timeout.unwrap_or_default();
                return Err(timed_out(program, limit, log_path, "was killed").await);
            }
            Err(source) => return Err(ProcessError::Capture { program, source }),
        };

        if status.success() {
            return Ok(());
        }

        let exit_code = status.code().unwrap_or(-1);
        append_failure_marker(log_path, &format!("{program} exited with code {exit_code}")).await;
        Err(ProcessError::Execution {
            program,
            exit_code,
            log_path: Some(log_path.to_path_buf()),
        })
    }

    async fn capture(&self, invocation: &Invocation) -> Result<String, ProcessError> {
        let program = invocation.program_name();
        debug!(command = %invocation.display(), "Spawning process");

        let child = invocation
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        // kill_on_drop reaps the child if the deadline drops the future.
        let output = match invocation.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ProcessError::Timeout {
                    program: program.clone(),
                    limit,
                    log_path: None,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| ProcessError::Capture {
            program: program.clone(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(ProcessError::Execution {
                program,
                exit_code: output.status.code().unwrap_or(-1),
                log_path: None,
            })
        }
    }
}

/// Wait for exit. `Ok(None)` means the deadline passed and the child was killed.
async fn wait_until(
    child: &mut Child,
    deadline: Option<Instant>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().await.map(Some);
    };

    match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(status) => status.map(Some),
        Err(_) => {
            warn!("Process exceeded its deadline, killing it");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill timed-out process");
            }
            Ok(None)
        }
    }
}

/// Join the drain task. `None` means it was still running at `deadline`;
/// it has then been aborted and has stopped writing to the log.
async fn join_drain(
    drain: &mut JoinHandle<std::io::Result<u64>>,
    deadline: Option<Instant>,
) -> Option<std::io::Result<u64>> {
    let joined = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, &mut *drain).await {
            Ok(joined) => joined,
            Err(_) => {
                drain.abort();
                let _ = (&mut *drain).await;
                return None;
            }
        },
        None => drain.await,
    };
    Some(joined.map_err(std::io::Error::other).and_then(|r| r))
}

/// Mark the log and build the timeout error for a step that ran past `limit`.
async fn timed_out(program: String, limit: Duration, log_path: &Path, how: &str) -> ProcessError {
    append_failure_marker(
        log_path,
        &format!("{program} timed out after {}s and {how}", limit.as_secs()),
    )
    .await;
    ProcessError::Timeout {
        program,
        limit,
        log_path: Some(log_path.to_path_buf()),
    }
}

/// Merge the child's stdout and stderr into one stream of lines.
///
/// Interleaving between the two pipes follows arrival order as observed by
/// the reader; order within each pipe is preserved.
fn merged_output(child: &mut Child) -> std::io::Result<BoxStream<'static, std::io::Result<String>>> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr was not piped"))?;
    Ok(stream::select(line_stream(stdout), line_stream(stderr)).boxed())
}

/// Lines of `reader`, decoded lossily, without their terminator.
/// Ends after the first read error.
fn line_stream<R>(reader: R) -> BoxStream<'static, std::io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(Some(BufReader::new(reader)), |state| async move {
        let Some(mut reader) = state else {
            return None;
        };
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => None,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                Some((Ok(String::from_utf8_lossy(&buf).into_owned()), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

/// Write every line to the log as it arrives, echoing to stdout when asked.
/// Returns the number of lines written.
async fn drain_output(
    mut output: BoxStream<'static, std::io::Result<String>>,
    log: File,
    echo: bool,
) -> std::io::Result<u64> {
    let mut log = BufWriter::new(log);
    let mut console = echo.then(tokio::io::stdout);
    let mut lines = 0u64;

    while let Some(line) = output.next().await {
        let line = line?;
        log.write_all(line.as_bytes()).await?;
        log.write_all(b"\n").await?;
        log.flush().await?;

        if let Some(console) = console.as_mut() {
            console.write_all(line.as_bytes()).await?;
            console.write_all(b"\n").await?;
            console.flush().await?;
        }
        lines += 1;
    }

    log.flush().await?;
    log.into_inner().sync_all().await?;
    Ok(lines)
}

/// Append the failure marker line. Errors are logged, not returned: the
/// process failure is what the caller needs to see.
async fn append_failure_marker(log_path: &Path, detail: &str) {
    let result = async {
        let mut file = OpenOptions::new().append(true).open(log_path).await?;
        file.write_all(format!("{FAILURE_MARKER} {detail}\n").as_bytes())
            .await?;
        file.flush().await
    }
    .await;

    if let Err(e) = result {
        warn!(log = %log_path.display(), error = %e, "Could not append failure marker to log");
    }
}
