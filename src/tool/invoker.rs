//! Subprocess execution of the extraction tool.
//!
//! [`ExternalToolInvoker`] spawns the resolved binary, drains stdout and stderr
//! concurrently into bounded buffers, and races process exit against a timer.
//! The deadline covers process exit and pipe draining. When the timer wins the
//! child's whole process group is killed and the child reaped before the call
//! returns.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::error::ToolError;
use super::locator::{BinaryLocator, ResolvedBinary};
use super::{InvokeOptions, ToolRunner};

/// Maximum stderr bytes retained for error reporting.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Read chunk size for pipe draining.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Timeout for the diagnostic version query.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the extraction tool as a child process.
#[derive(Debug, Default)]
pub struct ExternalToolInvoker {
    locator: BinaryLocator,
}

impl ExternalToolInvoker {
    /// Creates an invoker that resolves its binary through `locator`.
    #[must_use]
    pub fn new(locator: BinaryLocator) -> Self {
        Self { locator }
    }

    /// Resolves the executable this invoker will spawn.
    #[must_use]
    pub fn resolve_binary_path(&self) -> ResolvedBinary {
        self.locator.resolve()
    }

    /// Spawns the tool with `args`, returning its stdout as text.
    ///
    /// # Errors
    ///
    /// - [`ToolError::BinaryNotFound`] if the executable cannot be found
    /// - [`ToolError::Timeout`] if the process outlives `options.timeout` (it is killed)
    /// - [`ToolError::ProcessExecution`] on non-zero exit, carrying stderr
    #[instrument(skip(self, options), fields(arg_count = args.len(), timeout_ms = options.timeout.as_millis()))]
    pub async fn invoke(&self, args: &[String], options: &InvokeOptions) -> Result<String, ToolError> {
        let binary = self.resolve_binary_path();

        let mut command = Command::new(&binary.path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down helpers the tool forks.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ToolError::BinaryNotFound {
                    path: binary.path.clone(),
                }
            } else {
                ToolError::Spawn {
                    path: binary.path.clone(),
                    source,
                }
            }
        })?;
        let pid = child.id();

        let stdout = child.stdout.take().ok_or_else(|| {
            ToolError::Io(std::io::Error::other("child stdout was not captured"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            ToolError::Io(std::io::Error::other("child stderr was not captured"))
        })?;

        let mut stdout_task = tokio::spawn(read_bounded(stdout, options.max_output_bytes));
        let mut stderr_task = tokio::spawn(read_bounded(stderr, MAX_STDERR_BYTES));

        // The deadline covers exit and draining both pipes: a descendant still
        // holding a pipe open counts against it too.
        let finished = tokio::time::timeout(options.timeout, async {
            let status = child.wait().await.map_err(ToolError::Io)?;
            let stdout = join_reader(&mut stdout_task).await?;
            let stderr = join_reader(&mut stderr_task).await?;
            Ok::<_, ToolError>((status, stdout, stderr))
        })
        .await;

        let (status, (stdout_bytes, stdout_truncated), (stderr_bytes, _)) = match finished {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    timeout_ms = options.timeout.as_millis(),
                    "extraction tool timed out, killing process group"
                );
                kill_process_tree(&mut child, pid).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(ToolError::Timeout {
                    timeout: options.timeout,
                });
            }
        };

        if stdout_truncated {
            warn!(
                max_output_bytes = options.max_output_bytes,
                "extraction tool output exceeded limit, truncated"
            );
        }

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();
            debug!(code = ?status.code(), "extraction tool exited unsuccessfully");
            return Err(ToolError::process_execution(status.code(), stderr));
        }

        debug!(stdout_bytes = stdout_bytes.len(), "extraction tool completed");
        Ok(String::from_utf8_lossy(&stdout_bytes).into_owned())
    }

    /// Queries the tool version, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`ToolError`]; callers that only need an
    /// availability check should use [`Self::is_available`].
    pub async fn version(&self) -> Result<String, ToolError> {
        let options = InvokeOptions::new(VERSION_TIMEOUT);
        let output = self.invoke(&["--version".to_string()], &options).await?;
        Ok(output.trim().to_string())
    }

    /// Returns whether the tool can be launched at all.
    pub async fn is_available(&self) -> bool {
        match self.version().await {
            Ok(version) => {
                debug!(version = %version, "extraction tool available");
                true
            }
            Err(error) => {
                debug!(error = %error, "extraction tool unavailable");
                false
            }
        }
    }
}

#[async_trait]
impl ToolRunner for ExternalToolInvoker {
    async fn run(&self, args: &[String], options: &InvokeOptions) -> Result<String, ToolError> {
        self.invoke(args, options).await
    }
}

/// Reads `reader` to EOF, keeping at most `limit` bytes.
///
/// Keeps draining past the limit so the child never blocks on a full pipe.
async fn read_bounded<R>(mut reader: R, limit: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    let mut truncated = false;

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        let room = limit.saturating_sub(buffer.len());
        if read > room {
            buffer.extend_from_slice(&chunk[..room]);
            truncated = true;
        } else {
            buffer.extend_from_slice(&chunk[..read]);
        }
    }

    Ok((buffer, truncated))
}

/// Kills the tool and everything in its process group, then reaps it.
async fn kill_process_tree(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) {
            // SAFETY: killpg only sends a signal; `pgid` is the group created
            // at spawn with the child as leader.
            let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if result != 0 {
                debug!(
                    pgid,
                    error = %std::io::Error::last_os_error(),
                    "process group already gone"
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(error) = child.kill().await {
        debug!(error = %error, "extraction tool already exited");
    }
}

async fn join_reader(
    task: &mut JoinHandle<std::io::Result<(Vec<u8>, bool)>>,
) -> Result<(Vec<u8>, bool), ToolError> {
    task.await
        .map_err(|error| ToolError::Io(std::io::Error::other(error)))?
        .map_err(ToolError::Io)
}
