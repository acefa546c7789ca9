//! Builder for executing external tool commands with timeout support.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// How a streamed execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The cancellation token fired; the process was killed.
    Cancelled,
    /// The timeout elapsed; the process was killed.
    TimedOut,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use hf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> hf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("quiet")
///     .arg("-print_format").arg("json")
///     .arg("-show_format")
///     .arg("-show_streams")
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`hf_core::Error::Tool`] if the process times out (message
    ///   includes the timeout duration).
    /// - Returns [`hf_core::Error::Tool`] if the process exits with a non-zero
    ///   status (message includes stderr).
    /// - Returns [`hf_core::Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> hf_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| hf_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        // On timeout the wait future is dropped, and kill_on_drop reaps the child.
        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(hf_core::Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(hf_core::Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => Err(hf_core::Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Spawn the command and hand each stderr line to `on_line` as it arrives.
    ///
    /// Lines are split on both `\n` and `\r` (ffmpeg rewrites its stats line
    /// with carriage returns). Empty lines are skipped. Stdout is discarded.
    ///
    /// The child is killed when `cancel` fires or the timeout elapses; both
    /// cases are reported through [`StreamExit`], not as errors. A non-zero
    /// exit status is also not an error here; the caller inspects it.
    ///
    /// # Errors
    ///
    /// Returns [`hf_core::Error::Tool`] if the process cannot be spawned or its
    /// stderr cannot be read.
    pub async fn execute_streaming<F>(
        &self,
        mut on_line: F,
        cancel: &CancellationToken,
    ) -> hf_core::Result<StreamExit>
    where
        F: FnMut(&str),
    {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| hf_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| hf_core::Error::tool(&program_name, "stderr was not captured"))?;
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::with_capacity(256);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child).await;
                    return Ok(StreamExit::Cancelled);
                }
                _ = &mut deadline => {
                    terminate(&mut child).await;
                    return Ok(StreamExit::TimedOut);
                }
                read = read_segment(&mut reader, &mut buf) => {
                    match read {
                        Ok(true) => {
                            let line = String::from_utf8_lossy(&buf);
                            let line = line.trim();
                            if !line.is_empty() {
                                on_line(line);
                            }
                            buf.clear();
                        }
                        Ok(false) => break,
                        Err(e) => {
                            terminate(&mut child).await;
                            return Err(hf_core::Error::tool(
                                program_name,
                                format!("failed to read stderr: {e}"),
                            ));
                        }
                    }
                }
            }
        }

        // Stderr closed; wait for the exit status under the same guards.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                Ok(StreamExit::Cancelled)
            }
            _ = &mut deadline => {
                terminate(&mut child).await;
                Ok(StreamExit::TimedOut)
            }
            status = child.wait() => status.map(StreamExit::Exited).map_err(|e| {
                hf_core::Error::tool(program_name, format!("I/O error waiting for process: {e}"))
            }),
        }
    }
}

/// Kill the child and reap it so no orphan is left behind.
async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!("kill failed (process likely already exited): {e}");
    }
    let _ = child.wait().await;
}

/// Read bytes up to the next `\n` or `\r` into `buf` (delimiter excluded).
///
/// Returns `Ok(false)` at end of stream when nothing was read.
async fn read_segment<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(!buf.is_empty());
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n' || b == b'\r') {
            buf.extend_from_slice(&available[..pos]);
            reader.consume(pos + 1);
            return Ok(true);
        }
        let n = available.len();
        buf.extend_from_slice(available);
        reader.consume(n);
    }
}
