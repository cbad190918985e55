use crate::config::TrainingCommand;
use crate::errors::PipelineError;
use std::collections::VecDeque;
use std::future::Future;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Bytes of stderr kept for the failure report.
pub const STDERR_TAIL_BYTES: usize = 4096;

pub trait Trainer {
    /// Run training to completion.
    fn train(&self) -> impl Future<Output = Result<(), PipelineError>> + Send;
}

/// Runs the training job as a child process and waits for it to exit.
pub struct CommandTrainer {
    command: TrainingCommand,
}

impl CommandTrainer {
    pub fn new(command: TrainingCommand) -> Self {
        Self { command }
    }

    fn run_error(&self, source: std::io::Error) -> PipelineError {
        PipelineError::TrainingSpawn {
            command: self.command.to_string(),
            source,
        }
    }
}

impl Trainer for CommandTrainer {
    async fn train(&self) -> Result<(), PipelineError> {
        tracing::info!(command = %self.command, "Starting training");

        // stdout goes straight to the terminal, stderr is tee'd through us
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.run_error(e))?;

        let mut tail = Tail::new(STDERR_TAIL_BYTES);
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, &mut tail)
                .await
                .map_err(|e| self.run_error(e))?;
        }

        let status = child.wait().await.map_err(|e| self.run_error(e))?;
        let stderr = tail.into_string();

        if !status.success() {
            tracing::error!(code = ?status.code(), "Training command failed");
            return Err(PipelineError::TrainingFailed {
                code: status.code(),
                stderr,
            });
        }

        tracing::info!("Training completed");
        Ok(())
    }
}

/// Echo each line of `reader` to our stderr as it arrives, keeping only the
/// tail in memory. Returns at end of stream.
async fn forward_lines<R>(reader: R, tail: &mut Tail) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    // Split on raw bytes so a trainer printing invalid UTF-8 does not end the
    // stream early and leave the child blocked on a full pipe
    let mut lines = BufReader::new(reader).split(b'\n');
    while let Some(line) = lines.next_segment().await? {
        eprintln!("{}", String::from_utf8_lossy(&line));
        tail.push_line(&line);
    }
    Ok(())
}

/// Rolling window over the last `capacity` bytes written to it.
struct Tail {
    buf: VecDeque<u8>,
    capacity: usize,
}

impl Tail {
    fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push_line(&mut self, line: &[u8]) {
        self.buf.extend(line);
        self.buf.push_back(b'\n');
        let excess = self.buf.len().saturating_sub(self.capacity);
        self.buf.drain(..excess);
    }

    /// Tail as text, lossy where the cut landed inside a character.
    fn into_string(self) -> String {
        let bytes = Vec::from(self.buf);
        String::from_utf8_lossy(&bytes).trim_end().to_string()
    }
}
