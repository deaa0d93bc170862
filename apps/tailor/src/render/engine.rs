//! Typesetting engines — push-style producers of PDF bytes.
//!
//! An engine hands back two independent channels: the byte stream and an
//! out-of-band error signal. They are not ordered relative to each other. An error
//! may arrive after some or all bytes were pushed, or after the stream closed.
//! Dropping the error sender without sending means the producer finished cleanly.

use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 64 * 1024;
const CHUNK_QUEUE: usize = 16;
const LOG_TAIL_LINES: usize = 20;
const JOB_NAME: &str = "texput";

pub struct RenderRequest {
    pub source: String,
    /// Where to keep the engine's log if rendering fails.
    pub error_log_path: Option<PathBuf>,
}

pub struct RenderStream {
    pub chunks: mpsc::Receiver<Bytes>,
    pub error: oneshot::Receiver<String>,
}

pub trait TypesetEngine: Send + Sync {
    /// Starts rendering in the background and returns immediately.
    fn start(&self, request: RenderRequest) -> RenderStream;
}

/// Runs a pdflatex-compatible program in a scratch directory.
pub struct PdfLatexEngine {
    program: String,
    passes: u32,
}

impl PdfLatexEngine {
    pub fn new(program: impl Into<String>, passes: u32) -> Self {
        Self {
            program: program.into(),
            passes: passes.max(1),
        }
    }
}

impl TypesetEngine for PdfLatexEngine {
    fn start(&self, request: RenderRequest) -> RenderStream {
        let (chunk_tx, chunks) = mpsc::channel(CHUNK_QUEUE);
        let (error_tx, error) = oneshot::channel();
        let program = self.program.clone();
        let passes = self.passes;

        tokio::spawn(async move {
            if let Err(detail) = run(&program, passes, request, chunk_tx).await {
                warn!(program, "Typesetting failed: {detail}");
                let _ = error_tx.send(detail);
            }
        });

        RenderStream { chunks, error }
    }
}

async fn run(
    program: &str,
    passes: u32,
    request: RenderRequest,
    chunk_tx: mpsc::Sender<Bytes>,
) -> Result<(), String> {
    let scratch =
        tempfile::tempdir().map_err(|e| format!("cannot create scratch directory: {e}"))?;
    let tex_path = scratch.path().join(format!("{JOB_NAME}.tex"));
    tokio::fs::write(&tex_path, &request.source)
        .await
        .map_err(|e| format!("cannot write engine input: {e}"))?;

    for pass in 1..=passes {
        debug!(program, pass, "Running typesetting pass");
        let output = Command::new(program)
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg("-output-directory")
            .arg(scratch.path())
            .arg(&tex_path)
            .current_dir(scratch.path())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to run {program}: {e}"))?;

        if !output.status.success() {
            let log_file = scratch.path().join(format!("{JOB_NAME}.log"));
            let log = match tokio::fs::read_to_string(&log_file).await {
                Ok(log) => log,
                Err(_) => String::from_utf8_lossy(&output.stdout).into_owned(),
            };
            if let Some(log_path) = &request.error_log_path {
                if let Err(e) = tokio::fs::write(log_path, &log).await {
                    warn!(path = %log_path.display(), "Could not keep engine log: {e}");
                }
            }
            return Err(summarize_log(&log));
        }
    }

    stream_file(&scratch.path().join(format!("{JOB_NAME}.pdf")), &chunk_tx).await
}

async fn stream_file(path: &Path, chunk_tx: &mpsc::Sender<Bytes>) -> Result<(), String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| format!("engine produced no PDF: {e}"))?;

    loop {
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        let read = file
            .read_buf(&mut buf)
            .await
            .map_err(|e| format!("failed reading engine output: {e}"))?;
        if read == 0 {
            return Ok(());
        }
        if chunk_tx.send(buf.freeze()).await.is_err() {
            debug!("Output sink closed before the stream ended");
            return Ok(());
        }
    }
}

/// The `!` error lines of a TeX log with the line after each, or the log tail if there are none.
pub fn summarize_log(log: &str) -> String {
    let lines: Vec<&str> = log.lines().collect();
    let mut picked = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with('!') {
            picked.push(*line);
            if let Some(next) = lines.get(i + 1) {
                if !next.trim().is_empty() && !next.starts_with('!') {
                    picked.push(*next);
                }
            }
        }
    }

    if picked.is_empty() {
        let start = lines.len().saturating_sub(LOG_TAIL_LINES);
        picked = lines[start..].to_vec();
    }

    let summary = picked.join("\n").trim().to_string();
    if summary.is_empty() {
        "typesetting engine exited with an error".to_string()
    } else {
        summary
    }
}
