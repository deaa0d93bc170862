//! Typeset Compiler — LaTeX source in, durable PDF out.
//!
//! The engine's byte stream is the producer and the output file is the sink. The
//! outcome is decided by [`CompileLatch`] only after both the producer's error
//! channel and the sink have reported, and any producer error wins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::errors::PipelineError;
use crate::render::engine::{RenderRequest, RenderStream, TypesetEngine};

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDocument {
    pub output_path: PathBuf,
    pub debug_source_path: PathBuf,
    pub bytes_written: u64,
}

/// Final-state bookkeeping for one compile.
#[derive(Debug, Default)]
struct CompileLatch {
    error: Option<String>,
    producer_reported: bool,
    sink_finished: bool,
}

impl CompileLatch {
    fn record_error(&mut self, detail: String) {
        if self.error.is_none() {
            self.error = Some(detail);
        }
        self.producer_reported = true;
    }

    fn record_producer_clean(&mut self) {
        self.producer_reported = true;
    }

    fn record_finish(&mut self) {
        self.sink_finished = true;
    }

    fn settled(&self) -> bool {
        self.producer_reported && self.sink_finished
    }

    fn into_error(self) -> Option<String> {
        self.error
    }
}

#[derive(Clone)]
pub struct TypesetCompiler {
    engine: Arc<dyn TypesetEngine>,
    debug_dir: PathBuf,
}

impl TypesetCompiler {
    pub fn new(engine: Arc<dyn TypesetEngine>, debug_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            debug_dir: debug_dir.into(),
        }
    }

    /// Debug source location for a given output; kept after the run for inspection.
    pub fn debug_source_path(&self, output_path: &Path) -> PathBuf {
        self.debug_dir
            .join(format!("debug-{}.tex", file_stem(output_path)))
    }

    fn error_log_path(&self, output_path: &Path) -> PathBuf {
        self.debug_dir
            .join(format!("latex-error-{}.log", file_stem(output_path)))
    }

    pub async fn compile(
        &self,
        latex_source: &str,
        output_path: &Path,
    ) -> Result<CompiledDocument, PipelineError> {
        let debug_source_path = self.debug_source_path(output_path);
        tokio::fs::create_dir_all(&self.debug_dir)
            .await
            .map_err(|e| PipelineError::file_io(&self.debug_dir, e))?;
        tokio::fs::write(&debug_source_path, latex_source)
            .await
            .map_err(|e| PipelineError::file_io(&debug_source_path, e))?;
        info!(path = %debug_source_path.display(), "LaTeX source saved");

        // From here on every failure carries the debug source path.
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::output_io(parent, e, &debug_source_path))?;
        }
        let mut sink = tokio::fs::File::create(output_path)
            .await
            .map_err(|e| PipelineError::output_io(output_path, e, &debug_source_path))?;

        let bytes_written = self
            .render_into(latex_source, output_path, &debug_source_path, &mut sink)
            .await?;
        if let Err(e) = sink.sync_all().await {
            drop(sink);
            discard_partial(output_path).await;
            return Err(PipelineError::output_io(output_path, e, &debug_source_path));
        }

        info!(
            path = %output_path.display(),
            bytes_written, "PDF written"
        );

        Ok(CompiledDocument {
            output_path: output_path.to_path_buf(),
            debug_source_path,
            bytes_written,
        })
    }

    /// Streams the engine's output into `sink`. On any failure the file at
    /// `output_path` is removed before returning.
    async fn render_into<W>(
        &self,
        latex_source: &str,
        output_path: &Path,
        debug_source_path: &Path,
        sink: &mut W,
    ) -> Result<u64, PipelineError>
    where
        W: AsyncWrite + Unpin,
    {
        let stream = self.engine.start(RenderRequest {
            source: latex_source.to_string(),
            error_log_path: Some(self.error_log_path(output_path)),
        });

        let outcome = drain(stream, sink, debug_source_path).await;

        let failure = match outcome {
            Ok(0) => StreamFailure::Engine("typesetting engine produced no output".to_string()),
            Ok(bytes_written) => return Ok(bytes_written),
            Err(failure) => failure,
        };

        discard_partial(output_path).await;

        Err(match failure {
            StreamFailure::Engine(detail) => PipelineError::CompileFailure {
                detail,
                debug_source_path: debug_source_path.to_path_buf(),
            },
            StreamFailure::Sink(e) => PipelineError::output_io(output_path, e, debug_source_path),
        })
    }
}

async fn discard_partial(output_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(output_path).await {
        debug!(path = %output_path.display(), "Could not remove partial output: {e}");
    }
}

enum StreamFailure {
    Engine(String),
    Sink(std::io::Error),
}

async fn drain<W>(
    mut stream: RenderStream,
    sink: &mut W,
    debug_source_path: &Path,
) -> Result<u64, StreamFailure>
where
    W: AsyncWrite + Unpin,
{
    let mut latch = CompileLatch::default();
    let mut bytes_written: u64 = 0;

    while !latch.settled() {
        tokio::select! {
            signal = &mut stream.error, if !latch.producer_reported => match signal {
                Ok(detail) => {
                    warn!(path = %debug_source_path.display(), "Typesetting error: {detail}");
                    latch.record_error(detail);
                }
                Err(_) => latch.record_producer_clean(),
            },
            chunk = stream.chunks.recv(), if !latch.sink_finished => match chunk {
                Some(bytes) => {
                    sink.write_all(&bytes).await.map_err(StreamFailure::Sink)?;
                    bytes_written += bytes.len() as u64;
                }
                None => {
                    sink.flush().await.map_err(StreamFailure::Sink)?;
                    latch.record_finish();
                }
            },
        }
    }

    match latch.into_error() {
        Some(detail) => Err(StreamFailure::Engine(detail)),
        None => Ok(bytes_written),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}
