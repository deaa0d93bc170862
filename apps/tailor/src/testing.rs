//! Test doubles shared by unit tests across the crate.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot, Notify};

use crate::clock::Clock;
use crate::errors::PipelineError;
use crate::events::EventBus;
use crate::generation::generator::{GenerateRequest, Pipeline, PipelineParts};
use crate::llm_client::{
    GenerateContentRequest, GenerationClient, GenerationTransport, TransportResponse,
};
use crate::models::{DocumentKind, Template};
use crate::render::engine::{RenderRequest, RenderStream, TypesetEngine};
use crate::render::TypesetCompiler;
use crate::state::AppState;
use crate::store::{self, DocumentStore, MemoryStore, SettingsStore, StoreError};

pub const TEMPLATE: &str =
    "\\documentclass{article}\n\\begin{document}\nJane Doe, Rust engineer\n\\end{document}\n";

// ────────────────────────────────────────────────────────────────────────────
// Generation transport
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model_id: String,
    pub api_key: String,
    pub body: GenerateContentRequest,
}

/// Replays queued responses in order and records every call.
pub struct StubTransport {
    responses: Mutex<VecDeque<Result<TransportResponse, PipelineError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    holds: Mutex<HashMap<usize, Arc<Notify>>>,
}

impl StubTransport {
    pub fn new(responses: Vec<Result<TransportResponse, PipelineError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            holds: Mutex::new(HashMap::new()),
        }
    }

    /// Call number `index` (zero-based) takes its response on arrival but only
    /// returns it once the handle is notified.
    pub fn hold_call(&self, index: usize) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.holds.lock().unwrap().insert(index, release.clone());
        release
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationTransport for StubTransport {
    async fn post(
        &self,
        model_id: &str,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<TransportResponse, PipelineError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(RecordedRequest {
                model_id: model_id.to_string(),
                api_key: api_key.to_string(),
                body: request.clone(),
            });
            requests.len() - 1
        };
        let next = self.responses.lock().unwrap().pop_front();
        let hold = self.holds.lock().unwrap().remove(&index);
        if let Some(release) = hold {
            release.notified().await;
        }
        next.unwrap_or_else(|| gemini_error(500, "no stubbed response left"))
    }
}

pub fn gemini_ok(text: &str) -> Result<TransportResponse, PipelineError> {
    Ok(TransportResponse {
        status: 200,
        body: json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
        })
        .to_string(),
    })
}

pub fn gemini_error(status: u16, message: &str) -> Result<TransportResponse, PipelineError> {
    Ok(TransportResponse {
        status,
        body: json!({"error": {"code": status, "message": message}}).to_string(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Typesetting engine
// ────────────────────────────────────────────────────────────────────────────

/// When the stub signals an error relative to closing its byte stream.
#[derive(Debug, Clone)]
pub enum ErrorTiming {
    Never,
    BeforeFinish(String),
    AfterFinish(String),
}

pub struct StubEngine {
    chunks: Vec<Bytes>,
    timing: ErrorTiming,
    sources: Mutex<Vec<String>>,
}

impl StubEngine {
    pub fn new(chunks: Vec<Bytes>, timing: ErrorTiming) -> Self {
        Self {
            chunks,
            timing,
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Sources of every render that was started.
    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().unwrap().clone()
    }
}

impl TypesetEngine for StubEngine {
    fn start(&self, request: RenderRequest) -> RenderStream {
        self.sources.lock().unwrap().push(request.source);

        let (chunk_tx, chunks) = mpsc::channel(self.chunks.len().max(1));
        let (error_tx, error) = oneshot::channel();
        let payload = self.chunks.clone();
        let timing = self.timing.clone();

        tokio::spawn(async move {
            let mut error_tx = Some(error_tx);
            if let ErrorTiming::BeforeFinish(detail) = &timing {
                if let Some(tx) = error_tx.take() {
                    let _ = tx.send(detail.clone());
                }
            }
            for chunk in payload {
                if chunk_tx.send(chunk).await.is_err() {
                    break;
                }
            }
            drop(chunk_tx);
            if let ErrorTiming::AfterFinish(detail) = &timing {
                for _ in 0..3 {
                    tokio::task::yield_now().await;
                }
                if let Some(tx) = error_tx.take() {
                    let _ = tx.send(detail.clone());
                }
            }
        });

        RenderStream { chunks, error }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Settings stores
// ────────────────────────────────────────────────────────────────────────────

/// Yields between reading and returning, so unsynchronized read-modify-write
/// sequences interleave.
pub struct YieldingStore {
    inner: MemoryStore,
}

impl YieldingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::with_defaults(),
        }
    }
}

#[async_trait]
impl SettingsStore for YieldingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let value = self.inner.get(key).await?;
        tokio::task::yield_now().await;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.set(key, value).await
    }
}

/// Refuses to write the document list; every other key works.
pub struct FailingStore {
    inner: MemoryStore,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::with_defaults(),
        }
    }
}

#[async_trait]
impl SettingsStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        if key == store::DOCUMENTS {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only settings file",
            )));
        }
        self.inner.set(key, value).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Clock
// ────────────────────────────────────────────────────────────────────────────

pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Requests and a wired-up pipeline
// ────────────────────────────────────────────────────────────────────────────

fn template(name: &str) -> Template {
    Template {
        name: name.to_string(),
        content: TEMPLATE.to_string(),
    }
}

pub fn resume_request(job_description: &str) -> GenerateRequest {
    GenerateRequest {
        kind: DocumentKind::Resume,
        job_description: job_description.to_string(),
        resume_template: Some(template("resume.tex")),
        cover_letter_template: None,
        company: None,
        position: None,
    }
}

pub fn cover_letter_request(job_description: &str) -> GenerateRequest {
    GenerateRequest {
        kind: DocumentKind::CoverLetter,
        job_description: job_description.to_string(),
        resume_template: None,
        cover_letter_template: Some(template("cover-letter.tex")),
        company: None,
        position: None,
    }
}

/// Every collaborator of a [`Pipeline`] replaced by a double, rooted in a temp dir.
pub struct Harness {
    pub dir: TempDir,
    pub transport: Arc<StubTransport>,
    pub engine: Arc<StubEngine>,
    pub settings: Arc<dyn SettingsStore>,
    pub documents: DocumentStore,
    pub events: EventBus,
    pub compiler: TypesetCompiler,
    pub pipeline: Arc<Pipeline>,
}

impl Harness {
    pub async fn new(
        responses: Vec<Result<TransportResponse, PipelineError>>,
        engine: StubEngine,
    ) -> Self {
        Self::with_api_key("test-key", responses, engine).await
    }

    pub async fn with_api_key(
        api_key: &str,
        responses: Vec<Result<TransportResponse, PipelineError>>,
        engine: StubEngine,
    ) -> Self {
        let settings: Arc<dyn SettingsStore> = Arc::new(MemoryStore::with_defaults());
        settings.set(store::API_KEY, json!(api_key)).await.unwrap();
        Self::build(settings, responses, engine)
    }

    pub async fn with_store(
        settings: Arc<dyn SettingsStore>,
        responses: Vec<Result<TransportResponse, PipelineError>>,
        engine: StubEngine,
    ) -> Self {
        settings.set(store::API_KEY, json!("test-key")).await.unwrap();
        Self::build(settings, responses, engine)
    }

    fn build(
        settings: Arc<dyn SettingsStore>,
        responses: Vec<Result<TransportResponse, PipelineError>>,
        engine: StubEngine,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(StubTransport::new(responses));
        let engine = Arc::new(engine);
        let client = GenerationClient::new(transport.clone());
        let compiler = TypesetCompiler::new(engine.clone(), dir.path().join("debug"));
        let documents = DocumentStore::new(settings.clone());
        let events = EventBus::new();

        let pipeline = Arc::new(Pipeline::new(PipelineParts {
            client,
            compiler: compiler.clone(),
            documents: documents.clone(),
            settings: settings.clone(),
            events: events.clone(),
            clock: Arc::new(FixedClock::default()),
            output_dir: dir.path().join("documents"),
        }));

        Self {
            dir,
            transport,
            engine,
            settings,
            documents,
            events,
            compiler,
            pipeline,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("documents")
    }

    pub fn state(&self) -> AppState {
        AppState {
            pipeline: self.pipeline.clone(),
            compiler: self.compiler.clone(),
            documents: self.documents.clone(),
            settings: self.settings.clone(),
            events: self.events.clone(),
        }
    }
}
