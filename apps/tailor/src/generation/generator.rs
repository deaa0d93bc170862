//! Document Generation — orchestrates the full synthesis pipeline.
//!
//! Flow: validate input → build prompts → generate LaTeX → compile to PDF →
//!       append document record → (résumé only) spawn keyword extraction.
//!
//! Every transition is published on the `status` topic. A failure at any stage ends
//! the run and is returned to the caller as a value. Keyword extraction runs after
//! the result is decided and can never turn a success into a failure.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::{ErrorKind, PipelineError};
use crate::events::{EventBus, Stage, StatusEvent};
use crate::generation::keywords::KeywordExtractor;
use crate::generation::prompt_builder;
use crate::llm_client::GenerationClient;
use crate::models::{DocumentKind, DocumentRecord, Template};
use crate::render::TypesetCompiler;
use crate::store::{self, DocumentStore, SettingsStore, DEFAULT_MODEL_ID};

const DEFAULT_COMPANY: &str = "Generated";
const DEFAULT_POSITION: &str = "Position";

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Inbound generation request. Both templates may be sent; `kind` picks one.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub job_description: String,
    #[serde(default)]
    pub resume_template: Option<Template>,
    #[serde(default)]
    pub cover_letter_template: Option<Template>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl GenerateRequest {
    fn template(&self) -> Option<&Template> {
        match self.kind {
            DocumentKind::Resume => self.resume_template.as_ref(),
            DocumentKind::CoverLetter => self.cover_letter_template.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDocument {
    pub record: DocumentRecord,
    pub output_path: PathBuf,
    pub debug_source_path: PathBuf,
}

/// Everything a finished run leaves behind.
pub struct PipelineRun {
    pub request_id: Uuid,
    pub result: Result<GeneratedDocument, PipelineError>,
    /// Detached keyword extraction, present only for successful résumé runs.
    pub keywords_task: Option<JoinHandle<()>>,
}

/// Structured reply the requester always receives.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_source_path: Option<String>,
}

impl From<&Result<GeneratedDocument, PipelineError>> for GenerateResponse {
    fn from(result: &Result<GeneratedDocument, PipelineError>) -> Self {
        match result {
            Ok(doc) => Self {
                success: true,
                request_id: None,
                file_path: Some(doc.output_path.display().to_string()),
                error: None,
                error_kind: None,
                debug_source_path: None,
            },
            Err(e) => Self {
                success: false,
                request_id: None,
                file_path: None,
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
                debug_source_path: e.debug_source_path().map(|p| p.display().to_string()),
            },
        }
    }
}

impl From<&PipelineRun> for GenerateResponse {
    fn from(run: &PipelineRun) -> Self {
        Self {
            request_id: Some(run.request_id),
            ..Self::from(&run.result)
        }
    }
}

struct Credentials {
    api_key: String,
    model_id: String,
}

/// Collaborators the pipeline is assembled from.
pub struct PipelineParts {
    pub client: GenerationClient,
    pub compiler: TypesetCompiler,
    pub documents: DocumentStore,
    pub settings: Arc<dyn SettingsStore>,
    pub events: EventBus,
    pub clock: Arc<dyn Clock>,
    pub output_dir: PathBuf,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

pub struct Pipeline {
    client: GenerationClient,
    keywords: KeywordExtractor,
    compiler: TypesetCompiler,
    documents: DocumentStore,
    settings: Arc<dyn SettingsStore>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    output_dir: PathBuf,
    // One in-flight run per kind; later requests of the same kind queue here.
    resume_turn: Mutex<()>,
    cover_letter_turn: Mutex<()>,
    keyword_order: Arc<KeywordOrder>,
}

/// Orders detached keyword writes by the run that spawned them. A result from an
/// older run never replaces one already stored by a newer run.
#[derive(Default)]
struct KeywordOrder {
    issued: AtomicU64,
    applied: Mutex<u64>,
}

impl KeywordOrder {
    fn next_ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Pipeline {
    pub fn new(parts: PipelineParts) -> Self {
        let PipelineParts {
            client,
            compiler,
            documents,
            settings,
            events,
            clock,
            output_dir,
        } = parts;

        Self {
            keywords: KeywordExtractor::new(client.clone()),
            client,
            compiler,
            documents,
            settings,
            events,
            clock,
            output_dir,
            resume_turn: Mutex::new(()),
            cover_letter_turn: Mutex::new(()),
            keyword_order: Arc::new(KeywordOrder::default()),
        }
    }

    /// Runs one generation to completion or failure.
    pub async fn run(&self, request: GenerateRequest) -> PipelineRun {
        let request_id = Uuid::new_v4();
        let status = StatusReporter {
            events: &self.events,
            request_id,
            kind: request.kind,
        };

        let _turn = match request.kind {
            DocumentKind::Resume => self.resume_turn.lock().await,
            DocumentKind::CoverLetter => self.cover_letter_turn.lock().await,
        };

        match self.execute(&request, &status).await {
            Ok((document, credentials)) => {
                let keywords_task = (request.kind == DocumentKind::Resume).then(|| {
                    status.report(Stage::ExtractingKeywords, "Extracting keywords");
                    self.spawn_keyword_extraction(request.job_description.clone(), credentials)
                });

                let file_path = document.output_path.display().to_string();
                info!(%request_id, kind = ?request.kind, file_path, "Generation complete");
                status.report(Stage::Done, file_path);

                PipelineRun {
                    request_id,
                    result: Ok(document),
                    keywords_task,
                }
            }
            Err(e) => {
                warn!(%request_id, kind = ?request.kind, error_kind = ?e.kind(), "Generation failed: {e}");
                status.fail(&e);
                PipelineRun {
                    request_id,
                    result: Err(e),
                    keywords_task: None,
                }
            }
        }
    }

    async fn execute(
        &self,
        request: &GenerateRequest,
        status: &StatusReporter<'_>,
    ) -> Result<(GeneratedDocument, Credentials), PipelineError> {
        // Step 1: validate and build prompts
        status.report(Stage::ValidatingInput, "Validating input");
        let template = request.template().ok_or_else(|| {
            PipelineError::MissingInput(format!("No {} template selected.", request.kind.label()))
        })?;
        let prompts = prompt_builder::build(template, &request.job_description, request.kind)?;

        // Step 2: remote generation
        status.report(Stage::AwaitingGeneration, "Generating tailored LaTeX");
        let credentials = self.credentials().await?;
        let latex = self
            .client
            .generate(
                &prompts.prompt,
                &prompts.system_prompt,
                &credentials.model_id,
                &credentials.api_key,
            )
            .await?;

        // The budget is requested, not enforced.
        let generated_len = latex.chars().count();
        if generated_len > prompts.char_limit {
            warn!(
                generated_len,
                char_limit = prompts.char_limit,
                "Generated LaTeX exceeds the template's character budget"
            );
        }

        // Step 3: compile
        status.report(Stage::Compiling, "Compiling PDF");
        let id = Uuid::new_v4();
        let output_path = self
            .output_dir
            .join(output_file_name(request.kind, self.clock.now(), id));
        let compiled = self.compiler.compile(&latex, &output_path).await?;

        // Step 4: persist
        status.report(Stage::Persisting, "Recording document");
        let record = DocumentRecord {
            id,
            kind: request.kind,
            company: non_empty_or(&request.company, DEFAULT_COMPANY),
            position: non_empty_or(&request.position, DEFAULT_POSITION),
            source_path: compiled.debug_source_path.display().to_string(),
            output_path: compiled.output_path.display().to_string(),
            created_at: self.clock.now(),
        };
        self.documents
            .append(record.clone())
            .await
            .map_err(|e| PipelineError::PersistFailure(e.to_string()))?;

        Ok((
            GeneratedDocument {
                record,
                output_path: compiled.output_path,
                debug_source_path: compiled.debug_source_path,
            },
            credentials,
        ))
    }

    /// Passthrough for callers that build their own prompts. The reply is returned
    /// untouched, fences included.
    pub async fn generate_raw(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> Result<String, PipelineError> {
        let credentials = self.credentials().await?;
        self.client
            .generate_raw(
                prompt,
                system_prompt,
                &credentials.model_id,
                &credentials.api_key,
            )
            .await
    }

    async fn credentials(&self) -> Result<Credentials, PipelineError> {
        let settings = self.settings.as_ref();
        let api_key = store::get_string(settings, store::API_KEY)
            .await
            .map_err(|e| PipelineError::SettingsUnavailable(e.to_string()))?;
        let model_id = store::get_string(settings, store::MODEL_ID)
            .await
            .map_err(|e| PipelineError::SettingsUnavailable(e.to_string()))?;
        let model_id = if model_id.is_empty() {
            DEFAULT_MODEL_ID.to_string()
        } else {
            model_id
        };
        Ok(Credentials { api_key, model_id })
    }

    /// Best-effort. Its failures are logged here and never reach the requester.
    fn spawn_keyword_extraction(
        &self,
        job_description: String,
        credentials: Credentials,
    ) -> JoinHandle<()> {
        let extractor = self.keywords.clone();
        let settings = self.settings.clone();
        let events = self.events.clone();
        let order = self.keyword_order.clone();
        // Issued while the résumé turn is held, so tickets follow run order.
        let ticket = order.next_ticket();

        tokio::spawn(async move {
            let keywords = match extractor
                .extract(&job_description, &credentials.model_id, &credentials.api_key)
                .await
            {
                Ok(keywords) => keywords,
                Err(e) => {
                    warn!("Keyword extraction failed: {e}");
                    return;
                }
            };
            if keywords.is_empty() {
                warn!("Keyword extraction returned no keywords; keeping the previous list");
                return;
            }

            let mut applied = order.applied.lock().await;
            if *applied > ticket {
                debug!(ticket, newer = *applied, "Dropping keywords from an older run");
                return;
            }
            if let Err(e) = settings.set(store::LAST_KEYWORDS, json!(keywords)).await {
                warn!("Could not store keywords: {e}");
            }
            *applied = ticket;
            info!(count = keywords.len(), "Keywords updated");
            events.publish_keywords(keywords);
        })
    }
}

struct StatusReporter<'a> {
    events: &'a EventBus,
    request_id: Uuid,
    kind: DocumentKind,
}

impl StatusReporter<'_> {
    fn report(&self, stage: Stage, message: impl Into<String>) {
        self.events.publish_status(StatusEvent {
            request_id: self.request_id,
            kind: self.kind,
            stage,
            message: message.into(),
            error_kind: None,
        });
    }

    fn fail(&self, error: &PipelineError) {
        self.events.publish_status(StatusEvent {
            request_id: self.request_id,
            kind: self.kind,
            stage: Stage::Failed,
            message: error.to_string(),
            error_kind: Some(error.kind()),
        });
    }
}

/// `<kind>-<unix millis>-<id prefix>.pdf`; the id prefix keeps same-millisecond runs apart.
fn output_file_name(kind: DocumentKind, stamp: DateTime<Utc>, id: Uuid) -> String {
    let id = id.simple().to_string();
    format!("{}-{}-{}.pdf", kind.slug(), stamp.timestamp_millis(), &id[..8])
}

fn non_empty_or(value: &Option<String>, fallback: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
