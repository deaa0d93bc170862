//! Topic-keyed publish/subscribe for pipeline observers.
//!
//! Publishing never blocks and never fails: with no subscribers the event is dropped.
//! Slow subscribers lag and lose the oldest events rather than stalling the pipeline.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::errors::ErrorKind;
use crate::models::DocumentKind;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Status,
    Keywords,
}

/// Pipeline stage a status event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ValidatingInput,
    AwaitingGeneration,
    Compiling,
    Persisting,
    ExtractingKeywords,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub request_id: Uuid,
    pub kind: DocumentKind,
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordsEvent {
    pub keywords: Vec<String>,
}

#[derive(Clone)]
pub struct EventBus {
    status: broadcast::Sender<StatusEvent>,
    keywords: broadcast::Sender<KeywordsEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (status, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (keywords, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { status, keywords }
    }

    pub fn publish_status(&self, event: StatusEvent) {
        let delivered = self.status.send(event).unwrap_or(0);
        trace!(delivered, "Status event published");
    }

    pub fn publish_keywords(&self, keywords: Vec<String>) {
        let delivered = self.keywords.send(KeywordsEvent { keywords }).unwrap_or(0);
        trace!(delivered, "Keywords event published");
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }

    pub fn subscribe_keywords(&self) -> broadcast::Receiver<KeywordsEvent> {
        self.keywords.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(stage: Stage) -> StatusEvent {
        StatusEvent {
            request_id: Uuid::new_v4(),
            kind: DocumentKind::Resume,
            stage,
            message: String::new(),
            error_kind: None,
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish_status(status(Stage::Done));
        bus.publish_keywords(vec!["Rust".to_string()]);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let bus = EventBus::new();
        let mut first = bus.subscribe_keywords();
        let mut second = bus.subscribe_keywords();

        bus.publish_keywords(vec!["Go".to_string(), "SQL".to_string()]);

        assert_eq!(first.recv().await.unwrap().keywords, vec!["Go", "SQL"]);
        assert_eq!(second.recv().await.unwrap().keywords, vec!["Go", "SQL"]);
    }

    #[tokio::test]
    async fn test_topics_are_independent() {
        let bus = EventBus::new();
        let mut keywords = bus.subscribe_keywords();

        bus.publish_status(status(Stage::Compiling));

        assert!(matches!(
            keywords.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn test_status_event_serialization() {
        let mut event = status(Stage::ExtractingKeywords);
        event.error_kind = Some(ErrorKind::CompileFailure);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["stage"], "extracting_keywords");
        assert_eq!(value["kind"], "resume");
        assert_eq!(value["errorKind"], "CompileFailure");
        assert!(value.get("requestId").is_some());
    }
}
