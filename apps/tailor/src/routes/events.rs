use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::events::Topic;
use crate::state::AppState;

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

/// GET /api/v1/events/:topic
///
/// Server-sent events for one topic. Subscribers see only events published after
/// they connect.
pub async fn handle_events(
    State(state): State<AppState>,
    Path(topic): Path<Topic>,
) -> Sse<EventStream> {
    debug!(?topic, "Event subscriber connected");
    let stream = match topic {
        Topic::Status => forward(state.events.subscribe_status(), "status"),
        Topic::Keywords => forward(state.events.subscribe_keywords(), "keywords"),
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn forward<T>(rx: broadcast::Receiver<T>, name: &'static str) -> EventStream
where
    T: Serialize + Clone + Send + 'static,
{
    stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(payload) => match Event::default().event(name).json_data(&payload) {
                    Ok(event) => return Some((Ok(event), rx)),
                    Err(e) => warn!(topic = name, "Dropping unserializable event: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = name, skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
