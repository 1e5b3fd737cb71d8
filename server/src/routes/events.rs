//! `GET /upload/events`: server-sent stream of job progress events.
//!
//! Each accepted state transition is sent as one `job-progress` event whose
//! data is the JSON `JobProgressEvent`. Pass `?job_id=` to follow one job.
//! Slow subscribers skip the events they missed; the status endpoint always
//! has the current record.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use graphload::broadcast::JobProgressEvent;
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::state::AppState;

const EVENT_NAME: &str = "job-progress";

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub job_id: Option<String>,
}

impl EventsQuery {
    fn matches(&self, event: &JobProgressEvent) -> bool {
        self.job_id.as_deref().map_or(true, |id| id == event.job_id)
    }
}

pub async fn events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.service.subscribe()).filter_map(move |item| {
        match item {
            Ok(event) if query.matches(&event) => Some(Ok(to_sse_event(&event))),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "SSE subscriber lagged, events were skipped");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default().interval(Duration::from_secs(15)))
}

fn to_sse_event(event: &JobProgressEvent) -> Event {
    Event::default()
        .event(EVENT_NAME)
        .id(format!("{}:{}", event.job_id, event.timestamp.timestamp_micros()))
        .json_data(event)
        .unwrap_or_else(|_| Event::default().comment("serialization error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphload::broadcast::JobUpdate;

    #[test]
    fn test_job_filter() {
        let event = JobProgressEvent::new("job-1", JobUpdate::AnalysisStarted);
        assert!(EventsQuery::default().matches(&event));
        assert!(EventsQuery {
            job_id: Some("job-1".to_string())
        }
        .matches(&event));
        assert!(!EventsQuery {
            job_id: Some("job-2".to_string())
        }
        .matches(&event));
    }
}
