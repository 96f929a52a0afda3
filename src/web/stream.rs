//! Server-sent progress stream for one download session.
//!
//! The stream sends the current record right away, then one event per record
//! replacement, and ends after a terminal record. Delivering the terminal
//! record retires the session.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream, StreamExt};
use std::time::Duration;
use tokio::sync::watch;

use crate::download::progress::{ProgressRecord, ProgressStatus};
use crate::storage::sessions::SessionStore;
use crate::web::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

enum Cursor {
    Unknown,
    First(watch::Receiver<ProgressRecord>),
    Live(watch::Receiver<ProgressRecord>),
    Done,
}

struct Subscription {
    session_id: String,
    sessions: SessionStore,
    idle_timeout: Duration,
    cursor: Cursor,
}

impl Subscription {
    async fn next_record(mut self) -> Option<(ProgressRecord, Self)> {
        let record = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => return None,
            Cursor::Unknown => {
                log::info!("Progress requested for unknown session {}", self.session_id);
                return Some((ProgressRecord::failed("Unknown or expired session"), self));
            }
            Cursor::First(mut rx) => {
                let record = rx.borrow_and_update().clone();
                self.cursor = Cursor::Live(rx);
                record
            }
            Cursor::Live(mut rx) => {
                // A `starting` session is waiting for a transfer slot and may
                // stay silent for as long as the downloads ahead of it run.
                let queued = rx.borrow().status == ProgressStatus::Starting;
                let changed = if queued {
                    Ok(rx.changed().await)
                } else {
                    tokio::time::timeout(self.idle_timeout, rx.changed()).await
                };
                match changed {
                    Ok(Ok(())) => {
                        let record = rx.borrow_and_update().clone();
                        self.cursor = Cursor::Live(rx);
                        record
                    }
                    Ok(Err(_)) => {
                        log::warn!("Session {} disappeared while streaming", self.session_id);
                        return Some((ProgressRecord::failed("Download session was closed"), self));
                    }
                    Err(_) => {
                        log::warn!(
                            "Session {} sent no progress for {:?}, closing stream",
                            self.session_id,
                            self.idle_timeout
                        );
                        return Some((ProgressRecord::failed("Timed out waiting for progress"), self));
                    }
                }
            }
        };

        if record.is_terminal() {
            self.cursor = Cursor::Done;
            self.sessions.delete(&self.session_id);
            log::debug!("Session {} delivered its final record", self.session_id);
        }
        Some((record, self))
    }
}

/// Records a subscriber to `session_id` observes, ending with a terminal one.
pub fn progress_records(
    sessions: SessionStore,
    session_id: String,
    idle_timeout: Duration,
) -> impl Stream<Item = ProgressRecord> + Send + 'static {
    let cursor = match sessions.subscribe(&session_id) {
        Some(rx) => Cursor::First(rx),
        None => Cursor::Unknown,
    };
    let subscription = Subscription {
        session_id,
        sessions,
        idle_timeout,
        cursor,
    };
    stream::unfold(subscription, Subscription::next_record)
}

/// `GET /progress/{session_id}`
pub async fn progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = progress_records(state.sessions.clone(), session_id, state.idle_timeout)
        .map(|record| Event::default().json_data(&record));

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn downloading(percentage: f64) -> ProgressRecord {
        ProgressRecord {
            status: ProgressStatus::Downloading,
            percentage,
            ..ProgressRecord::starting()
        }
    }

    #[tokio::test]
    async fn test_unknown_session_yields_single_error() {
        let sessions = SessionStore::new();
        let records: Vec<_> = progress_records(sessions, "nope".into(), Duration::from_secs(5))
            .collect()
            .await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ProgressStatus::Error);
        assert_eq!(records[0].error.as_deref(), Some("Unknown or expired session"));
    }

    #[tokio::test]
    async fn test_stream_ends_after_terminal_and_retires_session() {
        let sessions = SessionStore::new();
        let id = sessions.create();
        let mut records = Box::pin(progress_records(sessions.clone(), id.clone(), Duration::from_secs(5)));

        assert_eq!(records.next().await.map(|r| r.status), Some(ProgressStatus::Starting));

        sessions.set(&id, downloading(40.0));
        assert_eq!(records.next().await.map(|r| r.percentage), Some(40.0));

        sessions.set(&id, ProgressRecord::finished(10, "clip.mp4".into(), "done".into()));
        let last = records.next().await.expect("terminal record");
        assert_eq!(last.status, ProgressStatus::Finished);
        assert_eq!(last.filename.as_deref(), Some("clip.mp4"));

        assert!(records.next().await.is_none());
        assert!(sessions.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_already_terminal_session_is_delivered_once() {
        let sessions = SessionStore::new();
        let id = sessions.create();
        sessions.set(&id, ProgressRecord::failed("boom"));

        let records: Vec<_> = progress_records(sessions.clone(), id.clone(), Duration::from_secs(5))
            .collect()
            .await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error.as_deref(), Some("boom"));

        let again: Vec<_> = progress_records(sessions, id, Duration::from_secs(5)).collect().await;
        assert_eq!(again[0].error.as_deref(), Some("Unknown or expired session"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_stream_times_out() {
        let sessions = SessionStore::new();
        let id = sessions.create();
        sessions.set(&id, downloading(12.5));

        let records: Vec<_> = progress_records(sessions.clone(), id.clone(), Duration::from_secs(30))
            .collect()
            .await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].error.as_deref(), Some("Timed out waiting for progress"));
        // The download itself may still finish; its session stays registered.
        assert!(sessions.get(&id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_session_is_not_timed_out() {
        let sessions = SessionStore::new();
        let id = sessions.create();

        let writer = {
            let sessions = sessions.clone();
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                sessions.set(&id, downloading(30.0));
                sessions.set(&id, ProgressRecord::finished(10, "clip.mp4".into(), "done".into()));
            })
        };

        let records: Vec<_> = progress_records(sessions.clone(), id.clone(), Duration::from_secs(30))
            .collect()
            .await;
        writer.await.unwrap();

        let statuses: Vec<_> = records.iter().map(|r| r.status).collect();
        assert_eq!(statuses.first(), Some(&ProgressStatus::Starting));
        assert_eq!(statuses.last(), Some(&ProgressStatus::Finished));
        assert!(!statuses.contains(&ProgressStatus::Error));
    }

    #[tokio::test]
    async fn test_deleted_session_closes_stream_with_error() {
        let sessions = SessionStore::new();
        let id = sessions.create();
        let mut records = Box::pin(progress_records(sessions.clone(), id.clone(), Duration::from_secs(5)));

        assert!(records.next().await.is_some());
        sessions.delete(&id);

        let last = records.next().await.expect("error record");
        assert_eq!(last.status, ProgressStatus::Error);
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_intermediate_records_are_coalesced_to_latest() {
        let sessions = SessionStore::new();
        let id = sessions.create();
        let mut records = Box::pin(progress_records(sessions.clone(), id.clone(), Duration::from_secs(5)));
        assert!(records.next().await.is_some());

        sessions.set(&id, downloading(10.0));
        sessions.set(&id, downloading(20.0));
        assert_eq!(records.next().await.map(|r| r.percentage), Some(20.0));
    }
}
