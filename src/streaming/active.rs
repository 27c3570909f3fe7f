//! Registry of open streams.
//!
//! Every open stream holds a cancellation token here and runs its reader on
//! the shared `TaskTracker`, so shutdown can cancel all of them and wait for
//! the readers to release their connections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::observability::metrics;

/// How often a drain re-cancels streams that opened after it started.
const DRAIN_RECHECK: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct OpenStream {
    server_id: String,
    token: CancellationToken,
    opened_at: Instant,
}

/// Snapshot of one open stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub id: u64,
    pub server_id: String,
    pub age_ms: u64,
}

#[derive(Debug, Default)]
pub struct ActiveStreams {
    streams: DashMap<u64, OpenStream>,
    next_id: AtomicU64,
    tracker: TaskTracker,
}

impl ActiveStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new stream and return its id.
    pub fn register(&self, server_id: &str, token: CancellationToken) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.streams.insert(
            id,
            OpenStream {
                server_id: server_id.to_string(),
                token,
                opened_at: Instant::now(),
            },
        );
        metrics::record_active_streams(self.streams.len());
        id
    }

    pub fn deregister(&self, id: u64) {
        if self.streams.remove(&id).is_some() {
            metrics::record_active_streams(self.streams.len());
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn list(&self) -> Vec<StreamInfo> {
        let mut streams: Vec<StreamInfo> = self
            .streams
            .iter()
            .map(|entry| StreamInfo {
                id: *entry.key(),
                server_id: entry.server_id.clone(),
                age_ms: entry.opened_at.elapsed().as_millis() as u64,
            })
            .collect();
        streams.sort_by_key(|s| s.id);
        streams
    }

    /// Tracker the stream readers are spawned on.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Cancel every open stream. Returns how many were newly signalled.
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for entry in self.streams.iter() {
            if !entry.token.is_cancelled() {
                entry.token.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Cancel every stream and wait for all readers to exit.
    ///
    /// Streams registered while the drain is in progress are cancelled too.
    /// Returns how many streams were signalled.
    pub async fn cancel_and_drain(&self) -> usize {
        self.tracker.close();
        let mut cancelled = 0;
        loop {
            cancelled += self.cancel_all();
            tokio::select! {
                _ = self.tracker.wait() => {
                    if self.streams.is_empty() {
                        break;
                    }
                    // Registered, reader not spawned yet.
                    tokio::task::yield_now().await;
                }
                _ = tokio::time::sleep(DRAIN_RECHECK) => {}
            }
        }
        self.tracker.reopen();
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_register_and_cancel_all() {
        let streams = ActiveStreams::new();
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let id_a = streams.register("s1", a.clone());
        streams.register("s2", b.clone());
        assert_eq!(streams.len(), 2);

        assert_eq!(streams.cancel_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());

        streams.deregister(id_a);
        assert_eq!(streams.list().len(), 1);
        assert_eq!(streams.list()[0].server_id, "s2");
    }

    fn spawn_reader(streams: &Arc<ActiveStreams>, server_id: &str, linger: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let id = streams.register(server_id, token.clone());
        let reader_token = token.clone();
        let reader_streams = Arc::clone(streams);
        streams.tracker().spawn(async move {
            reader_token.cancelled().await;
            tokio::time::sleep(linger).await;
            reader_streams.deregister(id);
        });
        token
    }

    #[tokio::test]
    async fn test_cancel_and_drain_catches_late_streams() {
        let streams = Arc::new(ActiveStreams::new());
        let early = spawn_reader(&streams, "s1", Duration::from_millis(100));

        let late_streams = Arc::clone(&streams);
        let late = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            spawn_reader(&late_streams, "s2", Duration::ZERO)
        });

        let cancelled = tokio::time::timeout(Duration::from_secs(2), streams.cancel_and_drain())
            .await
            .unwrap();
        let late = late.await.unwrap();

        assert_eq!(cancelled, 2);
        assert!(early.is_cancelled() && late.is_cancelled());
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn test_drain_waits_for_readers() {
        let streams = ActiveStreams::new();
        let token = CancellationToken::new();
        let reader_token = token.clone();
        streams.tracker().spawn(async move { reader_token.cancelled().await });

        token.cancel();
        let cancelled = tokio::time::timeout(Duration::from_secs(1), streams.cancel_and_drain())
            .await
            .unwrap();
        assert_eq!(cancelled, 0);
        assert!(streams.tracker().is_empty());
    }
}
