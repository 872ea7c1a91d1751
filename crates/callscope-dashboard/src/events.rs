//! Analysis-complete notifications
//!
//! Whoever finishes an analysis publishes an [`AnalysisComplete`] on the
//! shared [`AnalysisEventBus`]; views that show derived data subscribe
//! through a [`RefreshListener`] and refresh themselves.

use callscope_core::config::DashboardConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 16;

/// An analysis finished and its results are available
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisComplete {
    /// Event id
    pub id: Uuid,
    /// Transcript the analysis ran on, when known
    pub transcript_id: Option<String>,
    /// Completion time
    pub completed_at: DateTime<Utc>,
}

impl AnalysisComplete {
    /// An analysis completed now
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            transcript_id: None,
            completed_at: Utc::now(),
        }
    }

    /// An analysis of `transcript_id` completed now
    #[must_use]
    pub fn for_transcript(transcript_id: impl Into<String>) -> Self {
        Self {
            transcript_id: Some(transcript_id.into()),
            ..Self::new()
        }
    }
}

impl Default for AnalysisComplete {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process broadcast bus for [`AnalysisComplete`] events
#[derive(Debug, Clone)]
pub struct AnalysisEventBus {
    tx: broadcast::Sender<AnalysisComplete>,
}

impl AnalysisEventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Create a bus sized by `dashboard.event_capacity`
    #[must_use]
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.event_capacity)
    }

    /// Publish an event, returning how many subscribers will see it
    pub fn publish(&self, event: AnalysisComplete) -> usize {
        debug!(event_id = %event.id, transcript_id = ?event.transcript_id, "publishing analysis complete");
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisComplete> {
        self.tx.subscribe()
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AnalysisEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Background task reacting to bus events.
///
/// The subscription lives exactly as long as the task. Dropping the
/// listener cancels it; [`RefreshListener::shutdown`] also waits until the
/// subscription is released.
#[derive(Debug)]
pub struct RefreshListener {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RefreshListener {
    /// Run `on_event` for every event received on `rx`
    pub fn spawn<F, Fut>(mut rx: broadcast::Receiver<AnalysisComplete>, on_event: F) -> Self
    where
        F: Fn(AnalysisComplete) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => {
                        debug!("refresh listener cancelled");
                        break;
                    }
                    received = rx.recv() => match received {
                        Ok(event) => on_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "refresh listener lagged, events dropped");
                        }
                        Err(RecvError::Closed) => {
                            debug!("analysis event bus closed");
                            break;
                        }
                    },
                }
            }
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Whether the listener task is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop listening and wait for the subscription to be released
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("refresh listener task failed: {e}");
            }
        }
    }
}

impl Drop for RefreshListener {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_listener(bus: &AnalysisEventBus) -> (RefreshListener, Arc<AtomicUsize>) {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let listener = RefreshListener::spawn(bus.subscribe(), move |_event| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (listener, seen)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_listener_receives_each_event_once() {
        let bus = AnalysisEventBus::default();
        let (listener, seen) = counting_listener(&bus);

        assert_eq!(bus.publish(AnalysisComplete::new()), 1);
        assert_eq!(bus.publish(AnalysisComplete::for_transcript("t1")), 1);
        settle().await;

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        listener.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_releases_subscription() {
        let bus = AnalysisEventBus::default();
        let (listener, seen) = counting_listener(&bus);
        assert_eq!(bus.receiver_count(), 1);

        listener.shutdown().await;
        assert_eq!(bus.receiver_count(), 0);

        assert_eq!(bus.publish(AnalysisComplete::new()), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_cancels_listener() {
        let bus = AnalysisEventBus::default();
        let (listener, _seen) = counting_listener(&bus);

        drop(listener);
        settle().await;

        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_listener_stops_when_bus_closes() {
        let bus = AnalysisEventBus::default();
        let (listener, _seen) = counting_listener(&bus);

        drop(bus);
        settle().await;

        assert!(!listener.is_running());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = AnalysisEventBus::new(0);
        assert_eq!(bus.publish(AnalysisComplete::new()), 0);
    }
}
