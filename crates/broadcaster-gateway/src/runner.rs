use crate::connection::ConnectionManager;
use broadcaster_core::{BroadcastError, LogWindow, RecipientRow, RunEvent, RunState, RunStats};
use broadcaster_engine::{Broadcaster, ClientFactory, RecipientSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Per-run settings that do not come from the request.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Email subject line.
    pub subject: String,
    /// Prefix for normalized phones.
    pub country_code: String,
}

/// Why a run could not be started.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// Another broadcast is still running.
    #[error("A broadcast is already running")]
    Busy,
    /// The message or dataset was rejected.
    #[error(transparent)]
    Rejected(#[from] BroadcastError),
}

/// What the page shows: the latest (or current) run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSnapshot {
    /// `None` until the first run starts.
    pub run_id: Option<Uuid>,
    /// Latest state-machine state.
    pub state: Option<RunState>,
    /// Rows processed so far.
    pub completed: usize,
    /// Rows in the dataset.
    pub total: usize,
    /// Newest first, at most 15 lines.
    pub log: Vec<String>,
    /// Set only once the run completed.
    pub stats: Option<RunStats>,
    /// Set only when the run aborted.
    pub error: Option<String>,
    /// When the run was accepted.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run completed or aborted.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Clears the launcher's busy flag when the run task ends, even by panic.
struct ActiveRun<'a>(&'a AtomicBool);

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Tracker {
    snapshot: RunSnapshot,
    log: LogWindow,
}

impl Tracker {
    fn started(run_id: Uuid, total: usize) -> Self {
        Self {
            snapshot: RunSnapshot {
                run_id: Some(run_id),
                total,
                started_at: Some(Utc::now()),
                ..Default::default()
            },
            log: LogWindow::default(),
        }
    }

    fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::StateChanged { state } => self.snapshot.state = Some(*state),
            RunEvent::RowCompleted {
                completed,
                total,
                line,
                ..
            } => {
                self.snapshot.completed = *completed;
                self.snapshot.total = *total;
                self.log.push(line.clone());
                self.snapshot.log = self.log.entries().map(str::to_string).collect();
            }
            RunEvent::Completed { stats, .. } => {
                self.snapshot.stats = Some(*stats);
                self.snapshot.finished_at = Some(Utc::now());
            }
            RunEvent::Aborted { reason } => {
                self.snapshot.error = Some(reason.clone());
                self.snapshot.finished_at = Some(Utc::now());
            }
        }
    }
}

/// Starts broadcasts in the background, one at a time, and fans their
/// events out to every viewer.
pub struct RunLauncher {
    factory: Arc<dyn ClientFactory>,
    source: Arc<dyn RecipientSource>,
    settings: RunSettings,
    connections: Arc<ConnectionManager>,
    active: AtomicBool,
    tracker: RwLock<Tracker>,
}

impl RunLauncher {
    /// Creates an idle launcher publishing to `connections`.
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        source: Arc<dyn RecipientSource>,
        settings: RunSettings,
        connections: Arc<ConnectionManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            factory,
            source,
            settings,
            connections,
            active: AtomicBool::new(false),
            tracker: RwLock::new(Tracker::default()),
        })
    }

    /// Whether a broadcast is in progress.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Copy of the latest run's progress.
    pub async fn snapshot(&self) -> RunSnapshot {
        self.tracker.read().await.snapshot.clone()
    }

    /// Validates the message, loads the dataset, and starts the run.
    ///
    /// Input problems are reported here, before any connection is attempted.
    pub async fn start(self: &Arc<Self>, message: String) -> Result<Uuid, StartError> {
        if message.trim().is_empty() {
            return Err(BroadcastError::Validation("Message is empty".to_string()).into());
        }
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StartError::Busy);
        }

        let rows = match self.source.load().await {
            Ok(rows) => rows,
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                warn!(source = %self.source.describe(), error = %e, "Dataset rejected");
                return Err(e.into());
            }
        };

        let run_id = Uuid::new_v4();
        *self.tracker.write().await = Tracker::started(run_id, rows.len());

        let broadcaster = Broadcaster::new(self.factory.chat_client(), self.factory.mail_client())
            .with_subject(self.settings.subject.clone())
            .with_country_code(self.settings.country_code.clone());

        info!(%run_id, rows = rows.len(), "Broadcast started");
        let launcher = Arc::clone(self);
        tokio::spawn(async move {
            launcher.drive(run_id, broadcaster, rows, message).await;
        });
        Ok(run_id)
    }

    async fn drive(&self, run_id: Uuid, broadcaster: Broadcaster, rows: Vec<RecipientRow>, message: String) {
        let _active = ActiveRun(&self.active);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = broadcaster.with_events(tx).run(&rows, &message);
        let forward = async {
            while let Some(event) = rx.recv().await {
                self.publish(run_id, event).await;
            }
        };
        let (result, ()) = tokio::join!(run, forward);

        match result {
            Ok(summary) => info!(%run_id, rows = summary.rows, "Broadcast finished"),
            Err(e) => {
                error!(%run_id, error = %e, "Broadcast failed");
                let mut tracker = self.tracker.write().await;
                if tracker.snapshot.error.is_none() {
                    tracker.snapshot.error = Some(e.to_string());
                }
            }
        }
    }

    async fn publish(&self, run_id: Uuid, event: RunEvent) {
        self.tracker.write().await.apply(&event);
        let payload = serde_json::json!({
            "type": "run_event",
            "run_id": run_id,
            "event": event,
        });
        self.connections.broadcast(&payload.to_string()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcaster_core::{RowReport, SendOutcome};

    #[test]
    fn test_tracker_follows_events() {
        let mut tracker = Tracker::started(Uuid::new_v4(), 2);
        tracker.apply(&RunEvent::StateChanged {
            state: RunState::Sending,
        });
        tracker.apply(&RunEvent::RowCompleted {
            report: RowReport {
                number: 1,
                phone: None,
                email: None,
                chat: SendOutcome::bad_format(),
                mail: SendOutcome::no_address(),
            },
            completed: 1,
            total: 2,
            stats: RunStats::default(),
            line: "Row 1: Bad Num -> Bad Format | - -> -".to_string(),
        });

        let snap = &tracker.snapshot;
        assert_eq!(snap.state, Some(RunState::Sending));
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.log.len(), 1);
        assert!(snap.stats.is_none());

        tracker.apply(&RunEvent::Completed {
            stats: RunStats::default(),
            rows: 2,
        });
        assert!(tracker.snapshot.stats.is_some());
        assert!(tracker.snapshot.finished_at.is_some());
    }

    #[test]
    fn test_abort_sets_error_without_stats() {
        let mut tracker = Tracker::started(Uuid::new_v4(), 3);
        tracker.apply(&RunEvent::Aborted {
            reason: "Unauthorized".to_string(),
        });
        assert_eq!(tracker.snapshot.error.as_deref(), Some("Unauthorized"));
        assert!(tracker.snapshot.stats.is_none());
    }
}
