use crate::sender::{OutgoingMessage, RowSender};
use crate::phone::DEFAULT_COUNTRY_CODE;
use broadcaster_channels::{ChatClient, MailClient};
use broadcaster_core::{
    BroadcastError, BroadcastResult, BroadcasterConfig, LogWindow, RecipientRow, RunEvent,
    RunState, RunStats,
};
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Builds fresh, unconnected channel clients for each run.
pub trait ClientFactory: Send + Sync {
    /// A new chat client.
    fn chat_client(&self) -> Box<dyn ChatClient>;
    /// A new mail client.
    fn mail_client(&self) -> Box<dyn MailClient>;
}

/// Randomized pause between rows, uniform over `[1.5 s, 3.0 s]`.
///
/// Always applied between two rows, whatever the previous row's outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// Shortest pause.
    pub const MIN_DELAY: Duration = Duration::from_millis(1500);
    /// Longest pause.
    pub const MAX_DELAY: Duration = Duration::from_millis(3000);

    /// Inclusive bounds of the pause.
    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    /// Draws the next pause.
    pub fn next_delay(&self) -> Duration {
        let secs = rand::thread_rng().gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: Self::MIN_DELAY,
            max: Self::MAX_DELAY,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Final counters.
    pub stats: RunStats,
    /// Rows processed.
    pub rows: usize,
    /// Last lines of the scrollback.
    pub log: LogWindow,
}

/// Runs one broadcast: connect, send every row, release.
///
/// ```text
/// Connecting ──ok──▶ Sending ──last row──▶ Completed
///     │
///     └──auth/connection failure──▶ Aborted
/// ```
pub struct Broadcaster {
    chat: Box<dyn ChatClient>,
    mail: Box<dyn MailClient>,
    sender: RowSender,
    subject: String,
    pacing: Pacing,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
    state: Option<RunState>,
}

impl Broadcaster {
    /// Creates a broadcaster over two unconnected clients.
    pub fn new(chat: Box<dyn ChatClient>, mail: Box<dyn MailClient>) -> Self {
        Self {
            chat,
            mail,
            sender: RowSender::new(DEFAULT_COUNTRY_CODE),
            subject: "Update".to_string(),
            pacing: Pacing::default(),
            events: None,
            state: None,
        }
    }

    /// Creates a broadcaster with clients from `factory` and settings from `config`.
    pub fn from_config(config: &BroadcasterConfig, factory: &dyn ClientFactory) -> Self {
        Self::new(factory.chat_client(), factory.mail_client())
            .with_subject(config.email_subject.clone())
            .with_country_code(config.country_code.clone())
    }

    /// Email subject line.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Country code prepended to normalized phones.
    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.sender = RowSender::new(country_code);
        self
    }

    /// Receives every [`RunEvent`] of the run.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Current state; `None` before [`Broadcaster::run`] starts.
    pub fn state(&self) -> Option<RunState> {
        self.state
    }

    /// Sends `body` to every row in order.
    ///
    /// An empty body is rejected before connecting. Connection and
    /// authorization failures abort the run with no statistics; per-row
    /// failures never do.
    pub async fn run(mut self, rows: &[RecipientRow], body: &str) -> BroadcastResult<RunSummary> {
        if body.trim().is_empty() {
            return Err(BroadcastError::Validation("Message is empty".to_string()));
        }

        self.transition(RunState::Connecting);
        if let Err(e) = self.connect().await {
            warn!(error = %e, "Broadcast aborted");
            self.transition(RunState::Aborted);
            self.emit(RunEvent::Aborted {
                reason: e.to_string(),
            });
            return Err(e);
        }

        self.transition(RunState::Sending);
        let message = OutgoingMessage::new(body, self.subject.clone());
        let total = rows.len();
        let mut stats = RunStats::default();
        let mut log = LogWindow::default();

        for (idx, row) in rows.iter().enumerate() {
            let report = self
                .sender
                .send_row(self.chat.as_ref(), self.mail.as_ref(), row, &message)
                .await;
            stats.record(&report);

            let line = report.log_line();
            info!(
                row = report.number,
                chat = %report.chat.detail,
                mail = %report.mail.detail,
                "Row processed"
            );
            log.push(line.clone());

            let completed = idx + 1;
            self.emit(RunEvent::RowCompleted {
                report,
                completed,
                total,
                stats,
                line,
            });

            if completed < total {
                tokio::time::sleep(self.pacing.next_delay()).await;
            }
        }

        self.release().await;
        self.transition(RunState::Completed);
        info!(
            tg_ok = stats.tg_ok,
            tg_fail = stats.tg_fail,
            em_ok = stats.em_ok,
            em_fail = stats.em_fail,
            "Broadcast complete"
        );
        self.emit(RunEvent::Completed { stats, rows: total });

        Ok(RunSummary {
            stats,
            rows: total,
            log,
        })
    }

    async fn connect(&mut self) -> BroadcastResult<()> {
        self.chat.connect().await?;

        let authorized = match self.chat.is_authorized().await {
            Ok(authorized) => authorized,
            Err(e) => {
                self.release_chat().await;
                return Err(e);
            }
        };
        if !authorized {
            self.release_chat().await;
            return Err(BroadcastError::Unauthorized(
                "Session string invalid or expired; generate a new one".to_string(),
            ));
        }

        if let Err(e) = self.mail.connect().await {
            self.release_chat().await;
            return Err(e);
        }
        Ok(())
    }

    async fn release_chat(&mut self) {
        if let Err(e) = self.chat.disconnect().await {
            warn!(channel = self.chat.name(), error = %e, "Disconnect failed");
        }
    }

    async fn release(&mut self) {
        self.release_chat().await;
        if let Err(e) = self.mail.quit().await {
            warn!(channel = self.mail.name(), error = %e, "Quit failed");
        }
    }

    fn transition(&mut self, state: RunState) {
        info!(?state, "Broadcast state");
        self.state = Some(state);
        self.emit(RunEvent::StateChanged { state });
    }

    fn emit(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = events.send(event);
        }
    }
}
