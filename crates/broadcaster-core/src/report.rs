use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// --- Send outcomes ---

/// Result of one channel for one row: `(succeeded, detail)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    /// Whether the message was handed to the remote service.
    pub succeeded: bool,
    /// Short human-readable status.
    pub detail: String,
}

impl SendOutcome {
    /// Detail recorded for a successful delivery.
    pub const SENT: &'static str = "Sent";
    /// Placeholder when the phone cell does not normalize.
    pub const BAD_FORMAT: &'static str = "Bad Format";
    /// Placeholder when the email cell is absent.
    pub const NO_ADDRESS: &'static str = "-";

    /// A successful delivery.
    pub fn sent() -> Self {
        Self {
            succeeded: true,
            detail: Self::SENT.to_string(),
        }
    }

    /// A failed delivery (or a skipped one, for the placeholders).
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            detail: detail.into(),
        }
    }

    /// The chat placeholder for rows without a usable phone number.
    pub fn bad_format() -> Self {
        Self::failed(Self::BAD_FORMAT)
    }

    /// The mail placeholder for rows without an email address.
    pub fn no_address() -> Self {
        Self::failed(Self::NO_ADDRESS)
    }
}

/// Both channel outcomes for one processed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowReport {
    /// 1-based data-row number.
    pub number: usize,
    /// Normalized phone, when the row had one. A send was attempted iff set.
    pub phone: Option<String>,
    /// Email address, when the row had one. A send was attempted iff set.
    pub email: Option<String>,
    /// Chat channel outcome.
    pub chat: SendOutcome,
    /// Mail channel outcome.
    pub mail: SendOutcome,
}

impl RowReport {
    /// Whether a chat send was attempted for this row.
    pub fn chat_attempted(&self) -> bool {
        self.phone.is_some()
    }

    /// Whether a mail send was attempted for this row.
    pub fn mail_attempted(&self) -> bool {
        self.email.is_some()
    }

    /// One-line summary for the scrollback log.
    pub fn log_line(&self) -> String {
        format!(
            "Row {}: {} -> {} | {} -> {}",
            self.number,
            self.phone.as_deref().unwrap_or("Bad Num"),
            self.chat.detail,
            self.email.as_deref().unwrap_or(SendOutcome::NO_ADDRESS),
            self.mail.detail,
        )
    }
}

// --- Run statistics ---

/// Success/failure counters for one broadcast run.
///
/// Only attempted sends are counted; placeholder outcomes are not failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Chat messages delivered.
    pub tg_ok: u64,
    /// Chat messages attempted and failed.
    pub tg_fail: u64,
    /// Emails delivered.
    pub em_ok: u64,
    /// Emails attempted and failed.
    pub em_fail: u64,
}

impl RunStats {
    /// Folds one row into the counters.
    pub fn record(&mut self, report: &RowReport) {
        if report.chat_attempted() {
            if report.chat.succeeded {
                self.tg_ok += 1;
            } else {
                self.tg_fail += 1;
            }
        }
        if report.mail_attempted() {
            if report.mail.succeeded {
                self.em_ok += 1;
            } else {
                self.em_fail += 1;
            }
        }
    }

    /// Chat sends attempted.
    pub fn chat_total(&self) -> u64 {
        self.tg_ok + self.tg_fail
    }

    /// Mail sends attempted.
    pub fn mail_total(&self) -> u64 {
        self.em_ok + self.em_fail
    }
}

// --- Log window ---

/// Most-recent-first scrollback capped to a fixed number of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogWindow {
    entries: VecDeque<String>,
    capacity: usize,
    total: usize,
}

impl LogWindow {
    /// Lines kept visible by default.
    pub const DEFAULT_CAPACITY: usize = 15;

    /// Creates an empty window holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    /// Adds a line at the top, dropping the oldest when full.
    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push_front(line.into());
        self.entries.truncate(self.capacity);
        self.total += 1;
    }

    /// Visible lines, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of visible lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been logged yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lines pushed over the window's lifetime, including evicted ones.
    pub fn total_pushed(&self) -> usize {
        self.total
    }

    /// Visible lines joined newest first, one per line.
    pub fn render(&self) -> String {
        self.entries().collect::<Vec<_>>().join("\n")
    }
}

impl Default for LogWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

// --- Run lifecycle ---

/// Broadcast state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Opening the chat and mail sessions.
    Connecting,
    /// Iterating over rows.
    Sending,
    /// Every row processed, sessions released.
    Completed,
    /// A connection or authorization failure stopped the run before any row.
    Aborted,
}

impl RunState {
    /// `Completed` and `Aborted` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// Notifications emitted while a broadcast runs, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// The state machine moved to `state`.
    StateChanged {
        /// New state.
        state: RunState,
    },
    /// One row finished on both channels.
    RowCompleted {
        /// Per-channel outcomes for the row.
        report: RowReport,
        /// Rows completed so far, this one included.
        completed: usize,
        /// Rows in the dataset.
        total: usize,
        /// Counters after this row.
        stats: RunStats,
        /// Scrollback line for this row.
        line: String,
    },
    /// The run finished; final counters.
    Completed {
        /// Final counters.
        stats: RunStats,
        /// Rows processed.
        rows: usize,
    },
    /// The run stopped before sending; no counters are reported.
    Aborted {
        /// Human-readable cause.
        reason: String,
    },
}

impl RunEvent {
    /// Completed fraction in `[0, 1]` for row events.
    pub fn progress(&self) -> Option<f64> {
        match self {
            Self::RowCompleted {
                completed, total, ..
            } if *total > 0 => Some(*completed as f64 / *total as f64),
            _ => None,
        }
    }
}
