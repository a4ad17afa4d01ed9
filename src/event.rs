use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::performance::PerformanceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Manual,
    Timer,
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RefreshTrigger::Startup => "startup",
            RefreshTrigger::Manual => "manual",
            RefreshTrigger::Timer => "timer",
        })
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    RefreshStarted {
        trigger: RefreshTrigger,
        at: DateTime<Utc>,
    },
    RefreshCompleted(Arc<PerformanceTable>),
    /// The cycle produced no table; the previous one stays on screen.
    RefreshFailed {
        error: String,
        at: DateTime<Utc>,
    },
    AutoRefreshChanged(bool),
    LogMessage(String),
    Error(String),
}
