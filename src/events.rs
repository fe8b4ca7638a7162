//! Structured security events.
//!
//! Every classification produces one [`LogEvent`]. Events are immutable once
//! built and are mirrored to `tracing` when the shield records them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{error, info, warn};

/// Subsystem that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ShieldModule {
    PrivacyShield,
    StealthEngine,
    NetworkGuard,
    CoreEngine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Danger,
}

impl fmt::Display for ShieldModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// One entry of the shield journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    pub id: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub module: ShieldModule,
    pub level: LogLevel,
    pub message: String,
}

impl LogEvent {
    pub fn new(module: ShieldModule, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
            timestamp: now_millis(),
            module,
            level,
            message: message.into(),
        }
    }

    /// `HH:MM:SS` (UTC) label of the timestamp, as shown in the journal.
    pub fn clock_label(&self) -> String {
        let secs = self.timestamp / 1000;
        format!(
            "{:02}:{:02}:{:02}",
            (secs / 3600) % 24,
            (secs / 60) % 60,
            secs % 60
        )
    }

    /// Forwards the event to the `tracing` subscriber.
    pub fn trace(&self) {
        match self.level {
            LogLevel::Info | LogLevel::Success => {
                info!(id = self.id, module = %self.module, level = %self.level, "{}", self.message)
            }
            LogLevel::Warning => {
                warn!(id = self.id, module = %self.module, "{}", self.message)
            }
            LogLevel::Danger => {
                error!(id = self.id, module = %self.module, "{}", self.message)
            }
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
