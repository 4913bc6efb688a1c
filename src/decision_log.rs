use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::{Mode, Priority, Strategy};
use crate::engine::EngineError;

/// Maximum reason length forwarded to dashboards and log entries
pub const MAX_REASON_LEN: usize = 255;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Category {
    Safety,
    Charge,
    Discharge,
    Price,
    Error,
    Decision,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub level: Level,
    pub category: Category,
    pub message: String,
}

/// Classify a decision for the rotating log. Safety and error markers
/// take precedence over the mode-derived buckets.
pub fn classify(strategy: &Strategy) -> Category {
    let reason = strategy.reason.to_lowercase();
    if reason.contains("temperature") || reason.contains("safety") {
        return Category::Safety;
    }
    if reason.contains("fallback") || reason.contains("error") {
        return Category::Error;
    }
    match strategy.mode {
        Mode::ChargeFromGrid | Mode::ChargeFromPv => Category::Charge,
        Mode::DischargeToHome => Category::Discharge,
        Mode::DischargeToGrid => Category::Price,
        Mode::GridToHome | Mode::Idle => Category::Decision,
    }
}

/// Fixed-capacity rotating record of the most recent decisions
#[derive(Debug)]
pub struct DecisionLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record_strategy(&mut self, strategy: &Strategy) {
        let level = match strategy.priority {
            Priority::Critical => Level::Error,
            Priority::High => Level::Warn,
            Priority::Normal | Priority::Low => Level::Info,
        };
        let mut message = format!("{}: {}", strategy.mode, strategy.reason);
        message.truncate(MAX_REASON_LEN);
        self.push(LogEntry {
            timestamp: Local::now().fixed_offset(),
            level,
            category: classify(strategy),
            message,
        });
    }

    /// Typed failure entry: the variant picks the category, so the API
    /// can tell a price outage from a broken inverter without string
    /// matching.
    pub fn record_failure(&mut self, err: &EngineError) {
        let (level, category) = match err {
            EngineError::MissingInput(_) => (Level::Warn, Category::Error),
            EngineError::PriceDataUnavailable(_) => (Level::Warn, Category::Price),
            EngineError::ActuationFailure(_) => (Level::Error, Category::Error),
        };
        let mut message = err.to_string();
        message.truncate(MAX_REASON_LEN);
        self.push(LogEntry {
            timestamp: Local::now().fixed_offset(),
            level,
            category,
            message,
        });
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        let mut message = message.into();
        message.truncate(MAX_REASON_LEN);
        self.push(LogEntry {
            timestamp: Local::now().fixed_offset(),
            level: Level::Error,
            category: Category::Error,
            message,
        });
    }

    fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DecisionLog {
    fn default() -> Self {
        Self::new(5)
    }
}
