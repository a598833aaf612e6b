use std::time::Duration;

use serde::Deserialize;

use crate::IngestError;

// ═══════════════════════════════════════════════════════════════
//  Policies
// ═══════════════════════════════════════════════════════════════

/// Когда подтверждать сообщение относительно записи в HDFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AckPolicy {
    /// Ack as soon as the message is pulled, before any write.
    /// A message whose writes all fail is still consumed.
    #[default]
    BeforeWrite,
    /// Ack only after the event is stored. An event that could not be
    /// stored stops the consumer unacknowledged, so it is redelivered
    /// after the restart.
    AfterWrite,
}

impl std::fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AckPolicy::BeforeWrite => f.write_str("before-write"),
            AckPolicy::AfterWrite => f.write_str("after-write"),
        }
    }
}

impl std::str::FromStr for AckPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before-write" | "before_write" => Ok(AckPolicy::BeforeWrite),
            "after-write" | "after_write" => Ok(AckPolicy::AfterWrite),
            other => Err(IngestError::Config(format!(
                "unknown ack policy '{other}' (expected before-write or after-write)"
            ))),
        }
    }
}

/// Bounded retry for one write call: `max_attempts` tries with linear
/// backoff `retry_delay * attempt` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Outer restart of the consumer after connection-level errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(10),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  IngestConfig
// ═══════════════════════════════════════════════════════════════

/// Upper bound for `write.max_attempts`.
pub const MAX_WRITE_ATTEMPTS: u32 = 100;
/// Upper bound for `restart.attempts`.
pub const MAX_RESTART_ATTEMPTS: u32 = 1000;

/// Immutable service configuration, built once at process entry.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Broker `host:port` addresses checked by the readiness gate.
    pub brokers: Vec<String>,
    pub broker_wait: Duration,
    /// Absolute root of the event tree on the distributed filesystem.
    pub base_path: String,
    pub write: RetryPolicy,
    pub ack: AckPolicy,
    pub restart: RestartPolicy,
}

impl IngestConfig {
    pub fn new(brokers: Vec<String>, base_path: impl Into<String>) -> Self {
        Self {
            brokers,
            broker_wait: Duration::from_secs(120),
            base_path: base_path.into(),
            write: RetryPolicy::default(),
            ack: AckPolicy::default(),
            restart: RestartPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(IngestError::Config("no broker address configured".into()));
        }
        if !self.base_path.starts_with('/') {
            return Err(IngestError::Config(format!(
                "base path '{}' must be absolute",
                self.base_path
            )));
        }
        if !(1..=MAX_WRITE_ATTEMPTS).contains(&self.write.max_attempts) {
            return Err(IngestError::Config(format!(
                "max write attempts must be between 1 and {MAX_WRITE_ATTEMPTS}, got {}",
                self.write.max_attempts
            )));
        }
        if !(1..=MAX_RESTART_ATTEMPTS).contains(&self.restart.attempts) {
            return Err(IngestError::Config(format!(
                "restart attempts must be between 1 and {MAX_RESTART_ATTEMPTS}, got {}",
                self.restart.attempts
            )));
        }
        Ok(())
    }
}

/// Split a comma-separated broker list, dropping empty entries.
pub fn parse_brokers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
