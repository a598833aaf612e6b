use std::sync::Arc;

use crate::clock::Clock;
use crate::event::{DiscardReason, Event, UserIdRejected};
use crate::partition::PartitionResolver;
use crate::writer::{DurableWriter, WriteOutcome};

/// Result of processing one raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Every attempted write succeeded (possibly via fallback files).
    /// `user_skipped` is set when the per-user file was left out.
    Stored { event_type: String, writes: Vec<WriteOutcome>, user_skipped: Option<UserIdRejected> },
    /// At least one write failed terminally.
    Incomplete { event_type: String, writes: Vec<WriteOutcome>, user_skipped: Option<UserIdRejected> },
    /// Nothing written.
    Discarded(DiscardReason),
}

impl ProcessOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, ProcessOutcome::Stored { .. })
    }

    pub fn writes(&self) -> &[WriteOutcome] {
        match self {
            ProcessOutcome::Stored { writes, .. } | ProcessOutcome::Incomplete { writes, .. } => writes,
            ProcessOutcome::Discarded(_) => &[],
        }
    }

    pub fn user_skipped(&self) -> Option<&UserIdRejected> {
        match self {
            ProcessOutcome::Stored { user_skipped, .. } | ProcessOutcome::Incomplete { user_skipped, .. } => {
                user_skipped.as_ref()
            }
            ProcessOutcome::Discarded(_) => None,
        }
    }
}

/// Decode → resolve → write → aggregate for one message.
pub struct EventProcessor {
    resolver: PartitionResolver,
    writer: DurableWriter,
    clock: Arc<dyn Clock>,
}

impl EventProcessor {
    pub fn new(resolver: PartitionResolver, writer: DurableWriter, clock: Arc<dyn Clock>) -> Self {
        Self { resolver, writer, clock }
    }

    /// Never fails: malformed input is discarded, write failures are
    /// reported in the outcome and logged.
    pub async fn process(&self, raw: &[u8]) -> ProcessOutcome {
        let event = match Event::parse(raw) {
            Ok(ev) => ev,
            Err(reason) => {
                tracing::warn!(
                    reason = %reason,
                    raw = %String::from_utf8_lossy(raw),
                    "discarding message"
                );
                return ProcessOutcome::Discarded(reason);
            }
        };

        tracing::info!(
            event_type = event.event_type(),
            user_id = event.user_id().unwrap_or("-"),
            "received event"
        );
        let user_skipped = event.user_rejected().cloned();
        if let Some(reason) = &user_skipped {
            tracing::warn!(reason = %reason, "skipping per-user file");
        }

        let line = match event.to_json_line() {
            Ok(line) => line,
            Err(reason) => {
                tracing::error!(reason = %reason, "discarding message");
                return ProcessOutcome::Discarded(reason);
            }
        };

        let targets = self.resolver.resolve(
            event.event_type(),
            event.timestamp(),
            event.user_id(),
            self.clock.today(),
        );

        let mut writes = Vec::with_capacity(2);
        for target in targets.iter() {
            tracing::debug!(path = %target.path, "writing event");
            writes.push(self.writer.write(&target.path, &line, target.mode.is_append()).await);
        }

        let event_type = event.event_type().to_string();
        if writes.iter().all(WriteOutcome::is_success) {
            tracing::info!(event_type = %event_type, files = writes.len(), "stored event");
            ProcessOutcome::Stored { event_type, writes, user_skipped }
        } else {
            let failed: Vec<&str> = writes
                .iter()
                .filter(|w| !w.is_success())
                .map(|w| w.target.as_str())
                .collect();
            tracing::warn!(event_type = %event_type, ?failed, "failed to store event to one or more locations");
            ProcessOutcome::Incomplete { event_type, writes, user_skipped }
        }
    }
}
