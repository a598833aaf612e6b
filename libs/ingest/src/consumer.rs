use sink_api::{FeedError, FeedMessage, MessageFeed};
use tokio_util::sync::CancellationToken;

use crate::config::{AckPolicy, RestartPolicy};
use crate::error::{ConsumeError, IngestError};
use crate::processor::{EventProcessor, ProcessOutcome};

/// Running counters over the whole process lifetime, across restarts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeStats {
    pub received: u64,
    pub stored: u64,
    pub incomplete: u64,
    pub discarded: u64,
    /// Acks the feed refused; those messages come back after a rebalance.
    pub ack_failures: u64,
}

impl ConsumeStats {
    fn record(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Stored { .. } => self.stored += 1,
            ProcessOutcome::Incomplete { .. } => self.incomplete += 1,
            ProcessOutcome::Discarded(_) => self.discarded += 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Session loop
// ═══════════════════════════════════════════════════════════════

/// A refused ack leaves the offset unstored; the message is redelivered
/// after a rebalance or restart, so the session goes on.
async fn ack_message<F>(feed: &mut F, message: &FeedMessage, stats: &mut ConsumeStats)
where
    F: MessageFeed + ?Sized,
{
    if let Err(e) = feed.ack(message).await {
        stats.ack_failures += 1;
        tracing::warn!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            error = %e,
            "ack failed, message may be redelivered"
        );
    }
}

/// One consumer session: pull, process, ack, strictly one message at a
/// time. Returns `Ok` when cancelled between messages or when the feed
/// closes; a failed `next` ends the session, a failed ack does not.
pub async fn consume<F>(
    feed: &mut F,
    processor: &EventProcessor,
    ack: AckPolicy,
    token: &CancellationToken,
    stats: &mut ConsumeStats,
) -> Result<(), ConsumeError>
where
    F: MessageFeed + ?Sized,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::info!("shutdown requested, leaving consumer loop");
                return Ok(());
            }
            next = feed.next() => next?,
        };
        let Some(message) = next else {
            tracing::info!("feed closed");
            return Ok(());
        };

        stats.received += 1;
        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "message received"
        );

        if ack == AckPolicy::BeforeWrite {
            ack_message(feed, &message, stats).await;
        }

        let outcome = processor.process(&message.payload).await;
        stats.record(&outcome);

        if ack == AckPolicy::AfterWrite {
            if let ProcessOutcome::Incomplete { .. } = outcome {
                return Err(ConsumeError::Unstored {
                    topic: message.topic,
                    partition: message.partition,
                    offset: message.offset,
                });
            }
            ack_message(feed, &message, stats).await;
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Restart loop
// ═══════════════════════════════════════════════════════════════

/// Connect and consume, reconnecting after session errors up to
/// `restart.attempts` sessions in total. The attempt counter is never
/// reset. Cancellation at any point is a clean stop.
pub async fn run_with_restarts<C, F>(
    mut connect: C,
    processor: &EventProcessor,
    ack: AckPolicy,
    restart: RestartPolicy,
    token: &CancellationToken,
) -> Result<ConsumeStats, IngestError>
where
    C: FnMut() -> Result<F, FeedError>,
    F: MessageFeed,
{
    let mut stats = ConsumeStats::default();
    let mut last = None;

    for attempt in 1..=restart.attempts {
        if token.is_cancelled() {
            return Ok(stats);
        }
        tracing::info!(attempt, max = restart.attempts, %ack, "starting consumer");

        let result = match connect() {
            Ok(mut feed) => consume(&mut feed, processor, ack, token, &mut stats).await,
            Err(e) => Err(ConsumeError::Feed(e)),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    received = stats.received,
                    stored = stats.stored,
                    incomplete = stats.incomplete,
                    discarded = stats.discarded,
                    ack_failures = stats.ack_failures,
                    "consumer stopped"
                );
                return Ok(stats);
            }
            Err(e) => {
                tracing::error!(attempt, max = restart.attempts, error = %e, "consumer session failed");
                last = Some(e);
            }
        }

        if attempt < restart.attempts {
            tracing::info!(delay_s = restart.delay.as_secs(), "restarting consumer");
            tokio::select! {
                _ = token.cancelled() => return Ok(stats),
                _ = tokio::time::sleep(restart.delay) => {}
            }
        }
    }

    let last = last.unwrap_or_else(|| ConsumeError::Feed(FeedError::new("no consumer session started")));
    tracing::error!(attempts = restart.attempts, "giving up after repeated consumer failures");
    Err(IngestError::RestartsExhausted { attempts: restart.attempts, last })
}
