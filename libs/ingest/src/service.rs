use std::sync::Arc;

use sink_api::{DistributedFs, FeedError, MessageFeed};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::IngestConfig;
use crate::consumer::{run_with_restarts, ConsumeStats};
use crate::error::IngestError;
use crate::partition::{Bucket, PartitionResolver};
use crate::processor::EventProcessor;
use crate::provision::ensure_paths;
use crate::readiness::ReadinessGate;
use crate::writer::DurableWriter;

/// Whole service lifecycle after configuration:
/// broker gate → directory provisioning → consume with restarts.
///
/// Returns `Ok` on a clean stop (cancellation). Provisioning failures are
/// logged, never fatal.
pub async fn run<C, F>(
    cfg: &IngestConfig,
    fs: Arc<dyn DistributedFs>,
    clock: Arc<dyn Clock>,
    connect: C,
    token: &CancellationToken,
) -> Result<ConsumeStats, IngestError>
where
    C: FnMut() -> Result<F, FeedError>,
    F: MessageFeed,
{
    cfg.validate()?;

    let gate = ReadinessGate::new(cfg.brokers.clone());
    let ready = tokio::select! {
        _ = token.cancelled() => return Ok(ConsumeStats::default()),
        ready = gate.wait_for_broker(cfg.broker_wait) => ready,
    };
    if !ready {
        return Err(IngestError::BrokerUnavailable {
            brokers: cfg.brokers.join(","),
            waited: cfg.broker_wait,
        });
    }

    let buckets: Vec<&str> = Bucket::ALL.iter().map(|b| b.dir_name()).collect();
    let report = ensure_paths(fs.as_ref(), &cfg.base_path, &buckets).await;
    if !report.is_complete() {
        tracing::warn!(failed = report.failed.len(), "some directories could not be provisioned, continuing");
    }

    let processor = EventProcessor::new(
        PartitionResolver::new(&cfg.base_path),
        DurableWriter::new(fs, cfg.write, clock.clone()),
        clock,
    );
    run_with_restarts(connect, &processor, cfg.ack, cfg.restart, token).await
}
