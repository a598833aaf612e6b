use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use feed_kafka::KafkaFeed;
use fs_webhdfs::WebHdfsClient;
use ingest::{Clock, ConsumeStats, SystemClock};

use crate::config::{ConsumeArgs, Effective};
use crate::error::SinkError;

const HDFS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run(args: ConsumeArgs) -> Result<ConsumeStats, SinkError> {
    let eff = Effective::new(&args)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let host = hostname();
    let client_id = client_id(&host, std::process::id(), clock.as_ref());
    tracing::info!(
        brokers = %eff.brokers,
        topic = %eff.topic,
        group = %eff.group_id,
        hdfs_url = %eff.hdfs_url,
        hdfs_user = %eff.hdfs_user,
        base_path = %eff.ingest.base_path,
        ack = %eff.ingest.ack,
        max_write_attempts = eff.ingest.write.max_attempts,
        host = %host,
        client_id = %client_id,
        "starting event-sink"
    );

    let fs = Arc::new(WebHdfsClient::new(&eff.hdfs_url, &eff.hdfs_user, HDFS_REQUEST_TIMEOUT)?);
    let feed_cfg = eff.feed_config(client_id);

    // --- CancellationToken для graceful shutdown ---
    let token = CancellationToken::new();
    let signal_token = token.clone();
    let signals = tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => tracing::info!("shutdown signal received, finishing current message"),
            Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signals"),
        }
        signal_token.cancel();
    });

    let result = ingest::run(
        &eff.ingest,
        fs,
        clock,
        || KafkaFeed::connect(&feed_cfg),
        &token,
    )
    .await;
    signals.abort();

    let stats = result?;
    tracing::info!(
        received = stats.received,
        stored = stats.stored,
        incomplete = stats.incomplete,
        discarded = stats.discarded,
        ack_failures = stats.ack_failures,
        "event-sink stopped"
    );
    Ok(stats)
}

/// Ctrl+C везде, плюс SIGTERM на unix (docker stop).
async fn shutdown_signal() -> Result<(), SinkError> {
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

/// `consumer_<host>_<pid>_<epoch>`: unique per process start.
fn client_id(host: &str, pid: u32, clock: &dyn Clock) -> String {
    format!("consumer_{host}_{pid}_{}", clock.epoch_secs())
}
