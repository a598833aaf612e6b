use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use feed_kafka::KafkaFeedConfig;
use ingest::{parse_brokers, AckPolicy, IngestConfig, RestartPolicy, RetryPolicy};

use crate::error::SinkError;

#[derive(Parser)]
#[command(name = "event-sink", about = "Kafka → HDFS приёмник пользовательских событий")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Читать topic и складывать события в HDFS
    Consume(ConsumeArgs),
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct ConsumeArgs {
    /// Путь к TOML конфигу (необязательный)
    #[arg(long, default_value = "event-sink.toml", env = "EVENT_SINK_CONFIG")]
    pub config: String,

    /// Comma-separated broker list, `host:port`
    #[arg(long, env = "KAFKA_BROKERS")]
    pub brokers: Option<String>,

    #[arg(long, env = "KAFKA_TOPIC")]
    pub topic: Option<String>,

    #[arg(long, env = "KAFKA_GROUP_ID")]
    pub group_id: Option<String>,

    /// WebHDFS namenode URL
    #[arg(long, env = "HDFS_URL")]
    pub hdfs_url: Option<String>,

    #[arg(long, env = "HDFS_USER")]
    pub hdfs_user: Option<String>,

    /// Корень дерева событий в HDFS
    #[arg(long, env = "HDFS_BASE_PATH")]
    pub base_path: Option<String>,

    /// Сколько ждать брокер при старте
    #[arg(long, env = "BROKER_WAIT_SECS")]
    pub broker_wait_secs: Option<u64>,

    /// Write attempts per file before the fallback file
    #[arg(long, env = "MAX_HDFS_RETRIES")]
    pub max_write_attempts: Option<u32>,

    #[arg(long, env = "RETRY_DELAY_MS")]
    pub retry_delay_ms: Option<u64>,

    #[arg(long, env = "RESTART_ATTEMPTS")]
    pub restart_attempts: Option<u32>,

    #[arg(long, env = "RESTART_DELAY_SECS")]
    pub restart_delay_secs: Option<u64>,

    /// before-write | after-write
    #[arg(long, env = "ACK_POLICY")]
    pub ack_policy: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub brokers: Option<String>,
    pub topic: Option<String>,
    pub group_id: Option<String>,
    pub hdfs_url: Option<String>,
    pub hdfs_user: Option<String>,
    pub base_path: Option<String>,
    pub broker_wait_secs: Option<u64>,
    pub max_write_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub restart_attempts: Option<u32>,
    pub restart_delay_secs: Option<u64>,
    pub ack_policy: Option<AckPolicy>,
}

impl FileConfig {
    /// Missing file = empty config; unreadable or malformed file = error.
    pub fn load(path: &str) -> Result<Self, SinkError> {
        if !std::path::Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SinkError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        toml::from_str(&content)
            .map_err(|e| SinkError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: config file < env/CLI. Значения по
/// умолчанию берутся только для ключей, не заданных нигде.
#[derive(Debug, Clone)]
pub struct Effective {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub hdfs_url: String,
    pub hdfs_user: String,
    pub ingest: IngestConfig,
}

impl Effective {
    pub fn new(args: &ConsumeArgs) -> Result<Self, SinkError> {
        Self::merge(args, FileConfig::load(&args.config)?)
    }

    pub fn merge(args: &ConsumeArgs, file: FileConfig) -> Result<Self, SinkError> {
        let brokers = args.brokers.clone().or(file.brokers).unwrap_or_else(|| "kafka:9093".into());
        let topic = args.topic.clone().or(file.topic).unwrap_or_else(|| "user-events".into());
        let group_id = args.group_id.clone().or(file.group_id).unwrap_or_else(|| "hdfs-consumer-group".into());
        let hdfs_url = args.hdfs_url.clone().or(file.hdfs_url).unwrap_or_else(|| "http://namenode:9870".into());
        let hdfs_user = args.hdfs_user.clone().or(file.hdfs_user).unwrap_or_else(|| "hdfs".into());
        let base_path = args.base_path.clone().or(file.base_path).unwrap_or_else(|| "/user/savora/events".into());

        let ack = match &args.ack_policy {
            Some(raw) => raw.parse()?,
            None => file.ack_policy.unwrap_or_default(),
        };

        if topic.trim().is_empty() {
            return Err(SinkError::Config { context: "topic", detail: "topic must not be empty".into() });
        }
        if group_id.trim().is_empty() {
            return Err(SinkError::Config { context: "group_id", detail: "consumer group must not be empty".into() });
        }

        let mut ingest = IngestConfig::new(parse_brokers(&brokers), base_path);
        ingest.broker_wait = Duration::from_secs(args.broker_wait_secs.or(file.broker_wait_secs).unwrap_or(120));
        ingest.write = RetryPolicy {
            max_attempts: args.max_write_attempts.or(file.max_write_attempts).unwrap_or(5),
            retry_delay: Duration::from_millis(args.retry_delay_ms.or(file.retry_delay_ms).unwrap_or(2000)),
        };
        ingest.restart = RestartPolicy {
            attempts: args.restart_attempts.or(file.restart_attempts).unwrap_or(5),
            delay: Duration::from_secs(args.restart_delay_secs.or(file.restart_delay_secs).unwrap_or(10)),
        };
        ingest.ack = ack;
        ingest.validate()?;

        Ok(Self {
            brokers,
            topic,
            group_id,
            hdfs_url,
            hdfs_user,
            ingest,
        })
    }

    pub fn feed_config(&self, client_id: String) -> KafkaFeedConfig {
        KafkaFeedConfig {
            brokers: self.ingest.brokers.join(","),
            topic: self.topic.clone(),
            group_id: self.group_id.clone(),
            client_id,
            session_timeout: Duration::from_millis(30_000),
            request_timeout: Duration::from_millis(40_000),
            max_poll_interval: Duration::from_millis(300_000),
        }
    }
}
