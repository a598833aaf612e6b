use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{Offset, TopicPartitionList};

use sink_api::{FeedError, FeedMessage, MessageFeed};

// ════════════════════════════════════════════════════════════════
//  Configuration
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct KafkaFeedConfig {
    /// Comma-separated `host:port` list.
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    /// Unique per process, so brokers can tell restarted instances apart.
    pub client_id: String,
    pub session_timeout: Duration,
    pub request_timeout: Duration,
    pub max_poll_interval: Duration,
}

impl KafkaFeedConfig {
    /// librdkafka properties. Offsets are stored only through `ack`;
    /// the client's auto-commit then commits whatever was stored.
    pub fn client_config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("client.id", &self.client_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("session.timeout.ms", self.session_timeout.as_millis().to_string())
            .set("socket.timeout.ms", self.request_timeout.as_millis().to_string())
            .set("max.poll.interval.ms", self.max_poll_interval.as_millis().to_string());
        cfg
    }
}

// ════════════════════════════════════════════════════════════════
//  KafkaFeed
// ════════════════════════════════════════════════════════════════

pub struct KafkaFeed {
    consumer: StreamConsumer,
}

impl KafkaFeed {
    /// Создать consumer и подписаться на topic. Group membership и
    /// rebalancing на стороне librdkafka.
    pub fn connect(cfg: &KafkaFeedConfig) -> Result<Self, FeedError> {
        let consumer: StreamConsumer = cfg
            .client_config()
            .create()
            .map_err(|e| FeedError::new(format!("create consumer: {e}")))?;
        consumer
            .subscribe(&[cfg.topic.as_str()])
            .map_err(|e| FeedError::new(format!("subscribe '{}': {e}", cfg.topic)))?;
        tracing::info!(
            topic = %cfg.topic,
            group = %cfg.group_id,
            client_id = %cfg.client_id,
            "kafka consumer subscribed"
        );
        Ok(Self { consumer })
    }
}

/// Errors librdkafka recovers from on its own: partition EOF, a topic
/// that is not created yet, broker or leader churn, timeouts. The
/// consumer keeps polling through them.
fn is_transient(err: &KafkaError) -> bool {
    match err {
        KafkaError::PartitionEOF(_) => true,
        KafkaError::MessageConsumption(code) => matches!(
            code,
            RDKafkaErrorCode::UnknownTopicOrPartition
                | RDKafkaErrorCode::UnknownTopic
                | RDKafkaErrorCode::UnknownPartition
                | RDKafkaErrorCode::BrokerTransportFailure
                | RDKafkaErrorCode::AllBrokersDown
                | RDKafkaErrorCode::OperationTimedOut
                | RDKafkaErrorCode::RequestTimedOut
                | RDKafkaErrorCode::NetworkException
                | RDKafkaErrorCode::LeaderNotAvailable
                | RDKafkaErrorCode::NotLeaderForPartition
                | RDKafkaErrorCode::Resolve
        ),
        _ => false,
    }
}

impl MessageFeed for KafkaFeed {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<FeedMessage>, FeedError>> + Send + '_>> {
        Box::pin(async move {
            loop {
                match self.consumer.recv().await {
                    Ok(msg) => {
                        return Ok(Some(FeedMessage {
                            topic: msg.topic().to_string(),
                            partition: msg.partition(),
                            offset: msg.offset(),
                            payload: msg.payload().unwrap_or_default().to_vec(),
                        }));
                    }
                    Err(KafkaError::PartitionEOF(partition)) => {
                        tracing::debug!(partition, "partition eof");
                    }
                    Err(e) if is_transient(&e) => {
                        tracing::warn!(error = %e, "kafka consumer error, still polling");
                    }
                    Err(e) => return Err(FeedError::new(format!("recv: {e}"))),
                }
            }
        })
    }

    fn ack<'a>(&'a mut self, message: &'a FeedMessage)
        -> Pin<Box<dyn Future<Output = Result<(), FeedError>> + Send + 'a>>
    {
        Box::pin(async move {
            // Committed offset = next offset to read.
            let mut tpl = TopicPartitionList::new();
            tpl.add_partition_offset(&message.topic, message.partition, Offset::Offset(message.offset + 1))
                .map_err(|e| FeedError::new(format!("ack offset: {e}")))?;
            self.consumer
                .store_offsets(&tpl)
                .map_err(|e| FeedError::new(format!("store offset: {e}")))
        })
    }
}
