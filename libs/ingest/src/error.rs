use std::time::Duration;

use sink_api::FeedError;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("config: {0}")]
    Config(String),

    #[error("broker not reachable at {brokers} after {}s", .waited.as_secs())]
    BrokerUnavailable { brokers: String, waited: Duration },

    #[error("consumer failed after {attempts} attempts: {last}")]
    RestartsExhausted { attempts: u32, last: ConsumeError },
}

/// Why a consumer session ended abnormally. Both variants restart the
/// session.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("feed: {0}")]
    Feed(#[from] FeedError),

    #[error("event at {topic}[{partition}]@{offset} not stored, left unacknowledged")]
    Unstored { topic: String, partition: i32, offset: i64 },
}
