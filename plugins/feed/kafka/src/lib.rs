//! `MessageFeed` over a Kafka consumer group.

mod feed;

pub use feed::{KafkaFeed, KafkaFeedConfig};
