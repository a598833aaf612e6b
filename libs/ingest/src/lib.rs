//! Kafka → HDFS event ingestion: routing, durable writes, the consumer
//! loop and its startup sequence.

pub mod clock;
pub mod config;
pub mod error;
mod consumer;
mod event;
mod partition;
mod processor;
mod provision;
mod readiness;
mod service;
mod writer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    parse_brokers, AckPolicy, IngestConfig, RestartPolicy, RetryPolicy, MAX_RESTART_ATTEMPTS, MAX_WRITE_ATTEMPTS,
};
pub use consumer::{consume, run_with_restarts, ConsumeStats};
pub use error::{ConsumeError, IngestError};
pub use event::{DiscardReason, Event, UserIdRejected};
pub use partition::{event_date, Bucket, PartitionResolver, TargetFile, Targets, WriteMode, USER_DIR};
pub use processor::{EventProcessor, ProcessOutcome};
pub use provision::{ensure_paths, ProvisionReport};
pub use readiness::ReadinessGate;
pub use service::run;
pub use writer::{AttemptOutcome, DurableWriter, WriteAttempt, WriteKind, WriteOutcome};
