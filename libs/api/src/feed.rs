use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use crate::FeedError;

// ════════════════════════════════════════════════════════════════
//  Feed types
// ════════════════════════════════════════════════════════════════

/// Одно сообщение из подписанного topic'а. Payload: сырые байты,
/// декодирование делает pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Subscribed message source under a consumer group.
///
/// One message is handed out at a time; `ack` advances the group's read
/// position past it. Errors are connection-level: the caller drops the
/// feed and reconnects.
pub trait MessageFeed: Send {
    /// Следующее сообщение. `Ok(None)` = feed закрыт.
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<FeedMessage>, FeedError>> + Send + '_>>;

    /// Mark `message` consumed.
    fn ack<'a>(&'a mut self, message: &'a FeedMessage)
        -> Pin<Box<dyn Future<Output = Result<(), FeedError>> + Send + 'a>>;
}

// ════════════════════════════════════════════════════════════════
//  VecFeed
// ════════════════════════════════════════════════════════════════

/// In-memory feed over a fixed list of payloads. Records acknowledged
/// offsets; optionally fails with a connection error once drained, or
/// refuses to ack chosen offsets.
#[derive(Debug, Default)]
pub struct VecFeed {
    pending: VecDeque<FeedMessage>,
    acked: Vec<i64>,
    failing_acks: Vec<i64>,
    fail_when_drained: Option<String>,
}

impl VecFeed {
    pub fn new(topic: &str, payloads: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let pending = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| FeedMessage {
                topic: topic.to_string(),
                partition: 0,
                offset: i as i64,
                payload,
            })
            .collect();
        Self {
            pending,
            acked: Vec::new(),
            failing_acks: Vec::new(),
            fail_when_drained: None,
        }
    }

    /// `ack` of `offset` returns `Err` and is not recorded.
    pub fn fail_ack(mut self, offset: i64) -> Self {
        self.failing_acks.push(offset);
        self
    }

    /// After the last message, `next` returns `Err` instead of `Ok(None)`.
    pub fn fail_when_drained(mut self, msg: impl Into<String>) -> Self {
        self.fail_when_drained = Some(msg.into());
        self
    }

    pub fn acked(&self) -> &[i64] {
        &self.acked
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl MessageFeed for VecFeed {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<FeedMessage>, FeedError>> + Send + '_>> {
        Box::pin(async move {
            match self.pending.pop_front() {
                Some(msg) => Ok(Some(msg)),
                None => match &self.fail_when_drained {
                    Some(reason) => Err(FeedError::new(reason.clone())),
                    None => Ok(None),
                },
            }
        })
    }

    fn ack<'a>(&'a mut self, message: &'a FeedMessage)
        -> Pin<Box<dyn Future<Output = Result<(), FeedError>> + Send + 'a>>
    {
        Box::pin(async move {
            if self.failing_acks.contains(&message.offset) {
                return Err(FeedError::new(format!("ack offset {}: coordinator unavailable", message.offset)));
            }
            self.acked.push(message.offset);
            Ok(())
        })
    }
}
