use std::sync::Arc;

use sink_api::{parent_dir, DistributedFs, FsError};

use crate::clock::Clock;
use crate::config::RetryPolicy;

// ═══════════════════════════════════════════════════════════════
//  Outcome types
// ═══════════════════════════════════════════════════════════════

/// How the bytes landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Native append to an existing file.
    Appended,
    /// Append hit a lease conflict; content rewritten as existing + new.
    Rewritten,
    /// New file.
    Created,
    /// Existing file truncated (append not intended).
    Overwritten,
    /// Primary attempts exhausted; written to a suffixed sibling file.
    Fallback,
}

impl std::fmt::Display for WriteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteKind::Appended => f.write_str("appended"),
            WriteKind::Rewritten => f.write_str("rewritten"),
            WriteKind::Created => f.write_str("created"),
            WriteKind::Overwritten => f.write_str("overwritten"),
            WriteKind::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(WriteKind),
    RetryableFailure(FsError),
    TerminalFailure(FsError),
}

/// Одна попытка записи. `path`: фактический путь (для fallback
/// с суффиксом).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAttempt {
    pub number: u32,
    pub path: String,
    pub outcome: AttemptOutcome,
}

/// Result of one `DurableWriter::write` call. Success iff the last
/// attempt succeeded, possibly against the fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub target: String,
    pub attempts: Vec<WriteAttempt>,
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self.attempts.last().map(|a| &a.outcome),
            Some(AttemptOutcome::Success(_))
        )
    }

    pub fn kind(&self) -> Option<WriteKind> {
        match self.attempts.last().map(|a| &a.outcome) {
            Some(AttemptOutcome::Success(kind)) => Some(*kind),
            _ => None,
        }
    }

    /// Where the bytes landed, or the last path tried.
    pub fn resolved_path(&self) -> &str {
        self.attempts
            .last()
            .map(|a| a.path.as_str())
            .unwrap_or(&self.target)
    }

    pub fn error(&self) -> Option<&FsError> {
        match self.attempts.last().map(|a| &a.outcome) {
            Some(AttemptOutcome::TerminalFailure(e)) | Some(AttemptOutcome::RetryableFailure(e)) => Some(e),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  DurableWriter
// ═══════════════════════════════════════════════════════════════

/// Retrying writer for filesystems with single-writer append leases.
///
/// Per call: up to `max_attempts` tries with linear backoff. A lease
/// conflict on append is resolved in-attempt by read-modify-write. When
/// all tries fail, exactly one last-resort create goes to
/// `<path>.<epoch seconds>`. Never returns an error: the outcome says
/// what happened.
///
/// Read-modify-write is not atomic: a concurrent writer doing the same
/// between our read and our truncating write loses its bytes.
pub struct DurableWriter {
    fs: Arc<dyn DistributedFs>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl DurableWriter {
    pub fn new(fs: Arc<dyn DistributedFs>, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { fs, policy, clock }
    }

    pub async fn write(&self, path: &str, data: &[u8], append: bool) -> WriteOutcome {
        let max = self.policy.max_attempts;
        let mut attempts = Vec::new();

        for number in 1..=max {
            match self.attempt(path, data, append).await {
                Ok(kind) => {
                    tracing::info!(path, attempt = number, %kind, "write ok");
                    attempts.push(WriteAttempt {
                        number,
                        path: path.to_string(),
                        outcome: AttemptOutcome::Success(kind),
                    });
                    return WriteOutcome { target: path.to_string(), attempts };
                }
                Err(e) => {
                    tracing::warn!(path, attempt = number, max, error = ?e, "write attempt failed");
                    attempts.push(WriteAttempt {
                        number,
                        path: path.to_string(),
                        outcome: AttemptOutcome::RetryableFailure(e),
                    });
                    if number < max {
                        let delay = self.policy.backoff(number);
                        tracing::info!(path, delay_ms = delay.as_millis() as u64, "retrying write");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let fallback = format!("{path}.{}", self.clock.epoch_secs());
        tracing::warn!(path, fallback = %fallback, "write retries exhausted, trying fallback file");
        let outcome = match self.fs.create(&fallback, data, false).await {
            Ok(()) => {
                tracing::warn!(path, fallback = %fallback, "wrote to fallback file");
                AttemptOutcome::Success(WriteKind::Fallback)
            }
            Err(e) => {
                tracing::error!(path, fallback = %fallback, error = ?e, "fallback write failed, content dropped");
                AttemptOutcome::TerminalFailure(e)
            }
        };
        attempts.push(WriteAttempt {
            number: max + 1,
            path: fallback,
            outcome,
        });
        WriteOutcome { target: path.to_string(), attempts }
    }

    async fn attempt(&self, path: &str, data: &[u8], append: bool) -> Result<WriteKind, FsError> {
        if let Some(dir) = parent_dir(path) {
            if self.fs.status(dir).await?.is_none() {
                tracing::info!(dir, "creating directory");
                self.fs.mkdirs(dir).await?;
            }
        }

        let exists = self.fs.status(path).await?.is_some();

        if append && exists {
            match self.fs.append(path, data).await {
                Ok(()) => Ok(WriteKind::Appended),
                Err(e) if e.is_lease_conflict() => {
                    tracing::warn!(path, error = %e, "append hit lease conflict, trying read-modify-write");
                    self.read_modify_write(path, data).await?;
                    Ok(WriteKind::Rewritten)
                }
                Err(e) => Err(e),
            }
        } else {
            // exists == true здесь только при append == false.
            self.fs.create(path, data, exists).await?;
            Ok(if exists { WriteKind::Overwritten } else { WriteKind::Created })
        }
    }

    async fn read_modify_write(&self, path: &str, data: &[u8]) -> Result<(), FsError> {
        let mut content = self.fs.read(path).await?;
        content.extend_from_slice(data);
        self.fs.create(path, &content, true).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sink_api::{FaultOp, FsErrorKind, FsOp, MemoryFs};

    use super::*;
    use crate::clock::ManualClock;

    fn writer(fs: &Arc<MemoryFs>) -> DurableWriter {
        DurableWriter::new(
            fs.clone(),
            RetryPolicy { max_attempts: 5, retry_delay: Duration::from_secs(2) },
            Arc::new(ManualClock::at(1_714_557_600)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn creates_then_appends() {
        let fs = Arc::new(MemoryFs::new());
        let w = writer(&fs);

        let first = w.write("/e/search_events/2024-05-01.json", b"{\"a\":1}\n", true).await;
        assert_eq!(first.kind(), Some(WriteKind::Created));
        assert!(fs.is_dir("/e/search_events"));

        let second = w.write("/e/search_events/2024-05-01.json", b"{\"a\":2}\n", true).await;
        assert_eq!(second.kind(), Some(WriteKind::Appended));
        assert_eq!(second.attempts.len(), 1);
        assert_eq!(fs.lines("/e/search_events/2024-05-01.json"), vec!["{\"a\":1}", "{\"a\":2}"]);
    }

    #[tokio::test(start_paused = true)]
    async fn large_attempt_budget_costs_nothing_on_success() {
        let fs = Arc::new(MemoryFs::new());
        let w = DurableWriter::new(
            fs.clone(),
            RetryPolicy { max_attempts: u32::MAX, retry_delay: Duration::from_secs(2) },
            Arc::new(ManualClock::at(1_714_557_600)),
        );

        let out = w.write("/e/f.json", b"1\n", true).await;
        assert_eq!(out.kind(), Some(WriteKind::Created));
        assert_eq!(out.attempts.len(), 1);
        assert!(out.attempts.capacity() < 16);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_when_append_not_intended() {
        let fs = Arc::new(MemoryFs::new());
        fs.seed_file("/e/snapshot.json", b"old\n");
        let out = writer(&fs).write("/e/snapshot.json", b"new\n", false).await;
        assert_eq!(out.kind(), Some(WriteKind::Overwritten));
        assert_eq!(fs.contents("/e/snapshot.json").unwrap(), b"new\n");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_with_linear_backoff() {
        let fs = Arc::new(MemoryFs::new());
        fs.seed_file("/e/f.json", b"1\n");
        fs.inject_fault(FaultOp::Append, "/e/f.json", FsErrorKind::Io, 2);

        let started = tokio::time::Instant::now();
        let out = writer(&fs).write("/e/f.json", b"2\n", true).await;

        assert_eq!(out.kind(), Some(WriteKind::Appended));
        assert_eq!(out.attempts.len(), 3);
        assert!(matches!(out.attempts[0].outcome, AttemptOutcome::RetryableFailure(_)));
        // 2s after attempt 1, 4s after attempt 2.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
        assert_eq!(fs.lines("/e/f.json"), vec!["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_read_modify_write_counts_as_attempt_failure() {
        let fs = Arc::new(MemoryFs::new());
        fs.seed_file("/e/f.json", b"1\n");
        fs.inject_fault(FaultOp::Append, "/e/f.json", FsErrorKind::LeaseConflict, 1);
        fs.inject_fault(FaultOp::Read, "/e/f.json", FsErrorKind::Io, 1);

        let out = writer(&fs).write("/e/f.json", b"2\n", true).await;
        assert_eq!(out.attempts.len(), 2);
        assert_eq!(out.kind(), Some(WriteKind::Appended));
        assert_eq!(fs.lines("/e/f.json"), vec!["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_path_carries_epoch_suffix() {
        let fs = Arc::new(MemoryFs::new());
        fs.seed_file("/e/f.json", b"1\n");
        fs.inject_fault(FaultOp::Append, "/e/f.json", FsErrorKind::Io, 5);

        let out = writer(&fs).write("/e/f.json", b"2\n", true).await;
        assert!(out.is_success());
        assert_eq!(out.kind(), Some(WriteKind::Fallback));
        assert_eq!(out.resolved_path(), "/e/f.json.1714557600");
        assert_eq!(out.attempts.len(), 6);
        assert_eq!(fs.lines("/e/f.json"), vec!["1"]);
        assert_eq!(fs.lines("/e/f.json.1714557600"), vec!["2"]);
        assert!(fs.ops().contains(&FsOp::Create { path: "/e/f.json.1714557600".into(), overwrite: false }));
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_never_clobbers_an_earlier_fallback() {
        let fs = Arc::new(MemoryFs::new());
        fs.seed_file("/e/f.json", b"1\n");
        fs.seed_file("/e/f.json.1714557600", b"earlier\n");
        fs.inject_fault(FaultOp::Append, "/e/f.json", FsErrorKind::Io, 5);

        let out = writer(&fs).write("/e/f.json", b"2\n", true).await;
        assert!(!out.is_success());
        assert_eq!(out.error().map(|e| e.kind()), Some(FsErrorKind::AlreadyExists));
        assert_eq!(fs.lines("/e/f.json.1714557600"), vec!["earlier"]);
    }
}
