/// Category of a filesystem error. The write engine branches on it:
/// a lease conflict is demoted to read-modify-write, everything else
/// is an attempt failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    /// Path does not exist.
    NotFound,
    /// Another writer holds the lease on the file, or the file is in
    /// lease recovery.
    LeaseConflict,
    /// Target exists and the call refused to overwrite it.
    AlreadyExists,
    /// Network or remote I/O failure, transient, may retry.
    Io,
    /// Unexpected status or response body from the backend.
    Protocol,
    /// Invalid configuration, permanent, fail at startup.
    Config,
}

impl std::fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsErrorKind::NotFound => f.write_str("not_found"),
            FsErrorKind::LeaseConflict => f.write_str("lease_conflict"),
            FsErrorKind::AlreadyExists => f.write_str("already_exists"),
            FsErrorKind::Io => f.write_str("io"),
            FsErrorKind::Protocol => f.write_str("protocol"),
            FsErrorKind::Config => f.write_str("config"),
        }
    }
}

/// Unified error type for all `DistributedFs` methods.
///
/// Carries an `FsErrorKind` for categorization and a human-readable message.
#[derive(Clone, PartialEq, Eq)]
pub struct FsError {
    kind: FsErrorKind,
    message: String,
}

impl FsError {
    pub fn new(kind: FsErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn not_found(path: &str) -> Self {
        Self { kind: FsErrorKind::NotFound, message: format!("{path}: no such file or directory") }
    }

    /// Lease held by another client or lease recovery in progress.
    pub fn lease_conflict(msg: impl Into<String>) -> Self {
        Self { kind: FsErrorKind::LeaseConflict, message: msg.into() }
    }

    pub fn already_exists(path: &str) -> Self {
        Self { kind: FsErrorKind::AlreadyExists, message: format!("{path}: already exists") }
    }

    /// I/O error, transient, may retry.
    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: FsErrorKind::Io, message: msg.into() }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self { kind: FsErrorKind::Protocol, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: FsErrorKind::Config, message: msg.into() }
    }

    pub fn kind(&self) -> FsErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_lease_conflict(&self) -> bool {
        self.kind == FsErrorKind::LeaseConflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FsErrorKind::NotFound
    }
}

impl std::fmt::Debug for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FsError {}

// ════════════════════════════════════════════════════════════════
//  FeedError
// ════════════════════════════════════════════════════════════════

/// Ошибка источника сообщений (брокер недоступен, сессия потеряна,
/// commit не прошёл). Всегда уровня соединения: consumer loop
/// перезапускает подписку.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedError {
    message: String,
}

impl FeedError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[feed] {}", self.message)
    }
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FeedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_includes_kind() {
        let e = FsError::lease_conflict("holder: DFSClient_1");
        assert_eq!(format!("{e:?}"), "[lease_conflict] holder: DFSClient_1");
        assert_eq!(e.to_string(), "holder: DFSClient_1");
    }
}
