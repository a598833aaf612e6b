use reqwest::StatusCode;
use sink_api::{FileKind, FileStatus, FsError, FsErrorKind};

// ════════════════════════════════════════════════════════════════
//  WebHDFS JSON bodies
// ════════════════════════════════════════════════════════════════

#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FileStatusEnvelope {
    pub file_status: RawFileStatus,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ListEnvelope {
    pub file_statuses: FileStatuses,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FileStatuses {
    #[serde(default)]
    pub file_status: Vec<RawFileStatus>,
}

#[derive(serde::Deserialize)]
pub(crate) struct RawFileStatus {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub length: u64,
    #[serde(default, rename = "pathSuffix")]
    pub path_suffix: String,
}

impl RawFileStatus {
    pub fn into_status(self) -> FileStatus {
        match self.kind.as_str() {
            "DIRECTORY" => FileStatus::directory(),
            _ => FileStatus { kind: FileKind::File, length: self.length },
        }
    }
}

#[derive(serde::Deserialize)]
pub(crate) struct BooleanResponse {
    pub boolean: bool,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteExceptionEnvelope {
    remote_exception: RemoteException,
}

#[derive(serde::Deserialize)]
struct RemoteException {
    #[serde(default)]
    exception: String,
    #[serde(default)]
    message: String,
}

// ════════════════════════════════════════════════════════════════
//  Error classification
// ════════════════════════════════════════════════════════════════

/// Классифицировать RemoteException namenode/datanode.
///
/// Lease conflicts surface under several exception names depending on the
/// Hadoop version, so the message text is checked as well.
pub(crate) fn classify_exception(exception: &str, message: &str) -> FsErrorKind {
    match exception {
        "FileNotFoundException" => FsErrorKind::NotFound,
        "FileAlreadyExistsException" => FsErrorKind::AlreadyExists,
        "AlreadyBeingCreatedException" | "RecoveryInProgressException" | "LeaseExpiredException" => {
            FsErrorKind::LeaseConflict
        }
        _ => {
            let lower = message.to_lowercase();
            if lower.contains("lease") || lower.contains("recovery") {
                FsErrorKind::LeaseConflict
            } else {
                FsErrorKind::Io
            }
        }
    }
}

/// Build an `FsError` from a non-success response.
pub(crate) fn remote_error(status: StatusCode, body: &str, path: &str) -> FsError {
    if let Ok(env) = serde_json::from_str::<RemoteExceptionEnvelope>(body) {
        let ex = env.remote_exception;
        let kind = classify_exception(&ex.exception, &ex.message);
        return FsError::new(kind, format!("{path}: {} ({}): {}", ex.exception, status.as_u16(), ex.message));
    }

    let kind = if status == StatusCode::NOT_FOUND {
        FsErrorKind::NotFound
    } else if status.is_server_error() {
        FsErrorKind::Io
    } else {
        FsErrorKind::Protocol
    };
    let body = body.trim();
    FsError::new(kind, format!("{path}: HTTP {}: {body}", status.as_u16()))
}
