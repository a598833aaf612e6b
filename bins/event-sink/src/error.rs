#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("filesystem: {0}")]
    Fs(#[from] sink_api::FsError),

    #[error("{0}")]
    Ingest(#[from] ingest::IngestError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}

impl SinkError {
    /// Process exit status: 2 when the broker never came up, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            SinkError::Ingest(ingest::IngestError::BrokerUnavailable { .. }) => 2,
            _ => 1,
        }
    }
}
