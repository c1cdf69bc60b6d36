use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("failed to load presets from `{path}`: {reason}")]
    Presets { path: String, reason: String },
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn presets(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Presets {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
