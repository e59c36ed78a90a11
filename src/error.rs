use thiserror::Error;

/// Failures a single pipeline stage can hit while talking to the analytics
/// service. Each stage handles its own; none of these cross into a sibling.
///
/// An empty post collection is not represented here: the derived stages
/// treat it as a no-op and never reach the network.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Transport unreachable, refused or timed out.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// Payload did not have the expected shape.
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        endpoint: &'static str,
        reason: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    pub fn malformed(endpoint: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::MalformedResponse {
            endpoint,
            reason: reason.into(),
        }
    }

    /// Short machine label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Network(_) => "network",
            PipelineError::Status { .. } => "status",
            PipelineError::MalformedResponse { .. } => "malformed_response",
            PipelineError::InvalidRequest(_) => "invalid_request",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
