use thiserror::Error;

/// Failure of one provider call.
///
/// The `Display` text is what retry conditions inspect, so status codes map to
/// the phrases `is_transient_message` recognises.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("missing credential {variable} for provider {provider}")]
    CredentialMissing { provider: String, variable: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("{}", describe_status(*status, body))]
    Provider { status: u16, body: String },
    #[error("provider response is not valid JSON: {0}")]
    MalformedResponse(String),
    #[error("provider returned an empty response")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CredentialMissing,
    TransientNetwork,
    RateLimited,
    GatewayTimeout,
    MalformedResponse,
    EmptyResponse,
    Rejected,
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::CredentialMissing { .. } => ErrorKind::CredentialMissing,
            AgentError::Network(_) | AgentError::Timeout(_) => ErrorKind::TransientNetwork,
            AgentError::Provider { status: 429, .. } => ErrorKind::RateLimited,
            AgentError::Provider { status: 504, .. } => ErrorKind::GatewayTimeout,
            AgentError::Provider { status, .. } if *status >= 500 => ErrorKind::TransientNetwork,
            AgentError::Provider { .. } => ErrorKind::Rejected,
            AgentError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            AgentError::EmptyResponse => ErrorKind::EmptyResponse,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientNetwork
                | ErrorKind::RateLimited
                | ErrorKind::GatewayTimeout
                | ErrorKind::MalformedResponse
        )
    }
}

fn describe_status(status: u16, body: &str) -> String {
    let label = match status {
        429 => "rate limit exceeded",
        504 => "gateway timeout",
        500..=599 => "server error",
        _ => "request rejected",
    };
    if body.is_empty() {
        format!("provider {label} (HTTP {status})")
    } else {
        format!("provider {label} (HTTP {status}): {body}")
    }
}
