use thiserror::Error;

/// Every failure the dashboard can surface to the user.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DashboardError {
    /// Rejected locally, before any request was issued.
    #[error("{0}")]
    Validation(String),
    /// The request never produced a usable body (network, timeout, non-JSON, bad shape).
    #[error("{0}")]
    Transport(String),
    /// The server answered with an explicit `error` field; message kept verbatim.
    #[error("{0}")]
    Server(String),
}

impl DashboardError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Server(_) => "server",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m) | Self::Transport(m) | Self::Server(m) => m,
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Self::Transport(format!("invalid response body: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transport(format!("unexpected response shape: {}", err))
    }
}

pub type DashboardResult<T> = std::result::Result<T, DashboardError>;
