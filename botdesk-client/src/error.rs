use thiserror::Error;

/// All errors generated in `botdesk-client`.
#[derive(Debug, Error)]
pub enum DashError {
    /// Push-channel failure. Recovered automatically up to the reconnect
    /// attempt budget, then surfaced as a persistent Disconnected state.
    #[error("transport error: {0}")]
    Transport(String),

    /// REST call failure. Logged for periodic purposes (previous good render
    /// preserved), propagated to the caller for one-shot lookups.
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Malformed payload shape. Rendered as an inline error state in place
    /// of the affected view, never thrown up the stack.
    #[error("invalid payload: {0}")]
    Validation(String),

    /// Empty/invalid user entry. Rejected synchronously before any request
    /// is made.
    #[error("invalid input: {0}")]
    UserInput(String),
}

impl DashError {
    /// Short tag used as the prefix of inline error rows and banners.
    pub fn label(&self) -> &'static str {
        match self {
            DashError::Transport(_) => "transport",
            DashError::Fetch(_) => "fetch",
            DashError::Validation(_) => "validation",
            DashError::UserInput(_) => "input",
        }
    }

    /// Whether this error originates from the user's own entry rather than
    /// from a background update.
    pub fn is_user_input(&self) -> bool {
        matches!(self, DashError::UserInput(_))
    }
}

impl From<serde_json::Error> for DashError {
    fn from(value: serde_json::Error) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DashError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let malformed = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        assert_eq!(DashError::from(malformed).label(), "validation");
        assert_eq!(DashError::Transport("gone".into()).label(), "transport");
        assert!(DashError::UserInput("empty".into()).is_user_input());
        assert!(!DashError::Transport("gone".into()).is_user_input());
    }
}
