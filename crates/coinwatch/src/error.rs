use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Server error ({status}): {message}")]
    Server { status: StatusCode, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Token storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Text a view should show for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Auth(msg) | ClientError::Validation(msg) => msg.clone(),
            ClientError::Server { message, .. } => message.clone(),
            ClientError::Network(e) => {
                tracing::debug!("Network error surfaced to view: {e}");
                "Something went wrong. Please try again.".to_string()
            }
            ClientError::Decode(_) => "Unexpected response from server.".to_string(),
            ClientError::Io(_) | ClientError::Config(_) => self.to_string(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            ClientError::Network(e) => e.status(),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
