//! Error types for the realtime transport

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No bearer token in the token store
    #[error("No authentication token")]
    MissingToken,

    /// Socket could not be opened
    #[error("connection failed: {0}")]
    Connect(String),

    /// Operation needs an open socket
    #[error("socket is not open")]
    NotConnected,

    /// Outbound message could not be encoded
    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// Token store could not be read or written
    #[error("token store error: {0}")]
    TokenStore(String),
}

impl TransportError {
    /// Whether the reconnect loop should keep trying after this error
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_message_matches_status_text() {
        assert_eq!(TransportError::MissingToken.to_string(), "No authentication token");
        assert!(!TransportError::MissingToken.is_retryable());
        assert!(TransportError::Connect("refused".into()).is_retryable());
    }
}
