//! Error types for the caseflow data model

/// Model-level errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// An id was missing or not a positive integer
    #[error("invalid {field}: {value}")]
    InvalidId {
        /// Field name as the backend spells it
        field: &'static str,
        /// Rendering of the rejected value
        value: String,
    },

    /// A response body could not be decoded into the expected record
    #[error("could not decode {what}: {source}")]
    Decode {
        /// Record kind being decoded
        what: &'static str,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// A response envelope carried no usable payload
    #[error("empty response envelope for {0}")]
    EmptyEnvelope(&'static str),
}

impl ModelError {
    /// Check if this error came from caller input rather than the backend
    #[inline]
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidId { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_id_display() {
        let err = ModelError::InvalidId {
            field: "taskId",
            value: "NaN".to_string(),
        };
        assert_eq!(err.to_string(), "invalid taskId: NaN");
        assert!(err.is_input_error());
    }

    #[test]
    fn envelope_error_is_not_input() {
        assert!(!ModelError::EmptyEnvelope("case").is_input_error());
    }
}
