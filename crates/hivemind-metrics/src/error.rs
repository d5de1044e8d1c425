use thiserror::Error;

pub type ObserveResult<T> = Result<T, ObserveError>;

#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("invalid {field}: '{value}' is not a recognised value")]
    InvalidEventKind { field: &'static str, value: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("payload too large: {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage task join error: {0}")]
    Task(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

impl ObserveError {
    /// True for errors caused by the caller's input rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidEventKind { .. }
                | Self::InvalidFilter(_)
                | Self::InvalidInput(_)
                | Self::PayloadTooLarge { .. }
        )
    }

    pub fn invalid_kind(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidEventKind {
            field,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ObserveError;

    #[test]
    fn validation_errors_are_classified_apart_from_store_failures() {
        assert!(ObserveError::invalid_kind("eventType", "Bogus").is_validation());
        assert!(ObserveError::PayloadTooLarge { size: 10, max: 5 }.is_validation());
        assert!(!ObserveError::StoreUnavailable("down".into()).is_validation());
        assert!(!ObserveError::Task("join".into()).is_validation());
    }

    #[test]
    fn invalid_kind_message_names_field_and_value() {
        let error = ObserveError::invalid_kind("sourceApp", "cursor");
        assert_eq!(
            error.to_string(),
            "invalid sourceApp: 'cursor' is not a recognised value"
        );
    }
}
