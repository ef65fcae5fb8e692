use thiserror::Error;

/// Result type for relational store operations
pub type RecordResult<T> = Result<T, RecordError>;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record not found: {table}/{id}")]
    NotFound { table: &'static str, id: String },

    #[error("Invalid record request: {message}")]
    Invalid { message: String },

    #[error("Request to {table} failed with status {status}: {body}")]
    Status {
        table: &'static str,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Could not decode response: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },
}

impl RecordError {
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn not_found<S: ToString>(table: &'static str, id: S) -> Self {
        Self::NotFound {
            table,
            id: id.to_string(),
        }
    }
}
