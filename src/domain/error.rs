use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("validation error: param {param} requires value of {expected}")]
    FieldDecode {
        param: &'static str,
        expected: &'static str,
    },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn field_decode(param: &'static str, expected: &'static str) -> Self {
        Self::FieldDecode { param, expected }
    }

    /// Text handed back to clients; omits the `validation error:` prefix for plain violations.
    pub fn public_message(&self) -> String {
        match self {
            DomainError::Validation { message } => message.clone(),
            other => other.to_string(),
        }
    }
}
