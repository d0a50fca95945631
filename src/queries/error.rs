use crate::remote::RemoteError;
use crate::schema::ValidationErrors;

/// Why a query or mutation failed.
///
/// Every kind goes through the same log-and-toast path; the variant is kept
/// for callers that want to react programmatically (for example to show
/// field errors next to a form).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// The input did not pass its form schema; nothing was sent
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// The backend answered with a record that fails the canonical schema
    #[error("Unexpected response: {0}")]
    ResponseShape(ValidationErrors),

    #[error("{0}")]
    NotAuthenticated(String),

    #[error("Failed to encode request: {0}")]
    Encode(String),
}

impl QueryError {
    pub fn not_authenticated() -> Self {
        Self::NotAuthenticated("User not authenticated".to_string())
    }

    /// Field errors of a rejected input, if that is what this is
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }

    /// Short kind name used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Remote(_) => "remote",
            Self::ResponseShape(_) => "response_shape",
            Self::NotAuthenticated(_) => "not_authenticated",
            Self::Encode(_) => "encode",
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
