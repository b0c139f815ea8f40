//! Service error taxonomy
//!
//! Maps onto conventional REST status classes: validation (400), auth (401),
//! ownership (403), missing rows (404), unmet preconditions (422), and
//! upstream dependency failures (500). Detailed diagnostics stay in logs;
//! end users only ever see the generic message for 5xx.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("access denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("upstream dependency failure")]
    Upstream(#[source] anyhow::Error),
}

impl ServiceError {
    /// REST status class this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::Unauthorized => 401,
            ServiceError::Forbidden => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Precondition(_) => 422,
            ServiceError::Upstream(_) => 500,
        }
    }

    /// Text safe to show an end user. Upstream failures are collapsed to a
    /// generic message; the chain is logged server-side instead.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Upstream(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Upstream(err)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Upstream(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServiceError::Validation("x".into()).status_code(), 400);
        assert_eq!(ServiceError::Unauthorized.status_code(), 401);
        assert_eq!(ServiceError::Forbidden.status_code(), 403);
        assert_eq!(ServiceError::NotFound("child").status_code(), 404);
        assert_eq!(ServiceError::Precondition("x".into()).status_code(), 422);
    }

    #[test]
    fn test_upstream_message_is_generic() {
        let err = ServiceError::Upstream(anyhow::anyhow!("pinecone timeout at 10.0.0.3"));
        assert!(!err.user_message().contains("pinecone"));
    }
}
