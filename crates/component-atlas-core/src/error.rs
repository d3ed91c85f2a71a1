//! Error taxonomy and the structured result exposed to callers.
//!
//! Input errors (bad repository identifiers, empty candidate lists) are
//! values of [`AtlasError`]. Unavailable collaborators are never errors at
//! this layer: they degrade to "no signal" inside the operations.

use serde::Serialize;
use thiserror::Error;

/// Result alias for core operations that validate their inputs.
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Errors a core operation can report back to its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    /// Missing or malformed repository identifier.
    #[error("invalid repository identifier: {0:?}")]
    InvalidRepository(String),

    /// Scoring was requested with no candidate repositories.
    #[error("no candidate repositories supplied")]
    EmptyCandidates,

    /// Any other malformed argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced component or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backing store failed while serving a request.
    #[error("store error: {0}")]
    Store(String),
}

impl AtlasError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<anyhow::Error> for AtlasError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(format!("{:#}", err))
    }
}

/// Validate a repository identifier (`owner/name` or a bare name).
///
/// Identifiers must be non-empty, contain no whitespace or control
/// characters, and have no empty path segments.
pub fn validate_repository(repository: &str) -> Result<()> {
    let trimmed = repository.trim();
    let malformed = trimmed.is_empty()
        || trimmed.len() != repository.len()
        || repository
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        || repository.split('/').any(|segment| segment.is_empty());
    if malformed {
        return Err(AtlasError::InvalidRepository(repository.to_string()));
    }
    Ok(())
}

/// Structured success/failure envelope handed to the skill and CLI layer.
///
/// A successful operation that found nothing is `Success` with empty data;
/// `Failure` means the request could not be completed.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Success { success: bool, data: T },
    Failure { success: bool, error: String },
}

impl<T> Outcome<T> {
    pub fn success(data: T) -> Self {
        Outcome::Success {
            success: true,
            data,
        }
    }

    pub fn failure(error: impl std::fmt::Display) -> Self {
        Outcome::Failure {
            success: false,
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl<T, E: std::fmt::Display> From<std::result::Result<T, E>> for Outcome<T> {
    fn from(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(data) => Outcome::success(data),
            Err(e) => Outcome::failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_owner_name_and_bare_names() {
        assert!(validate_repository("acme/payments").is_ok());
        assert!(validate_repository("repoA").is_ok());
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for bad in ["", "  ", "acme/", "/x", "a b", "acme//x", " acme/x"] {
            assert_eq!(
                validate_repository(bad),
                Err(AtlasError::InvalidRepository(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn outcome_serializes_success_and_failure() {
        let ok: Outcome<Vec<u32>> = Outcome::success(vec![]);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": []}));

        let err: Outcome<Vec<u32>> = Outcome::failure(AtlasError::EmptyCandidates);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "no candidate repositories supplied");
    }
}
