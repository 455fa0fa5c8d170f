//! Matchcast Error Types
//!
//! This module defines a layered error hierarchy:
//! - `DomainError`: Business rule failures (config, missing match, invariants)
//! - `InfraError`: Infrastructure failures (IO, serialization, database, store availability)
//! - `MatchcastError`: Top-level error that wraps both categories

use std::fmt;

/// Domain-level errors representing business logic failures
#[derive(Debug)]
pub enum DomainError {
    /// Configuration file not found at the specified path
    ConfigNotFound { path: String },
    /// Configuration validation failed
    ConfigInvalid { field: String, reason: String },
    /// Configuration parsing failed
    ConfigParse { source: String },
    /// Referenced match does not exist
    MatchNotFound { id: String },
    /// A lifecycle invariant was about to be broken
    Invariant { reason: String },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigNotFound { path } => write!(f, "Config not found: {}", path),
            Self::ConfigInvalid { field, reason } => {
                write!(f, "Config invalid [{}]: {}", field, reason)
            }
            Self::ConfigParse { source } => write!(f, "Config parse error: {}", source),
            Self::MatchNotFound { id } => write!(f, "Match with ID {} not found", id),
            Self::Invariant { reason } => write!(f, "Invariant violated: {}", reason),
        }
    }
}

impl std::error::Error for DomainError {}

/// Infrastructure-level errors representing external system failures
#[derive(Debug)]
pub enum InfraError {
    /// IO operation failed
    Io(std::io::Error),
    /// JSON serialization/deserialization failed
    Json(serde_json::Error),
    /// YAML serialization/deserialization failed
    Yaml(serde_yml::Error),
    /// Database operation failed
    Database(rusqlite::Error),
    /// A backing store could not be reached
    StoreUnavailable { store: String, reason: String },
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Json(err) => write!(f, "JSON error: {}", err),
            Self::Yaml(err) => write!(f, "YAML error: {}", err),
            Self::Database(err) => write!(f, "Database error: {}", err),
            Self::StoreUnavailable { store, reason } => {
                write!(f, "Store unavailable [{}]: {}", store, reason)
            }
        }
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Yaml(e) => Some(e),
            Self::Database(e) => Some(e),
            Self::StoreUnavailable { .. } => None,
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<serde_yml::Error> for InfraError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Yaml(err)
    }
}

impl From<rusqlite::Error> for InfraError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

/// Top-level error type for Matchcast
///
/// Wraps domain and infrastructure errors so callers can either propagate a
/// single type or match on the category they care about. The tick scheduler
/// uses [`MatchcastError::is_transient`] to decide whether a failed batch is
/// worth another attempt.
#[derive(Debug)]
pub enum MatchcastError {
    /// Business logic error
    Domain(DomainError),
    /// Infrastructure/external system error
    Infra(InfraError),
    /// Generic error for edge cases
    Other(String),
}

impl fmt::Display for MatchcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{}", e),
            Self::Infra(e) => write!(f, "{}", e),
            Self::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for MatchcastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Infra(e) => Some(e),
            Self::Other(_) => None,
        }
    }
}

impl From<DomainError> for MatchcastError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<InfraError> for MatchcastError {
    fn from(err: InfraError) -> Self {
        Self::Infra(err)
    }
}

// Convenience conversions from infrastructure error sources
impl From<std::io::Error> for MatchcastError {
    fn from(err: std::io::Error) -> Self {
        Self::Infra(InfraError::Io(err))
    }
}

impl From<serde_json::Error> for MatchcastError {
    fn from(err: serde_json::Error) -> Self {
        Self::Infra(InfraError::Json(err))
    }
}

impl From<serde_yml::Error> for MatchcastError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Infra(InfraError::Yaml(err))
    }
}

impl From<rusqlite::Error> for MatchcastError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Infra(InfraError::Database(err))
    }
}

impl From<tokio::task::JoinError> for MatchcastError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Other(format!("blocking task failed: {}", err))
    }
}

impl MatchcastError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigNotFound { path: path.into() })
    }

    pub fn config_parse_error(source: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigParse {
            source: source.into(),
        })
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn match_not_found(id: impl Into<String>) -> Self {
        Self::Domain(DomainError::MatchNotFound { id: id.into() })
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::Domain(DomainError::Invariant {
            reason: reason.into(),
        })
    }

    pub fn store_unavailable(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Infra(InfraError::StoreUnavailable {
            store: store.into(),
            reason: reason.into(),
        })
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Infra(InfraError::StoreUnavailable { .. })
            | Self::Infra(InfraError::Database(_))
            | Self::Infra(InfraError::Io(_)) => true,
            Self::Infra(_) | Self::Domain(_) => false,
            Self::Other(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_is_transient() {
        let err = MatchcastError::store_unavailable("postgres", "connection refused");
        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "Store unavailable [postgres]: connection refused"
        );
    }

    #[test]
    fn test_domain_errors_are_not_transient() {
        assert!(!MatchcastError::match_not_found("m-1").is_transient());
        assert!(!MatchcastError::invariant("status went backwards").is_transient());
    }

    #[test]
    fn test_not_found_message() {
        let err = MatchcastError::match_not_found("abc");
        assert_eq!(err.to_string(), "Match with ID abc not found");
    }
}
