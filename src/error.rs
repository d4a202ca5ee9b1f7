//! Error types for the dashboard
//!
//! Errors are classified by recoverability:
//! - Retryable: network issues, timeouts, backend 5xx
//! - NonRetryable: configuration errors, malformed files, bad responses
//! - RequiresUserAction: no provider session, unknown provider code

use std::path::PathBuf;
use thiserror::Error;

use crate::records::RecordsError;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Records(#[from] RecordsError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to serialize {what}: {message}")]
    Serialization { what: String, message: String },

    #[error("No provider session. Log in with a provider code first")]
    NoProvider,

    #[error("Client refresh failed: {0}")]
    RefreshFailed(String),
}

impl DashboardError {
    pub fn serialization(what: impl Into<String>, err: serde_json::Error) -> Self {
        DashboardError::Serialization {
            what: what.into(),
            message: err.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::Records(e) => e.is_transient(),
            DashboardError::RefreshFailed(_) => true,
            _ => false,
        }
    }

    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            DashboardError::NoProvider | DashboardError::Records(RecordsError::ProviderNotFound(_))
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DashboardError::Records(RecordsError::ProviderNotFound(_)) => {
                "Check the provider code and log in again."
            }
            DashboardError::Records(RecordsError::InvalidUrl(_)) => {
                "Check apiBaseUrl in ~/.provider-dashboard/config.json"
            }
            DashboardError::Records(RecordsError::NotJson { .. }) => {
                "The backend returned an unexpected page. Check the API URL or try again later."
            }
            DashboardError::Records(e) if e.is_transient() => {
                "Check your internet connection and try again."
            }
            DashboardError::Records(_) => "The backend rejected the request. Try again later.",
            DashboardError::Configuration(_) => {
                "Check your configuration in ~/.provider-dashboard/config.json"
            }
            DashboardError::Parse { .. } => "Fix or delete the file and try again.",
            DashboardError::Io(_) => "Check file permissions and disk space.",
            DashboardError::Serialization { .. } => {
                "This is a bug in provider-dashboard. Please report it with the command you ran."
            }
            DashboardError::NoProvider => "Run `provider-dashboard login --code <CODE>`.",
            DashboardError::RefreshFailed(_) => "Check your connection and run the command again.",
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Io(err.to_string())
    }
}

/// Serializable error representation for the view layer
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&DashboardError> for ErrorReport {
    fn from(err: &DashboardError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        ErrorReport {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_5xx_is_retryable() {
        let err = DashboardError::from(RecordsError::Api {
            context: "Patients".into(),
            status: 503,
            message: "unavailable".into(),
        });
        let report = ErrorReport::from(&err);
        assert!(report.can_retry);
        assert_eq!(report.error_type, ErrorType::Retryable);
        assert_eq!(report.message, "API error for Patients: 503 unavailable");
    }

    #[test]
    fn test_unknown_provider_needs_user_action() {
        let err = DashboardError::from(RecordsError::ProviderNotFound("glow".into()));
        let report = ErrorReport::from(&err);
        assert!(!report.can_retry);
        assert_eq!(report.error_type, ErrorType::RequiresUserAction);
        assert!(report.recovery_suggestion.contains("provider code"));
    }

    #[test]
    fn test_configuration_error_not_retryable() {
        let err = DashboardError::Configuration("bad url".into());
        assert!(!err.is_retryable());
        assert!(!err.requires_user_action());
        let json = serde_json::to_value(ErrorReport::from(&err)).unwrap();
        assert_eq!(json["errorType"], "nonRetryable");
        assert_eq!(json["canRetry"], false);
    }

    #[test]
    fn test_serialization_error_is_not_a_parse_error() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = DashboardError::serialization("client page", source);
        assert!(matches!(err, DashboardError::Serialization { .. }));
        assert!(err.to_string().starts_with("Failed to serialize client page: "));

        let report = ErrorReport::from(&err);
        assert_eq!(report.error_type, ErrorType::NonRetryable);
        assert!(report.recovery_suggestion.contains("report"));
    }
}
