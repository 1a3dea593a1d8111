//! Error types for the harness domain

use std::fmt;
use thiserror::Error;

/// Error kind string reported by a remote instance, e.g. `banned_from_community`.
///
/// Kept verbatim so scenarios can assert on the exact rejection they expect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteErrorKind(String);

impl RemoteErrorKind {
    pub fn new<S: Into<String>>(kind: S) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for RemoteErrorKind {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Remote kinds that reject the caller's credentials.
const AUTH_KINDS: &[&str] = &[
    "incorrect_login",
    "not_logged_in",
    "incorrect_totp_token",
    "email_not_verified",
    "registration_application_pending",
];

/// Remote kinds that reject an action because of role, ban, lock or visibility state.
const PERMISSION_KINDS: &[&str] = &[
    "banned_from_community",
    "site_ban",
    "person_is_banned_from_site",
    "not_a_moderator",
    "not_an_admin",
    "not_top_mod",
    "no_post_edit_allowed",
    "no_comment_edit_allowed",
    "locked",
    "private_community",
    "only_mods_can_post_in_community",
    "community_is_blocked",
    "instance_is_blocked",
    "person_is_blocked",
    "deleted",
];

/// Core error type for harness operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Authentication rejected during {operation}: {kind}")]
    Auth {
        operation: String,
        kind: RemoteErrorKind,
    },

    #[error("Not found during {operation}: {kind}")]
    NotFound {
        operation: String,
        kind: RemoteErrorKind,
    },

    #[error("Validation error during {operation}: {kind}")]
    Validation {
        operation: String,
        kind: RemoteErrorKind,
    },

    #[error("Permission denied during {operation}: {kind}")]
    Permission {
        operation: String,
        kind: RemoteErrorKind,
    },

    #[error("Operation timeout: {operation} not satisfied within {timeout_ms}ms after {attempts} attempts")]
    Timeout {
        operation: String,
        timeout_ms: u64,
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("State transition error: {message}")]
    StateTransition { message: String },

    #[error("Assertion failed: {message}")]
    Assertion { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Configuration {
            message: format!("invalid URL: {}", err),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl Error {
    /// Classify an error reported by a remote instance.
    ///
    /// `status` is the HTTP status and `kind` the `error` field of the body.
    pub fn from_remote<S: Into<String>>(operation: S, status: u16, kind: &str) -> Self {
        let operation = operation.into();
        let remote = RemoteErrorKind::new(kind);

        if AUTH_KINDS.contains(&kind) || status == 401 {
            Error::Auth {
                operation,
                kind: remote,
            }
        } else if kind == "not_found" || kind.starts_with("couldnt_find") || status == 404 {
            Error::NotFound {
                operation,
                kind: remote,
            }
        } else if PERMISSION_KINDS.contains(&kind) || status == 403 {
            Error::Permission {
                operation,
                kind: remote,
            }
        } else if (400..500).contains(&status) {
            Error::Validation {
                operation,
                kind: remote,
            }
        } else {
            Error::Transport(format!("{} failed with status {}: {}", operation, status, kind))
        }
    }

    /// Create a timeout error for a convergence wait
    pub fn timeout<S: Into<String>>(
        operation: S,
        timeout_ms: u64,
        attempts: u32,
        last_error: Option<String>,
    ) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
            attempts,
            last_error,
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a state transition error
    pub fn state_transition<S: Into<String>>(message: S) -> Self {
        Self::StateTransition {
            message: message.into(),
        }
    }

    /// Create an assertion failure
    pub fn assertion<S: Into<String>>(message: S) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, Error::Permission { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// The remote error kind, if this error came from an instance
    pub fn remote_kind(&self) -> Option<&RemoteErrorKind> {
        match self {
            Error::Auth { kind, .. }
            | Error::NotFound { kind, .. }
            | Error::Validation { kind, .. }
            | Error::Permission { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Get the error category for logging and reports
    pub fn category(&self) -> &'static str {
        match self {
            Error::Auth { .. } => "auth",
            Error::NotFound { .. } => "not_found",
            Error::Validation { .. } => "validation",
            Error::Permission { .. } => "permission",
            Error::Timeout { .. } => "timeout",
            Error::Transport(_) => "transport",
            Error::Serialization(_) => "serialization",
            Error::Configuration { .. } => "configuration",
            Error::InvalidLocator(_) => "invalid_locator",
            Error::StateTransition { .. } => "state_transition",
            Error::Assertion { .. } => "assertion",
            Error::Internal(_) => "internal",
        }
    }
}

/// Convenience result type for harness operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_classification() {
        let err = Error::from_remote("login", 400, "incorrect_login");
        assert!(err.is_auth());
        assert_eq!(err.category(), "auth");

        let err = Error::from_remote("get_post", 400, "not_found");
        assert!(err.is_not_found());

        let err = Error::from_remote("create_post", 400, "couldnt_find_community");
        assert!(err.is_not_found());
        assert_eq!(err.remote_kind().unwrap(), &"couldnt_find_community");

        let err = Error::from_remote("create_post", 400, "banned_from_community");
        assert!(err.is_permission());

        let err = Error::from_remote("create_community", 400, "community_already_exists");
        assert!(err.is_validation());
        assert!(!err.is_permission());
    }

    #[test]
    fn test_server_errors_are_transport() {
        let err = Error::from_remote("get_site", 502, "bad gateway");
        assert_eq!(err.category(), "transport");
        assert!(err.remote_kind().is_none());
    }

    #[test]
    fn test_unauthorized_status_wins_over_unknown_kind() {
        let err = Error::from_remote("get_my_user", 401, "something_new");
        assert!(err.is_auth());
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout("post visible on beta", 10_000, 21, Some("boom".into()));
        let display = err.to_string();
        assert!(err.is_timeout());
        assert!(display.contains("post visible on beta"));
        assert!(display.contains("10000ms"));
        assert!(display.contains("21 attempts"));
    }

    #[test]
    fn test_error_from_conversions() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.category(), "serialization");

        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert_eq!(err.category(), "configuration");
    }
}
