//! Error types for the Repobot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Repobot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Code-hosting platform errors ---
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    // --- Registry construction errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Failures reported by a code-hosting platform.
///
/// The `Display` text is what ends up in the transcript, so it carries the
/// platform's own message rather than a wrapped error chain.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Not Found")]
    NotFound,

    #[error("{0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("the specified path is not a file")]
    NotAFile,
}

impl HostError {
    /// HTTP status associated with the failure, if the platform answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            HostError::Api { status, .. } => Some(*status),
            HostError::NotFound => Some(404),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("action '{name}' is exposed by both '{first}' and '{second}'")]
    DuplicateAction {
        name: String,
        first: String,
        second: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn host_error_keeps_platform_message() {
        let err = HostError::Api {
            status: 422,
            message: "Reference already exists".into(),
        };
        assert_eq!(err.to_string(), "Reference already exists");
        assert_eq!(err.status(), Some(422));
        assert_eq!(HostError::NotFound.status(), Some(404));
        assert_eq!(HostError::Network("reset".into()).status(), None);
    }

    #[test]
    fn duplicate_action_names_both_owners() {
        let err = RegistryError::DuplicateAction {
            name: "readFile".into(),
            first: "reader".into(),
            second: "writer".into(),
        };
        let text = err.to_string();
        assert!(text.contains("readFile"));
        assert!(text.contains("reader"));
        assert!(text.contains("writer"));
    }
}
