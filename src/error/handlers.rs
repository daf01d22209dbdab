//! Standardized error handling for HTTP responses and network failures

use crate::error::RegistryError;
use reqwest::StatusCode;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle registry-related HTTP errors
    pub fn handle_registry_error(
        status: StatusCode,
        error_text: &str,
        operation: &str,
    ) -> RegistryError {
        match status.as_u16() {
            401 => RegistryError::Auth(format!(
                "Unauthorized to perform {} operation: {}",
                operation, error_text
            )),
            403 => RegistryError::Auth(format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            )),
            404 => RegistryError::NotFound(format!(
                "Resource not found for {}: {}",
                operation, error_text
            )),
            429 => RegistryError::Registry(format!(
                "Rate limited during {}: {}",
                operation, error_text
            )),
            500 => RegistryError::Registry(format!(
                "Registry server error during {}: {}",
                operation, error_text
            )),
            502 | 503 => RegistryError::Registry(format!(
                "Registry unavailable for {}: {}",
                operation, error_text
            )),
            _ => RegistryError::Registry(format!(
                "{} failed (status {}): {}",
                operation, status, error_text
            )),
        }
    }

    /// Handle upload-related HTTP errors on the destination
    pub fn handle_upload_error(
        status: StatusCode,
        error_text: &str,
        context: &str,
    ) -> RegistryError {
        let error_msg = match status.as_u16() {
            400 => {
                if error_text.contains("DIGEST_INVALID") {
                    format!(
                        "Digest validation failed during {} - uploaded content doesn't match: {}",
                        context, error_text
                    )
                } else {
                    format!("Bad request during {}: {}", context, error_text)
                }
            }
            401 => format!("Authentication failed during {}: {}", context, error_text),
            403 => format!("Permission denied for {}: {}", context, error_text),
            404 => format!(
                "Repository not found or {} session expired: {}",
                context, error_text
            ),
            413 => format!("Content too large for {}: {}", context, error_text),
            500 => format!("Registry server error during {}: {}", context, error_text),
            502 | 503 => format!("Registry unavailable during {}: {}", context, error_text),
            507 => format!("Registry out of storage during {}: {}", context, error_text),
            _ => format!("{} failed (status {}): {}", context, status, error_text),
        };

        RegistryError::Transfer(error_msg)
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> RegistryError {
        if error.is_timeout() {
            RegistryError::Timeout(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            RegistryError::Network(format!("Connection error during {}: {}", context, error))
        } else if error.to_string().contains("certificate") {
            RegistryError::Network(format!(
                "TLS certificate error during {} (try --ignore-certs): {}",
                context, error
            ))
        } else {
            RegistryError::Network(format!("{} network error: {}", context, error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_mapping() {
        let err =
            HttpErrorHandler::handle_registry_error(StatusCode::NOT_FOUND, "nope", "tag listing");
        assert!(matches!(err, RegistryError::NotFound(_)));

        let err = HttpErrorHandler::handle_registry_error(StatusCode::UNAUTHORIZED, "", "catalog");
        assert!(matches!(err, RegistryError::Auth(_)));

        let err = HttpErrorHandler::handle_registry_error(StatusCode::IM_A_TEAPOT, "x", "catalog");
        assert!(err.to_string().contains("catalog failed (status 418"));
    }

    #[test]
    fn test_upload_error_is_transfer_error() {
        let err = HttpErrorHandler::handle_upload_error(
            StatusCode::BAD_REQUEST,
            "DIGEST_INVALID",
            "blob upload",
        );
        match err {
            RegistryError::Transfer(msg) => assert!(msg.contains("Digest validation failed")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
