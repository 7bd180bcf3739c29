use serde::Serialize;

/// Generic message recorded in the store when a fetch fails.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch products";
/// Generic message recorded in the store when a save fails.
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save changes";

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Gateway transport error: {0}")]
    Transport(String),

    #[error("Gateway returned HTTP {status}: {message}")]
    GatewayStatus { status: u16, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Circuit breaker open")]
    CircuitBreakerOpen,

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::StorageError(err.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::SerializationError(err.to_string())
        } else if let Some(status) = err.status() {
            ServiceError::GatewayStatus {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

impl ServiceError {
    /// True when the request never produced a usable answer from the gateway:
    /// connection problems, timeouts or an open circuit breaker.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::CircuitBreakerOpen)
    }

    /// True for errors raised before anything was sent or mutated.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_) | Self::NotFound(_))
    }

    /// Short category label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::GatewayStatus { .. } => "gateway_status",
            Self::SerializationError(_) => "serialization",
            Self::ValidationError(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::StorageError(_) => "storage",
            Self::ConfigError(_) => "config",
            Self::CircuitBreakerOpen => "circuit_open",
            Self::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(ServiceError::Transport("connection refused".into()).is_transport());
        assert!(ServiceError::CircuitBreakerOpen.is_transport());
        assert!(!ServiceError::GatewayStatus {
            status: 500,
            message: "boom".into()
        }
        .is_transport());
        assert!(!ServiceError::SerializationError("eof".into()).is_transport());
    }

    #[test]
    fn json_errors_map_to_serialization() {
        let err: ServiceError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert_eq!(err.kind(), "serialization");
    }
}
