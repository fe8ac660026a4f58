use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Why an access check refused the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDenial {
    /// The order is bound to another account; re-authenticating as the owner fixes it
    NotOwner,
    /// The caller's role can never reach this order through this route
    RoleMismatch,
    /// The order left the customer edit window
    Locked,
}

/// Application errors, mapped onto HTTP responses at the boundary.
///
/// Validation failures of the order form are not represented here: the
/// validation engine returns a structured `ErrorTree` instead.
#[derive(Debug, Clone)]
pub enum BusinessError {
    /// Malformed request input (400 Bad Request)
    ValidationError { field: String, message: String },
    /// The order is not local yet and no workflow user accompanies the request (400)
    MissingExternalContext,
    /// No usable caller identity (401 Unauthorized)
    Unauthorized { message: String },
    /// Access check refused the caller (403 Forbidden)
    Forbidden { denial: AccessDenial, reason: String },
    /// Resource not found (404 Not Found)
    NotFound { resource: String, id: String },
    /// Write based on a stale copy of the order (409 Conflict)
    Conflict { message: String },
    /// Workflow tool failure: network, non-2xx, or failure body (502 Bad Gateway)
    UpstreamError { message: String },
    /// Workflow tool did not answer in time (504 Gateway Timeout)
    UpstreamTimeout { message: String },
    /// Persistence failure inside an order write (500)
    UpdateFailed { detail: String },
    /// Generic application error (500 Internal Server Error)
    InternalError { message: String },
}

impl BusinessError {
    pub fn code(&self) -> &'static str {
        match self {
            BusinessError::ValidationError { .. } => "VALIDATION_ERROR",
            BusinessError::MissingExternalContext => "MISSING_EXTERNAL_CONTEXT",
            BusinessError::Unauthorized { .. } => "UNAUTHORIZED",
            BusinessError::Forbidden {
                denial: AccessDenial::NotOwner,
                ..
            } => "NOT_OWNER",
            BusinessError::Forbidden {
                denial: AccessDenial::RoleMismatch,
                ..
            } => "ROLE_MISMATCH",
            BusinessError::Forbidden {
                denial: AccessDenial::Locked,
                ..
            } => "ORDER_LOCKED",
            BusinessError::NotFound { .. } => "NOT_FOUND",
            BusinessError::Conflict { .. } => "CONFLICT",
            BusinessError::UpstreamError { .. } => "UPSTREAM_ERROR",
            BusinessError::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            BusinessError::UpdateFailed { .. } => "UPDATE_FAILED",
            BusinessError::InternalError { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BusinessError::ValidationError { .. } | BusinessError::MissingExternalContext => {
                StatusCode::BAD_REQUEST
            }
            BusinessError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            BusinessError::Forbidden { .. } => StatusCode::FORBIDDEN,
            BusinessError::NotFound { .. } => StatusCode::NOT_FOUND,
            BusinessError::Conflict { .. } => StatusCode::CONFLICT,
            BusinessError::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
            BusinessError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            BusinessError::UpdateFailed { .. } | BusinessError::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Upstream failures can be retried by the caller; nothing retries them here.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BusinessError::UpstreamError { .. } | BusinessError::UpstreamTimeout { .. }
        )
    }
}

impl fmt::Display for BusinessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessError::ValidationError { field, message } => {
                write!(f, "Validation error in field '{field}': {message}")
            }
            BusinessError::MissingExternalContext => {
                write!(
                    f,
                    "Order is not available locally and no workflow user context was supplied"
                )
            }
            BusinessError::Unauthorized { message } => write!(f, "Unauthorized: {message}"),
            BusinessError::Forbidden { reason, .. } => write!(f, "{reason}"),
            BusinessError::NotFound { resource, id } => {
                write!(f, "{resource} with id '{id}' not found")
            }
            BusinessError::Conflict { message } => write!(f, "Conflict: {message}"),
            BusinessError::UpstreamError { message } => {
                write!(f, "External workflow sync failed: {message}")
            }
            BusinessError::UpstreamTimeout { message } => {
                write!(f, "External workflow timed out: {message}")
            }
            BusinessError::UpdateFailed { detail } => write!(f, "Update failed: {detail}"),
            BusinessError::InternalError { message } => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for BusinessError {}

/// Convert `BusinessError` to HTTP responses
impl IntoResponse for BusinessError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Upstream detail goes to the logs only; callers get a stable summary.
        let message = match &self {
            BusinessError::UpstreamError { message } => {
                tracing::warn!(upstream = %message, "workflow tool error");
                "External workflow sync failed".to_string()
            }
            BusinessError::UpstreamTimeout { message } => {
                tracing::warn!(upstream = %message, "workflow tool timeout");
                "External workflow timed out".to_string()
            }
            BusinessError::UpdateFailed { detail } => {
                tracing::error!(detail = %detail, "order update failed");
                "Update failed".to_string()
            }
            other => other.to_string(),
        };

        let mut error = json!({
            "code": code,
            "message": message,
            "type": format!("{self:?}").split([' ', '{']).next().unwrap_or("Unknown"),
            "retryable": self.is_retryable(),
        });
        if let BusinessError::UpdateFailed { detail } = &self {
            error["detail"] = json!(detail);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Maps `DbErr` into `BusinessError` with resource context
pub struct ErrorMapper;

impl ErrorMapper {
    pub fn map_db_error(err: DbErr, context: &str) -> BusinessError {
        if let Some(SqlErr::UniqueConstraintViolation(msg)) = err.sql_err() {
            return BusinessError::Conflict {
                message: format!("{} already exists: {msg}", Self::resource_name(context)),
            };
        }
        match err {
            DbErr::RecordNotFound(msg) => BusinessError::NotFound {
                resource: Self::resource_name(context),
                id: Self::extract_id_from_message(&msg),
            },
            DbErr::Conn(conn_err) => BusinessError::InternalError {
                message: format!("database connection: {conn_err}"),
            },
            _ => BusinessError::InternalError {
                message: err.to_string(),
            },
        }
    }

    /// Persistence failure inside an order write
    pub fn map_write_error(err: DbErr) -> BusinessError {
        match err {
            DbErr::RecordNotFound(msg) => BusinessError::NotFound {
                resource: "order".to_string(),
                id: Self::extract_id_from_message(&msg),
            },
            other => BusinessError::UpdateFailed {
                detail: other.to_string(),
            },
        }
    }

    fn resource_name(context: &str) -> String {
        context.replace('_', " ")
    }

    /// Pull the quoted id out of messages like "order with id 'abc' not found"
    fn extract_id_from_message(msg: &str) -> String {
        for pattern in [" id '", " id \""] {
            if let Some(start_pos) = msg.find(pattern) {
                let after_id = &msg[start_pos + pattern.len()..];
                if let Some(end_pos) = after_id.find(['\'', '"']) {
                    return after_id[..end_pos].to_string();
                }
            }
        }
        "unknown".to_string()
    }
}

#[macro_export]
macro_rules! not_found {
    ($resource:expr, $id:expr) => {
        $crate::common::errors::BusinessError::NotFound {
            resource: $resource.to_string(),
            id: $id.to_string(),
        }
    };
}

/// Extension trait to add business error conversion to `DbErr`
pub trait DbErrorExt {
    fn to_business_error(self, context: &str) -> BusinessError;
}

impl DbErrorExt for DbErr {
    fn to_business_error(self, context: &str) -> BusinessError {
        ErrorMapper::map_db_error(self, context)
    }
}

/// Result type alias for business operations
pub type BusinessResult<T> = Result<T, BusinessError>;

/// Shorthand for mapping database results at call sites
pub trait DbResultExt<T> {
    /// Reads and standalone statements
    fn in_context(self, context: &str) -> BusinessResult<T>;
    /// Statements inside an order write transaction
    fn for_write(self) -> BusinessResult<T>;
}

impl<T> DbResultExt<T> for Result<T, DbErr> {
    fn in_context(self, context: &str) -> BusinessResult<T> {
        self.map_err(|err| err.to_business_error(context))
    }

    fn for_write(self) -> BusinessResult<T> {
        self.map_err(ErrorMapper::map_write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    #[test]
    fn test_error_mapper_not_found() {
        let db_err = DbErr::RecordNotFound("order with id 'abc-123' not found".to_string());
        let business_err = ErrorMapper::map_db_error(db_err, "order");

        match business_err {
            BusinessError::NotFound { resource, id } => {
                assert_eq!(resource, "order");
                assert_eq!(id, "abc-123");
            }
            _ => panic!("Expected not found error"),
        }
    }

    #[test]
    fn test_write_errors_become_update_failed() {
        let err = ErrorMapper::map_write_error(DbErr::Custom("disk full".to_string()));
        match err {
            BusinessError::UpdateFailed { detail } => assert!(detail.contains("disk full")),
            other => panic!("Expected update failure, got {other:?}"),
        }
    }

    #[test]
    fn test_forbidden_codes_distinguish_denials() {
        let not_owner = BusinessError::Forbidden {
            denial: AccessDenial::NotOwner,
            reason: "bound".to_string(),
        };
        let mismatch = BusinessError::Forbidden {
            denial: AccessDenial::RoleMismatch,
            reason: "role".to_string(),
        };
        assert_eq!(not_owner.code(), "NOT_OWNER");
        assert_eq!(mismatch.code(), "ROLE_MISMATCH");
        assert_eq!(not_owner.status_code(), StatusCode::FORBIDDEN);
        let locked = BusinessError::Forbidden {
            denial: AccessDenial::Locked,
            reason: "locked".to_string(),
        };
        assert_eq!(locked.code(), "ORDER_LOCKED");
    }

    #[test]
    fn test_db_result_ext() {
        let read: Result<(), DbErr> =
            Err(DbErr::RecordNotFound("order with id 'x' not found".into()));
        assert!(matches!(read.in_context("order"), Err(BusinessError::NotFound { .. })));
        let write: Result<(), DbErr> = Err(DbErr::Custom("boom".into()));
        assert!(matches!(write.for_write(), Err(BusinessError::UpdateFailed { .. })));
    }

    #[test]
    fn test_only_upstream_errors_are_retryable() {
        assert!(
            BusinessError::UpstreamTimeout {
                message: "t".into()
            }
            .is_retryable()
        );
        assert!(!BusinessError::MissingExternalContext.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_context_response_body() {
        let response = BusinessError::MissingExternalContext.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "MISSING_EXTERNAL_CONTEXT");
        assert_eq!(body["error"]["type"], "MissingExternalContext");
    }

    #[tokio::test]
    async fn test_upstream_message_not_exposed() {
        let response = BusinessError::UpstreamError {
            message: "secret upstream detail".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
        assert!(!body["error"]["message"].as_str().unwrap().contains("secret"));
    }
}
