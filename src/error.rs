/// Unified error handling for the service.
///
/// Domain-specific error enums keep the failure taxonomy explicit; everything
/// converges on `AppError`, which carries the HTTP mapping:
/// authentication -> 401, authorization -> 403, not-found -> 404,
/// conflict / illegal state transition -> 409, validation -> 400,
/// unreachable store -> 503, everything else -> 500.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Validation errors for input data
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for ValidationError {}

/// Authentication failures: credential checks and the token lifecycle.
///
/// Every variant maps to 401. The messages are deliberately opaque where
/// distinguishing them would leak information (credentials).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    TokenMalformed,
    TokenExpired,
    TokenRevoked,
    TokenTypeMismatch,
    TokenNotFound,
    MissingToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid username or password"),
            AuthError::TokenMalformed => write!(f, "Malformed or tampered token"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenRevoked => write!(f, "Token has been revoked"),
            AuthError::TokenTypeMismatch => write!(f, "Wrong token type for this operation"),
            AuthError::TokenNotFound => write!(f, "Refresh token not found"),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
        }
    }
}

impl StdError for AuthError {}

/// Domain-level failures raised by membership, project and verification flows
#[derive(Debug, Clone)]
pub enum DomainError {
    ResourceNotFound(String),
    ResourceConflict(String),
    InvalidStateTransition(String),
    VerificationCodeMismatch,
    VerificationCodeExpired,
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::ResourceNotFound(msg) => write!(f, "{} not found", msg),
            DomainError::ResourceConflict(msg) => write!(f, "{}", msg),
            DomainError::InvalidStateTransition(msg) => write!(f, "{}", msg),
            DomainError::VerificationCodeMismatch => write!(f, "Verification code does not match"),
            DomainError::VerificationCodeExpired => write!(f, "Verification code has expired"),
        }
    }
}

impl StdError for DomainError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    /// Authorization denial with the reason (logged, surfaced as 403)
    Authorization(String),
    Domain(DomainError),
    Database(DatabaseError),
    /// Revocation store unreachable or misbehaving. Fail-closed: this is
    /// never collapsed into "not blacklisted".
    Cache(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Authorization(msg) => write!(f, "{}", msg),
            AppError::Domain(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Cache(msg) => write!(f, "Revocation store error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::Domain(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let error_msg = err.to_string();

        if error_msg.contains("duplicate key") || error_msg.contains("unique constraint") {
            AppError::Database(DatabaseError::UniqueConstraintViolation(
                "record already exists".to_string(),
            ))
        } else if error_msg.contains("no rows") {
            AppError::Database(DatabaseError::NotFound("Record not found".to_string()))
        } else if error_msg.contains("pool") || error_msg.contains("connect") {
            AppError::Database(DatabaseError::ConnectionPool(error_msg))
        } else {
            AppError::Database(DatabaseError::UnexpectedError(error_msg))
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Cache(err.to_string())
    }
}

/// Error response body returned for every failed request
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating with server-side logs
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Stable error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when the error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    /// Stable machine-readable code for the error class
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(AuthError::InvalidCredentials) => "INVALID_CREDENTIALS",
            AppError::Auth(AuthError::MissingToken) => "MISSING_TOKEN",
            AppError::Auth(_) => "TOKEN_INVALID",
            AppError::Authorization(_) => "FORBIDDEN",
            AppError::Domain(DomainError::ResourceNotFound(_)) => "NOT_FOUND",
            AppError::Domain(DomainError::ResourceConflict(_)) => "CONFLICT",
            AppError::Domain(DomainError::InvalidStateTransition(_)) => "INVALID_STATE",
            AppError::Domain(DomainError::VerificationCodeMismatch) => "CODE_MISMATCH",
            AppError::Domain(DomainError::VerificationCodeExpired) => "CODE_EXPIRED",
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => "DUPLICATE_ENTRY",
            AppError::Database(DatabaseError::NotFound(_)) => "NOT_FOUND",
            AppError::Database(DatabaseError::ConnectionPool(_)) => "SERVICE_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Cache(_) => "SERVICE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message surfaced to the caller. Infrastructure details never leak.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                "Database temporarily unavailable".to_string()
            }
            AppError::Database(DatabaseError::UnexpectedError(_)) => {
                "Database error occurred".to_string()
            }
            AppError::Cache(_) => "Token revocation store temporarily unavailable".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication failure");
            }
            AppError::Authorization(reason) => {
                tracing::warn!(error_id = error_id, reason = %reason, "Authorization denied");
            }
            AppError::Domain(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Domain error");
            }
            AppError::Database(e) => {
                tracing::error!(error_id = error_id, error = %e, "Database error");
            }
            AppError::Cache(e) => {
                tracing::error!(error_id = error_id, error = %e, "Revocation store error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Domain(e) => match e {
                DomainError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
                DomainError::ResourceConflict(_) => StatusCode::CONFLICT,
                DomainError::InvalidStateTransition(_) => StatusCode::CONFLICT,
                DomainError::VerificationCodeMismatch | DomainError::VerificationCodeExpired => {
                    StatusCode::BAD_REQUEST
                }
            },
            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
                DatabaseError::NotFound(_) => StatusCode::NOT_FOUND,
                DatabaseError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let status = self.status_code();
        let body = ErrorResponse::new(
            error_id,
            self.public_message(),
            self.code().to_string(),
            status.as_u16(),
        );

        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_401() {
        let cases = [
            AuthError::InvalidCredentials,
            AuthError::TokenMalformed,
            AuthError::TokenExpired,
            AuthError::TokenRevoked,
            AuthError::TokenTypeMismatch,
            AuthError::TokenNotFound,
            AuthError::MissingToken,
        ];
        for case in cases {
            assert_eq!(
                AppError::Auth(case).status_code(),
                StatusCode::UNAUTHORIZED
            );
        }
    }

    #[test]
    fn authorization_denial_maps_to_403() {
        let err = AppError::Authorization("not an owner".to_string());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn conflict_and_state_transition_map_to_409() {
        let conflict =
            AppError::Domain(DomainError::ResourceConflict("membership exists".to_string()));
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let transition = AppError::Domain(DomainError::InvalidStateTransition(
            "membership already left".to_string(),
        ));
        assert_eq!(transition.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn unreachable_stores_map_to_503() {
        let cache = AppError::Cache("connection refused".to_string());
        assert_eq!(cache.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let pool = AppError::Database(DatabaseError::ConnectionPool("timed out".to_string()));
        assert_eq!(pool.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn infrastructure_details_do_not_leak() {
        let cache = AppError::Cache("redis://10.0.0.5:6379 refused".to_string());
        assert!(!cache.public_message().contains("10.0.0.5"));

        let internal = AppError::Internal("signing key misconfigured".to_string());
        assert_eq!(internal.public_message(), "Internal server error");
    }

    #[test]
    fn sqlx_unique_violation_converts_to_conflict() {
        // sqlx surfaces constraint failures in the error text
        let err: AppError = sqlx::Error::Protocol(
            "duplicate key value violates unique constraint".to_string(),
        )
        .into();
        match err {
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => (),
            other => panic!("Expected unique violation, got {:?}", other),
        }
    }
}
