// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError {
                message,
                field_errors,
            } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::database::manager::DatabaseError> for ApiError {
    fn from(err: crate::database::manager::DatabaseError) -> Self {
        match err {
            crate::database::manager::DatabaseError::ConfigMissing(var) => {
                tracing::error!("Missing configuration: {}", var);
                ApiError::internal_server_error("Server is misconfigured")
            }
            crate::database::manager::DatabaseError::Migrate(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            crate::database::manager::DatabaseError::Sqlx(e) => {
                tracing::error!("Database unavailable: {}", e);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
        }
    }
}

impl From<crate::org::OrgAccessError> for ApiError {
    fn from(err: crate::org::OrgAccessError) -> Self {
        use crate::org::OrgAccessError;
        match err {
            OrgAccessError::Unauthenticated => ApiError::unauthorized("Authentication required"),
            // Indistinguishable from a nonexistent organization on purpose.
            OrgAccessError::NotAMember => ApiError::not_found("Organization not found"),
            OrgAccessError::Forbidden { required, .. } => {
                ApiError::forbidden(format!("This action requires the {} role", required))
            }
            OrgAccessError::Upstream(e) => {
                tracing::error!("Membership lookup failed: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::org::InvalidOrgRef> for ApiError {
    fn from(_: crate::org::InvalidOrgRef) -> Self {
        ApiError::bad_request("Organization identifier must not be empty")
    }
}

impl From<crate::auth::JwtError> for ApiError {
    fn from(err: crate::auth::JwtError) -> Self {
        use crate::auth::JwtError;
        match err {
            JwtError::TokenValidation(_) => ApiError::unauthorized("Invalid or expired token"),
            JwtError::MissingSecret => {
                tracing::error!("JWT secret not configured");
                ApiError::internal_server_error("Server is misconfigured")
            }
            JwtError::TokenGeneration(e) => {
                tracing::error!("Token generation failed: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::org::role::RoleParseError> for ApiError {
    fn from(err: crate::org::role::RoleParseError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors: HashMap<String, String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let detail = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "invalid value".to_string());
                (field.to_string(), detail)
            })
            .collect();

        ApiError::validation_error("Invalid input", Some(field_errors))
    }
}

impl From<crate::services::user_service::UserError> for ApiError {
    fn from(err: crate::services::user_service::UserError) -> Self {
        use crate::services::user_service::UserError;
        match err {
            UserError::EmailTaken => {
                ApiError::conflict("An account with this email already exists")
            }
            UserError::InvalidCredentials => ApiError::unauthorized("Invalid email or password"),
            UserError::NotFound => ApiError::not_found("User not found"),
            UserError::Hash(e) => {
                tracing::error!("Password hashing failed: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            UserError::Database(e) => {
                tracing::error!("User query failed: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::services::org_service::OrgError> for ApiError {
    fn from(err: crate::services::org_service::OrgError) -> Self {
        use crate::services::org_service::OrgError;
        match err {
            OrgError::UserNotFound => {
                ApiError::not_found("User not found. Ask them to sign up first.")
            }
            OrgError::AlreadyMember => ApiError::conflict("User is already a member"),
            OrgError::MembershipNotFound => ApiError::not_found("Membership not found"),
            OrgError::LastOwner => {
                ApiError::conflict("An organization must retain at least one owner")
            }
            OrgError::OwnerProtected => {
                ApiError::forbidden("Only an owner can modify an owner membership")
            }
            OrgError::Database(e) => {
                tracing::error!("Organization query failed: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::services::ticket_service::TicketError> for ApiError {
    fn from(err: crate::services::ticket_service::TicketError) -> Self {
        use crate::services::ticket_service::TicketError;
        match err {
            TicketError::NotFound => ApiError::not_found("Ticket not found"),
            TicketError::TagExists => ApiError::conflict("A tag with this name already exists"),
            TicketError::TagNotFound => ApiError::not_found("Tag not found"),
            TicketError::TagAlreadyAttached => {
                ApiError::conflict("Tag is already attached to this ticket")
            }
            TicketError::AssigneeNotMember => {
                ApiError::bad_request("Assignee is not a member of this organization")
            }
            TicketError::InvalidStatus(s) => {
                ApiError::bad_request(format!("Unknown ticket status: {}", s))
            }
            TicketError::Database(e) => {
                tracing::error!("Ticket query failed: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
