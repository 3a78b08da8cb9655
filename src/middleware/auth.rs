use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{Json, Response},
};

use crate::auth::{decode_token, Claims};
use crate::config;
use crate::error::ApiError;

/// Authenticated caller identity extracted from a bearer token.
///
/// Identity only — the caller's role in an organization is resolved
/// per-request by the org gate, never carried here.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub id: uuid::Uuid,
    pub email: String,
    pub name: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
        }
    }
}

/// JWT authentication middleware. Fails closed: any missing, malformed, or
/// expired token yields 401 and the request never reaches a handler.
pub async fn jwt_auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<serde_json::Value>)> {
    let token = extract_bearer_token(&headers).map_err(unauthorized)?;

    let secret = &config::config().security.jwt_secret;
    let claims = decode_token(&token, secret).map_err(|e| {
        tracing::debug!("Token validation failed: {}", e);
        unauthorized("Invalid or expired token".to_string())
    })?;

    request.extensions_mut().insert(AuthUser::from(claims));

    Ok(next.run(request).await)
}

fn unauthorized(msg: String) -> (StatusCode, Json<serde_json::Value>) {
    let api_error = ApiError::unauthorized(msg);
    (StatusCode::UNAUTHORIZED, Json(api_error.to_json()))
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty bearer token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
