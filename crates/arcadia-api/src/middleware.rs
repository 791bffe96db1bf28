use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use arcadia_types::api::Claims;

use crate::AppState;
use crate::error::ApiError;

/// Extract and validate JWT from the Authorization header; the decoded
/// claims are attached as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims =
        bearer_claims(req.headers(), &state.jwt_secret).ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Admin gate with two accepted credentials: the shared x-admin-key header,
/// or a bearer token whose role claim is admin.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = req
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok());
    if let Some(key) = key {
        if !state.admin_key.is_empty() && key == state.admin_key {
            return Ok(next.run(req).await);
        }
    }

    if let Some(claims) = bearer_claims(req.headers(), &state.jwt_secret) {
        if claims.is_admin() {
            req.extensions_mut().insert(claims);
            return Ok(next.run(req).await);
        }
    }

    Err(ApiError::Forbidden)
}

fn bearer_claims(headers: &HeaderMap, jwt_secret: &str) -> Option<Claims> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}
