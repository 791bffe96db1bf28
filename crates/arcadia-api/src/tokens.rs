use anyhow::anyhow;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::error;

use arcadia_db::tokens::{DEFAULT_TOKEN_VALIDITY_DAYS, Redemption};
use arcadia_types::api::{
    IssueTokenRequest, IssueTokenResponse, PremiumCountResponse, PremiumStatusResponse,
    RedeemRequest, RedeemResponse,
};

use crate::AppState;
use crate::error::ApiError;

/// Privileged: mint a fresh redemption code. The body is optional — an empty
/// POST issues with the default 30-day validity.
pub async fn issue(
    State(state): State<AppState>,
    body: Option<Json<IssueTokenRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let days = body
        .and_then(|Json(req)| req.days)
        .unwrap_or(DEFAULT_TOKEN_VALIDITY_DAYS);
    if days == 0 {
        return Err(ApiError::Validation("DAYS_INVALID"));
    }

    let now_ms = state.clock.now_ms();
    let token = state.db.issue_token(days, now_ms)?;

    Ok(Json(IssueTokenResponse {
        ok: true,
        token: token.token,
        created_at: token.created_at,
        expires_at: token.expires_at,
    }))
}

/// Public redemption endpoint. Business failures answer 200 with the
/// legacy wire reason codes — clients branch on `valid`, not the status.
pub async fn redeem(
    State(state): State<AppState>,
    Json(req): Json<RedeemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let code = req.token.trim().to_string();
    let user_id = req.user_id.trim().to_string();
    if code.is_empty() || user_id.is_empty() {
        return Err(ApiError::Validation("TOKEN_AND_USER_REQUIRED"));
    }

    let now_ms = state.clock.now_ms();

    // Run the blocking redemption transaction off the async runtime
    let db = state.clone();
    let outcome = tokio::task::spawn_blocking(move || db.db.redeem_token(&code, &user_id, now_ms))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Storage(anyhow!("redeem task failed"))
        })??;

    let response = match outcome {
        Redemption::Redeemed => RedeemResponse {
            ok: true,
            valid: true,
            reason: None,
        },
        Redemption::NotFound => RedeemResponse {
            ok: false,
            valid: false,
            reason: Some("TOKEN_INEXISTENTE"),
        },
        Redemption::Expired => RedeemResponse {
            ok: false,
            valid: false,
            reason: Some("TOKEN_EXPIRADO"),
        },
        Redemption::UsedByOther => RedeemResponse {
            ok: false,
            valid: false,
            reason: Some("TOKEN_JA_USADO"),
        },
    };

    Ok(Json(response))
}

pub async fn premium_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let since = state.db.premium_since(&user_id)?;

    Ok(Json(PremiumStatusResponse {
        ok: true,
        premium: since.is_some(),
        since,
    }))
}

pub async fn premium_count(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let total_premium = state.db.total_premium()?;

    Ok(Json(PremiumCountResponse {
        ok: true,
        total_premium,
    }))
}
