use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use arcadia_types::api::{
    AddXpRequest, AddXpResponse, Claims, LoginRequest, LoginResponse, MeResponse,
    RegisterRequest, RegisterResponse,
};
use arcadia_types::models::UserProfile;

use crate::AppState;
use crate::error::ApiError;

const NICK_MAX_LEN: usize = 32;
const PASSWORD_MIN_LEN: usize = 6;
const XP_MAX_STEP: i64 = 1000;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let nick = req.nick.trim();
    if nick.is_empty() {
        return Err(ApiError::Validation("NICK_REQUIRED"));
    }
    if nick.len() > NICK_MAX_LEN {
        return Err(ApiError::Validation("NICK_TOO_LONG"));
    }
    if req.password.len() < PASSWORD_MIN_LEN {
        return Err(ApiError::Validation("PASS_MIN_6"));
    }

    // Check-then-insert; the UNIQUE constraint on nick is the backstop.
    if state.db.get_user_by_nick(nick)?.is_some() {
        return Err(ApiError::Conflict("NICK_EXISTS"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Storage(anyhow!("password hash failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();
    let now_ms = state.clock.now_ms();

    state
        .db
        .create_user(&user_id.to_string(), nick, &password_hash, now_ms)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            ok: true,
            user_id,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_nick(req.nick.trim())?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| ApiError::Storage(anyhow!("stored hash unreadable: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Storage(anyhow!("corrupt user id '{}': {}", user.id, e)))?;

    let role = match &state.admin_user {
        Some(admin) if *admin == user.nick => "admin",
        _ => "user",
    };

    let token = create_token(&state.jwt_secret, user_id, &user.nick, role)?;

    Ok(Json(LoginResponse {
        ok: true,
        token,
        user: UserProfile {
            id: user_id,
            nick: user.nick,
            xp: user.xp,
        },
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("USER_NOT_FOUND"))?;

    let id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Storage(anyhow!("corrupt user id '{}': {}", user.id, e)))?;

    Ok(Json(MeResponse {
        ok: true,
        user: UserProfile {
            id,
            nick: user.nick,
            xp: user.xp,
        },
    }))
}

/// The experience counter only moves forward, in bounded steps.
pub async fn add_xp(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddXpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.amount <= 0 || req.amount > XP_MAX_STEP {
        return Err(ApiError::Validation("AMOUNT_INVALID"));
    }

    let xp = state
        .db
        .add_xp(&claims.sub.to_string(), req.amount)?
        .ok_or(ApiError::NotFound("USER_NOT_FOUND"))?;

    Ok(Json(AddXpResponse { ok: true, xp }))
}

fn create_token(secret: &str, user_id: Uuid, nick: &str, role: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        nick: nick.to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
