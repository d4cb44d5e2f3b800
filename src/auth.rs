// Authentication: password hashing, JWT sessions, the Session extractor, and
// the account/profile handlers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{rejection::JsonRejection, FromRef, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::db::{ProfileUpdate, User};
use crate::error::AppError;

const TOKEN_TTL_HOURS: i64 = 24;
const MIN_PASSWORD_LEN: usize = 8;

// ── JWT ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64, // user id
    pub name: String,
    pub exp: usize,
}

pub fn create_token(keys: &JwtKeys, user_id: i64, name: &str) -> Result<String, String> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| "token expiry overflow".to_string())?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        exp: expiration,
    };

    encode(&Header::default(), &claims, &keys.encoding)
        .map_err(|e| format!("Failed to create token: {e}"))
}

pub fn verify_token(keys: &JwtKeys, token: &str) -> Result<Claims, String> {
    decode::<Claims>(token, &keys.decoding, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| format!("Invalid token: {e}"))
}

// ── Password hashing ─────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| format!("Failed to hash password: {e}"))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| format!("Invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

// ── Session extractor ────────────────────────────────────────────────

/// The signed-in user, taken from `Authorization: Bearer <jwt>` and handed
/// explicitly to every handler that acts on someone's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub name: String,
}

impl<S> FromRequestParts<S> for Session
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Invalid Authorization header format".into())
        })?;

        let keys = JwtKeys::from_ref(state);
        let claims = verify_token(&keys, token).map_err(|e| {
            tracing::debug!("{e}");
            AppError::Unauthorized("Invalid token".into())
        })?;

        Ok(Session {
            user_id: claims.sub,
            name: claims.name,
        })
    }
}

// ── Account handlers ─────────────────────────────────────────────────

// Absent fields fall through to the required-field check below.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub bio: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn issue(keys: &JwtKeys, user: &User) -> Result<String, AppError> {
    create_token(keys, user.id, &user.name).map_err(|e| {
        tracing::error!("Token creation error: {e}");
        AppError::Internal("Internal error".into())
    })
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    if req.email.trim().is_empty() || req.password.is_empty() || req.name.trim().is_empty() {
        return Err(AppError::Validation(
            "name, email, and password are required".into(),
        ));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Password hash error: {e}");
        AppError::Internal("Internal error".into())
    })?;

    let bio = req.bio.unwrap_or_default();
    let user = match state
        .db
        .create_user(req.email.trim(), &password_hash, req.name.trim(), &bio)
        .await
    {
        Ok(user) => user,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = user.id, "registered new user");
    let token = issue(&state.jwt, &user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let user = state
        .db
        .get_user_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    match verify_password(&req.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return Err(invalid()),
        Err(e) => {
            tracing::error!("Password verify error: {e}");
            return Err(invalid());
        }
    }

    let token = issue(&state.jwt, &user)?;
    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(session: Session, State(state): State<AppState>) -> Result<Json<User>, AppError> {
    state
        .db
        .get_user(session.user_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("User"))
}

pub async fn update_profile(
    session: Session,
    State(state): State<AppState>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(update) = payload?;
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::Validation("name cannot be empty".into()));
    }
    state
        .db
        .update_user(session.user_id, &update)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("User"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new(b"test-secret")
    }

    #[test]
    fn test_password_hash_and_verify() {
        let password = "testpassword123";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrongpassword", &hash).unwrap());
    }

    #[test]
    fn test_jwt_create_and_verify() {
        let token = create_token(&keys(), 7, "Ana").unwrap();
        let claims = verify_token(&keys(), &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.name, "Ana");
    }

    #[test]
    fn test_jwt_rejects_other_secret() {
        let token = create_token(&keys(), 7, "Ana").unwrap();
        assert!(verify_token(&JwtKeys::new(b"another-secret"), &token).is_err());
        assert!(verify_token(&keys(), "invalid.token.here").is_err());
    }
}
