use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use vizfeed_db::models::NewAccount;
use vizfeed_db::queries::TokenPurpose;
use vizfeed_db::is_constraint_violation;
use vizfeed_types::api::{
    AuthResponse, Claims, ConfirmQuery, LoginRequest, PasswordResetConfirm, PasswordResetRequest,
    ProfileResponse, RegisterRequest, UpdateProfileRequest,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::mail::templates;
use crate::state::{AppState, AppStateInner};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=30;
const CONFIRM_TOKEN_TTL_HOURS: i64 = 24;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email)?;
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;

    let (lookup_email, lookup_name) = (email.clone(), username.clone());
    let (email_taken, name_taken) = state
        .db(move |db| {
            Ok((
                db.get_account_by_email(&lookup_email)?.is_some(),
                db.username_taken(&lookup_name, None)?,
            ))
        })
        .await?;
    if email_taken {
        return Err(ApiError::Conflict("Email already registered".into()));
    }
    if name_taken {
        return Err(ApiError::Conflict("Username already taken".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let is_admin = state.settings.is_admin_email(&email);

    let (new_email, new_name) = (email.clone(), username.clone());
    state
        .db(move |db| {
            db.create_account(&NewAccount {
                id: &user_id.to_string(),
                email: &new_email,
                password_hash: Some(&password_hash),
                username: &new_name,
                is_admin,
                email_confirmed: false,
            })
        })
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent registration.
            ApiError::Internal(inner) if is_constraint_violation(&inner) => {
                ApiError::Conflict("Email or username already taken".into())
            }
            other => other,
        })?;

    info!("Registered user {} ({})", username, user_id);

    let token = issue_single_use_token(
        &state,
        user_id,
        TokenPurpose::ConfirmEmail,
        Duration::hours(CONFIRM_TOKEN_TTL_HOURS),
    )
    .await?;
    let link = state
        .settings
        .url(&format!("/auth/confirm?token={token}&type=signup"));
    let mail = templates::confirm_email(&email, &username, &link);
    if let Err(e) = state.mailer.send(&mail).await {
        warn!("Confirmation email to {} failed: {}", email, e);
    }

    let jwt = create_token(&state.jwt_secret, user_id, &username)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            username,
            token: jwt,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_string();
    let account = state
        .db(move |db| db.get_account_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // OAuth-only identities have no password.
    let stored = account.password.as_deref().ok_or(ApiError::Unauthorized)?;
    verify_password(&req.password, stored)?;

    let user_id = account.user_id();
    let token = create_token(&state.jwt_secret, user_id, &account.username)?;

    Ok(Json(AuthResponse {
        user_id,
        username: account.username,
        token,
    }))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ConfirmQuery>,
) -> ApiResult<impl IntoResponse> {
    if query.kind.as_deref() != Some("signup") {
        return Err(ApiError::bad_request("Invalid verification link"));
    }

    let hash = hash_token(&query.token);
    let user_id = state
        .db(move |db| {
            let user_id = db.consume_auth_token(&hash, TokenPurpose::ConfirmEmail, Utc::now())?;
            if let Some(id) = &user_id {
                db.confirm_email(id)?;
            }
            Ok(user_id)
        })
        .await?
        .ok_or_else(|| ApiError::bad_request("Verification link is invalid or expired"))?;

    info!("Confirmed email for user {}", user_id);
    Ok(Json(serde_json::json!({
        "confirmed": true,
        "message": "Email verified successfully!",
    })))
}

/// Always answers 202 so the endpoint can't be used to enumerate accounts.
pub async fn request_password_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PasswordResetRequest>,
) -> ApiResult<StatusCode> {
    let email = req.email.trim().to_string();
    let lookup = email.clone();
    let account = state.db(move |db| db.get_account_by_email(&lookup)).await?;

    if let Some(account) = account {
        let token = issue_single_use_token(
            &state,
            account.user_id(),
            TokenPurpose::PasswordReset,
            Duration::hours(RESET_TOKEN_TTL_HOURS),
        )
        .await?;
        let link = state.settings.url(&format!("/reset-password?token={token}"));
        if let Err(e) = state.mailer.send(&templates::password_reset(&account.email, &link)).await {
            warn!("Password reset email to {} failed: {}", email, e);
        }
    }

    Ok(StatusCode::ACCEPTED)
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PasswordResetConfirm>,
) -> ApiResult<StatusCode> {
    validate_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let hash = hash_token(&req.token);
    let reset = state
        .db(move |db| {
            let user_id = db.consume_auth_token(&hash, TokenPurpose::PasswordReset, Utc::now())?;
            if let Some(id) = &user_id {
                db.set_password(id, &password_hash)?;
            }
            Ok(user_id)
        })
        .await?;

    match reset {
        Some(user_id) => {
            info!("Password reset for user {}", user_id);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::bad_request("Reset link is invalid or expired")),
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ProfileResponse>> {
    let user_id = claims.sub.to_string();
    let account = state
        .db(move |db| db.get_account(&user_id))
        .await?
        .ok_or(ApiError::NotFound("Profile"))?;

    Ok(Json(ProfileResponse {
        profile: account.to_profile(),
        email: account.email,
        email_confirmed: account.email_confirmed,
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let username = req.username.as_deref().map(validate_username).transpose()?;
    let avatar_url = req
        .avatar_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    let user_id = claims.sub.to_string();
    let account = state
        .db(move |db| {
            if let Some(name) = &username {
                if db.username_taken(name, Some(&user_id))? {
                    return Ok(Err(ApiError::Conflict("Username already taken".into())));
                }
            }
            db.update_profile(&user_id, username.as_deref(), avatar_url.as_deref())?;
            Ok(db.get_account(&user_id)?.ok_or(ApiError::NotFound("Profile")))
        })
        .await??;

    Ok(Json(ProfileResponse {
        profile: account.to_profile(),
        email: account.email,
        email_confirmed: account.email_confirmed,
    }))
}

// -- Helpers --

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(token)
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> ApiResult<()> {
    let parsed_hash = PasswordHash::new(stored)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Corrupt password hash: {}", e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)
}

/// Stores the SHA-256 of a fresh random token and returns the raw token.
async fn issue_single_use_token(
    state: &AppStateInner,
    user_id: Uuid,
    purpose: TokenPurpose,
    ttl: Duration,
) -> ApiResult<String> {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);

    let hash = hash_token(&token);
    let expires_at = Utc::now() + ttl;
    state
        .db(move |db| db.insert_auth_token(&hash, &user_id.to_string(), purpose, expires_at))
        .await?;
    Ok(token)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim();
    let valid = email.len() <= 254
        && !email.contains(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
            });
    if !valid {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(email.to_string())
}

pub fn validate_username(raw: &str) -> ApiResult<String> {
    let username = raw.trim();
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(ApiError::bad_request(format!(
            "Username must be {} to {} characters",
            USERNAME_LEN.start(),
            USERNAME_LEN.end()
        )));
    }
    if username.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ApiError::bad_request("Username may not contain spaces"));
    }
    Ok(username.to_string())
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_claims;

    #[test]
    fn token_round_trips_through_middleware_decoder() {
        let user_id = Uuid::new_v4();
        let token = create_token("test-secret", user_id, "ada").unwrap();
        let claims = decode_claims(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "ada");
        assert!(decode_claims(&token, "other-secret").is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(matches!(
            verify_password("hunter23", &hash),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn validation_limits() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(31)).is_err());
        assert_eq!(validate_username("  globe_fan ").unwrap(), "globe_fan");
        assert!(validate_username("two words").is_err());
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@localhost").is_err());
        assert_eq!(normalize_email(" a@b.io ").unwrap(), "a@b.io");
    }

    #[test]
    fn token_hash_is_stable_hex() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_eq!(hash_token("abc").len(), 64);
    }
}
