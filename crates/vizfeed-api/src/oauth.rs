//! OAuth2 authorization-code sign-in against one configured provider.

use axum::{
    Json,
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Redirect},
};
use axum_extra::{TypedHeader, headers::Cookie};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vizfeed_db::models::{AccountRow, NewAccount};
use vizfeed_db::{Database, is_constraint_violation};
use vizfeed_types::api::AuthResponse;

use crate::auth::create_token;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::state::{AppState, OAuthSettings};

const STATE_TTL_MINUTES: i64 = 10;
const NONCE_COOKIE: &str = "vizfeed_oauth_nonce";
const USERNAME_RETRIES: u32 = 5;

/// Signed `state` parameter; binds the callback to a start request.
#[derive(Debug, Serialize, Deserialize)]
struct OAuthState {
    provider: String,
    nonce: Uuid,
    exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

fn provider_settings<'a>(state: &'a AppState, provider: &str) -> ApiResult<&'a OAuthSettings> {
    state
        .settings
        .oauth
        .as_ref()
        .filter(|oauth| oauth.provider == provider)
        .ok_or(ApiError::NotFound("OAuth provider"))
}

fn redirect_uri(state: &AppState, provider: &str) -> String {
    state.settings.url(&format!("/auth/oauth/{provider}/callback"))
}

/// Ties a signed state to the browser that started the flow.
fn nonce_cookie(state: &AppState, value: &str, max_age: i64) -> String {
    let secure = if state.settings.base_url.starts_with("https://") {
        "; Secure"
    } else {
        ""
    };
    format!("{NONCE_COOKIE}={value}; HttpOnly; SameSite=Lax; Path=/auth/oauth; Max-Age={max_age}{secure}")
}

pub async fn start(
    State(state): State<AppState>,
    ApiPath(provider): ApiPath<String>,
) -> ApiResult<impl IntoResponse> {
    let oauth = provider_settings(&state, &provider)?;

    let nonce = Uuid::new_v4();
    let signed_state = encode(
        &Header::default(),
        &OAuthState {
            provider: provider.clone(),
            nonce,
            exp: (Utc::now() + Duration::minutes(STATE_TTL_MINUTES)).timestamp() as usize,
        },
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    let url = Url::parse_with_params(
        &oauth.auth_url,
        &[
            ("response_type", "code"),
            ("client_id", oauth.client_id.as_str()),
            ("redirect_uri", redirect_uri(&state, &provider).as_str()),
            ("scope", "openid email profile"),
            ("state", signed_state.as_str()),
        ],
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("Bad OAuth authorize URL: {}", e)))?;

    let cookie = nonce_cookie(&state, &nonce.to_string(), STATE_TTL_MINUTES * 60);
    Ok(([(SET_COOKIE, cookie)], Redirect::to(url.as_str())))
}

pub async fn callback(
    State(state): State<AppState>,
    ApiPath(provider): ApiPath<String>,
    ApiQuery(query): ApiQuery<CallbackQuery>,
    cookies: Option<TypedHeader<Cookie>>,
) -> ApiResult<impl IntoResponse> {
    let oauth = provider_settings(&state, &provider)?;

    if let Some(error) = query.error {
        return Err(ApiError::bad_request(format!("Provider refused sign-in: {error}")));
    }
    let code = query.code.ok_or_else(|| ApiError::bad_request("Missing code"))?;
    let raw_state = query.state.ok_or_else(|| ApiError::bad_request("Missing state"))?;

    let signed = decode::<OAuthState>(
        &raw_state,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::bad_request("Invalid or expired state"))?;
    if signed.claims.provider != provider {
        return Err(ApiError::bad_request("State was issued for another provider"));
    }
    let cookie_nonce = cookies
        .as_ref()
        .and_then(|TypedHeader(cookies)| cookies.get(NONCE_COOKIE));
    if cookie_nonce != Some(signed.claims.nonce.to_string().as_str()) {
        return Err(ApiError::bad_request("Sign-in was started in another browser"));
    }

    let access_token = exchange_code(&state, oauth, &provider, &code).await?;
    let info = fetch_user_info(&state, oauth, &access_token).await?;
    let email = info
        .email
        .clone()
        .ok_or_else(|| ApiError::Upstream("Provider did not return an email".into()))?;

    if info.email_verified == Some(false) {
        warn!("Rejected OAuth sign-in with unverified email {}", email);
        return Err(ApiError::Forbidden);
    }

    let is_admin = info.email_verified == Some(true) && state.settings.is_admin_email(&email);
    let account = state
        .db(move |db| find_or_create_account(db, &email, &info, is_admin))
        .await??;

    let user_id = account.user_id();
    let token = create_token(&state.jwt_secret, user_id, &account.username)?;
    Ok((
        [(SET_COOKIE, nonce_cookie(&state, "", 0))],
        Json(AuthResponse {
            user_id,
            username: account.username,
            token,
        }),
    ))
}

async fn exchange_code(
    state: &AppState,
    oauth: &OAuthSettings,
    provider: &str,
    code: &str,
) -> ApiResult<String> {
    let redirect = redirect_uri(state, provider);
    let response = state
        .http
        .post(&oauth.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect.as_str()),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Token exchange failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!("OAuth token endpoint returned {}: {}", status, body);
        return Err(ApiError::Upstream(format!("Token endpoint returned {status}")));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Upstream(format!("Malformed token response: {e}")))?;
    Ok(token.access_token)
}

async fn fetch_user_info(
    state: &AppState,
    oauth: &OAuthSettings,
    access_token: &str,
) -> ApiResult<UserInfo> {
    let response = state
        .http
        .get(&oauth.userinfo_url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Userinfo request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "Userinfo endpoint returned {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ApiError::Upstream(format!("Malformed userinfo response: {e}")))
}

/// Existing accounts are matched by email, and only linked when the provider
/// vouches for that email. New ones get a username derived from the provider
/// name or email, suffixed until unique.
fn find_or_create_account(
    db: &Database,
    email: &str,
    info: &UserInfo,
    is_admin: bool,
) -> anyhow::Result<Result<AccountRow, ApiError>> {
    let verified = info.email_verified == Some(true);
    if let Some(account) = db.get_account_by_email(email)? {
        return Ok(link_existing(account, verified));
    }

    let id = Uuid::new_v4().to_string();
    let base = username_base(info.name.as_deref(), email);
    let inserted = insert_with_free_username(db, &base, |username| {
        db.create_account(&NewAccount {
            id: &id,
            email,
            password_hash: None,
            username,
            is_admin,
            email_confirmed: verified,
        })
    });
    let username = match inserted {
        Ok(username) => username,
        // Same email registered concurrently
        Err(e) if is_constraint_violation(&e) => {
            return match db.get_account_by_email(email)? {
                Some(account) => Ok(link_existing(account, verified)),
                None => Err(e),
            };
        }
        Err(e) => return Err(e),
    };

    if let Some(picture) = &info.picture {
        db.update_profile(&id, None, Some(picture))?;
    }
    info!("Created OAuth account {} for {}", username, email);

    let account = db
        .get_account(&id)?
        .ok_or_else(|| anyhow::anyhow!("Account {} vanished after insert", id))?;
    Ok(Ok(account))
}

fn link_existing(account: AccountRow, verified: bool) -> Result<AccountRow, ApiError> {
    if verified {
        Ok(account)
    } else {
        Err(ApiError::Conflict("An account with this email already exists".into()))
    }
}

/// Runs `insert` with the first free `base`, `base2`, `base3`... and moves on
/// to the next suffix if another request claims the name first.
fn insert_with_free_username(
    db: &Database,
    base: &str,
    mut insert: impl FnMut(&str) -> anyhow::Result<()>,
) -> anyhow::Result<String> {
    let mut username = base.to_string();
    let mut suffix = 1;
    let mut retries = 0;
    loop {
        while db.username_taken(&username, None)? {
            suffix += 1;
            username = format!("{base}{suffix}");
        }
        match insert(&username) {
            Ok(()) => return Ok(username),
            Err(e) => {
                if retries >= USERNAME_RETRIES
                    || !is_constraint_violation(&e)
                    || !db.username_taken(&username, None)?
                {
                    return Err(e);
                }
                debug!("Username {} was claimed concurrently, retrying", username);
                retries += 1;
            }
        }
    }
}

fn username_base(name: Option<&str>, email: &str) -> String {
    let source = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or(email));
    let mut base: String = source
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '.' || *c == '-')
        .take(24)
        .collect();
    while base.chars().count() < 3 {
        base.push('_');
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(email: &str, verified: Option<bool>) -> UserInfo {
        UserInfo {
            email: Some(email.into()),
            email_verified: verified,
            name: Some("ada".into()),
            picture: Some("https://img.test/ada.png".into()),
        }
    }

    #[test]
    fn username_base_is_sanitized_and_padded() {
        assert_eq!(username_base(Some("Ada Lovelace"), "a@b.io"), "AdaLovelace");
        assert_eq!(username_base(None, "jo@b.io"), "jo_");
        assert_eq!(username_base(Some("  "), "x.y@b.io"), "x.y");
    }

    #[test]
    fn first_sign_in_creates_account_then_reuses_it() {
        let db = Database::open_in_memory().unwrap();
        let info = info("ada@example.com", Some(true));

        let first = find_or_create_account(&db, "ada@example.com", &info, false)
            .unwrap()
            .unwrap();
        assert!(first.password.is_none());
        assert!(first.email_confirmed);
        assert_eq!(first.avatar_url.as_deref(), Some("https://img.test/ada.png"));

        let again = find_or_create_account(&db, "ada@example.com", &info, false)
            .unwrap()
            .unwrap();
        assert_eq!(first.id, again.id);

        let other = find_or_create_account(&db, "ada@other.com", &info, false)
            .unwrap()
            .unwrap();
        assert_eq!(other.username, "ada2");
    }

    #[test]
    fn unverified_email_never_links_an_existing_account() {
        let db = Database::open_in_memory().unwrap();
        let verified = info("ada@example.com", Some(true));
        let owner = find_or_create_account(&db, "ada@example.com", &verified, true)
            .unwrap()
            .unwrap();
        assert!(owner.is_admin);

        let unverified = info("ada@example.com", None);
        let claim = find_or_create_account(&db, "ada@example.com", &unverified, false).unwrap();
        assert!(matches!(claim, Err(ApiError::Conflict(_))));

        let newcomer = info("new@example.com", None);
        let fresh = find_or_create_account(&db, "new@example.com", &newcomer, false)
            .unwrap()
            .unwrap();
        assert!(!fresh.email_confirmed);
    }

    #[test]
    fn username_claimed_mid_insert_moves_to_next_suffix() {
        let db = Database::open_in_memory().unwrap();
        let mut raced = false;
        let username = insert_with_free_username(&db, "ada", |username| {
            if !raced {
                raced = true;
                db.create_account(&NewAccount {
                    id: "rival",
                    email: "rival@example.com",
                    password_hash: None,
                    username,
                    is_admin: false,
                    email_confirmed: true,
                })?;
            }
            db.create_account(&NewAccount {
                id: "ada",
                email: "ada@example.com",
                password_hash: None,
                username,
                is_admin: false,
                email_confirmed: true,
            })
        })
        .unwrap();

        assert_eq!(username, "ada2");
        assert_eq!(db.get_account("ada").unwrap().unwrap().username, "ada2");
        assert_eq!(db.get_account("rival").unwrap().unwrap().username, "ada");
    }
}
