use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use vizfeed_types::api::Claims;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub type BearerHeader = TypedHeader<Authorization<Bearer>>;

pub fn decode_claims(token: &str, secret: &str) -> ApiResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthorized
    })?;
    Ok(token_data.claims)
}

/// Claims for requests where signing in is optional. Invalid tokens are
/// treated as anonymous.
pub fn optional_claims(bearer: Option<BearerHeader>, secret: &str) -> Option<Claims> {
    let TypedHeader(Authorization(bearer)) = bearer?;
    decode_claims(bearer.token(), secret).ok()
}

/// Extract and validate the JWT from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<BearerHeader>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ApiError::Unauthorized)?;
    let claims = decode_claims(bearer.token(), &state.jwt_secret)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Must run inside `require_auth`. Reads the admin flag from the profile on
/// every request, not from the token.
pub async fn require_admin(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    req: Request,
    next: Next,
) -> ApiResult<Response> {
    let user_id = claims.sub.to_string();
    let account = state
        .db(move |db| db.get_account(&user_id))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !account.is_admin {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}
