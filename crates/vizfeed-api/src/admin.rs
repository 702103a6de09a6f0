use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use vizfeed_db::is_constraint_violation;
use vizfeed_db::models::NewPost;
use vizfeed_types::api::{
    CreateCategoryRequest, CreatePostRequest, UpdatePostRequest, UpdateSettingRequest,
};
use vizfeed_types::models::{Category, Post};

use crate::auth::normalize_email;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

/// Lowercase ASCII letters, digits and single inner hyphens.
pub fn validate_slug(raw: &str) -> ApiResult<String> {
    let slug = raw.trim();
    let valid = (1..=100).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--");
    if !valid {
        return Err(ApiError::bad_request(format!("Invalid slug '{slug}'")));
    }
    Ok(slug.to_string())
}

fn conflict_on_duplicate(what: &'static str) -> impl FnOnce(ApiError) -> ApiError {
    move |e| match e {
        ApiError::Internal(inner) if is_constraint_violation(&inner) => {
            ApiError::Conflict(format!("{what} already exists"))
        }
        other => other,
    }
}

pub async fn create_post(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    let slug = validate_slug(&req.slug)?;
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    let config = req
        .config
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ApiError::bad_request(format!("Invalid config: {e}")))?;

    let id = Uuid::new_v4().to_string();
    let post = state
        .db(move |db| {
            let category_id = req.category_id.map(|c| c.to_string());
            if let Some(category_id) = &category_id {
                if !db.category_exists(category_id)? {
                    return Ok(None);
                }
            }
            db.create_post(&NewPost {
                id: &id,
                slug: &slug,
                title: &title,
                description: req.description.as_deref(),
                kind: req.kind,
                custom_html: &req.custom_html,
                custom_css: &req.custom_css,
                custom_script: &req.custom_script,
                config: config.as_deref(),
                thumbnail_url: req.thumbnail_url.as_deref(),
                external_url: req.external_url.as_deref(),
                category_id: category_id.as_deref(),
                created_at: None,
            })?;
            db.get_post(&id)
        })
        .await
        .map_err(conflict_on_duplicate("Post slug"))?
        .ok_or_else(|| ApiError::bad_request("Unknown category"))?
        .into_post();

    info!("Created post {} ({})", post.slug, post.id);
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    if req.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title may not be empty"));
    }

    let updated = state
        .db(move |db| {
            if let Some(Some(category_id)) = req.category_id {
                if !db.category_exists(&category_id.to_string())? {
                    return Ok(Err(ApiError::bad_request("Unknown category")));
                }
            }
            let id = post_id.to_string();
            if !db.update_post(&id, &req)? {
                return Ok(Err(ApiError::NotFound("Post")));
            }
            Ok(db.get_post(&id)?.ok_or(ApiError::NotFound("Post")))
        })
        .await??;

    Ok(Json(updated.into_post()))
}

pub async fn delete_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let deleted = state
        .db(move |db| db.delete_post(&post_id.to_string()))
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Post"));
    }
    info!("Deleted post {}", post_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_category(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateCategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let slug = validate_slug(&req.slug)?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }

    let category = Category {
        id: Uuid::new_v4(),
        name,
        slug,
        description: req.description.filter(|d| !d.trim().is_empty()),
    };
    let row = category.clone();
    state
        .db(move |db| {
            db.create_category(
                &row.id.to_string(),
                &row.name,
                &row.slug,
                row.description.as_deref(),
            )
        })
        .await
        .map_err(conflict_on_duplicate("Category"))?;

    info!("Created category {} ({})", category.slug, category.id);
    Ok((StatusCode::CREATED, Json(category)))
}

/// Keys ending in `_email` must hold an email address.
pub async fn update_setting(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateSettingRequest>,
) -> ApiResult<StatusCode> {
    let value = if key.ends_with("_email") {
        normalize_email(&req.value)?
    } else {
        req.value.trim().to_string()
    };

    let stored_key = key.clone();
    state
        .db(move |db| db.set_setting(&stored_key, &value))
        .await?;
    info!("Admin setting {} updated", key);
    Ok(StatusCode::NO_CONTENT)
}
