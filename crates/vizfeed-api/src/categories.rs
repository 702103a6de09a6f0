use axum::{Json, extract::State};
use uuid::Uuid;

use vizfeed_types::api::CategoriesResponse;
use vizfeed_types::models::{CategoryStats, PostCard};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::posts::KindQuery;
use crate::state::AppState;

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<CategoriesResponse>> {
    let categories: Vec<CategoryStats> = state
        .db(|db| db.list_category_stats())
        .await?
        .into_iter()
        .map(CategoryStats::from)
        .collect();

    let total_views = categories.iter().map(|c| c.total_views).sum();
    let total_posts = categories.iter().map(|c| c.post_count).sum();

    Ok(Json(CategoriesResponse {
        categories,
        total_views,
        total_posts,
    }))
}

pub async fn category_posts(
    State(state): State<AppState>,
    ApiPath(category_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<KindQuery>,
) -> ApiResult<Json<Vec<PostCard>>> {
    let kind = query.kind;
    let rows = state
        .db(move |db| {
            let id = category_id.to_string();
            if !db.category_exists(&id)? {
                return Ok(None);
            }
            db.list_category_posts(&id, kind).map(Some)
        })
        .await?
        .ok_or(ApiError::NotFound("Category"))?;

    Ok(Json(
        rows.into_iter()
            .map(|row| PostCard::from(row.into_post()))
            .collect(),
    ))
}
