use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::debug;
use uuid::Uuid;

use vizfeed_types::api::{Claims, CommentCreatedResponse, CreateCommentRequest};
use vizfeed_types::models::Comment;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub const MAX_COMMENT_CHARS: usize = 500;

pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    let comments = state
        .db(move |db| {
            let post_id = post_id.to_string();
            if db.get_post(&post_id)?.is_none() {
                return Ok(None);
            }
            db.list_comments(&post_id).map(Some)
        })
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    Ok(Json(comments.into_iter().map(Comment::from).collect()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = validate_comment(&req.content)?;

    let comment_id = Uuid::new_v4().to_string();
    let created = state
        .db(move |db| {
            let Some(comments_count) =
                db.add_comment(&comment_id, &post_id.to_string(), &claims.sub.to_string(), &content)?
            else {
                return Ok(None);
            };
            let row = db
                .get_comment(&comment_id)?
                .ok_or_else(|| anyhow::anyhow!("Comment {} vanished after insert", comment_id))?;
            Ok(Some((row, comments_count)))
        })
        .await?;

    let (row, comments_count) = created.ok_or(ApiError::NotFound("Post"))?;
    debug!("Comment {} added to post {}", row.id, post_id);

    Ok((
        StatusCode::CREATED,
        Json(CommentCreatedResponse {
            comment: row.into(),
            comments_count,
        }),
    ))
}

fn validate_comment(raw: &str) -> ApiResult<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(ApiError::bad_request("Comment is empty"));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiError::bad_request(format!(
            "Comment exceeds {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_length_is_counted_in_chars_after_trim() {
        assert!(validate_comment("   ").is_err());
        assert_eq!(validate_comment("  nice globe \n").unwrap(), "nice globe");
        assert!(validate_comment(&"🌍".repeat(MAX_COMMENT_CHARS)).is_ok());
        assert!(validate_comment(&"a".repeat(MAX_COMMENT_CHARS + 1)).is_err());
    }
}
