use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use tracing::{debug, warn};

use vizfeed_types::models::VizKind;

use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery};
use crate::posts::KindQuery;
use crate::state::AppState;
use crate::viz::document::{EmbedSession, render_embed_document, render_not_found};
use crate::viz::library::LibraryManifest;

/// Standalone document hosting one post's visualization.
pub async fn embed_page(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(query): ApiQuery<KindQuery>,
) -> ApiResult<Response> {
    let kind = query.kind.unwrap_or(VizKind::Custom);
    let lookup = slug.clone();
    let row = state
        .db(move |db| db.get_post_by_slug(&lookup, Some(kind)))
        .await?;

    let Some(row) = row else {
        debug!("Embed requested for unknown {} post '{}'", kind, slug);
        return Ok((StatusCode::NOT_FOUND, Html(render_not_found(&slug))).into_response());
    };
    let post = row.into_post();

    let (session_id, _cancel) = state.viz.mount(post.id).await;
    let session_url = state.settings.url(&format!("/api/viz/sessions/{session_id}"));
    let session = EmbedSession {
        session_id,
        events_url: format!("{session_url}/events"),
        session_url,
    };

    let manifest = LibraryManifest::for_kind(post.kind);
    let document = render_embed_document(&post, &manifest, Some(&session));

    let mut response = Html(document.html).into_response();
    match HeaderValue::from_str(&document.csp) {
        Ok(csp) => {
            response
                .headers_mut()
                .insert(header::CONTENT_SECURITY_POLICY, csp);
        }
        Err(e) => warn!("Unrepresentable CSP for '{}': {}", post.slug, e),
    }
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}
