use std::cmp::Ordering;

use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use uuid::Uuid;

use vizfeed_types::api::{
    Claims, CounterResponse, FeedResponse, GridResponse, GridSort, LikeResponse,
    PostDetailResponse,
};
use vizfeed_types::models::{Post, PostCard, VizKind};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::html::escape;
use crate::state::{ApiSettings, AppState};

pub const EMBED_WIDTH: u32 = 800;
pub const EMBED_HEIGHT: u32 = 600;

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    /// Deep-link slug that selects the initial post.
    pub post: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<VizKind>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GridQuery {
    pub q: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    #[serde(default)]
    pub sort: GridSort,
    #[serde(rename = "type")]
    pub kind: Option<VizKind>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KindQuery {
    #[serde(rename = "type")]
    pub kind: Option<VizKind>,
}

pub async fn feed(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> ApiResult<Json<FeedResponse>> {
    let kind = query.kind;
    let posts: Vec<Post> = state
        .db(move |db| db.list_posts(kind))
        .await?
        .into_iter()
        .map(|row| row.into_post())
        .collect();

    let initial_index = initial_index(&posts, query.post.as_deref());
    Ok(Json(FeedResponse {
        posts,
        initial_index,
    }))
}

/// Index of the post whose slug matches the deep link, else 0.
pub fn initial_index(posts: &[Post], slug: Option<&str>) -> usize {
    slug.and_then(|slug| posts.iter().position(|post| post.slug == slug))
        .unwrap_or(0)
}

pub async fn grid(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<GridQuery>,
) -> ApiResult<Json<GridResponse>> {
    let kind = query.kind.unwrap_or(VizKind::Custom);
    let posts: Vec<Post> = state
        .db(move |db| db.list_posts(Some(kind)))
        .await?
        .into_iter()
        .map(|row| row.into_post())
        .collect();

    let posts = filter_and_sort(posts, query.q.as_deref(), query.category.as_deref(), query.sort);
    let total_likes = posts.iter().map(|p| p.likes_count).sum();
    let total_comments = posts.iter().map(|p| p.comments_count).sum();

    Ok(Json(GridResponse {
        posts: posts.into_iter().map(PostCard::from).collect(),
        total_likes,
        total_comments,
    }))
}

/// Case-insensitive search over title, description, HTML fragment and
/// category name, then category-slug filter, then ordering.
pub fn filter_and_sort(
    posts: Vec<Post>,
    search: Option<&str>,
    category_slug: Option<&str>,
    sort: GridSort,
) -> Vec<Post> {
    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let category_slug = category_slug.filter(|s| !s.is_empty() && *s != "all");

    let mut posts: Vec<Post> = posts
        .into_iter()
        .filter(|post| match &needle {
            Some(needle) => matches_search(post, needle),
            None => true,
        })
        .filter(|post| match category_slug {
            Some(slug) => post.category.as_ref().is_some_and(|c| c.slug == slug),
            None => true,
        })
        .collect();

    posts.sort_by(|a, b| {
        let newest = b.created_at.cmp(&a.created_at);
        match sort {
            GridSort::Date => newest,
            GridSort::Views => b.views_count.cmp(&a.views_count).then(newest),
            GridSort::Likes => b.likes_count.cmp(&a.likes_count).then(newest),
            GridSort::Category => compare_category(a, b).then(newest),
        }
    });
    posts
}

fn matches_search(post: &Post, needle: &str) -> bool {
    post.title.to_lowercase().contains(needle)
        || post
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || post.custom_html.to_lowercase().contains(needle)
        || post
            .category
            .as_ref()
            .is_some_and(|c| c.name.to_lowercase().contains(needle))
}

/// Alphabetical by category name; uncategorized posts last.
fn compare_category(a: &Post, b: &Post) -> Ordering {
    match (&a.category, &b.category) {
        (Some(a), Some(b)) => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(query): ApiQuery<KindQuery>,
) -> ApiResult<Json<PostDetailResponse>> {
    let kind = query.kind;
    let post = state
        .db(move |db| db.get_post_by_slug(&slug, kind))
        .await?
        .ok_or(ApiError::NotFound("Post"))?
        .into_post();

    let embed_url = embed_url(&state.settings, &post.slug);
    let embed_code = embed_code(&embed_url, &post.title);
    Ok(Json(PostDetailResponse {
        post,
        embed_url,
        embed_code,
    }))
}

pub fn embed_url(settings: &ApiSettings, slug: &str) -> String {
    settings.url(&format!("/embed/{slug}"))
}

/// Fixed-size iframe snippet for third-party pages.
pub fn embed_code(embed_url: &str, title: &str) -> String {
    format!(
        r#"<iframe src="{}" width="{EMBED_WIDTH}" height="{EMBED_HEIGHT}" title="{}" frameborder="0" sandbox="allow-scripts" allowfullscreen></iframe>"#,
        escape(embed_url),
        escape(title)
    )
}

pub async fn record_view(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<Json<CounterResponse>> {
    let count = state
        .db(move |db| db.increment_views(&post_id.to_string()))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;
    Ok(Json(CounterResponse { count }))
}

pub async fn record_share(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<Json<CounterResponse>> {
    let count = state
        .db(move |db| db.increment_shares(&post_id.to_string()))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;
    Ok(Json(CounterResponse { count }))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<LikeResponse>> {
    let interaction_id = Uuid::new_v4();
    let (liked, likes_count) = state
        .db(move |db| {
            db.toggle_like(
                &interaction_id.to_string(),
                &claims.sub.to_string(),
                &post_id.to_string(),
            )
        })
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    Ok(Json(LikeResponse { liked, likes_count }))
}

pub async fn like_status(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<LikeResponse>> {
    let status = state
        .db(move |db| {
            let post_id = post_id.to_string();
            let Some(post) = db.get_post(&post_id)? else {
                return Ok(None);
            };
            let liked = db.has_liked(&claims.sub.to_string(), &post_id)?;
            Ok(Some(LikeResponse {
                liked,
                likes_count: post.likes_count,
            }))
        })
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use vizfeed_types::models::CategoryRef;

    use super::*;

    fn post(slug: &str, day: u32, views: i64, likes: i64, category: Option<&str>) -> Post {
        Post {
            id: Uuid::new_v4(),
            slug: slug.into(),
            title: slug.replace('-', " "),
            description: None,
            kind: VizKind::Custom,
            custom_html: format!("<div id=\"{slug}\"></div>"),
            custom_css: String::new(),
            custom_script: String::new(),
            config: None,
            thumbnail_url: None,
            external_url: None,
            likes_count: likes,
            comments_count: 0,
            views_count: views,
            shares_count: 0,
            category: category.map(|name| CategoryRef {
                id: Uuid::new_v4(),
                name: name.into(),
                slug: name.to_lowercase(),
            }),
            created_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
        }
    }

    fn slugs(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    fn sample() -> Vec<Post> {
        vec![
            post("ocean-currents", 1, 50, 3, Some("Oceans")),
            post("city-lights", 3, 10, 9, Some("Cities")),
            post("flight-paths", 2, 80, 1, None),
        ]
    }

    #[test]
    fn deep_link_selects_index() {
        let posts = sample();
        assert_eq!(initial_index(&posts, Some("flight-paths")), 2);
        assert_eq!(initial_index(&posts, Some("missing")), 0);
        assert_eq!(initial_index(&posts, None), 0);
    }

    #[test]
    fn sorts() {
        assert_eq!(
            slugs(&filter_and_sort(sample(), None, None, GridSort::Date)),
            ["city-lights", "flight-paths", "ocean-currents"]
        );
        assert_eq!(
            slugs(&filter_and_sort(sample(), None, None, GridSort::Views)),
            ["flight-paths", "ocean-currents", "city-lights"]
        );
        assert_eq!(
            slugs(&filter_and_sort(sample(), None, None, GridSort::Likes)),
            ["city-lights", "ocean-currents", "flight-paths"]
        );
        assert_eq!(
            slugs(&filter_and_sort(sample(), None, None, GridSort::Category)),
            ["city-lights", "ocean-currents", "flight-paths"]
        );
    }

    #[test]
    fn search_covers_html_and_category_name() {
        assert_eq!(
            slugs(&filter_and_sort(sample(), Some("OCEANS"), None, GridSort::Date)),
            ["ocean-currents"]
        );
        assert_eq!(
            slugs(&filter_and_sort(sample(), Some("id=\"flight"), None, GridSort::Date)),
            ["flight-paths"]
        );
        assert_eq!(filter_and_sort(sample(), Some("  "), None, GridSort::Date).len(), 3);
    }

    #[test]
    fn category_filter_by_slug() {
        assert_eq!(
            slugs(&filter_and_sort(sample(), None, Some("cities"), GridSort::Date)),
            ["city-lights"]
        );
        assert_eq!(filter_and_sort(sample(), None, Some("all"), GridSort::Date).len(), 3);
    }

    #[test]
    fn embed_code_is_fixed_size_iframe() {
        let code = embed_code("https://viz.test/embed/a", "A \"quoted\" title");
        assert!(code.starts_with(r#"<iframe src="https://viz.test/embed/a" width="800" height="600""#));
        assert!(code.contains("A &quot;quoted&quot; title"));
        assert!(code.contains(r#"sandbox="allow-scripts""#));
    }
}
