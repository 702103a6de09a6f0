use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{CategoryStats, Comment, Post, PostCard, Profile, VizKind};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the OAuth callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub token: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: Profile,
    pub email: String,
    pub email_confirmed: bool,
}

// -- Feed & posts --

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub posts: Vec<Post>,
    /// Index of the deep-linked post, 0 when none matched.
    pub initial_index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: Post,
    pub embed_url: String,
    pub embed_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GridResponse {
    pub posts: Vec<PostCard>,
    pub total_likes: i64,
    pub total_comments: i64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GridSort {
    #[default]
    Date,
    Views,
    Likes,
    Category,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CounterResponse {
    pub count: i64,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentCreatedResponse {
    pub comment: Comment,
    pub comments_count: i64,
}

// -- Categories --

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryStats>,
    pub total_views: i64,
    pub total_posts: i64,
}

// -- Support --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateContactMessageRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateErrorReportRequest {
    pub post_id: Option<Uuid>,
    pub description: String,
    pub page_url: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendContactMessageRequest {
    #[serde(alias = "messageId")]
    pub message_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SendErrorReportRequest {
    #[serde(alias = "reportId")]
    pub report_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MailSentResponse {
    pub success: bool,
    pub provider_id: Option<String>,
}

// -- Sitemap --

#[derive(Debug, Serialize, Deserialize)]
pub struct SitemapTree {
    pub base_url: String,
    pub home: String,
    pub grid: String,
    pub categories: Vec<SitemapCategory>,
    pub uncategorized: Vec<SitemapPost>,
    pub sitemap_xml: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SitemapCategory {
    pub name: String,
    pub slug: String,
    pub url: String,
    pub posts: Vec<SitemapPost>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SitemapPost {
    pub title: String,
    pub slug: String,
    pub url: String,
    pub embed_url: String,
    pub created_at: DateTime<Utc>,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: VizKind,
    #[serde(default)]
    pub custom_html: String,
    #[serde(default)]
    pub custom_css: String,
    #[serde(default)]
    pub custom_script: String,
    pub config: Option<serde_json::Value>,
    pub thumbnail_url: Option<String>,
    pub external_url: Option<String>,
    pub category_id: Option<Uuid>,
}

/// Partial post edit. Nullable columns use `Option<Option<T>>`: an absent
/// field is left alone, an explicit `null` clears it.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub custom_html: Option<String>,
    pub custom_css: Option<String>,
    pub custom_script: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub config: Option<Option<serde_json::Value>>,
    #[serde(default, deserialize_with = "present")]
    pub thumbnail_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub external_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub category_id: Option<Option<Uuid>>,
}

/// Only called when the key is in the payload, so `null` maps to `Some(None)`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSettingRequest {
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_null_from_absent() {
        let update: UpdatePostRequest =
            serde_json::from_str(r#"{"title":"New","category_id":null}"#).unwrap();
        assert_eq!(update.title.as_deref(), Some("New"));
        assert_eq!(update.category_id, Some(None));
        assert!(update.description.is_none());
        assert!(update.external_url.is_none());

        let update: UpdatePostRequest =
            serde_json::from_str(r#"{"external_url":"https://x.test"}"#).unwrap();
        assert_eq!(update.external_url, Some(Some("https://x.test".to_string())));
    }
}
