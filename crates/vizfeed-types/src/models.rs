use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Which rendering library a post's stored script drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VizKind {
    #[default]
    Custom,
    Cesium,
    Globe,
    Leaflet,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown post type: {0}")]
pub struct UnknownVizKind(pub String);

impl VizKind {
    pub const ALL: [VizKind; 4] = [Self::Custom, Self::Cesium, Self::Globe, Self::Leaflet];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Cesium => "cesium",
            Self::Globe => "globe",
            Self::Leaflet => "leaflet",
        }
    }
}

impl fmt::Display for VizKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VizKind {
    type Err = UnknownVizKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownVizKind(s.to_string()))
    }
}

/// The slice of a category embedded in post responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// A feed item with its stored visualization fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: VizKind,
    pub custom_html: String,
    pub custom_css: String,
    pub custom_script: String,
    pub config: Option<serde_json::Value>,
    pub thumbnail_url: Option<String>,
    pub external_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub views_count: i64,
    pub shares_count: i64,
    pub category: Option<CategoryRef>,
    pub created_at: DateTime<Utc>,
}

/// Grid/list representation without the fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCard {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: VizKind,
    pub thumbnail_url: Option<String>,
    pub external_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub views_count: i64,
    pub shares_count: i64,
    pub category: Option<CategoryRef>,
    pub created_at: DateTime<Utc>,
}

impl From<Post> for PostCard {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            slug: post.slug,
            title: post.title,
            description: post.description,
            kind: post.kind,
            thumbnail_url: post.thumbnail_url,
            external_url: post.external_url,
            likes_count: post.likes_count,
            comments_count: post.comments_count,
            views_count: post.views_count,
            shares_count: post.shares_count,
            category: post.category,
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

/// One row of the `category_stats` view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub post_count: i64,
    pub total_views: i64,
    pub avg_views_per_post: f64,
    pub last_post_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub id: Uuid,
    pub post_id: Option<Uuid>,
    pub post_slug: Option<String>,
    pub reporter_id: Option<Uuid>,
    pub description: String,
    pub page_url: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viz_kind_parses_known_tags() {
        for kind in VizKind::ALL {
            assert_eq!(kind.as_str().parse::<VizKind>().unwrap(), kind);
        }
        assert!("webgpu".parse::<VizKind>().is_err());
    }

    #[test]
    fn viz_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&VizKind::Leaflet).unwrap(), "\"leaflet\"");
    }
}
