//! Database row types. These map directly to SQLite rows and stay separate
//! from the vizfeed-types API models; conversions live here.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use vizfeed_types::models::{
    CategoryRef, CategoryStats, Comment, ContactMessage, ErrorReport, Post, Profile, VizKind,
};

pub struct AccountRow {
    pub id: String,
    pub email: String,
    pub password: Option<String>,
    pub email_confirmed: bool,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

pub struct NewAccount<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: Option<&'a str>,
    pub username: &'a str,
    pub is_admin: bool,
    pub email_confirmed: bool,
}

pub struct PostRow {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub kind: String,
    pub custom_html: String,
    pub custom_css: String,
    pub custom_script: String,
    pub config: Option<String>,
    pub thumbnail_url: Option<String>,
    pub external_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub views_count: i64,
    pub shares_count: i64,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub created_at: String,
}

pub struct NewPost<'a> {
    pub id: &'a str,
    pub slug: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub kind: VizKind,
    pub custom_html: &'a str,
    pub custom_css: &'a str,
    pub custom_script: &'a str,
    pub config: Option<&'a str>,
    pub thumbnail_url: Option<&'a str>,
    pub external_url: Option<&'a str>,
    pub category_id: Option<&'a str>,
    /// Defaults to the insertion time when `None`.
    pub created_at: Option<&'a str>,
}

pub struct CategoryStatsRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub post_count: i64,
    pub total_views: i64,
    pub avg_views_per_post: f64,
    pub last_post_date: Option<String>,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}

pub struct ContactMessageRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub description: String,
    pub created_at: String,
}

pub struct ErrorReportRow {
    pub id: String,
    pub post_id: Option<String>,
    pub post_slug: Option<String>,
    pub reporter_id: Option<String>,
    pub description: String,
    pub page_url: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

/// Parses a stored timestamp. Column defaults write RFC 3339; older rows or
/// hand-written fixtures may use SQLite's "YYYY-MM-DD HH:MM:SS".
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

impl AccountRow {
    pub fn user_id(&self) -> Uuid {
        parse_id(&self.id, "user id")
    }

    pub fn to_profile(&self) -> Profile {
        Profile {
            id: self.user_id(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            is_admin: self.is_admin,
        }
    }
}

impl PostRow {
    pub fn into_post(self) -> Post {
        let kind = self.kind.parse().unwrap_or_else(|e| {
            warn!("Post '{}' has {}; treating as custom", self.slug, e);
            VizKind::Custom
        });

        let config = self.config.as_deref().and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| warn!("Corrupt config on post '{}': {}", self.slug, e))
                .ok()
        });

        let category = match (self.category_id, self.category_name, self.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(CategoryRef {
                id: parse_id(&id, "category id"),
                name,
                slug,
            }),
            _ => None,
        };

        Post {
            id: parse_id(&self.id, "post id"),
            slug: self.slug,
            title: self.title,
            description: self.description,
            kind,
            custom_html: self.custom_html,
            custom_css: self.custom_css,
            custom_script: self.custom_script,
            config,
            thumbnail_url: self.thumbnail_url,
            external_url: self.external_url,
            likes_count: self.likes_count,
            comments_count: self.comments_count,
            views_count: self.views_count,
            shares_count: self.shares_count,
            category,
            created_at: parse_timestamp(&self.created_at),
        }
    }
}

impl From<CategoryStatsRow> for CategoryStats {
    fn from(row: CategoryStatsRow) -> Self {
        Self {
            id: parse_id(&row.id, "category id"),
            name: row.name,
            slug: row.slug,
            description: row.description,
            post_count: row.post_count,
            total_views: row.total_views,
            avg_views_per_post: row.avg_views_per_post,
            last_post_date: row.last_post_date.as_deref().map(parse_timestamp),
        }
    }
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: parse_id(&row.id, "comment id"),
            post_id: parse_id(&row.post_id, "post id"),
            author_id: parse_id(&row.author_id, "author id"),
            author_username: row.author_username,
            content: row.content,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

impl From<ContactMessageRow> for ContactMessage {
    fn from(row: ContactMessageRow) -> Self {
        Self {
            id: parse_id(&row.id, "contact message id"),
            name: row.name,
            email: row.email,
            subject: row.subject,
            description: row.description,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

impl From<ErrorReportRow> for ErrorReport {
    fn from(row: ErrorReportRow) -> Self {
        Self {
            id: parse_id(&row.id, "error report id"),
            post_id: row.post_id.as_deref().map(|id| parse_id(id, "post id")),
            post_slug: row.post_slug,
            reporter_id: row.reporter_id.as_deref().map(|id| parse_id(id, "reporter id")),
            description: row.description,
            page_url: row.page_url,
            user_agent: row.user_agent,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_both_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(parse_timestamp("2025-03-14T09:26:53.000Z"), expected);
        assert_eq!(parse_timestamp("2025-03-14 09:26:53"), expected);
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }
}
