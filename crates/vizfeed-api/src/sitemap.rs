use std::fmt::Write as _;

use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use chrono::{DateTime, SecondsFormat, Utc};

use vizfeed_types::api::{SitemapCategory, SitemapPost, SitemapTree};
use vizfeed_types::models::{Post, VizKind};

use crate::error::ApiResult;
use crate::html::escape_xml;
use crate::state::{ApiSettings, AppState};

/// Posts of this kind are listed in the sitemaps.
pub const SITEMAP_KIND: VizKind = VizKind::Custom;
const CACHE_CONTROL: &str = "public, max-age=3600, s-maxage=3600";

fn iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn url_entry(out: &mut String, loc: &str, lastmod: &str, changefreq: &str, priority: &str) {
    let _ = write!(
        out,
        "  <url>\n    <loc>{}</loc>\n    <lastmod>{lastmod}</lastmod>\n    \
         <changefreq>{changefreq}</changefreq>\n    <priority>{priority}</priority>\n  </url>\n",
        escape_xml(loc)
    );
}

/// Homepage entry plus one feed and one embed `<url>` per post, each
/// stamped with the post's creation time.
pub fn render_sitemap(settings: &ApiSettings, posts: &[Post], generated_at: DateTime<Utc>) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    url_entry(&mut out, &settings.url("/"), &iso(&generated_at), "daily", "1.0");
    for post in posts {
        let lastmod = iso(&post.created_at);
        url_entry(
            &mut out,
            &settings.url(&format!("/?post={}", post.slug)),
            &lastmod,
            "weekly",
            "0.8",
        );
        url_entry(
            &mut out,
            &settings.url(&format!("/embed/{}", post.slug)),
            &lastmod,
            "weekly",
            "0.7",
        );
    }

    out.push_str("</urlset>\n");
    out
}

pub fn build_tree(settings: &ApiSettings, posts: &[Post]) -> SitemapTree {
    let mut categories: Vec<SitemapCategory> = Vec::new();
    let mut uncategorized = Vec::new();

    for post in posts {
        let entry = SitemapPost {
            title: post.title.clone(),
            slug: post.slug.clone(),
            url: settings.url(&format!("/?post={}", post.slug)),
            embed_url: settings.url(&format!("/embed/{}", post.slug)),
            created_at: post.created_at,
        };
        match &post.category {
            Some(category) => match categories.iter_mut().find(|c| c.slug == category.slug) {
                Some(group) => group.posts.push(entry),
                None => categories.push(SitemapCategory {
                    name: category.name.clone(),
                    slug: category.slug.clone(),
                    url: settings.url(&format!("/home?category={}", category.slug)),
                    posts: vec![entry],
                }),
            },
            None => uncategorized.push(entry),
        }
    }
    categories.sort_by(|a, b| a.name.cmp(&b.name));

    SitemapTree {
        base_url: settings.base_url.clone(),
        home: settings.url("/"),
        grid: settings.url("/home"),
        categories,
        uncategorized,
        sitemap_xml: settings.url("/sitemap.xml"),
    }
}

async fn sitemap_posts(state: &AppState) -> ApiResult<Vec<Post>> {
    Ok(state
        .db(|db| db.list_posts(Some(SITEMAP_KIND)))
        .await?
        .into_iter()
        .map(|row| row.into_post())
        .collect())
}

pub async fn sitemap_xml(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let posts = sitemap_posts(&state).await?;
    let body = render_sitemap(&state.settings, &posts, Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, "application/xml"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        body,
    ))
}

pub async fn sitemap_tree(State(state): State<AppState>) -> ApiResult<Json<SitemapTree>> {
    let posts = sitemap_posts(&state).await?;
    Ok(Json(build_tree(&state.settings, &posts)))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;
    use vizfeed_types::models::CategoryRef;

    use super::*;

    fn settings() -> ApiSettings {
        ApiSettings {
            base_url: "https://viz.test".into(),
            admin_email: None,
            admin_emails: Vec::new(),
            mail_from: "VizFeed <noreply@viz.test>".into(),
            oauth: None,
        }
    }

    fn post(slug: &str, category: Option<&str>) -> Post {
        Post {
            id: Uuid::new_v4(),
            slug: slug.into(),
            title: slug.into(),
            description: None,
            kind: VizKind::Custom,
            custom_html: String::new(),
            custom_css: String::new(),
            custom_script: String::new(),
            config: None,
            thumbnail_url: None,
            external_url: None,
            likes_count: 0,
            comments_count: 0,
            views_count: 0,
            shares_count: 0,
            category: category.map(|name| CategoryRef {
                id: Uuid::new_v4(),
                name: name.into(),
                slug: name.to_lowercase(),
            }),
            created_at: Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn two_urls_per_post_with_creation_lastmod() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let xml = render_sitemap(&settings(), &[post("tides", None), post("winds", None)], now);

        assert_eq!(xml.matches("<url>").count(), 5);
        assert!(xml.contains("<loc>https://viz.test/?post=tides</loc>"));
        assert!(xml.contains("<loc>https://viz.test/embed/winds</loc>"));
        assert_eq!(xml.matches("<lastmod>2024-03-09T08:30:00.000Z</lastmod>").count(), 4);
        assert!(xml.contains("<lastmod>2025-01-01T00:00:00.000Z</lastmod>"));
    }

    #[test]
    fn loc_is_xml_escaped() {
        let xml = render_sitemap(&settings(), &[post("a&b", None)], Utc::now());
        assert!(xml.contains("?post=a&amp;b"));
    }

    #[test]
    fn tree_groups_by_category() {
        let tree = build_tree(
            &settings(),
            &[post("tides", Some("Oceans")), post("winds", None), post("reefs", Some("Oceans"))],
        );
        assert_eq!(tree.categories.len(), 1);
        assert_eq!(tree.categories[0].posts.len(), 2);
        assert_eq!(tree.categories[0].url, "https://viz.test/home?category=oceans");
        assert_eq!(tree.uncategorized[0].embed_url, "https://viz.test/embed/winds");
    }
}
