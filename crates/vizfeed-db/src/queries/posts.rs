use anyhow::Result;
use rusqlite::{Connection, Row, params};

use vizfeed_types::api::UpdatePostRequest;
use vizfeed_types::models::VizKind;

use super::OptionalExt;
use crate::Database;
use crate::models::{NewPost, PostRow};

const POST_SELECT: &str = "SELECT p.id, p.slug, p.title, p.description, p.type,
        p.custom_html, p.custom_css, p.custom_script, p.config,
        p.thumbnail_url, p.external_url,
        p.likes_count, p.comments_count, p.views_count, p.shares_count,
        p.category_id, c.name, c.slug, p.created_at
     FROM posts p
     LEFT JOIN categories c ON c.id = p.category_id";

impl Database {
    // -- Posts --

    pub fn create_post(&self, post: &NewPost<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (id, slug, title, description, type, custom_html, custom_css,
                                    custom_script, config, thumbnail_url, external_url,
                                    category_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                         COALESCE(?13, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))",
                params![
                    post.id,
                    post.slug,
                    post.title,
                    post.description,
                    post.kind.as_str(),
                    post.custom_html,
                    post.custom_css,
                    post.custom_script,
                    post.config,
                    post.thumbnail_url,
                    post.external_url,
                    post.category_id,
                    post.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Applies the fields present in `update`. Returns false if no such post.
    pub fn update_post(&self, id: &str, update: &UpdatePostRequest) -> Result<bool> {
        // Nullable columns bind a (present, value) pair so an explicit null clears them.
        let config = update
            .config
            .as_ref()
            .map(|value| value.as_ref().map(|v| v.to_string()));
        let category_id = update.category_id.map(|id| id.map(|id| id.to_string()));
        let (set_description, description) = split(&update.description);
        let (set_config, config) = split(&config);
        let (set_thumbnail, thumbnail_url) = split(&update.thumbnail_url);
        let (set_external, external_url) = split(&update.external_url);
        let (set_category, category_id) = split(&category_id);

        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET
                    title         = COALESCE(?2, title),
                    description   = CASE WHEN ?3 THEN ?4 ELSE description END,
                    custom_html   = COALESCE(?5, custom_html),
                    custom_css    = COALESCE(?6, custom_css),
                    custom_script = COALESCE(?7, custom_script),
                    config        = CASE WHEN ?8 THEN ?9 ELSE config END,
                    thumbnail_url = CASE WHEN ?10 THEN ?11 ELSE thumbnail_url END,
                    external_url  = CASE WHEN ?12 THEN ?13 ELSE external_url END,
                    category_id   = CASE WHEN ?14 THEN ?15 ELSE category_id END
                 WHERE id = ?1",
                params![
                    id,
                    update.title,
                    set_description,
                    description,
                    update.custom_html,
                    update.custom_css,
                    update.custom_script,
                    set_config,
                    config,
                    set_thumbnail,
                    thumbnail_url,
                    set_external,
                    external_url,
                    set_category,
                    category_id,
                ],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(changed == 1)
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POST_SELECT} WHERE p.id = ?1");
            conn.query_row(&sql, [id], post_from_row).optional()
        })
    }

    /// Looks a post up by slug, optionally restricted to one type.
    pub fn get_post_by_slug(&self, slug: &str, kind: Option<VizKind>) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POST_SELECT} WHERE p.slug = ?1 AND (?2 IS NULL OR p.type = ?2)");
            conn.query_row(&sql, params![slug, kind.map(VizKind::as_str)], post_from_row)
                .optional()
        })
    }

    /// All posts, newest first, optionally restricted to one type.
    pub fn list_posts(&self, kind: Option<VizKind>) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            query_posts(
                conn,
                "WHERE (?1 IS NULL OR p.type = ?1) ORDER BY p.created_at DESC",
                params![kind.map(VizKind::as_str)],
            )
        })
    }

    /// Posts of one category, most viewed first.
    pub fn list_category_posts(
        &self,
        category_id: &str,
        kind: Option<VizKind>,
    ) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            query_posts(
                conn,
                "WHERE p.category_id = ?1 AND (?2 IS NULL OR p.type = ?2)
                 ORDER BY p.views_count DESC, p.created_at DESC",
                params![category_id, kind.map(VizKind::as_str)],
            )
        })
    }

    /// Returns the new view count, or `None` if the post doesn't exist.
    pub fn increment_views(&self, id: &str) -> Result<Option<i64>> {
        self.bump_counter(id, "views_count")
    }

    pub fn increment_shares(&self, id: &str) -> Result<Option<i64>> {
        self.bump_counter(id, "shares_count")
    }

    fn bump_counter(&self, id: &str, column: &'static str) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let sql = format!("UPDATE posts SET {column} = {column} + 1 WHERE id = ?1 RETURNING {column}");
            conn.query_row(&sql, [id], |row| row.get(0)).optional()
        })
    }
}

pub(crate) fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        kind: row.get(4)?,
        custom_html: row.get(5)?,
        custom_css: row.get(6)?,
        custom_script: row.get(7)?,
        config: row.get(8)?,
        thumbnail_url: row.get(9)?,
        external_url: row.get(10)?,
        likes_count: row.get(11)?,
        comments_count: row.get(12)?,
        views_count: row.get(13)?,
        shares_count: row.get(14)?,
        category_id: row.get(15)?,
        category_name: row.get(16)?,
        category_slug: row.get(17)?,
        created_at: row.get(18)?,
    })
}

fn query_posts(
    conn: &Connection,
    tail: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<PostRow>> {
    let sql = format!("{POST_SELECT} {tail}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, post_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn split<T>(field: &Option<Option<T>>) -> (bool, Option<&T>) {
    (field.is_some(), field.as_ref().and_then(Option::as_ref))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn lists_newest_first_and_filters_by_type() {
        let db = Database::open_in_memory().unwrap();
        fixtures::post(&db, "p1", "older", "2025-01-01T00:00:00.000Z");
        fixtures::post(&db, "p2", "newer", "2025-02-01T00:00:00.000Z");

        let slugs: Vec<String> = db
            .list_posts(None)
            .unwrap()
            .into_iter()
            .map(|row| row.slug)
            .collect();
        assert_eq!(slugs, ["newer", "older"]);

        assert!(db.list_posts(Some(VizKind::Cesium)).unwrap().is_empty());
        assert!(db.get_post_by_slug("older", Some(VizKind::Leaflet)).unwrap().is_none());
        assert!(db.get_post_by_slug("older", Some(VizKind::Custom)).unwrap().is_some());
    }

    #[test]
    fn uncategorized_post_has_no_category() {
        let db = Database::open_in_memory().unwrap();
        fixtures::post(&db, "p1", "lonely", "2025-01-01T00:00:00.000Z");

        let post = db.get_post("p1").unwrap().unwrap().into_post();
        assert!(post.category.is_none());
    }

    #[test]
    fn counters_report_missing_posts() {
        let db = Database::open_in_memory().unwrap();
        fixtures::post(&db, "p1", "counted", "2025-01-01T00:00:00.000Z");

        assert_eq!(db.increment_views("p1").unwrap(), Some(1));
        assert_eq!(db.increment_views("p1").unwrap(), Some(2));
        assert_eq!(db.increment_shares("p1").unwrap(), Some(1));
        assert_eq!(db.increment_views("missing").unwrap(), None);
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let db = Database::open_in_memory().unwrap();
        fixtures::post(&db, "p1", "editable", "2025-01-01T00:00:00.000Z");

        let update = UpdatePostRequest {
            title: Some("Edited".into()),
            ..Default::default()
        };
        assert!(db.update_post("p1", &update).unwrap());
        assert!(!db.update_post("missing", &update).unwrap());

        let row = db.get_post("p1").unwrap().unwrap();
        assert_eq!(row.title, "Edited");
        assert_eq!(row.custom_html, "<div id=\"globe\"></div>");
    }

    #[test]
    fn explicit_null_clears_nullable_fields() {
        let db = Database::open_in_memory().unwrap();
        let category = "00000000-0000-0000-0000-0000000000c1";
        db.create_category(category, "Oceans", "oceans", None).unwrap();
        fixtures::post(&db, "p1", "clearable", "2025-01-01T00:00:00.000Z");

        let set = UpdatePostRequest {
            description: Some(Some("Sea ice".into())),
            external_url: Some(Some("https://data.test/ice".into())),
            category_id: Some(Some(category.parse().unwrap())),
            ..Default::default()
        };
        assert!(db.update_post("p1", &set).unwrap());
        let row = db.get_post("p1").unwrap().unwrap();
        assert_eq!(row.description.as_deref(), Some("Sea ice"));
        assert_eq!(row.category_id.as_deref(), Some(category));

        let clear = UpdatePostRequest {
            description: Some(None),
            category_id: Some(None),
            ..Default::default()
        };
        assert!(db.update_post("p1", &clear).unwrap());
        let row = db.get_post("p1").unwrap().unwrap();
        assert!(row.description.is_none());
        assert!(row.category_id.is_none());
        assert_eq!(row.external_url.as_deref(), Some("https://data.test/ice"));
    }
}
