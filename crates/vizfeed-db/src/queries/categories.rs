use anyhow::Result;
use rusqlite::params;

use super::OptionalExt;
use crate::Database;
use crate::models::CategoryStatsRow;

impl Database {
    // -- Categories --

    pub fn create_category(
        &self,
        id: &str,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO categories (id, name, slug, description) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, slug, description],
            )?;
            Ok(())
        })
    }

    pub fn category_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM categories WHERE id = ?1", [id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Rows of the `category_stats` view, most viewed first.
    pub fn list_category_stats(&self) -> Result<Vec<CategoryStatsRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, slug, description, post_count, total_views,
                        avg_views_per_post, last_post_date
                 FROM category_stats
                 ORDER BY total_views DESC, name ASC",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(CategoryStatsRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                        description: row.get(3)?,
                        post_count: row.get(4)?,
                        total_views: row.get(5)?,
                        avg_views_per_post: row.get(6)?,
                        last_post_date: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::queries::fixtures;
    use vizfeed_types::api::UpdatePostRequest;

    #[test]
    fn stats_view_aggregates_posts() {
        let db = Database::open_in_memory().unwrap();
        let oceans = "00000000-0000-0000-0000-0000000000c1";
        db.create_category(oceans, "Oceans", "oceans", None).unwrap();
        db.create_category("c2", "Empty", "empty", None).unwrap();
        fixtures::post(&db, "p1", "warming", "2025-01-01T00:00:00.000Z");
        fixtures::post(&db, "p2", "sea-level", "2025-02-01T00:00:00.000Z");

        let update = UpdatePostRequest {
            category_id: Some(Some(oceans.parse().unwrap())),
            ..Default::default()
        };
        for id in ["p1", "p2"] {
            assert!(db.update_post(id, &update).unwrap());
        }
        for id in ["p1", "p1", "p1", "p2"] {
            db.increment_views(id).unwrap();
        }

        let stats = db.list_category_stats().unwrap();
        assert_eq!(stats.len(), 2);

        let first = &stats[0];
        assert_eq!(first.slug, "oceans");
        assert_eq!(first.post_count, 2);
        assert_eq!(first.total_views, 4);
        assert!((first.avg_views_per_post - 2.0).abs() < f64::EPSILON);
        assert_eq!(first.last_post_date.as_deref(), Some("2025-02-01T00:00:00.000Z"));

        let empty = &stats[1];
        assert_eq!(empty.post_count, 0);
        assert_eq!(empty.total_views, 0);
        assert!(empty.last_post_date.is_none());
        assert!(db.category_exists(oceans).unwrap());
    }
}
