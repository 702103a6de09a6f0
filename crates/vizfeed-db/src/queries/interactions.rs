use anyhow::Result;
use rusqlite::params;

use super::OptionalExt;
use crate::Database;

const LIKE: &str = "like";

impl Database {
    // -- Interactions --

    /// Toggle a like: removes it if present, inserts it if not, and adjusts
    /// `likes_count` in the same transaction.
    ///
    /// Returns `(liked, likes_count)` after the toggle, or `None` if the post
    /// doesn't exist.
    pub fn toggle_like(
        &self,
        interaction_id: &str,
        user_id: &str,
        post_id: &str,
    ) -> Result<Option<(bool, i64)>> {
        self.with_tx(|tx| {
            let exists = tx
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM interactions WHERE user_id = ?1 AND post_id = ?2 AND type = ?3",
                params![user_id, post_id, LIKE],
            )?;

            let liked = if removed > 0 {
                tx.execute(
                    "UPDATE posts SET likes_count = MAX(likes_count - 1, 0) WHERE id = ?1",
                    [post_id],
                )?;
                false
            } else {
                tx.execute(
                    "INSERT INTO interactions (id, user_id, post_id, type) VALUES (?1, ?2, ?3, ?4)",
                    params![interaction_id, user_id, post_id, LIKE],
                )?;
                tx.execute(
                    "UPDATE posts SET likes_count = likes_count + 1 WHERE id = ?1",
                    [post_id],
                )?;
                true
            };

            let likes_count: i64 =
                tx.query_row("SELECT likes_count FROM posts WHERE id = ?1", [post_id], |row| {
                    row.get(0)
                })?;
            Ok(Some((liked, likes_count)))
        })
    }

    pub fn has_liked(&self, user_id: &str, post_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let liked = conn
                .query_row(
                    "SELECT 1 FROM interactions WHERE user_id = ?1 AND post_id = ?2 AND type = ?3",
                    params![user_id, post_id, LIKE],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            Ok(liked)
        })
    }

    /// Like interactions actually stored for a post.
    pub fn count_likes(&self, post_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM interactions WHERE post_id = ?1 AND type = ?2",
                params![post_id, LIKE],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::queries::fixtures;

    #[test]
    fn toggling_twice_restores_count() {
        let db = Database::open_in_memory().unwrap();
        fixtures::account(&db, "u1", "alice");
        fixtures::post(&db, "p1", "liked", "2025-01-01T00:00:00.000Z");

        assert_eq!(db.toggle_like("i1", "u1", "p1").unwrap(), Some((true, 1)));
        assert!(db.has_liked("u1", "p1").unwrap());
        assert_eq!(db.toggle_like("i2", "u1", "p1").unwrap(), Some((false, 0)));
        assert!(!db.has_liked("u1", "p1").unwrap());
    }

    #[test]
    fn counter_tracks_interaction_rows() {
        let db = Database::open_in_memory().unwrap();
        fixtures::account(&db, "u1", "alice");
        fixtures::account(&db, "u2", "bob");
        fixtures::post(&db, "p1", "popular", "2025-01-01T00:00:00.000Z");

        db.toggle_like("i1", "u1", "p1").unwrap();
        let (_, count) = db.toggle_like("i2", "u2", "p1").unwrap().unwrap();

        assert_eq!(count, 2);
        assert_eq!(db.count_likes("p1").unwrap(), count);
    }

    #[test]
    fn liking_a_missing_post_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        fixtures::account(&db, "u1", "alice");

        assert_eq!(db.toggle_like("i1", "u1", "missing").unwrap(), None);
        assert_eq!(db.count_likes("missing").unwrap(), 0);
    }
}
