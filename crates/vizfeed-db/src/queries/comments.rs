use anyhow::Result;
use rusqlite::params;

use super::OptionalExt;
use crate::Database;
use crate::models::CommentRow;

impl Database {
    // -- Comments --

    /// Inserts a comment and bumps `comments_count` in one transaction.
    /// Returns the new count, or `None` if the post doesn't exist.
    pub fn add_comment(
        &self,
        id: &str,
        post_id: &str,
        author_id: &str,
        content: &str,
    ) -> Result<Option<i64>> {
        self.with_tx(|tx| {
            let exists = tx
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO comments (id, post_id, author_id, content) VALUES (?1, ?2, ?3, ?4)",
                params![id, post_id, author_id, content],
            )?;
            let count = tx.query_row(
                "UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?1
                 RETURNING comments_count",
                [post_id],
                |row| row.get(0),
            )?;
            Ok(Some(count))
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT c.id, c.post_id, c.author_id, COALESCE(p.username, 'unknown'), c.content, c.created_at
                 FROM comments c
                 LEFT JOIN profiles p ON p.id = c.author_id
                 WHERE c.id = ?1",
                [id],
                |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row.get(3)?,
                        content: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Comments on a post, newest first.
    pub fn list_comments(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            // JOIN profiles to fetch the author's username in a single query
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.author_id, COALESCE(p.username, 'unknown'), c.content, c.created_at
                 FROM comments c
                 LEFT JOIN profiles p ON p.id = c.author_id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at DESC",
            )?;

            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row.get(3)?,
                        content: row.get(4)?,
                        created_at: row.get(5)?,
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

    #[test]
    fn comment_bumps_counter() {
        let db = Database::open_in_memory().unwrap();
        fixtures::account(&db, "u1", "alice");
        fixtures::post(&db, "p1", "talked-about", "2025-01-01T00:00:00.000Z");

        assert_eq!(db.add_comment("c1", "p1", "u1", "first").unwrap(), Some(1));
        assert_eq!(db.add_comment("c2", "p1", "u1", "second").unwrap(), Some(2));

        let comments = db.list_comments("p1").unwrap();
        assert_eq!(comments.len(), 2);
        assert!(comments.iter().all(|c| c.author_username == "alice"));
    }

    #[test]
    fn comment_on_missing_post_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        fixtures::account(&db, "u1", "alice");

        assert_eq!(db.add_comment("c1", "missing", "u1", "hello").unwrap(), None);
        assert!(db.get_comment("c1").unwrap().is_none());
    }
}
