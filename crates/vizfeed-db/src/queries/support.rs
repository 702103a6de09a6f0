use anyhow::Result;
use rusqlite::params;

use super::OptionalExt;
use crate::Database;
use crate::models::{ContactMessageRow, ErrorReportRow};

impl Database {
    // -- Contact messages --

    pub fn insert_contact_message(
        &self,
        id: &str,
        name: &str,
        email: &str,
        subject: &str,
        description: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO contact_messages (id, name, email, subject, description)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, name, email, subject, description],
            )?;
            Ok(())
        })
    }

    pub fn get_contact_message(&self, id: &str) -> Result<Option<ContactMessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, subject, description, created_at
                 FROM contact_messages WHERE id = ?1",
                [id],
                |row| {
                    Ok(ContactMessageRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        subject: row.get(3)?,
                        description: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Error reports --

    pub fn insert_error_report(
        &self,
        id: &str,
        post_id: Option<&str>,
        reporter_id: Option<&str>,
        description: &str,
        page_url: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO error_reports (id, post_id, reporter_id, description, page_url, user_agent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, post_id, reporter_id, description, page_url, user_agent],
            )?;
            Ok(())
        })
    }

    pub fn get_error_report(&self, id: &str) -> Result<Option<ErrorReportRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT r.id, r.post_id, p.slug, r.reporter_id, r.description,
                        r.page_url, r.user_agent, r.created_at
                 FROM error_reports r
                 LEFT JOIN posts p ON p.id = r.post_id
                 WHERE r.id = ?1",
                [id],
                |row| {
                    Ok(ErrorReportRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        post_slug: row.get(2)?,
                        reporter_id: row.get(3)?,
                        description: row.get(4)?,
                        page_url: row.get(5)?,
                        user_agent: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::queries::fixtures;

    #[test]
    fn error_report_carries_post_slug() {
        let db = Database::open_in_memory().unwrap();
        fixtures::post(&db, "p1", "broken-globe", "2025-01-01T00:00:00.000Z");

        db.insert_error_report("r1", Some("p1"), None, "blank canvas", None, Some("curl"))
            .unwrap();
        let report = db.get_error_report("r1").unwrap().unwrap();
        assert_eq!(report.post_slug.as_deref(), Some("broken-globe"));
        assert_eq!(report.user_agent.as_deref(), Some("curl"));

        assert!(db.get_error_report("r2").unwrap().is_none());
    }

    #[test]
    fn contact_message_round_trips() {
        let db = Database::open_in_memory().unwrap();
        db.insert_contact_message("m1", "Ada", "ada@example.com", "Hi", "Line one\nLine two")
            .unwrap();

        let message = db.get_contact_message("m1").unwrap().unwrap();
        assert_eq!(message.subject, "Hi");
        assert!(message.description.contains('\n'));
    }
}
