use anyhow::Result;
use rusqlite::params;

use super::OptionalExt;
use crate::Database;

impl Database {
    // -- Admin settings --

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT setting_value FROM admin_settings WHERE setting_key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO admin_settings (setting_key, setting_value) VALUES (?1, ?2)
                 ON CONFLICT(setting_key) DO UPDATE SET
                    setting_value = excluded.setting_value,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![key, value],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn settings_upsert() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("contact_email").unwrap(), None);

        db.set_setting("contact_email", "a@example.com").unwrap();
        db.set_setting("contact_email", "b@example.com").unwrap();
        assert_eq!(
            db.get_setting("contact_email").unwrap().as_deref(),
            Some("b@example.com")
        );
    }
}
