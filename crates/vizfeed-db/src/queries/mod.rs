mod accounts;
mod categories;
mod comments;
mod interactions;
mod posts;
mod settings;
mod support;

pub use accounts::TokenPurpose;

use anyhow::Result;

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::Database;
    use crate::models::{NewAccount, NewPost};
    use vizfeed_types::models::VizKind;

    pub fn account(db: &Database, id: &str, username: &str) {
        db.create_account(&NewAccount {
            id,
            email: &format!("{username}@example.com"),
            password_hash: Some("hash"),
            username,
            is_admin: false,
            email_confirmed: true,
        })
        .unwrap();
    }

    pub fn post(db: &Database, id: &str, slug: &str, created_at: &str) {
        db.create_post(&NewPost {
            id,
            slug,
            title: slug,
            description: None,
            kind: VizKind::Custom,
            custom_html: "<div id=\"globe\"></div>",
            custom_css: "",
            custom_script: "",
            config: None,
            thumbnail_url: None,
            external_url: None,
            category_id: None,
            created_at: Some(created_at),
        })
        .unwrap();
    }
}
