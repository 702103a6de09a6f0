use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password        TEXT,
                email_confirmed INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE profiles (
                id          TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
                avatar_url  TEXT,
                is_admin    INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE auth_tokens (
                token_hash  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                purpose     TEXT NOT NULL,
                expires_at  TEXT NOT NULL,
                used_at     TEXT
            );

            CREATE TABLE categories (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                slug        TEXT NOT NULL UNIQUE,
                description TEXT
            );

            CREATE TABLE posts (
                id              TEXT PRIMARY KEY,
                slug            TEXT NOT NULL UNIQUE,
                title           TEXT NOT NULL,
                description     TEXT,
                type            TEXT NOT NULL DEFAULT 'custom'
                                CHECK (type IN ('custom', 'cesium', 'globe', 'leaflet')),
                custom_html     TEXT NOT NULL DEFAULT '',
                custom_css      TEXT NOT NULL DEFAULT '',
                custom_script   TEXT NOT NULL DEFAULT '',
                config          TEXT,
                thumbnail_url   TEXT,
                external_url    TEXT,
                likes_count     INTEGER NOT NULL DEFAULT 0 CHECK (likes_count >= 0),
                comments_count  INTEGER NOT NULL DEFAULT 0 CHECK (comments_count >= 0),
                views_count     INTEGER NOT NULL DEFAULT 0,
                shares_count    INTEGER NOT NULL DEFAULT 0,
                category_id     TEXT REFERENCES categories(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_posts_created ON posts(type, created_at);
            CREATE INDEX idx_posts_category ON posts(category_id);

            CREATE TABLE interactions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                type        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(user_id, post_id, type)
            );

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            CREATE TABLE contact_messages (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL,
                subject     TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE error_reports (
                id          TEXT PRIMARY KEY,
                post_id     TEXT REFERENCES posts(id) ON DELETE SET NULL,
                reporter_id TEXT REFERENCES users(id) ON DELETE SET NULL,
                description TEXT NOT NULL,
                page_url    TEXT,
                user_agent  TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE admin_settings (
                setting_key     TEXT PRIMARY KEY,
                setting_value   TEXT NOT NULL,
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE VIEW category_stats AS
                SELECT
                    c.id,
                    c.name,
                    c.slug,
                    c.description,
                    COUNT(p.id)                           AS post_count,
                    COALESCE(SUM(p.views_count), 0)       AS total_views,
                    COALESCE(AVG(p.views_count), 0.0)     AS avg_views_per_post,
                    MAX(p.created_at)                     AS last_post_date
                FROM categories c
                LEFT JOIN posts p ON p.category_id = c.id
                GROUP BY c.id;

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
