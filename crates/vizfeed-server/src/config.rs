use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use vizfeed_api::state::{ApiSettings, OAuthSettings};
use vizfeed_api::viz::registry::DEFAULT_MAX_SESSIONS;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub settings: ApiSettings,
    pub resend_api_key: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub viz_session_ttl: Duration,
    pub viz_max_sessions: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("VIZFEED_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("VIZFEED_JWT_SECRET is unset or still a placeholder");
        }

        let host = get("VIZFEED_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("VIZFEED_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("VIZFEED_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("VIZFEED_HOST must be an IP address")?;

        let ttl_secs: u64 = get("VIZFEED_VIZ_SESSION_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(600);
        let max_sessions: usize = get("VIZFEED_VIZ_MAX_SESSIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_SESSIONS);

        let oauth = match (get("VIZFEED_OAUTH_CLIENT_ID"), get("VIZFEED_OAUTH_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(OAuthSettings {
                provider: get("VIZFEED_OAUTH_PROVIDER").unwrap_or_else(|| "google".into()),
                client_id,
                client_secret,
                auth_url: get("VIZFEED_OAUTH_AUTH_URL").unwrap_or_else(|| GOOGLE_AUTH_URL.into()),
                token_url: get("VIZFEED_OAUTH_TOKEN_URL")
                    .unwrap_or_else(|| GOOGLE_TOKEN_URL.into()),
                userinfo_url: get("VIZFEED_OAUTH_USERINFO_URL")
                    .unwrap_or_else(|| GOOGLE_USERINFO_URL.into()),
            }),
            _ => None,
        };

        let settings = ApiSettings {
            base_url: get("VIZFEED_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            admin_email: get("VIZFEED_ADMIN_EMAIL"),
            admin_emails: get("VIZFEED_ADMIN_EMAILS")
                .map(|list| {
                    list.split(',')
                        .map(|e| e.trim().to_lowercase())
                        .filter(|e| !e.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            mail_from: get("VIZFEED_MAIL_FROM")
                .unwrap_or_else(|| "VizFeed <onboarding@resend.dev>".into()),
            oauth,
        };

        Ok(Self {
            addr,
            db_path: get("VIZFEED_DB_PATH")
                .unwrap_or_else(|| "vizfeed.db".into())
                .into(),
            jwt_secret,
            settings,
            resend_api_key: get("RESEND_API_KEY"),
            static_dir: get("VIZFEED_STATIC_DIR").map(PathBuf::from),
            viz_session_ttl: Duration::from_secs(ttl_secs),
            viz_max_sessions: max_sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn rejects_missing_or_placeholder_secret() {
        assert!(load(&[]).is_err());
        assert!(load(&[("VIZFEED_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("VIZFEED_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.db_path, PathBuf::from("vizfeed.db"));
        assert_eq!(config.settings.base_url, "http://localhost:3000");
        assert_eq!(config.viz_session_ttl, Duration::from_secs(600));
        assert_eq!(config.viz_max_sessions, DEFAULT_MAX_SESSIONS);
        assert!(config.settings.oauth.is_none());
        assert!(config.resend_api_key.is_none());
    }

    #[test]
    fn parses_admin_list_and_oauth() {
        let config = load(&[
            ("VIZFEED_JWT_SECRET", "s3cret"),
            ("VIZFEED_BASE_URL", "https://viz.example/"),
            ("VIZFEED_ADMIN_EMAILS", " Ada@Example.com, ,bob@example.com"),
            ("VIZFEED_OAUTH_CLIENT_ID", "id"),
            ("VIZFEED_OAUTH_CLIENT_SECRET", "secret"),
        ])
        .unwrap();
        assert_eq!(config.settings.base_url, "https://viz.example");
        assert_eq!(
            config.settings.admin_emails,
            vec!["ada@example.com".to_string(), "bob@example.com".to_string()]
        );
        let oauth = config.settings.oauth.unwrap();
        assert_eq!(oauth.provider, "google");
        assert_eq!(oauth.token_url, GOOGLE_TOKEN_URL);
    }

    #[test]
    fn viz_session_cap_is_configurable() {
        let config = load(&[
            ("VIZFEED_JWT_SECRET", "s3cret"),
            ("VIZFEED_VIZ_MAX_SESSIONS", "250"),
        ])
        .unwrap();
        assert_eq!(config.viz_max_sessions, 250);
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(load(&[("VIZFEED_JWT_SECRET", "s3cret"), ("VIZFEED_PORT", "http")]).is_err());
    }
}
