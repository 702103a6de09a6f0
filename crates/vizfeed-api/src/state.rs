use std::sync::Arc;

use tracing::error;

use vizfeed_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::mail::Mailer;
use crate::viz::registry::VizRegistry;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub settings: ApiSettings,
    pub mailer: Arc<dyn Mailer>,
    pub http: reqwest::Client,
    pub viz: VizRegistry,
}

/// Deployment settings the handlers need. Built by the server from its env.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Public origin used in links, sitemaps and embed snippets. No trailing slash.
    pub base_url: String,
    /// Fallback recipient when no admin setting names one.
    pub admin_email: Option<String>,
    /// Emails promoted to admin when they register.
    pub admin_emails: Vec<String>,
    pub mail_from: String,
    pub oauth: Option<OAuthSettings>,
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl ApiSettings {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

impl AppStateInner {
    /// Runs a blocking store call off the async runtime.
    pub async fn db<F, T>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(e.into())
            })?
            .map_err(ApiError::Internal)
    }
}
