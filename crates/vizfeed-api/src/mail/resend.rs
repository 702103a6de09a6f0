use anyhow::{Context, anyhow};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Email, Mailer, SentEmail};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Sends mail through the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendResponse {
    id: Option<String>,
}

impl ResendMailer {
    pub fn new(client: reqwest::Client, api_key: String, from: String) -> Self {
        Self {
            client,
            api_key,
            from,
            endpoint: RESEND_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Mailer for ResendMailer {
    fn send<'a>(&'a self, email: &'a Email) -> BoxFuture<'a, anyhow::Result<SentEmail>> {
        Box::pin(async move {
            let request = SendRequest {
                from: &self.from,
                to: &email.to,
                subject: &email.subject,
                html: &email.html,
                reply_to: email.reply_to.as_deref(),
            };

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .context("Mail API request failed")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!("Mail API returned {}: {}", status, body);
                return Err(anyhow!("Mail API returned {}", status));
            }

            let sent: SendResponse = response
                .json()
                .await
                .context("Mail API response was not JSON")?;
            debug!(id = ?sent.id, "Email accepted by provider");

            Ok(SentEmail {
                provider_id: sent.id,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode, header},
        routing::post,
    };
    use serde_json::{Value, json};

    use super::*;

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    /// Local stand-in for the provider answering every send with `status`.
    async fn spawn_provider(status: StatusCode) -> (String, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route(
                "/emails",
                post(
                    move |State(captured): State<Captured>,
                          headers: HeaderMap,
                          Json(body): Json<Value>| async move {
                        let auth = headers
                            .get(header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        captured.lock().unwrap().push((auth, body));
                        (status, Json(json!({ "id": "re_123" })))
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        (format!("http://{addr}/emails"), captured)
    }

    fn mailer(endpoint: &str) -> ResendMailer {
        ResendMailer::new(
            reqwest::Client::new(),
            "re_test_key".into(),
            "VizFeed <noreply@viz.test>".into(),
        )
        .with_endpoint(endpoint)
    }

    fn email(reply_to: Option<&str>) -> Email {
        Email {
            to: vec!["owner@viz.test".into()],
            subject: "Hello".into(),
            html: "<p>Hi</p>".into(),
            reply_to: reply_to.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn posts_json_with_bearer_key() {
        let (endpoint, captured) = spawn_provider(StatusCode::OK).await;
        let mailer = mailer(&endpoint);

        let sent = mailer.send(&email(Some("ada@example.com"))).await.unwrap();
        assert_eq!(sent.provider_id.as_deref(), Some("re_123"));
        mailer.send(&email(None)).await.unwrap();

        let requests = captured.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);

        let (auth, body) = &requests[0];
        assert_eq!(auth.as_deref(), Some("Bearer re_test_key"));
        assert_eq!(body["from"], "VizFeed <noreply@viz.test>");
        assert_eq!(body["to"], json!(["owner@viz.test"]));
        assert_eq!(body["subject"], "Hello");
        assert_eq!(body["reply_to"], "ada@example.com");

        let (_, body) = &requests[1];
        assert!(!body.as_object().unwrap().contains_key("reply_to"));
    }

    #[tokio::test]
    async fn rejected_send_is_an_error() {
        let (endpoint, captured) = spawn_provider(StatusCode::UNPROCESSABLE_ENTITY).await;

        let err = mailer(&endpoint).send(&email(None)).await.unwrap_err();
        assert!(err.to_string().contains("422"));
        assert_eq!(captured.lock().unwrap().len(), 1);
    }
}
