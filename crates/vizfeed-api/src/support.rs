use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};
use uuid::Uuid;

use vizfeed_db::is_constraint_violation;
use vizfeed_types::api::{
    CreateContactMessageRequest, CreateErrorReportRequest, CreatedResponse, MailSentResponse,
    SendContactMessageRequest, SendErrorReportRequest,
};
use vizfeed_types::models::{ContactMessage, ErrorReport};

use crate::auth::normalize_email;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::mail::{Email, templates};
use crate::middleware::{BearerHeader, optional_claims};
use crate::state::{AppState, AppStateInner};

pub const CONTACT_EMAIL_KEY: &str = "contact_email";
pub const ERROR_REPORT_EMAIL_KEY: &str = "error_report_email";

const MAX_NAME_CHARS: usize = 100;
const MAX_SUBJECT_CHARS: usize = 200;
const MAX_BODY_CHARS: usize = 5000;

fn required(field: &str, value: &str, max: usize) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{field} exceeds {max} characters"
        )));
    }
    Ok(value.to_string())
}

pub async fn create_contact_message(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateContactMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required("Name", &req.name, MAX_NAME_CHARS)?;
    let email = normalize_email(&req.email)?;
    let subject = required("Subject", &req.subject, MAX_SUBJECT_CHARS)?;
    let description = required("Message", &req.description, MAX_BODY_CHARS)?;

    let id = Uuid::new_v4();
    state
        .db(move |db| {
            db.insert_contact_message(&id.to_string(), &name, &email, &subject, &description)
        })
        .await?;

    info!("Stored contact message {}", id);
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn send_contact_message(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendContactMessageRequest>,
) -> ApiResult<Json<MailSentResponse>> {
    let id = req.message_id.to_string();
    let message: ContactMessage = state
        .db(move |db| db.get_contact_message(&id))
        .await?
        .ok_or(ApiError::NotFound("Contact message"))?
        .into();

    let admin = admin_recipient(&state, CONTACT_EMAIL_KEY).await?;
    let mail = templates::contact_message(&message, &admin);
    deliver(&state, &mail, "contact message", message.id).await
}

pub async fn create_error_report(
    State(state): State<AppState>,
    bearer: Option<BearerHeader>,
    ApiJson(req): ApiJson<CreateErrorReportRequest>,
) -> ApiResult<impl IntoResponse> {
    let description = required("Description", &req.description, MAX_BODY_CHARS)?;
    let reporter = optional_claims(bearer, &state.jwt_secret).map(|claims| claims.sub);

    let id = Uuid::new_v4();
    let post_id = req.post_id;
    let page_url = req.page_url.filter(|s| !s.trim().is_empty());
    let user_agent = req.user_agent.filter(|s| !s.trim().is_empty());

    state
        .db(move |db| {
            db.insert_error_report(
                &id.to_string(),
                post_id.map(|p| p.to_string()).as_deref(),
                reporter.map(|r| r.to_string()).as_deref(),
                &description,
                page_url.as_deref(),
                user_agent.as_deref(),
            )
        })
        .await
        .map_err(|e| match e {
            ApiError::Internal(inner) if is_constraint_violation(&inner) => {
                ApiError::NotFound("Post")
            }
            other => other,
        })?;

    info!("Stored error report {} (post {:?})", id, post_id);
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn send_error_report(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendErrorReportRequest>,
) -> ApiResult<Json<MailSentResponse>> {
    let id = req.report_id.to_string();
    let report: ErrorReport = state
        .db(move |db| db.get_error_report(&id))
        .await?
        .ok_or(ApiError::NotFound("Error report"))?
        .into();

    let admin = admin_recipient(&state, ERROR_REPORT_EMAIL_KEY).await?;
    let post_url = report
        .post_slug
        .as_deref()
        .map(|slug| state.settings.url(&format!("/?post={slug}")));
    let mail = templates::error_report(&report, &admin, post_url.as_deref());
    deliver(&state, &mail, "error report", report.id).await
}

/// Admin setting `key`, falling back to the configured admin address.
async fn admin_recipient(state: &AppStateInner, key: &'static str) -> ApiResult<String> {
    let stored = state.db(move |db| db.get_setting(key)).await?;
    stored
        .filter(|value| !value.trim().is_empty())
        .or_else(|| state.settings.admin_email.clone())
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Admin email not configured")))
}

async fn deliver(
    state: &AppStateInner,
    mail: &Email,
    what: &str,
    id: Uuid,
) -> ApiResult<Json<MailSentResponse>> {
    let sent = state.mailer.send(mail).await.map_err(|e| {
        error!("Sending {} {} failed: {:#}", what, id, e);
        ApiError::Upstream(format!("Could not send {what}"))
    })?;

    info!("Sent {} {} to {:?}", what, id, mail.to);
    Ok(Json(MailSentResponse {
        success: true,
        provider_id: sent.provider_id,
    }))
}
