use vizfeed_types::models::{ContactMessage, ErrorReport};

use super::Email;
use crate::html::{escape, escape_multiline};

const HEADER_STYLE: &str = "background: linear-gradient(135deg, #8B5CF6 0%, #EC4899 100%); color: white; padding: 20px; border-radius: 8px 8px 0 0;";
const BODY_STYLE: &str = "background: #f9fafb; padding: 20px; border: 1px solid #e5e7eb;";
const QUOTE_STYLE: &str = "background: white; padding: 15px; border-radius: 4px; border-left: 4px solid #8B5CF6; margin-top: 15px;";
const FOOTER_STYLE: &str = "background: #f3f4f6; padding: 15px; text-align: center; font-size: 12px; color: #6b7280; border-radius: 0 0 8px 8px;";

fn layout(heading: &str, body: &str, footer: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
      <div style="{HEADER_STYLE}"><h1 style="margin: 0;">{heading}</h1></div>
      <div style="{BODY_STYLE}">{body}</div>
      <div style="{FOOTER_STYLE}">{footer}</div>
    </div>
  </body>
</html>"#
    )
}

/// Contact form message forwarded to the admin; replies go to the sender.
pub fn contact_message(message: &ContactMessage, admin: &str) -> Email {
    let email = escape(&message.email);
    let body = format!(
        r#"<p><strong>Name:</strong> {name}</p>
<p><strong>Email:</strong> <a href="mailto:{email}">{email}</a></p>
<p><strong>Subject:</strong> {subject}</p>
<div style="{QUOTE_STYLE}"><strong>Message:</strong><br/>{text}</div>"#,
        name = escape(&message.name),
        subject = escape(&message.subject),
        text = escape_multiline(&message.description),
    );
    let footer = format!("Received on {}", message.created_at.format("%Y-%m-%d %H:%M UTC"));

    Email {
        to: vec![admin.to_string()],
        subject: format!("📧 Contact: {}", message.subject),
        html: layout("New Contact Message", &body, &footer),
        reply_to: Some(message.email.clone()),
    }
}

pub fn error_report(report: &ErrorReport, admin: &str, post_url: Option<&str>) -> Email {
    let mut body = String::new();
    if let Some(slug) = &report.post_slug {
        match post_url {
            Some(url) => body.push_str(&format!(
                r#"<p><strong>Post:</strong> <a href="{}">{}</a></p>"#,
                escape(url),
                escape(slug)
            )),
            None => body.push_str(&format!("<p><strong>Post:</strong> {}</p>", escape(slug))),
        }
    }
    if let Some(page_url) = &report.page_url {
        body.push_str(&format!("<p><strong>Page:</strong> {}</p>", escape(page_url)));
    }
    if let Some(user_agent) = &report.user_agent {
        body.push_str(&format!(
            "<p><strong>User agent:</strong> {}</p>",
            escape(user_agent)
        ));
    }
    if let Some(reporter) = report.reporter_id {
        body.push_str(&format!("<p><strong>Reporter:</strong> {reporter}</p>"));
    }
    body.push_str(&format!(
        r#"<div style="{QUOTE_STYLE}"><strong>Description:</strong><br/>{}</div>"#,
        escape_multiline(&report.description)
    ));
    let footer = format!("Reported on {}", report.created_at.format("%Y-%m-%d %H:%M UTC"));

    let subject = match &report.post_slug {
        Some(slug) => format!("🐞 Error report: {slug}"),
        None => "🐞 Error report".to_string(),
    };

    Email {
        to: vec![admin.to_string()],
        subject,
        html: layout("New Error Report", &body, &footer),
        reply_to: None,
    }
}

pub fn confirm_email(to: &str, username: &str, link: &str) -> Email {
    let body = format!(
        r#"<p>Hi {},</p>
<p>Confirm your email address to finish setting up your account.</p>
<p><a href="{link}">Confirm email</a></p>"#,
        escape(username),
        link = escape(link),
    );
    Email {
        to: vec![to.to_string()],
        subject: "Confirm your email".to_string(),
        html: layout("Welcome", &body, "If you did not sign up, ignore this email."),
        reply_to: None,
    }
}

pub fn password_reset(to: &str, link: &str) -> Email {
    let body = format!(
        r#"<p>Someone asked to reset the password for this account.</p>
<p><a href="{}">Choose a new password</a></p>"#,
        escape(link)
    );
    Email {
        to: vec![to.to_string()],
        subject: "Reset your password".to_string(),
        html: layout(
            "Password reset",
            &body,
            "The link expires in one hour. If this was not you, ignore this email.",
        ),
        reply_to: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn contact_message_escapes_and_sets_reply_to() {
        let message = ContactMessage {
            id: Uuid::new_v4(),
            name: "<script>x</script>".into(),
            email: "ada@example.com".into(),
            subject: "Hello".into(),
            description: "line one\nline two".into(),
            created_at: Utc::now(),
        };
        let email = contact_message(&message, "admin@example.com");

        assert_eq!(email.to, vec!["admin@example.com".to_string()]);
        assert_eq!(email.reply_to.as_deref(), Some("ada@example.com"));
        assert_eq!(email.subject, "📧 Contact: Hello");
        assert!(email.html.contains("&lt;script&gt;"));
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("line one<br>line two"));
    }

    #[test]
    fn error_report_links_post() {
        let report = ErrorReport {
            id: Uuid::new_v4(),
            post_id: Some(Uuid::new_v4()),
            post_slug: Some("ocean-currents".into()),
            reporter_id: None,
            description: "Globe stays black".into(),
            page_url: None,
            user_agent: Some("Firefox".into()),
            created_at: Utc::now(),
        };
        let email = error_report(&report, "ops@example.com", Some("https://viz.test/?post=ocean-currents"));

        assert!(email.subject.ends_with("ocean-currents"));
        assert!(email.html.contains(r#"href="https://viz.test/?post=ocean-currents""#));
        assert!(email.html.contains("Firefox"));
    }
}
