pub mod resend;
pub mod templates;

use futures_util::future::BoxFuture;
use tracing::info;

pub use resend::ResendMailer;

/// A transactional email ready to hand to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SentEmail {
    pub provider_id: Option<String>,
}

/// Outbound mail seam. Implementations must be cheap to share across handlers.
pub trait Mailer: Send + Sync {
    fn send<'a>(&'a self, email: &'a Email) -> BoxFuture<'a, anyhow::Result<SentEmail>>;
}

/// Logs emails instead of sending them; used when no provider key is set.
#[derive(Debug, Clone)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send<'a>(&'a self, email: &'a Email) -> BoxFuture<'a, anyhow::Result<SentEmail>> {
        Box::pin(async move {
            info!(
                to = ?email.to,
                subject = %email.subject,
                reply_to = ?email.reply_to,
                "Mail provider not configured; email logged only"
            );
            Ok(SentEmail::default())
        })
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Captures every email for assertions.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<Email>>,
    }

    impl RecordingMailer {
        pub fn take(&self) -> Vec<Email> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl Mailer for RecordingMailer {
        fn send<'a>(&'a self, email: &'a Email) -> BoxFuture<'a, anyhow::Result<SentEmail>> {
            self.sent.lock().unwrap().push(email.clone());
            Box::pin(async {
                Ok(SentEmail {
                    provider_id: Some("recorded".into()),
                })
            })
        }
    }
}
