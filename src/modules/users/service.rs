use async_trait::async_trait;
use std::sync::Arc;
use tourdesk_core::AppError;
use tracing::{instrument, warn};

use crate::metrics::track_notification;
use crate::modules::resources::{MutationEvent, MutationObserver};
use crate::utils::notifier::{Notification, Notifier};

/// Tells a user their account is gone once the delete has committed.
pub struct AccountClosureNotifier {
    notifier: Arc<dyn Notifier>,
}

impl AccountClosureNotifier {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

pub fn closure_notice(email: &str, name: Option<&str>) -> Notification {
    let greeting = name
        .and_then(|n| n.split_whitespace().next())
        .unwrap_or("there");

    Notification {
        recipient: email.to_string(),
        subject: "Your Tourdesk account has been closed".to_string(),
        body: format!(
            "Hi {greeting},\n\n\
             Your account has been closed by an administrator and your data removed.\n\n\
             If you think this is a mistake, please contact support.\n"
        ),
    }
}

#[async_trait]
impl MutationObserver for AccountClosureNotifier {
    #[instrument(skip(self, event), fields(event = event.kind()))]
    async fn on_mutation(&self, event: &MutationEvent) -> Result<(), AppError> {
        let MutationEvent::Deleted { before } = event else {
            return Ok(());
        };

        let Some(email) = before.fields.get("email").and_then(|v| v.as_str()) else {
            warn!(user_id = %before.id, "deleted user has no email, skipping closure notice");
            return Ok(());
        };
        let name = before.fields.get("name").and_then(|v| v.as_str());

        match self.notifier.notify(&closure_notice(email, name)).await {
            Ok(()) => {
                track_notification("sent");
                Ok(())
            }
            Err(err) => {
                track_notification("failed");
                Err(AppError::internal(err.context("Failed to send account closure notice")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_notice_greets_by_first_name() {
        let notice = closure_notice("jonas@example.io", Some("Jonas Schmedtmann"));
        assert_eq!(notice.recipient, "jonas@example.io");
        assert!(notice.body.starts_with("Hi Jonas,"));
    }

    #[test]
    fn test_closure_notice_without_name() {
        let notice = closure_notice("a@example.io", None);
        assert!(notice.body.starts_with("Hi there,"));
    }
}
