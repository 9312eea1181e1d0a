//! The `notifier` module posts the final run status to a messaging webhook.
//! Strictly best-effort: failures are logged and swallowed, and an
//! unconfigured webhook makes notification a no-op.

use reqwest;
use reqwest::header::CONTENT_TYPE;
use result::{Error, Result};
use serde_json;

pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Notifier {
        Notifier {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    /// Posts `message` and never escalates: a delivery failure is logged
    /// and the run carries on.
    pub fn notify(&self, message: &str) {
        if self.webhook_url.is_none() {
            debug!("notification skipped: no webhook configured");
            return;
        }
        match self.post_message(message) {
            Ok(()) => info!("notification delivered"),
            Err(err) => warn!("notification failed: {}", err),
        }
    }

    fn post_message(&self, message: &str) -> Result<()> {
        let url = match self.webhook_url {
            Some(ref url) => url,
            None => {
                return Err(Error::Notification("no webhook configured".to_string()));
            }
        };
        let response = self
            .client
            .post(url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(message_payload(message).to_string())
            .send()
            .map_err(|err| Error::Notification(format!("webhook send failed: {}", err)))?;
        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn message_payload(message: &str) -> serde_json::Value {
    json!({
        "content": message,
        "username": "fundtrace",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = message_payload("run complete");
        assert_eq!(payload["content"], json!("run complete"));
        assert_eq!(payload["username"], json!("fundtrace"));
    }

    #[test]
    fn test_unconfigured_webhook_is_a_noop() {
        let notifier = Notifier::new(None);
        assert_matches!(
            notifier.post_message("run complete"),
            Err(Error::Notification(_))
        );
        // Swallows rather than panicking or escalating.
        notifier.notify("run complete");
    }

    #[test]
    fn test_unreachable_webhook_is_swallowed() {
        let notifier = Notifier::new(Some("http://127.0.0.1:9/webhook".to_string()));
        assert_matches!(
            notifier.post_message("run complete"),
            Err(Error::Notification(_))
        );
        notifier.notify("run complete");
    }
}
