//! Notification dispatcher - builds chat push payloads and sends them
//!
//! Batch items are delivered concurrently and independently: one item's
//! failure never aborts the others, and results keep request order.

use crate::push_client::PushSender;
use relay_shared::{
    BatchReport, ChatNotification, DeliveryFailure, DeliveryResult, RelayError,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Notifier {
    sender: Option<Arc<dyn PushSender>>,
    body_limit: usize,
}

impl Notifier {
    pub fn new(sender: Option<Arc<dyn PushSender>>, body_limit: usize) -> Self {
        Self { sender, body_limit }
    }

    pub fn disabled() -> Self {
        Self::new(None, relay_shared::notification::MAX_BODY_CHARS)
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    fn sender(&self) -> Result<&Arc<dyn PushSender>, RelayError> {
        self.sender.as_ref().ok_or(RelayError::NotificationsDisabled)
    }

    /// Send one notification; returns the message id.
    pub async fn send_one(&self, notification: &ChatNotification) -> Result<String, RelayError> {
        notification.validate()?;
        let sender = self.sender()?;
        let message = notification.to_push_message(self.body_limit);

        match sender.send(&message).await {
            Ok(id) => {
                info!("[N]   Delivered {}", id);
                Ok(id)
            }
            Err(failure) => {
                warn!("[N]   Delivery failed ({}): {}", failure.code(), failure);
                Err(failure.into())
            }
        }
    }

    pub async fn send_batch(&self, notifications: &[ChatNotification]) -> Result<BatchReport, RelayError> {
        if notifications.is_empty() {
            return Err(RelayError::validation("notifications", "must not be empty"));
        }
        let sender = self.sender()?;

        let handles: Vec<_> = notifications
            .iter()
            .map(|n| {
                let sender = Arc::clone(sender);
                let token = n.recipient_token.trim().to_string();
                let prepared = n
                    .validate()
                    .map(|_| n.to_push_message(self.body_limit))
                    .map_err(|e| item_failure(&e));
                tokio::spawn(async move {
                    match prepared {
                        Ok(message) => match sender.send(&message).await {
                            Ok(id) => DeliveryResult::delivered(&token, id),
                            Err(failure) => DeliveryResult::failed(&token, &failure),
                        },
                        Err(failure) => DeliveryResult::failed(&token, &failure),
                    }
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (handle, n) in handles.into_iter().zip(notifications) {
            let result = handle.await.unwrap_or_else(|e| {
                DeliveryResult::failed(
                    n.recipient_token.trim(),
                    &DeliveryFailure::DeliveryError(e.to_string()),
                )
            });
            results.push(result);
        }

        let report = BatchReport::from_results(results);
        info!(
            "[N]   Batch done: {} sent, {} failed",
            report.success_count, report.failure_count
        );
        Ok(report)
    }
}

/// Per-item validation failures are reported, not raised.
fn item_failure(err: &RelayError) -> DeliveryFailure {
    match err {
        RelayError::Validation { field, message } if field == "recipientToken" => {
            DeliveryFailure::InvalidToken(format!("{} {}", field, message))
        }
        other => DeliveryFailure::DeliveryError(other.to_string()),
    }
}
