use std::fmt;

use failure::Error as FailureError;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Template {
    OrderUpdated,
    NewSnackOrder,
    SubscriptionChanged,
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Template::OrderUpdated => "order_updated",
            Template::NewSnackOrder => "new_snack_order",
            Template::SubscriptionChanged => "subscription_changed",
        })
    }
}

/// Outbound customer notifications. Delivery is best effort.
pub trait Notifier: Send + Sync {
    fn notify(&self, template: Template, subject: &str, payload: &Value) -> Result<(), FailureError>;
}

/// Writes notifications to the log instead of sending them anywhere.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, template: Template, subject: &str, payload: &Value) -> Result<(), FailureError> {
        info!("Notification {} ({}): {}", template, subject, payload);
        Ok(())
    }
}

/// Sends a notification, logging instead of propagating any failure.
pub fn notify_quietly(notifier: &dyn Notifier, template: Template, subject: &str, payload: &Value) {
    if let Err(e) = notifier.notify(template, subject, payload) {
        error!("Failed to send {} notification: {}", template, e);
    }
}
