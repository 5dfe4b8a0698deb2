use std::sync::Arc;

use chrono::prelude::*;
use failure::{Error as FailureError, Fail};
use serde_json::{self, Value};

use super::locks::with_order_lock;
use super::payment_state::{self, PaymentOutcome};
use super::snack::{notify_snack_order, stamp_snack_payment};
use super::types::*;
use clients::notification::*;
use clients::payment::PaymentGateway;
use clients::webhook::*;
use errors::*;
use models::*;
use repos::*;

pub const INVOICE_PAID: &str = "invoice.payment_succeeded";
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// What a delivered webhook event resulted in.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Payment { outcome: PaymentOutcome },
    SnackPayment { order: SnackOrder },
    Ignored { event_type: String, reason: String },
}

impl WebhookOutcome {
    fn ignored(event_type: &str, reason: String) -> Self {
        warn!("Ignoring {} event: {}", event_type, reason);
        WebhookOutcome::Ignored {
            event_type: event_type.to_string(),
            reason,
        }
    }
}

pub trait PaymentService {
    /// Stamps a confirmed subscription payment onto the earliest unpaid week of an order
    fn apply_payment(
        &self,
        order_id: OrderId,
        subscription_id: Option<SubscriptionId>,
        payment_id: PaymentId,
        payment_date: NaiveDateTime,
    ) -> ServiceFuture<PaymentOutcome>;
    /// Verifies and dispatches a payment provider event
    fn handle_webhook(&self, payload: String, signature: String) -> ServiceFuture<WebhookOutcome>;
    fn pause_subscription(&self, subscription_id: SubscriptionId) -> ServiceFuture<SubscriptionChange>;
    fn resume_subscription(&self, subscription_id: SubscriptionId) -> ServiceFuture<SubscriptionChange>;
    fn cancel_subscription(&self, subscription_id: SubscriptionId) -> ServiceFuture<SubscriptionChange>;
}

#[derive(Clone)]
pub struct PaymentServiceImpl {
    ctx: ServiceContext,
    gateway: Arc<dyn PaymentGateway>,
    verifier: WebhookVerifier,
}

impl PaymentServiceImpl {
    pub fn new(ctx: ServiceContext, gateway: Arc<dyn PaymentGateway>, verifier: WebhookVerifier) -> Self {
        Self { ctx, gateway, verifier }
    }

    fn pay_order(
        &self,
        order_id: OrderId,
        subscription_id: Option<SubscriptionId>,
        payment_id: PaymentId,
        payment_date: NaiveDateTime,
    ) -> Result<PaymentOutcome, FailureError> {
        // Priced outside of the row lock.
        let price = self.gateway.price_for_payment(&payment_id, &payment_id.0)?;

        with_order_lock(&*self.ctx.db_pool, &self.ctx.locks, order_id, |conn, order| {
            payment_state::apply_payment(conn, &order, subscription_id.as_ref(), &payment_id, payment_date, price)
        })
    }

    fn latest_order_of(&self, email: &str, order_type: Option<OrderType>) -> Result<Option<Order>, FailureError> {
        with_transaction(&*self.ctx.db_pool, |conn| {
            let customer = match conn
                .select_customers(CustomerFilter {
                    email: Some(email.to_string()),
                    ..Default::default()
                })?
                .into_iter()
                .next()
            {
                Some(customer) => customer,
                None => return Ok(None),
            };

            Ok(conn
                .select_orders(OrderFilter {
                    customer_id: Some(customer.customer_id),
                    order_type,
                    sort: Some(SortOrder::Descending),
                    ..Default::default()
                })?
                .into_iter()
                .next())
        })
    }

    fn on_invoice_paid(&self, event: &WebhookEvent) -> Result<WebhookOutcome, FailureError> {
        let invoice: Invoice = serde_json::from_value(event.data.object.clone()).map_err(|e| e.context(Error::Parse))?;
        let (email, payment_id) = match (invoice.customer_email, invoice.payment_intent) {
            (Some(email), Some(payment_id)) => (email, PaymentId(payment_id)),
            _ => return Ok(WebhookOutcome::ignored(&event.event_type, "invoice without customer email or payment intent".to_string())),
        };

        let order = match self.latest_order_of(&email, Some(OrderType::Subscription))? {
            Some(order) => order,
            None => return Ok(WebhookOutcome::ignored(&event.event_type, format!("no subscription order for {}", email))),
        };

        let outcome = self.pay_order(
            order.order_id,
            invoice.subscription.map(SubscriptionId),
            payment_id,
            Utc::now().naive_utc(),
        )?;
        Ok(WebhookOutcome::Payment { outcome })
    }

    fn on_checkout_completed(&self, event: &WebhookEvent) -> Result<WebhookOutcome, FailureError> {
        let session: CheckoutSession = serde_json::from_value(event.data.object.clone()).map_err(|e| e.context(Error::Parse))?;
        if let Some(subscription) = session.subscription {
            return Ok(WebhookOutcome::ignored(&event.event_type, format!("checkout of subscription {}", subscription)));
        }
        let (email, payment_id) = match (session.customer_email, session.payment_intent) {
            (Some(email), Some(payment_id)) => (email, PaymentId(payment_id)),
            _ => return Ok(WebhookOutcome::ignored(&event.event_type, "checkout without customer email or payment intent".to_string())),
        };
        let amount = session.amount_total.unwrap_or(0) as f64 / 100.0;

        let order = match self.latest_order_of(&email, None)? {
            Some(order) => order,
            None => return Ok(WebhookOutcome::ignored(&event.event_type, format!("no order for {}", email))),
        };

        let snack_order = with_order_lock(&*self.ctx.db_pool, &self.ctx.locks, order.order_id, |conn, order| {
            stamp_snack_payment(conn, &order, &payment_id, amount)
        })?;
        notify_snack_order(&*self.ctx.notifier, &snack_order);

        Ok(WebhookOutcome::SnackPayment { order: snack_order })
    }

    fn dispatch(&self, payload: &str, signature: &str) -> Result<WebhookOutcome, FailureError> {
        let event = self.verifier.verify(payload, signature)?;
        info!("Webhook event {} ({:?}) received", event.event_type, event.id);

        match event.event_type.as_str() {
            INVOICE_PAID => self.on_invoice_paid(&event),
            CHECKOUT_COMPLETED => self.on_checkout_completed(&event),
            other => {
                debug!("Unhandled webhook event type {}", other);
                Ok(WebhookOutcome::Ignored {
                    event_type: other.to_string(),
                    reason: "unhandled event type".to_string(),
                })
            }
        }
    }

    fn change_subscription(&self, subscription_id: SubscriptionId, action: SubscriptionAction) -> ServiceFuture<SubscriptionChange> {
        debug!("Requested {} of subscription {}", action, subscription_id);
        let service = self.clone();

        self.ctx.spawn(move || {
            let key = format!("{}-{}-{}", action, subscription_id, Utc::now().timestamp());
            let response = match action {
                SubscriptionAction::Pause => service.gateway.pause_subscription(&subscription_id, &key),
                SubscriptionAction::Resume => service.gateway.resume_subscription(&subscription_id, &key),
                SubscriptionAction::Cancel => service.gateway.cancel_subscription(&subscription_id, &key),
            }?;
            debug!("Gateway answered {} of {}: {}", action, subscription_id, response);

            let status = action.resulting_status();
            let updated = with_transaction(&*service.ctx.db_pool, |conn| {
                conn.update_orders(OrderUpdater {
                    mask: OrderFilter {
                        subscription_id: Some(subscription_id.clone()),
                        ..Default::default()
                    },
                    data: OrderUpdateData {
                        subscription_status: Some(status),
                        ..Default::default()
                    },
                })
            })?;
            if updated.is_empty() {
                warn!("No order carries subscription {}", subscription_id);
            }

            let change = SubscriptionChange {
                subscription_id,
                status,
                orders_updated: updated.len(),
                message: format!("Subscription {} requested successfully", action),
            };
            info!("Subscription {} set to {:?} on {} orders", change.subscription_id, status, change.orders_updated);

            let payload = serde_json::to_value(&change).unwrap_or(Value::Null);
            notify_quietly(&*service.ctx.notifier, Template::SubscriptionChanged, &change.message, &payload);
            Ok(change)
        })
    }
}

impl PaymentService for PaymentServiceImpl {
    fn apply_payment(
        &self,
        order_id: OrderId,
        subscription_id: Option<SubscriptionId>,
        payment_id: PaymentId,
        payment_date: NaiveDateTime,
    ) -> ServiceFuture<PaymentOutcome> {
        debug!("Applying payment {} to order {}", payment_id, order_id);
        let service = self.clone();

        self.ctx
            .spawn(move || service.pay_order(order_id, subscription_id, payment_id, payment_date))
    }

    fn handle_webhook(&self, payload: String, signature: String) -> ServiceFuture<WebhookOutcome> {
        let service = self.clone();

        self.ctx.spawn(move || service.dispatch(&payload, &signature))
    }

    fn pause_subscription(&self, subscription_id: SubscriptionId) -> ServiceFuture<SubscriptionChange> {
        self.change_subscription(subscription_id, SubscriptionAction::Pause)
    }

    fn resume_subscription(&self, subscription_id: SubscriptionId) -> ServiceFuture<SubscriptionChange> {
        self.change_subscription(subscription_id, SubscriptionAction::Resume)
    }

    fn cancel_subscription(&self, subscription_id: SubscriptionId) -> ServiceFuture<SubscriptionChange> {
        self.change_subscription(subscription_id, SubscriptionAction::Cancel)
    }
}
