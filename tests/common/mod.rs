#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::prelude::*;
use failure::Error as FailureError;
use futures::prelude::*;
use futures_cpupool::CpuPool;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde_json::{self, Value};

use lib::clients::*;
use lib::controller::*;
use lib::models::*;
use lib::repos::*;
use lib::services::*;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const JANE: &str = "jane@example.com";
pub const JOHN: &str = "john@example.com";

/// Records every notification instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Template, Value)>>,
}

impl RecordingNotifier {
    pub fn templates(&self) -> Vec<Template> {
        self.sent.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, template: Template, _subject: &str, payload: &Value) -> Result<(), FailureError> {
        self.sent.lock().unwrap().push((template, payload.clone()));
        Ok(())
    }
}

/// Prices every payment at 60.00 and accepts every subscription call.
#[derive(Default)]
pub struct MockGateway {
    pub keys: Mutex<Vec<String>>,
}

impl MockGateway {
    fn record(&self, key: &str) {
        self.keys.lock().unwrap().push(key.to_string());
    }
}

impl PaymentGateway for MockGateway {
    fn price_for_payment(&self, _payment_id: &PaymentId, idempotency_key: &str) -> Result<f64, FailureError> {
        self.record(idempotency_key);
        Ok(60.0)
    }

    fn pause_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError> {
        self.record(idempotency_key);
        Ok(json!({"id": subscription_id, "status": "paused"}))
    }

    fn resume_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError> {
        self.record(idempotency_key);
        Ok(json!({"id": subscription_id, "status": "active"}))
    }

    fn cancel_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError> {
        self.record(idempotency_key);
        Ok(json!({"id": subscription_id, "status": "canceled"}))
    }
}

pub struct Context {
    pub pool: MemoryPool,
    pub ctx: ServiceContext,
    pub notifier: Arc<RecordingNotifier>,
    pub gateway: Arc<MockGateway>,
    pub verifier: WebhookVerifier,
}

/// Two categories holding five recipes, three spice levels, two snacks and two customers.
pub fn seeded_pool() -> MemoryPool {
    let pool = MemoryPool::new();
    pool.add_category(1, "Vegetarian")
        .add_category(2, "Seafood")
        .add_category(3, "Desserts")
        .add_recipe(1, 1, "Mushroom Risotto", 12.5)
        .add_recipe(2, 1, "Veggie Tacos", 11.0)
        .add_recipe(3, 1, "Lentil Curry", 10.5)
        .add_recipe(4, 2, "Salmon Teriyaki", 15.0)
        .add_recipe(5, 2, "Shrimp Linguine", 14.0)
        .add_spice_level(1, "Mild")
        .add_spice_level(2, "Medium")
        .add_spice_level(3, "Hot")
        .add_snack(1, "Trail Mix", 4.5)
        .add_snack(2, "Brownie", 3.0)
        .add_customer(1, JANE, "Jane", "Doe")
        .add_customer(2, JOHN, "John", "Roe");
    pool
}

pub fn setup() -> Context {
    let pool = seeded_pool();
    let notifier = Arc::new(RecordingNotifier::default());
    let gateway = Arc::new(MockGateway::default());
    let ctx = ServiceContext::new(Arc::new(pool.clone()), CpuPool::new(2), notifier.clone());

    Context {
        pool,
        ctx,
        notifier,
        gateway,
        verifier: WebhookVerifier::new(WEBHOOK_SECRET.to_string(), 300),
    }
}

impl Context {
    pub fn orders(&self) -> OrderServiceImpl {
        OrderServiceImpl::new(self.ctx.clone()).with_rng_factory(Arc::new(|| {
            Box::new(StdRng::from_seed([7; 32])) as Box<dyn RngCore + Send>
        }))
    }

    pub fn snacks(&self) -> SnackServiceImpl {
        SnackServiceImpl::new(self.ctx.clone())
    }

    pub fn payments(&self) -> PaymentServiceImpl {
        PaymentServiceImpl::new(self.ctx.clone(), self.gateway.clone(), self.verifier.clone())
    }

    pub fn controller(&self) -> ControllerImpl {
        let gateway = Arc::new(RetryingGateway::new(self.gateway.clone(), 2, Duration::from_millis(0)));
        ControllerImpl::new(ServiceFactory::new(self.ctx.clone(), gateway, self.verifier.clone())).unwrap()
    }

    pub fn call(&self, request: Request) -> Response {
        self.controller().call(request).wait().unwrap()
    }

    /// Places a 3-meals-a-week order for two over both vegetarian and seafood recipes.
    pub fn place_order(&self, customer_id: i32) -> OrderId {
        self.orders()
            .place_order(place_order_payload(customer_id))
            .wait()
            .unwrap()
            .order_id
    }

    /// Signed webhook delivery as the payment provider would send it.
    pub fn webhook_request(&self, event: &Value) -> Request {
        let payload = serde_json::to_string(event).unwrap();
        let signature = self.verifier.sign(&payload, Utc::now().timestamp()).unwrap();
        Request::new(Method::Post, "/stripe/webhook")
            .with_header(SIGNATURE_HEADER, &signature)
            .with_body(payload)
    }
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd(2024, 3, 4)
}

pub fn place_order_payload(customer_id: i32) -> PlaceOrderPayload {
    serde_json::from_value(json!({
        "customer_id": customer_id,
        "amount_paid": 59.97,
        "meals_per_week": 3,
        "number_of_people": 2,
        "selected_recipes": [1, 2],
        "start_date": start_date(),
        "initial_payment_id": "pi_initial"
    })).unwrap()
}

/// Marks weeks of an order as paid without going through the payment flow.
pub fn mark_paid(pool: &MemoryPool, order_id: OrderId, week: Week, payment_id: &str) {
    with_transaction(pool, |conn| {
        conn.update_mappings(WeekMappingUpdater {
            mask: WeekMappingFilter {
                order_id: Some(order_id),
                week: Some(week),
                ..Default::default()
            },
            data: WeekMappingUpdateData {
                payment_id: Some(PaymentId(payment_id.to_string())),
                payment_date: Some(start_date().and_hms(9, 0, 0)),
                paid_amount: Some(59.97),
                ..Default::default()
            },
        })
    }).unwrap();
}

pub fn week_rows(pool: &MemoryPool, order_id: OrderId, week: Week) -> Vec<WeekMapping> {
    pool.snapshot()
        .mappings
        .into_iter()
        .filter(|m| m.order_id == order_id && m.week == week)
        .collect()
}
