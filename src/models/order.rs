use chrono::prelude::*;
use postgres::Row;

use super::common::*;
use errors::*;
use repos::types::*;
use util::*;

const ORDER_ID_COLUMN: &str = "order_id";
const CUSTOMER_ID_COLUMN: &str = "customer_id";
const ORDER_TYPE_COLUMN: &str = "order_type";
const ACTIVE_WEEK_COLUMN: &str = "active_week";
const AMOUNT_PAID_COLUMN: &str = "amount_paid";
const SELECTED_RECIPES_COLUMN: &str = "selected_recipes";
const SUBSCRIPTION_ID_COLUMN: &str = "subscription_id";
const SUBSCRIPTION_STATUS_COLUMN: &str = "subscription_status";
const INITIAL_PAYMENT_ID_COLUMN: &str = "initial_payment_id";
const CREATED_AT_COLUMN: &str = "created_at";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    /// Recurring 4-week plan billed through a subscription.
    #[serde(rename = "S")]
    Subscription,
    #[serde(rename = "O")]
    OneOff,
}

impl OrderType {
    pub fn as_code(self) -> &'static str {
        match self {
            OrderType::Subscription => "S",
            OrderType::OneOff => "O",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "S" => Some(OrderType::Subscription),
            "O" => Some(OrderType::OneOff),
            _ => None,
        }
    }
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::Subscription
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    #[serde(rename = "A")]
    Active,
    #[serde(rename = "P")]
    Paused,
    #[serde(rename = "C")]
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "A",
            SubscriptionStatus::Paused => "P",
            SubscriptionStatus::Cancelled => "C",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(SubscriptionStatus::Active),
            "P" => Some(SubscriptionStatus::Paused),
            "C" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub order_type: OrderType,
    /// Week currently eligible for billing and delivery.
    pub active_week: Week,
    pub amount_paid: f64,
    pub selected_recipes: Vec<CategoryId>,
    pub subscription_id: Option<SubscriptionId>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub initial_payment_id: Option<PaymentId>,
    pub created_at: DateTime<Utc>,
}

impl FromRow for Order {
    fn from_row(row: &Row) -> RepoResult<Self> {
        let order_type: String = row.try_get(ORDER_TYPE_COLUMN)?;
        let subscription_status: Option<String> = row.try_get(SUBSCRIPTION_STATUS_COLUMN)?;
        let selected_recipes: Vec<i32> = row.try_get(SELECTED_RECIPES_COLUMN)?;

        Ok(Self {
            order_id: OrderId(row.try_get(ORDER_ID_COLUMN)?),
            customer_id: CustomerId(row.try_get(CUSTOMER_ID_COLUMN)?),
            order_type: OrderType::from_code(&order_type).ok_or_else(|| RepoError::Connection {
                reason: format!("Unknown order_type {}", order_type),
            })?,
            active_week: row.try_get(ACTIVE_WEEK_COLUMN)?,
            amount_paid: row.try_get(AMOUNT_PAID_COLUMN)?,
            selected_recipes: selected_recipes.into_iter().map(CategoryId).collect(),
            subscription_id: row.try_get::<_, Option<String>>(SUBSCRIPTION_ID_COLUMN)?.map(SubscriptionId),
            subscription_status: subscription_status.as_ref().and_then(|code| SubscriptionStatus::from_code(code)),
            initial_payment_id: row.try_get::<_, Option<String>>(INITIAL_PAYMENT_ID_COLUMN)?.map(PaymentId),
            created_at: row.try_get(CREATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderInserter {
    pub customer_id: CustomerId,
    pub order_type: OrderType,
    pub active_week: Week,
    pub amount_paid: f64,
    pub selected_recipes: Vec<CategoryId>,
    pub initial_payment_id: Option<PaymentId>,
    pub created_at: DateTime<Utc>,
}

impl OrderInserter {
    pub fn into_order(self, order_id: OrderId) -> Order {
        Order {
            order_id,
            customer_id: self.customer_id,
            order_type: self.order_type,
            active_week: self.active_week,
            amount_paid: self.amount_paid,
            selected_recipes: self.selected_recipes,
            subscription_id: None,
            subscription_status: None,
            initial_payment_id: self.initial_payment_id,
            created_at: self.created_at,
        }
    }
}

impl Inserter for OrderInserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        let mut b = InsertBuilder::new(table)
            .with_arg(CUSTOMER_ID_COLUMN, self.customer_id.0)
            .with_arg(ORDER_TYPE_COLUMN, self.order_type.as_code().to_string())
            .with_arg(ACTIVE_WEEK_COLUMN, self.active_week)
            .with_arg(AMOUNT_PAID_COLUMN, self.amount_paid)
            .with_arg(
                SELECTED_RECIPES_COLUMN,
                self.selected_recipes.into_iter().map(|v| v.0).collect::<Vec<i32>>(),
            )
            .with_arg(CREATED_AT_COLUMN, self.created_at);

        if let Some(v) = self.initial_payment_id {
            b = b.with_arg(INITIAL_PAYMENT_ID_COLUMN, v.0);
        }

        b
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub order_id: Option<OrderId>,
    pub customer_id: Option<CustomerId>,
    pub order_type: Option<OrderType>,
    pub subscription_id: Option<SubscriptionId>,
    /// Only orders that have no subscription attached yet.
    pub without_subscription: bool,
    pub sort: Option<SortOrder>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.order_id.map_or(true, |v| v == order.order_id)
            && self.customer_id.map_or(true, |v| v == order.customer_id)
            && self.order_type.map_or(true, |v| v == order.order_type)
            && self.subscription_id
                .as_ref()
                .map_or(true, |v| Some(v) == order.subscription_id.as_ref())
            && (!self.without_subscription || order.subscription_id.is_none())
    }
}

impl From<OrderId> for OrderFilter {
    fn from(v: OrderId) -> Self {
        Self {
            order_id: Some(v),
            ..Default::default()
        }
    }
}

impl Filter for OrderFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.order_id {
            b = b.with_filter(ORDER_ID_COLUMN, v.0);
        }

        if let Some(v) = self.customer_id {
            b = b.with_filter(CUSTOMER_ID_COLUMN, v.0);
        }

        if let Some(v) = self.order_type {
            b = b.with_filter(ORDER_TYPE_COLUMN, v.as_code().to_string());
        }

        if let Some(v) = self.subscription_id {
            b = b.with_filter(SUBSCRIPTION_ID_COLUMN, v.0);
        }

        if self.without_subscription {
            b = b.with_null(SUBSCRIPTION_ID_COLUMN);
        }

        if let Some(sort) = self.sort {
            b = b.with_extra(format!("ORDER BY {} {}", ORDER_ID_COLUMN, sort.as_sql()));
        }

        b
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderUpdateData {
    pub active_week: Option<Week>,
    pub subscription_id: Option<SubscriptionId>,
    pub subscription_status: Option<SubscriptionStatus>,
}

impl OrderUpdateData {
    pub fn apply(&self, order: &mut Order) {
        if let Some(v) = self.active_week {
            order.active_week = v;
        }
        if let Some(ref v) = self.subscription_id {
            order.subscription_id = Some(v.clone());
        }
        if let Some(v) = self.subscription_status {
            order.subscription_status = Some(v);
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrderUpdater {
    pub mask: OrderFilter,
    pub data: OrderUpdateData,
}

impl Updater for OrderUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let OrderUpdater { mask, data } = self;

        let mut b = UpdateBuilder::from(mask.into_filtered_operation_builder(table));

        if let Some(v) = data.active_week {
            b = b.with_value(ACTIVE_WEEK_COLUMN, v);
        }

        if let Some(v) = data.subscription_id {
            b = b.with_value(SUBSCRIPTION_ID_COLUMN, v.0);
        }

        if let Some(v) = data.subscription_status {
            b = b.with_value(SUBSCRIPTION_STATUS_COLUMN, v.as_code().to_string());
        }

        b
    }
}
