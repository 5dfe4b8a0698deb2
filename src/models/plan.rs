//! Request payloads and response views of the order endpoints.

use std::fmt;

use chrono::prelude::*;
use serde::de::{self, Deserializer};
use serde::Deserialize;

use super::catalog::*;
use super::common::*;
use super::order::*;
use super::snack::*;

#[derive(Deserialize)]
#[serde(untagged)]
enum CategoryList {
    List(Vec<CategoryId>),
    Joined(String),
}

/// Accepts selected categories either as a JSON list or as a comma-joined string.
fn deserialize_categories<'de, D>(deserializer: D) -> Result<Vec<CategoryId>, D::Error>
where
    D: Deserializer<'de>,
{
    match CategoryList::deserialize(deserializer)? {
        CategoryList::List(v) => Ok(v),
        CategoryList::Joined(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<CategoryId>().map_err(|_| de::Error::custom(format!("invalid category id `{}`", s))))
            .collect(),
    }
}

fn default_active_week() -> Week {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaceOrderPayload {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default = "default_active_week")]
    pub active_week: Week,
    pub amount_paid: f64,
    pub meals_per_week: i32,
    pub number_of_people: i32,
    #[serde(deserialize_with = "deserialize_categories")]
    pub selected_recipes: Vec<CategoryId>,
    /// First delivery date; today when omitted.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub initial_payment_id: Option<PaymentId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanItem {
    #[serde(default)]
    pub mapping_id: Option<MappingId>,
    pub recipe_id: RecipeId,
    pub recipe_price: f64,
    pub spice_level_id: SpiceLevelId,
    #[serde(default)]
    pub payment_id: Option<PaymentId>,
}

/// One week of an update-order payload, as the client submits it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeekPlan {
    pub week: Week,
    #[serde(default)]
    pub payment_id: Option<PaymentId>,
    pub delivery_date: String,
    pub number_of_people: i32,
    pub meals_per_week: i32,
    pub items: Vec<PlanItem>,
}

/// Week-level values of a submitted week after normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct WeekDetails {
    pub week: Week,
    pub delivery_date: NaiveDate,
    pub number_of_people: i32,
    pub meals_per_week: i32,
    pub paid: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateOrderPayload {
    pub order_id: OrderId,
    pub order_details: Vec<WeekPlan>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub mapping_id: MappingId,
    pub recipe_id: RecipeId,
    pub recipe_name: Option<String>,
    pub recipe_price: f64,
    pub spice_level_id: SpiceLevelId,
    pub spice_level_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeekView {
    pub week: Week,
    pub payment_id: Option<PaymentId>,
    pub payment_date: Option<NaiveDateTime>,
    pub delivery_date: NaiveDate,
    pub number_of_people: i32,
    pub meals_per_week: i32,
    pub due_amount: f64,
    pub snack_mapping_ids: Vec<SnackMappingId>,
    pub items: Vec<ItemView>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub customer_email: String,
    pub customer_name: String,
    pub order_details: Vec<WeekView>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdatedOrder {
    #[serde(flatten)]
    pub details: OrderDetails,
    /// Due week's meal count differs from the latest paid week's.
    pub plan_changed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveOrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub customer_email: String,
    pub customer_name: String,
    #[serde(rename = "activeWeekOrderDetails")]
    pub active_week_order_details: WeekView,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanSetting {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub active_week: Week,
    /// Category names joined with `", "`.
    pub selected_recipes: String,
    pub subscription_id: Option<SubscriptionId>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub week: Week,
    pub meals_per_week: i32,
    pub number_of_people: i32,
    pub delivery_date: NaiveDate,
    pub due_amount: f64,
    pub payment_date: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrderItem {
    pub mapping_id: MappingId,
    pub week: Week,
    pub recipe_id: RecipeId,
    pub recipe_name: Option<String>,
    pub recipe_price: f64,
    pub spice_level_id: SpiceLevelId,
    pub spice_level_name: Option<String>,
    pub payment_id: Option<PaymentId>,
    pub payment_date: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrderDetails {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub active_week: Week,
    pub subscription_id: Option<SubscriptionId>,
    pub initial_payment_id: Option<PaymentId>,
    pub amount_paid: f64,
    pub created_at: DateTime<Utc>,
    pub customer_name: String,
    pub customer_email: String,
    pub order_details: Vec<CustomerOrderItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectedRecipe {
    pub week: Week,
    pub recipe_id: RecipeId,
    pub recipe_price: f64,
    #[serde(default = "default_spice_level")]
    pub spice_level_id: SpiceLevelId,
    pub delivery_date: String,
    pub number_of_people: i32,
    pub meals_per_week: i32,
    #[serde(default)]
    pub due_amount: f64,
}

fn default_spice_level() -> SpiceLevelId {
    DEFAULT_SPICE_LEVEL
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddSelectedRecipesPayload {
    pub order_id: OrderId,
    pub mappings: Vec<SelectedRecipe>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddedRecipes {
    pub order_id: OrderId,
    pub inserted: Vec<MappingId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderIdPayload {
    pub order_id: OrderId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletedOrder {
    pub deleted_orders: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomerPayload {
    pub customer_id: CustomerId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnackLine {
    pub snacks_id: SnackId,
    pub portion: i32,
    pub price: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddSnacksPayload {
    pub order_id: OrderId,
    pub week: Week,
    pub snacks: Vec<SnackLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddedSnacks {
    pub order_id: OrderId,
    pub week: Week,
    pub inserted_snacks: Vec<SnackId>,
    pub total_amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnackOrderLine {
    #[serde(flatten)]
    pub mapping: SnackMapping,
    pub name: String,
    pub price: f64,
}

impl SnackOrderLine {
    pub fn new(mapping: SnackMapping, snack: &Snack) -> Self {
        Self {
            mapping,
            name: snack.name.clone(),
            price: snack.price,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnackOrder {
    pub order_id: OrderId,
    pub active_week: Week,
    pub snacks: Vec<SnackOrderLine>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionPayload {
    pub subscription_id: SubscriptionId,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SubscriptionAction {
    Pause,
    Resume,
    Cancel,
}

impl SubscriptionAction {
    pub fn resulting_status(self) -> SubscriptionStatus {
        match self {
            SubscriptionAction::Pause => SubscriptionStatus::Paused,
            SubscriptionAction::Resume => SubscriptionStatus::Active,
            SubscriptionAction::Cancel => SubscriptionStatus::Cancelled,
        }
    }
}

impl fmt::Display for SubscriptionAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            SubscriptionAction::Pause => "pause",
            SubscriptionAction::Resume => "resume",
            SubscriptionAction::Cancel => "cancel",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionChange {
    pub subscription_id: SubscriptionId,
    pub status: SubscriptionStatus,
    pub orders_updated: usize,
    pub message: String,
}
