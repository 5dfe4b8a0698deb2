use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::prelude::*;
use failure::Error as FailureError;
use rand::rngs::StdRng;
use rand::{FromEntropy, RngCore};
use serde_json;

use super::allocation::*;
use super::catalog::recipe_pool;
use super::locks::with_order_lock;
use super::reconciliation::*;
use super::types::*;
use clients::notification::*;
use errors::*;
use models::*;
use repos::*;

pub type RngFactory = Arc<dyn Fn() -> Box<dyn RngCore + Send> + Send + Sync>;

pub trait OrderService {
    /// Creates an order and allocates recipes to all of its weeks
    fn place_order(&self, payload: PlaceOrderPayload) -> ServiceFuture<PlacedOrder>;
    /// Applies the submitted weeks of an order and returns its refreshed details
    fn update_order(&self, payload: UpdateOrderPayload) -> ServiceFuture<UpdatedOrder>;
    fn plan_setting(&self, customer_id: CustomerId) -> ServiceFuture<PlanSetting>;
    /// Latest order of a customer with its rows grouped by week
    fn fetch_order(&self, customer_id: CustomerId) -> ServiceFuture<OrderDetails>;
    /// Earliest order of a customer, restricted to its active week
    fn active_order(&self, customer_id: CustomerId) -> ServiceFuture<ActiveOrderDetails>;
    fn order_details_by_customer(&self, customer_id: CustomerId) -> ServiceFuture<CustomerOrderDetails>;
    /// Inserts explicitly chosen recipes into weeks that have none yet
    fn add_selected_recipes(&self, payload: AddSelectedRecipesPayload) -> ServiceFuture<AddedRecipes>;
    fn delete_order(&self, order_id: OrderId) -> ServiceFuture<DeletedOrder>;
}

pub struct OrderServiceImpl {
    ctx: ServiceContext,
    rng_factory: RngFactory,
}

impl OrderServiceImpl {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            ctx,
            rng_factory: Arc::new(|| Box::new(StdRng::from_entropy()) as Box<dyn RngCore + Send>),
        }
    }

    pub fn with_rng_factory(mut self, rng_factory: RngFactory) -> Self {
        self.rng_factory = rng_factory;
        self
    }
}

fn not_found(what: String) -> FailureError {
    format_err!("{}", what).context(Error::NotFound).into()
}

fn validation(what: String) -> FailureError {
    format_err!("{}", what).context(Error::Validation).into()
}

fn first_order(conn: &mut dyn RepoConnection, customer_id: CustomerId, sort: SortOrder) -> Result<Order, FailureError> {
    conn.select_orders(OrderFilter {
        customer_id: Some(customer_id),
        sort: Some(sort),
        ..Default::default()
    })?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(format!("No order found for customer {}", customer_id)))
}

fn customer_of(conn: &mut dyn RepoConnection, order: &Order) -> Result<Customer, FailureError> {
    conn.select_customers(CustomerFilter::from(order.customer_id))?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(format!("Customer {} of order {} not found", order.customer_id, order.order_id)))
}

struct Names {
    recipes: HashMap<RecipeId, String>,
    spice_levels: HashMap<SpiceLevelId, String>,
}

impl Names {
    fn load(conn: &mut dyn RepoConnection, mappings: &[WeekMapping]) -> Result<Self, FailureError> {
        let wanted = mappings.iter().map(|m| m.recipe_id).collect::<HashSet<_>>();
        let recipes = conn.select_recipes(RecipeFilter::default())?
            .into_iter()
            .filter(|r| wanted.contains(&r.recipe_id))
            .map(|r| (r.recipe_id, r.title))
            .collect();
        let spice_levels = conn.select_spice_levels()?
            .into_iter()
            .map(|s| (s.spice_level_id, s.spice_level_name))
            .collect();

        Ok(Self { recipes, spice_levels })
    }

    fn item(&self, m: &WeekMapping) -> ItemView {
        ItemView {
            mapping_id: m.mapping_id,
            recipe_id: m.recipe_id,
            recipe_name: self.recipes.get(&m.recipe_id).cloned(),
            recipe_price: m.recipe_price,
            spice_level_id: m.spice_level_id,
            spice_level_name: self.spice_levels.get(&m.spice_level_id).cloned(),
        }
    }
}

fn week_views(conn: &mut dyn RepoConnection, order_id: OrderId, mappings: &[WeekMapping]) -> Result<Vec<WeekView>, FailureError> {
    let names = Names::load(conn, mappings)?;
    let mut by_week = BTreeMap::<Week, Vec<&WeekMapping>>::new();
    for m in mappings {
        by_week.entry(m.week).or_insert_with(Vec::new).push(m);
    }

    let mut out = vec![];
    for (week, rows) in by_week {
        let head = rows[0];
        let snack_mapping_ids = conn.select_snack_links(OrderWeekSnackFilter {
            order_id: Some(order_id),
            week: Some(week),
        })?
            .into_iter()
            .map(|l| l.snacks_mapping_id)
            .collect();
        out.push(WeekView {
            week,
            payment_id: head.payment_id.clone(),
            payment_date: head.payment_date,
            delivery_date: head.delivery_date,
            number_of_people: head.number_of_people,
            meals_per_week: head.meals_per_week,
            due_amount: head.due_amount,
            snack_mapping_ids,
            items: rows.iter().map(|m| names.item(m)).collect(),
        });
    }

    Ok(out)
}

/// Full details of one order, rows grouped by week.
pub fn load_order_details(conn: &mut dyn RepoConnection, order_id: OrderId) -> Result<OrderDetails, FailureError> {
    let order = conn.select_orders(OrderFilter::from(order_id))?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(format!("Order {} not found", order_id)))?;
    let customer = customer_of(conn, &order)?;
    let mappings = conn.select_mappings(WeekMappingFilter::from(order_id))?;
    let order_details = week_views(conn, order_id, &mappings)?;

    Ok(OrderDetails {
        order,
        customer_email: customer.email,
        customer_name: customer.first_name,
        order_details,
    })
}

/// Whether the first due week asks for a different number of meals than the latest paid one.
fn plan_changed(weeks: &[(WeekDetails, Vec<PlanItem>)]) -> bool {
    let latest_paid = weeks.iter().filter(|(d, _)| d.paid).last();
    let due = weeks.iter().find(|(d, _)| !d.paid);
    match (latest_paid, due) {
        (Some((paid, _)), Some((due, _))) => paid.meals_per_week != due.meals_per_week,
        _ => false,
    }
}

impl OrderService for OrderServiceImpl {
    fn place_order(&self, payload: PlaceOrderPayload) -> ServiceFuture<PlacedOrder> {
        debug!("Placing order for customer {}", payload.customer_id);
        let db_pool = self.ctx.db_pool.clone();
        let rng_factory = self.rng_factory.clone();

        self.ctx.spawn(move || {
            if payload.selected_recipes.is_empty() {
                return Err(validation("No recipe categories selected".to_string()));
            }
            if !is_valid_week(payload.active_week) {
                return Err(validation(format!("Active week {} is out of range", payload.active_week)));
            }
            let start_date = payload.start_date.unwrap_or_else(|| Utc::now().naive_utc().date());

            let placed = with_transaction(&*db_pool, |conn| {
                if conn.select_customers(CustomerFilter::from(payload.customer_id))?.is_empty() {
                    return Err(not_found(format!("Customer {} not found", payload.customer_id)));
                }

                let order = conn.insert_order(OrderInserter {
                    customer_id: payload.customer_id,
                    order_type: payload.order_type,
                    active_week: payload.active_week,
                    amount_paid: payload.amount_paid,
                    selected_recipes: payload.selected_recipes.clone(),
                    initial_payment_id: payload.initial_payment_id.clone(),
                    created_at: Utc::now(),
                })?;

                let pool = recipe_pool(conn, &order.selected_recipes)?;
                let mut rng = (rng_factory)();
                let rows = allocate(
                    &mut rng,
                    &pool,
                    &AllocationRequest {
                        order_id: order.order_id,
                        meals_per_week: payload.meals_per_week,
                        number_of_people: payload.number_of_people,
                        due_amount: payload.amount_paid,
                        start_date,
                    },
                )?;
                for row in rows {
                    conn.insert_mapping(row)?;
                }

                Ok(PlacedOrder { order_id: order.order_id })
            })?;

            info!("Order {} placed for customer {}", placed.order_id, payload.customer_id);
            Ok(placed)
        })
    }

    fn update_order(&self, payload: UpdateOrderPayload) -> ServiceFuture<UpdatedOrder> {
        debug!("Updating order {}", payload.order_id);
        let ctx = self.ctx.clone();

        self.ctx.spawn(move || {
            let order_id = payload.order_id;
            let weeks = payload
                .order_details
                .iter()
                .map(normalize_week)
                .collect::<Result<Vec<_>, _>>()?;

            let mut seen = HashSet::new();
            for (details, _) in &weeks {
                if !seen.insert(details.week) {
                    return Err(validation(format!("Week {} submitted twice", details.week)));
                }
            }

            let plan_changed = plan_changed(&weeks);
            if plan_changed {
                info!("Order {} changes its meals per week for the due week", order_id);
            }

            let details = with_order_lock(&*ctx.db_pool, &ctx.locks, order_id, |conn, _| {
                for (week, items) in &weeks {
                    reconcile_week(conn, order_id, week, items)?;
                }
                load_order_details(conn, order_id)
            })?;

            let payload = serde_json::to_value(&details)?;
            notify_quietly(&*ctx.notifier, Template::OrderUpdated, "Existing Order Updated", &payload);

            Ok(UpdatedOrder { details, plan_changed })
        })
    }

    fn plan_setting(&self, customer_id: CustomerId) -> ServiceFuture<PlanSetting> {
        debug!("Getting plan setting of customer {}", customer_id);
        let db_pool = self.ctx.db_pool.clone();

        self.ctx.spawn(move || {
            with_transaction(&*db_pool, |conn| {
                let order = first_order(conn, customer_id, SortOrder::Descending)?;
                let active = conn.select_mappings(WeekMappingFilter {
                    order_id: Some(order.order_id),
                    week: Some(order.active_week),
                    ..Default::default()
                })?
                    .into_iter()
                    .next()
                    .ok_or_else(|| not_found(format!("Order {} has no rows for week {}", order.order_id, order.active_week)))?;

                let categories = conn.select_categories()?
                    .into_iter()
                    .map(|c| (c.category_id, c.category_name))
                    .collect::<HashMap<_, _>>();
                let selected_recipes = order
                    .selected_recipes
                    .iter()
                    .filter_map(|id| categories.get(id).cloned())
                    .collect::<Vec<_>>()
                    .join(", ");

                Ok(PlanSetting {
                    order_id: order.order_id,
                    customer_id: order.customer_id,
                    active_week: order.active_week,
                    selected_recipes,
                    subscription_id: order.subscription_id,
                    subscription_status: order.subscription_status,
                    week: active.week,
                    meals_per_week: active.meals_per_week,
                    number_of_people: active.number_of_people,
                    delivery_date: active.delivery_date,
                    due_amount: active.due_amount,
                    payment_date: active.payment_date,
                })
            })
        })
    }

    fn fetch_order(&self, customer_id: CustomerId) -> ServiceFuture<OrderDetails> {
        debug!("Fetching latest order of customer {}", customer_id);
        let db_pool = self.ctx.db_pool.clone();

        self.ctx.spawn(move || {
            with_transaction(&*db_pool, |conn| {
                let order = first_order(conn, customer_id, SortOrder::Descending)?;
                load_order_details(conn, order.order_id)
            })
        })
    }

    fn active_order(&self, customer_id: CustomerId) -> ServiceFuture<ActiveOrderDetails> {
        debug!("Fetching active order of customer {}", customer_id);
        let db_pool = self.ctx.db_pool.clone();

        self.ctx.spawn(move || {
            with_transaction(&*db_pool, |conn| {
                let order = first_order(conn, customer_id, SortOrder::Ascending)?;
                let customer = customer_of(conn, &order)?;
                let mappings = conn.select_mappings(WeekMappingFilter {
                    order_id: Some(order.order_id),
                    week: Some(order.active_week),
                    ..Default::default()
                })?;
                let active_week_order_details = week_views(conn, order.order_id, &mappings)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| not_found(format!("Active week of order {} has no rows", order.order_id)))?;

                Ok(ActiveOrderDetails {
                    order,
                    customer_email: customer.email,
                    customer_name: customer.first_name,
                    active_week_order_details,
                })
            })
        })
    }

    fn order_details_by_customer(&self, customer_id: CustomerId) -> ServiceFuture<CustomerOrderDetails> {
        debug!("Fetching order details of customer {}", customer_id);
        let db_pool = self.ctx.db_pool.clone();

        self.ctx.spawn(move || {
            with_transaction(&*db_pool, |conn| {
                let order = first_order(conn, customer_id, SortOrder::Ascending)?;
                let customer = customer_of(conn, &order)?;
                let mappings = conn.select_mappings(WeekMappingFilter::from(order.order_id))?;
                let names = Names::load(conn, &mappings)?;

                let order_details = mappings
                    .iter()
                    .map(|m| {
                        let item = names.item(m);
                        CustomerOrderItem {
                            mapping_id: m.mapping_id,
                            week: m.week,
                            recipe_id: m.recipe_id,
                            recipe_name: item.recipe_name,
                            recipe_price: m.recipe_price,
                            spice_level_id: m.spice_level_id,
                            spice_level_name: item.spice_level_name,
                            payment_id: m.payment_id.clone(),
                            payment_date: m.payment_date,
                        }
                    })
                    .collect();

                Ok(CustomerOrderDetails {
                    order_id: order.order_id,
                    customer_id: order.customer_id,
                    active_week: order.active_week,
                    subscription_id: order.subscription_id,
                    initial_payment_id: order.initial_payment_id,
                    amount_paid: order.amount_paid,
                    created_at: order.created_at,
                    customer_name: customer.full_name(),
                    customer_email: customer.email,
                    order_details,
                })
            })
        })
    }

    fn add_selected_recipes(&self, payload: AddSelectedRecipesPayload) -> ServiceFuture<AddedRecipes> {
        debug!("Adding {} selected recipes to order {}", payload.mappings.len(), payload.order_id);
        let ctx = self.ctx.clone();

        self.ctx.spawn(move || {
            let order_id = payload.order_id;
            if payload.mappings.is_empty() {
                return Err(validation("No recipes to add".to_string()));
            }

            let mut by_week = BTreeMap::<Week, Vec<&SelectedRecipe>>::new();
            for m in &payload.mappings {
                if !is_valid_week(m.week) {
                    return Err(validation(format!("Week {} is out of range", m.week)));
                }
                by_week.entry(m.week).or_insert_with(Vec::new).push(m);
            }
            for (week, rows) in &by_week {
                let meals = rows[0].meals_per_week;
                if rows.iter().any(|r| r.meals_per_week != meals) || rows.len() != meals as usize {
                    return Err(validation(format!(
                        "Week {} has {} recipes for {} meals per week",
                        week,
                        rows.len(),
                        meals
                    )));
                }
            }
            let mut inserters = vec![];
            for m in &payload.mappings {
                inserters.push(WeekMappingInserter {
                    order_id,
                    week: m.week,
                    recipe_id: m.recipe_id,
                    recipe_price: m.recipe_price,
                    spice_level_id: m.spice_level_id,
                    delivery_date: normalize_date(&m.delivery_date)?,
                    number_of_people: m.number_of_people,
                    meals_per_week: m.meals_per_week,
                    due_amount: m.due_amount,
                });
            }
            let weeks = by_week.keys().cloned().collect::<Vec<_>>();

            let inserted = with_order_lock(&*ctx.db_pool, &ctx.locks, order_id, move |conn, _| {
                for week in weeks {
                    let existing = conn.select_mappings(WeekMappingFilter {
                        order_id: Some(order_id),
                        week: Some(week),
                        ..Default::default()
                    })?;
                    if !existing.is_empty() {
                        return Err(validation(format!("Week {} of order {} already has recipes", week, order_id)));
                    }
                }

                let mut inserted = vec![];
                for inserter in inserters {
                    inserted.push(conn.insert_mapping(inserter)?.mapping_id);
                }
                Ok(inserted)
            })?;

            info!("Added {} recipes to order {}", inserted.len(), order_id);
            Ok(AddedRecipes { order_id, inserted })
        })
    }

    fn delete_order(&self, order_id: OrderId) -> ServiceFuture<DeletedOrder> {
        debug!("Deleting order {}", order_id);
        let ctx = self.ctx.clone();

        self.ctx.spawn(move || {
            let deleted = with_order_lock(&*ctx.db_pool, &ctx.locks, order_id, |conn, _| {
                conn.delete_snack_links(OrderWeekSnackFilter {
                    order_id: Some(order_id),
                    ..Default::default()
                })?;
                conn.delete_snack_mappings(SnackMappingFilter::from(order_id))?;
                conn.delete_mappings(WeekMappingFilter::from(order_id))?;
                Ok(conn.delete_orders(OrderFilter::from(order_id))?.len())
            })?;

            info!("Deleted order {}", order_id);
            Ok(DeletedOrder { deleted_orders: deleted })
        })
    }
}
