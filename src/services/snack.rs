use failure::Error as FailureError;
use serde_json;

use super::locks::with_order_lock;
use super::types::*;
use clients::notification::*;
use errors::*;
use models::*;
use repos::*;

pub trait SnackService {
    /// Buys snacks for one week of an order
    fn add_snacks(&self, payload: AddSnacksPayload) -> ServiceFuture<AddedSnacks>;
    /// Snacks bought for one week of an order, with catalog name and price
    fn snack_order(&self, order_id: OrderId, week: Week) -> ServiceFuture<Vec<SnackOrderLine>>;
}

pub struct SnackServiceImpl {
    ctx: ServiceContext,
}

impl SnackServiceImpl {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }
}

fn snack_lines(conn: &mut dyn RepoConnection, order_id: OrderId, week: Week) -> Result<Vec<SnackOrderLine>, FailureError> {
    let snacks = conn.select_snacks()?;
    let mappings = conn.select_snack_mappings(SnackMappingFilter {
        order_id: Some(order_id),
        week: Some(week),
        ..Default::default()
    })?;

    Ok(mappings
        .into_iter()
        .filter_map(|mapping| {
            let snack = snacks.iter().find(|s| s.snacks_id == mapping.snacks_id);
            if snack.is_none() {
                warn!("Snack {} of mapping {} is missing from the catalog", mapping.snacks_id, mapping.snacks_mapping_id);
            }
            snack.map(|snack| SnackOrderLine::new(mapping, snack))
        })
        .collect())
}

/// Records the one-off checkout that paid for the snacks of an order's active week.
pub fn stamp_snack_payment(
    conn: &mut dyn RepoConnection,
    order: &Order,
    payment_id: &PaymentId,
    amount: f64,
) -> Result<SnackOrder, FailureError> {
    let stamped = conn.update_snack_mappings(SnackMappingUpdater {
        mask: SnackMappingFilter {
            order_id: Some(order.order_id),
            week: Some(order.active_week),
            ..Default::default()
        },
        data: SnackMappingUpdateData {
            payment_id: Some(payment_id.clone()),
            paid_amount: Some(amount),
        },
    })?;
    info!(
        "Snack payment {} stamped on {} rows of week {} of order {}",
        payment_id,
        stamped.len(),
        order.active_week,
        order.order_id
    );

    Ok(SnackOrder {
        order_id: order.order_id,
        active_week: order.active_week,
        snacks: snack_lines(conn, order.order_id, order.active_week)?,
    })
}

impl SnackService for SnackServiceImpl {
    fn add_snacks(&self, payload: AddSnacksPayload) -> ServiceFuture<AddedSnacks> {
        debug!("Adding {} snacks to week {} of order {}", payload.snacks.len(), payload.week, payload.order_id);
        let ctx = self.ctx.clone();

        self.ctx.spawn(move || {
            let AddSnacksPayload { order_id, week, snacks } = payload;
            if snacks.is_empty() {
                return Err(format_err!("No snacks to add").context(Error::Validation).into());
            }
            if !is_valid_week(week) {
                return Err(format_err!("Week {} is out of range", week).context(Error::Validation).into());
            }
            let total_amount = snacks.iter().map(|s| s.price).sum::<f64>();

            let added = with_order_lock(&*ctx.db_pool, &ctx.locks, order_id, move |conn, _| {
                let mut inserted_snacks = vec![];
                for snack in &snacks {
                    let mapping = conn.insert_snack_mapping(SnackMappingInserter {
                        order_id,
                        week,
                        snacks_id: snack.snacks_id,
                        snacks_price: snack.price,
                        portion: snack.portion,
                        due_amount: total_amount,
                    })?;
                    conn.link_snack(OrderWeekSnack {
                        order_id,
                        week,
                        snacks_mapping_id: mapping.snacks_mapping_id,
                    })?;
                    inserted_snacks.push(snack.snacks_id);
                }

                Ok(AddedSnacks {
                    order_id,
                    week,
                    inserted_snacks,
                    total_amount,
                })
            })?;

            info!("Added {} snacks to week {} of order {}", added.inserted_snacks.len(), week, order_id);
            Ok(added)
        })
    }

    fn snack_order(&self, order_id: OrderId, week: Week) -> ServiceFuture<Vec<SnackOrderLine>> {
        debug!("Getting snacks of week {} of order {}", week, order_id);
        let db_pool = self.ctx.db_pool.clone();

        self.ctx
            .spawn(move || with_transaction(&*db_pool, |conn| snack_lines(conn, order_id, week)))
    }
}

pub fn notify_snack_order(notifier: &dyn Notifier, order: &SnackOrder) {
    match serde_json::to_value(order) {
        Ok(payload) => notify_quietly(notifier, Template::NewSnackOrder, "New Snack Order Received", &payload),
        Err(e) => error!("Failed to render snack order {}: {}", order.order_id, e),
    }
}
