//! Stamping of confirmed subscription payments onto order weeks.

use chrono::prelude::*;
use failure::Error as FailureError;

use models::*;
use repos::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Applied { week: Week, rows: usize },
    /// The payment was stamped by an earlier delivery of the same event.
    AlreadyApplied { week: Week },
    NoUnpaidWeek,
}

impl PaymentOutcome {
    pub fn active_week(&self) -> Option<Week> {
        match *self {
            PaymentOutcome::Applied { week, .. } | PaymentOutcome::AlreadyApplied { week } => Some(week),
            PaymentOutcome::NoUnpaidWeek => None,
        }
    }
}

/// Marks the earliest unpaid week of a locked order as paid by `payment_id`.
pub fn apply_payment(
    conn: &mut dyn RepoConnection,
    order: &Order,
    subscription_id: Option<&SubscriptionId>,
    payment_id: &PaymentId,
    payment_date: NaiveDateTime,
    price: f64,
) -> Result<PaymentOutcome, FailureError> {
    let order_id = order.order_id;

    if let Some(subscription_id) = subscription_id {
        let updated = conn.update_orders(OrderUpdater {
            mask: OrderFilter {
                order_id: Some(order_id),
                without_subscription: true,
                ..Default::default()
            },
            data: OrderUpdateData {
                subscription_id: Some(subscription_id.clone()),
                ..Default::default()
            },
        })?;
        if !updated.is_empty() {
            info!("Attached subscription {} to order {}", subscription_id, order_id);
        }
    }

    // A payment is stamped once across all orders.
    let seen = conn.select_mappings(WeekMappingFilter {
        payment_id: Some(payment_id.clone()),
        ..Default::default()
    })?;
    if let Some(row) = seen.first() {
        info!("Payment {} already applied to week {} of order {}", payment_id, row.week, row.order_id);
        return Ok(PaymentOutcome::AlreadyApplied { week: row.week });
    }

    let unpaid = conn.select_mappings(WeekMappingFilter {
        order_id: Some(order_id),
        unpaid: true,
        ..Default::default()
    })?;
    let week = match unpaid.iter().map(|m| m.week).min() {
        Some(week) => week,
        None => {
            warn!("Order {} has no unpaid week left, payment {} not applied", order_id, payment_id);
            return Ok(PaymentOutcome::NoUnpaidWeek);
        }
    };

    let stamped = conn.update_mappings(WeekMappingUpdater {
        mask: WeekMappingFilter {
            order_id: Some(order_id),
            week: Some(week),
            ..Default::default()
        },
        data: WeekMappingUpdateData {
            payment_id: Some(payment_id.clone()),
            payment_date: Some(payment_date),
            paid_amount: Some(price),
            ..Default::default()
        },
    })?;

    conn.update_orders(OrderUpdater {
        mask: OrderFilter::from(order_id),
        data: OrderUpdateData {
            active_week: Some(week),
            ..Default::default()
        },
    })?;
    info!(
        "Payment {} stamped on {} rows of week {} of order {}",
        payment_id,
        stamped.len(),
        week,
        order_id
    );

    Ok(PaymentOutcome::Applied {
        week,
        rows: stamped.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use errors::RepoResult;

    fn seeded() -> (MemoryPool, Order) {
        let pool = MemoryPool::new();
        pool.add_customer(1, "jane@example.com", "Jane", "Doe");
        let order = with_transaction(&pool, |conn| -> RepoResult<Order> {
            let order = conn.insert_order(OrderInserter {
                customer_id: CustomerId(1),
                order_type: OrderType::Subscription,
                active_week: 1,
                amount_paid: 60.0,
                selected_recipes: vec![CategoryId(1)],
                initial_payment_id: None,
                created_at: Utc::now(),
            })?;
            for week in 1..=WEEKS_PER_ORDER {
                for recipe in 1..=2 {
                    conn.insert_mapping(WeekMappingInserter {
                        order_id: order.order_id,
                        week,
                        recipe_id: RecipeId(recipe),
                        recipe_price: 15.0,
                        spice_level_id: DEFAULT_SPICE_LEVEL,
                        delivery_date: NaiveDate::from_ymd(2024, 3, 4),
                        number_of_people: 2,
                        meals_per_week: 2,
                        due_amount: 60.0,
                    })?;
                }
            }
            for (week, payment) in &[(1, "pay_w1"), (2, "pay_w2")] {
                conn.update_mappings(WeekMappingUpdater {
                    mask: WeekMappingFilter {
                        order_id: Some(order.order_id),
                        week: Some(*week),
                        ..Default::default()
                    },
                    data: WeekMappingUpdateData {
                        payment_id: Some(PaymentId(payment.to_string())),
                        ..Default::default()
                    },
                })?;
            }
            Ok(order)
        }).unwrap();
        (pool, order)
    }

    fn pay(pool: &MemoryPool, order: &Order, payment: &str) -> PaymentOutcome {
        with_transaction(pool, |conn| {
            apply_payment(
                conn,
                order,
                Some(&SubscriptionId("sub_1".into())),
                &PaymentId(payment.into()),
                NaiveDate::from_ymd(2024, 3, 17).and_hms(9, 0, 0),
                60.0,
            )
        }).unwrap()
    }

    #[test]
    fn earliest_unpaid_week_is_stamped() {
        let (pool, order) = seeded();

        assert_eq!(pay(&pool, &order, "pay_1"), PaymentOutcome::Applied { week: 3, rows: 2 });

        let data = pool.snapshot();
        assert_eq!(data.orders[0].active_week, 3);
        assert_eq!(data.orders[0].subscription_id, Some(SubscriptionId("sub_1".into())));
        let week3 = data.mappings.iter().filter(|m| m.week == 3).collect::<Vec<_>>();
        assert!(week3.iter().all(|m| m.payment_id == Some(PaymentId("pay_1".into())) && m.paid_amount == Some(60.0)));
        assert!(data.mappings.iter().filter(|m| m.week == 4).all(|m| !m.is_paid()));
    }

    #[test]
    fn replayed_payment_is_not_stamped_twice() {
        let (pool, order) = seeded();

        pay(&pool, &order, "pay_1");
        let before = pool.snapshot();
        assert_eq!(pay(&pool, &order, "pay_1"), PaymentOutcome::AlreadyApplied { week: 3 });

        assert_eq!(pool.snapshot().mappings, before.mappings);
    }

    #[test]
    fn fully_paid_order_reports_no_unpaid_week() {
        let (pool, order) = seeded();

        pay(&pool, &order, "pay_3");
        pay(&pool, &order, "pay_4");
        let outcome = pay(&pool, &order, "pay_5");

        assert_eq!(outcome, PaymentOutcome::NoUnpaidWeek);
        assert_eq!(outcome.active_week(), None);
        assert_eq!(pool.snapshot().orders[0].active_week, 4);
    }

    #[test]
    fn first_subscription_id_wins() {
        let (pool, order) = seeded();

        pay(&pool, &order, "pay_1");
        with_transaction(&pool, |conn| {
            apply_payment(
                conn,
                &order,
                Some(&SubscriptionId("sub_2".into())),
                &PaymentId("pay_2".into()),
                NaiveDate::from_ymd(2024, 3, 24).and_hms(9, 0, 0),
                60.0,
            )
        }).unwrap();

        assert_eq!(pool.snapshot().orders[0].subscription_id, Some(SubscriptionId("sub_1".into())));
    }
}
