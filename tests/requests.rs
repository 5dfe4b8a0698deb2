extern crate chrono;
extern crate failure;
extern crate futures;
extern crate futures_cpupool;
#[macro_use]
extern crate maplit;
extern crate mealkit_orders_lib as lib;
extern crate rand;
#[macro_use]
extern crate serde_json;

pub mod common;

use std::collections::HashSet;

use chrono::prelude::*;
use futures::prelude::*;

use lib::errors::*;
use lib::models::*;
use lib::repos::*;
use lib::services::payment_state::PaymentOutcome;
use lib::services::*;

fn week_plan(week: Week, items: Vec<PlanItem>) -> WeekPlan {
    WeekPlan {
        week,
        payment_id: None,
        delivery_date: "2024-03-11T00:00:00.000Z".to_string(),
        number_of_people: 2,
        meals_per_week: 3,
        items,
    }
}

fn plan_item(mapping_id: Option<MappingId>, recipe_id: i32) -> PlanItem {
    PlanItem {
        mapping_id,
        recipe_id: RecipeId(recipe_id),
        recipe_price: 12.0,
        spice_level_id: SpiceLevelId(3),
        payment_id: None,
    }
}

#[test]
fn placed_order_fills_every_week() {
    let ctx = common::setup();

    let order_id = ctx.place_order(1);

    let data = ctx.pool.snapshot();
    assert_eq!(data.orders.len(), 1);
    assert_eq!(data.orders[0].active_week, 1);
    assert_eq!(data.orders[0].selected_recipes, vec![CategoryId(1), CategoryId(2)]);
    assert_eq!(data.mappings.len(), 12);
    for week in 1..=WEEKS_PER_ORDER {
        let rows = common::week_rows(&ctx.pool, order_id, week);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|m| m.spice_level_id == DEFAULT_SPICE_LEVEL && !m.is_paid()));
    }
    let week3 = common::week_rows(&ctx.pool, order_id, 3);
    assert_eq!(week3[0].delivery_date, NaiveDate::from_ymd(2024, 3, 18));
}

#[test]
fn failed_allocation_leaves_no_order() {
    let ctx = common::setup();
    let mut payload = common::place_order_payload(1);
    // Desserts has no recipes.
    payload.selected_recipes = vec![CategoryId(3)];

    let e = ctx.orders().place_order(payload).wait().unwrap_err();

    assert_eq!(error_kind(&e), Some(Error::InsufficientInventory));
    let data = ctx.pool.snapshot();
    assert!(data.orders.is_empty());
    assert!(data.mappings.is_empty());
}

#[test]
fn unknown_customer_cannot_place_order() {
    let ctx = common::setup();

    let e = ctx.orders().place_order(common::place_order_payload(99)).wait().unwrap_err();

    assert_eq!(error_kind(&e), Some(Error::NotFound));
    assert!(ctx.pool.snapshot().orders.is_empty());
}

#[test]
fn update_inserts_deletes_and_updates() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    let stored = common::week_rows(&ctx.pool, order_id, 2);
    let kept = hashset!{stored[0].mapping_id, stored[1].mapping_id};

    let updated = ctx
        .orders()
        .update_order(UpdateOrderPayload {
            order_id,
            order_details: vec![week_plan(
                2,
                vec![
                    plan_item(Some(stored[0].mapping_id), 4),
                    plan_item(Some(stored[1].mapping_id), 5),
                    plan_item(Some(MappingId(9999)), 1),
                ],
            )],
        })
        .wait()
        .unwrap();

    let rows = common::week_rows(&ctx.pool, order_id, 2);
    assert_eq!(rows.len(), 3);
    let ids = rows.iter().map(|m| m.mapping_id).collect::<HashSet<_>>();
    assert!(kept.is_subset(&ids));
    assert!(!ids.contains(&stored[2].mapping_id));
    assert!(!ids.contains(&MappingId(9999)));
    assert!(rows.iter().all(|m| m.spice_level_id == SpiceLevelId(3)));
    assert!(rows.iter().all(|m| m.delivery_date == NaiveDate::from_ymd(2024, 3, 11)));

    let week2 = updated.details.order_details.iter().find(|w| w.week == 2).unwrap();
    assert_eq!(week2.items.len(), 3);
    assert!(week2.items.iter().any(|i| i.recipe_name == Some("Salmon Teriyaki".to_string())));
    assert!(!updated.plan_changed);
    assert_eq!(ctx.notifier.templates(), vec![lib::clients::Template::OrderUpdated]);
}

#[test]
fn replayed_update_does_not_churn_rows() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    let stored = common::week_rows(&ctx.pool, order_id, 2);
    let payload = UpdateOrderPayload {
        order_id,
        order_details: vec![week_plan(
            2,
            vec![
                plan_item(Some(stored[0].mapping_id), 4),
                plan_item(None, 5),
                plan_item(Some(MappingId(9999)), 1),
            ],
        )],
    };

    ctx.orders().update_order(payload.clone()).wait().unwrap();
    let first = common::week_rows(&ctx.pool, order_id, 2);
    ctx.orders().update_order(payload).wait().unwrap();
    let second = common::week_rows(&ctx.pool, order_id, 2);

    assert_eq!(
        first.iter().map(|m| m.mapping_id).collect::<HashSet<_>>(),
        second.iter().map(|m| m.mapping_id).collect::<HashSet<_>>()
    );
    assert_eq!(first, second);
}

#[test]
fn item_count_must_match_meals_per_week() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    let before = ctx.pool.snapshot();

    let e = ctx
        .orders()
        .update_order(UpdateOrderPayload {
            order_id,
            order_details: vec![week_plan(2, vec![plan_item(None, 1)])],
        })
        .wait()
        .unwrap_err();

    assert_eq!(error_kind(&e), Some(Error::Validation));
    assert_eq!(ctx.pool.snapshot().mappings, before.mappings);
}

#[test]
fn repeated_mapping_id_is_rejected() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    let stored = common::week_rows(&ctx.pool, order_id, 2);
    let before = ctx.pool.snapshot();

    let e = ctx
        .orders()
        .update_order(UpdateOrderPayload {
            order_id,
            order_details: vec![week_plan(
                2,
                vec![
                    plan_item(Some(stored[0].mapping_id), 4),
                    plan_item(Some(stored[0].mapping_id), 4),
                    plan_item(Some(stored[1].mapping_id), 5),
                ],
            )],
        })
        .wait()
        .unwrap_err();

    assert_eq!(error_kind(&e), Some(Error::Validation));
    assert_eq!(ctx.pool.snapshot().mappings, before.mappings);
    assert_eq!(common::week_rows(&ctx.pool, order_id, 2).len(), 3);
}

#[test]
fn week_without_meals_is_rejected() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    let before = ctx.pool.snapshot();
    let mut plan = week_plan(2, vec![]);
    plan.meals_per_week = 0;

    let e = ctx
        .orders()
        .update_order(UpdateOrderPayload {
            order_id,
            order_details: vec![plan],
        })
        .wait()
        .unwrap_err();

    assert_eq!(error_kind(&e), Some(Error::Validation));
    assert_eq!(ctx.pool.snapshot().mappings, before.mappings);
}

#[test]
fn moved_delivery_date_reaches_every_row_of_the_week() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    let stored = common::week_rows(&ctx.pool, order_id, 2);
    let mut plan = week_plan(
        2,
        vec![
            plan_item(Some(stored[0].mapping_id), 4),
            plan_item(Some(stored[1].mapping_id), 5),
            plan_item(None, 1),
        ],
    );
    plan.delivery_date = "2024-03-13".to_string();

    ctx.orders()
        .update_order(UpdateOrderPayload {
            order_id,
            order_details: vec![plan],
        })
        .wait()
        .unwrap();

    let rows = common::week_rows(&ctx.pool, order_id, 2);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|m| m.delivery_date == NaiveDate::from_ymd(2024, 3, 13)));
}

#[test]
fn paid_week_keeps_its_rows() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    common::mark_paid(&ctx.pool, order_id, 1, "pi_week1");
    let stored = common::week_rows(&ctx.pool, order_id, 1);
    let mut plan = week_plan(1, vec![plan_item(Some(stored[0].mapping_id), 4), plan_item(None, 5)]);
    plan.payment_id = Some(PaymentId("pi_week1".into()));

    ctx.orders()
        .update_order(UpdateOrderPayload {
            order_id,
            order_details: vec![plan],
        })
        .wait()
        .unwrap();

    let rows = common::week_rows(&ctx.pool, order_id, 1);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].recipe_id, RecipeId(4));
    assert!(rows.iter().all(|m| m.payment_id == Some(PaymentId("pi_week1".into()))));
}

#[test]
fn locked_order_is_a_concurrent_modification() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    ctx.pool.hold_row_lock(order_id);

    let e = ctx.orders().delete_order(order_id).wait().unwrap_err();

    assert_eq!(error_kind(&e), Some(Error::ConcurrentModification));
    assert_eq!(ctx.pool.snapshot().orders.len(), 1);

    ctx.pool.release_row_lock(order_id);
    ctx.orders().delete_order(order_id).wait().unwrap();
}

#[test]
fn payment_stamps_first_unpaid_week() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    common::mark_paid(&ctx.pool, order_id, 1, "pi_week1");
    common::mark_paid(&ctx.pool, order_id, 2, "pi_week2");
    let paid_at = NaiveDate::from_ymd(2024, 3, 17).and_hms(10, 0, 0);

    let outcome = ctx
        .payments()
        .apply_payment(order_id, Some(SubscriptionId("sub_1".into())), PaymentId("pay_1".into()), paid_at)
        .wait()
        .unwrap();

    assert_eq!(outcome, PaymentOutcome::Applied { week: 3, rows: 3 });
    assert_eq!(outcome.active_week(), Some(3));
    let order = ctx.pool.snapshot().orders[0].clone();
    assert_eq!(order.active_week, 3);
    assert_eq!(order.subscription_id, Some(SubscriptionId("sub_1".into())));
    let week3 = common::week_rows(&ctx.pool, order_id, 3);
    assert!(week3
        .iter()
        .all(|m| m.payment_id == Some(PaymentId("pay_1".into())) && m.payment_date == Some(paid_at) && m.paid_amount == Some(60.0)));
    assert!(common::week_rows(&ctx.pool, order_id, 4).iter().all(|m| !m.is_paid()));
    assert_eq!(*ctx.gateway.keys.lock().unwrap(), vec!["pay_1"]);
}

#[test]
fn replayed_payment_returns_same_week() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    let paid_at = NaiveDate::from_ymd(2024, 3, 17).and_hms(10, 0, 0);
    let pay = || {
        ctx.payments()
            .apply_payment(order_id, None, PaymentId("pay_1".into()), paid_at)
            .wait()
            .unwrap()
    };

    assert_eq!(pay(), PaymentOutcome::Applied { week: 1, rows: 3 });
    let before = ctx.pool.snapshot();
    assert_eq!(pay(), PaymentOutcome::AlreadyApplied { week: 1 });

    assert_eq!(ctx.pool.snapshot().mappings, before.mappings);
}

#[test]
fn payment_is_not_stamped_on_a_second_order() {
    let ctx = common::setup();
    let first = ctx.place_order(1);
    let second = ctx.place_order(1);
    let paid_at = NaiveDate::from_ymd(2024, 3, 17).and_hms(10, 0, 0);
    let pay = |order_id| {
        ctx.payments()
            .apply_payment(order_id, None, PaymentId("pi_1".into()), paid_at)
            .wait()
            .unwrap()
    };

    assert_eq!(pay(first), PaymentOutcome::Applied { week: 1, rows: 3 });
    assert_eq!(pay(second), PaymentOutcome::AlreadyApplied { week: 1 });

    let stamped = ctx.pool
        .snapshot()
        .mappings
        .into_iter()
        .filter(|m| m.payment_id == Some(PaymentId("pi_1".into())))
        .collect::<Vec<_>>();
    assert_eq!(stamped.len(), 3);
    assert!(stamped.iter().all(|m| m.order_id == first));
    let second_order = ctx.pool.snapshot().orders.into_iter().find(|o| o.order_id == second).unwrap();
    assert_eq!(second_order.active_week, 1);
}

#[test]
fn snacks_are_linked_to_their_week() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);

    let added = ctx
        .snacks()
        .add_snacks(AddSnacksPayload {
            order_id,
            week: 2,
            snacks: vec![
                SnackLine {
                    snacks_id: SnackId(1),
                    portion: 2,
                    price: 9.0,
                },
                SnackLine {
                    snacks_id: SnackId(2),
                    portion: 1,
                    price: 3.0,
                },
            ],
        })
        .wait()
        .unwrap();

    assert_eq!(added.inserted_snacks, vec![SnackId(1), SnackId(2)]);
    assert_eq!(added.total_amount, 12.0);
    let data = ctx.pool.snapshot();
    assert_eq!(data.snack_mappings.len(), 2);
    assert!(data.snack_mappings.iter().all(|s| s.due_amount == 12.0 && s.week == 2));
    assert_eq!(
        data.snack_links.iter().map(|l| l.snacks_mapping_id).collect::<HashSet<_>>(),
        data.snack_mappings.iter().map(|s| s.snacks_mapping_id).collect::<HashSet<_>>()
    );

    let lines = ctx.snacks().snack_order(order_id, 2).wait().unwrap();
    assert_eq!(lines.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(), vec!["Trail Mix", "Brownie"]);

    let details = ctx.orders().fetch_order(CustomerId(1)).wait().unwrap();
    let week2 = details.order_details.iter().find(|w| w.week == 2).unwrap();
    assert_eq!(week2.snack_mapping_ids.len(), 2);
}

#[test]
fn empty_snack_list_is_rejected() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);

    let e = ctx
        .snacks()
        .add_snacks(AddSnacksPayload {
            order_id,
            week: 1,
            snacks: vec![],
        })
        .wait()
        .unwrap_err();

    assert_eq!(error_kind(&e), Some(Error::Validation));
}

#[test]
fn delete_order_removes_dependent_rows() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    let other = ctx.place_order(2);
    ctx.snacks()
        .add_snacks(AddSnacksPayload {
            order_id,
            week: 1,
            snacks: vec![SnackLine {
                snacks_id: SnackId(1),
                portion: 1,
                price: 4.5,
            }],
        })
        .wait()
        .unwrap();

    let deleted = ctx.orders().delete_order(order_id).wait().unwrap();

    assert_eq!(deleted.deleted_orders, 1);
    let data = ctx.pool.snapshot();
    assert_eq!(data.orders.iter().map(|o| o.order_id).collect::<Vec<_>>(), vec![other]);
    assert!(data.mappings.iter().all(|m| m.order_id == other));
    assert!(data.snack_mappings.is_empty());
    assert!(data.snack_links.is_empty());

    let e = ctx.orders().delete_order(order_id).wait().unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::NotFound));
}

#[test]
fn queries_resolve_latest_and_earliest_orders() {
    let ctx = common::setup();
    let first = ctx.place_order(1);
    let latest = ctx.place_order(1);

    let fetched = ctx.orders().fetch_order(CustomerId(1)).wait().unwrap();
    assert_eq!(fetched.order.order_id, latest);
    assert_eq!(fetched.customer_email, common::JANE);
    assert_eq!(fetched.order_details.len(), 4);

    let active = ctx.orders().active_order(CustomerId(1)).wait().unwrap();
    assert_eq!(active.order.order_id, first);
    assert_eq!(active.active_week_order_details.week, 1);
    assert_eq!(active.active_week_order_details.items.len(), 3);

    let setting = ctx.orders().plan_setting(CustomerId(1)).wait().unwrap();
    assert_eq!(setting.order_id, latest);
    assert_eq!(setting.selected_recipes, "Vegetarian, Seafood");
    assert_eq!(setting.meals_per_week, 3);
    assert_eq!(setting.delivery_date, common::start_date());

    let flat = ctx.orders().order_details_by_customer(CustomerId(1)).wait().unwrap();
    assert_eq!(flat.order_id, first);
    assert_eq!(flat.customer_name, "Jane Doe");
    assert_eq!(flat.order_details.len(), 12);

    let e = ctx.orders().fetch_order(CustomerId(2)).wait().unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::NotFound));
}

#[test]
fn selected_recipes_fill_empty_weeks_only() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    with_transaction(&ctx.pool, |conn| {
        conn.delete_mappings(WeekMappingFilter {
            order_id: Some(order_id),
            week: Some(4),
            ..Default::default()
        })
    }).unwrap();
    let selected = |week: Week| -> Vec<SelectedRecipe> {
        (1..=3)
            .map(|recipe| {
                serde_json::from_value(json!({
                    "week": week,
                    "recipe_id": recipe,
                    "recipe_price": 11.0,
                    "delivery_date": "2024-03-25",
                    "number_of_people": 2,
                    "meals_per_week": 3
                })).unwrap()
            })
            .collect()
    };

    let added = ctx
        .orders()
        .add_selected_recipes(AddSelectedRecipesPayload {
            order_id,
            mappings: selected(4),
        })
        .wait()
        .unwrap();
    assert_eq!(added.inserted.len(), 3);
    assert_eq!(common::week_rows(&ctx.pool, order_id, 4).len(), 3);

    let e = ctx
        .orders()
        .add_selected_recipes(AddSelectedRecipesPayload {
            order_id,
            mappings: selected(1),
        })
        .wait()
        .unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::Validation));
    assert_eq!(common::week_rows(&ctx.pool, order_id, 1).len(), 3);
}

#[test]
fn subscription_lifecycle_updates_status() {
    let ctx = common::setup();
    let order_id = ctx.place_order(1);
    ctx.payments()
        .apply_payment(
            order_id,
            Some(SubscriptionId("sub_1".into())),
            PaymentId("pay_1".into()),
            NaiveDate::from_ymd(2024, 3, 4).and_hms(8, 0, 0),
        )
        .wait()
        .unwrap();

    let paused = ctx.payments().pause_subscription(SubscriptionId("sub_1".into())).wait().unwrap();
    assert_eq!(paused.status, SubscriptionStatus::Paused);
    assert_eq!(paused.orders_updated, 1);

    let resumed = ctx.payments().resume_subscription(SubscriptionId("sub_1".into())).wait().unwrap();
    assert_eq!(resumed.status, SubscriptionStatus::Active);

    let cancelled = ctx.payments().cancel_subscription(SubscriptionId("sub_1".into())).wait().unwrap();
    assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
    assert_eq!(ctx.pool.snapshot().orders[0].subscription_status, Some(SubscriptionStatus::Cancelled));

    let keys = ctx.gateway.keys.lock().unwrap().clone();
    assert!(keys[1].starts_with("pause-sub_1-"));
    assert!(keys[3].starts_with("cancel-sub_1-"));
    assert_eq!(
        ctx.notifier
            .templates()
            .into_iter()
            .filter(|t| *t == lib::clients::Template::SubscriptionChanged)
            .count(),
        3
    );
}
