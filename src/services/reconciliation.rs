//! Diffing of a submitted week against the mapping rows already stored for it.

use std::collections::HashSet;

use chrono::prelude::*;
use failure::{Error as FailureError, Fail};

use errors::*;
use models::*;
use repos::*;

#[derive(Clone, Debug, Default)]
pub struct WeekDiff {
    pub to_insert: Vec<PlanItem>,
    pub to_delete: Vec<MappingId>,
    pub to_update: Vec<(MappingId, PlanItem)>,
    /// Items of a paid week that match no stored row.
    pub skipped: Vec<PlanItem>,
}

impl WeekDiff {
    pub fn is_noop_for_rows(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DD HH:MM:SS` and bare `YYYY-MM-DD`.
pub fn normalize_date(raw: &str) -> Result<NaiveDate, FailureError> {
    let raw = raw.trim();
    if let Ok(v) = DateTime::parse_from_rfc3339(raw) {
        return Ok(v.naive_utc().date());
    }
    if let Ok(v) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(v.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| e.context(Error::Parse).into())
}

/// Splits a submitted week into its week-level details and its items.
pub fn normalize_week(plan: &WeekPlan) -> Result<(WeekDetails, Vec<PlanItem>), FailureError> {
    if !is_valid_week(plan.week) {
        return Err(format_err!("Week {} is out of range", plan.week)
            .context(Error::Validation)
            .into());
    }
    if plan.meals_per_week < 1 || plan.number_of_people < 1 {
        return Err(format_err!(
            "Week {} needs at least one meal and one person, got {} meals for {} people",
            plan.week,
            plan.meals_per_week,
            plan.number_of_people
        ).context(Error::Validation)
            .into());
    }
    let mut ids = HashSet::new();
    if let Some(id) = plan.items.iter().filter_map(|item| item.mapping_id).find(|id| !ids.insert(*id)) {
        return Err(format_err!("Mapping {} is submitted twice for week {}", id, plan.week)
            .context(Error::Validation)
            .into());
    }
    let delivery_date = normalize_date(&plan.delivery_date)?;

    Ok((
        WeekDetails {
            week: plan.week,
            delivery_date,
            number_of_people: plan.number_of_people,
            meals_per_week: plan.meals_per_week,
            paid: plan.payment_id.is_some(),
        },
        plan.items.clone(),
    ))
}

/// Classifies submitted items against stored rows of the same week.
///
/// Items without a known id, whether id-less or carrying an id the week does not have, adopt
/// the id of an unclaimed stored row with the same recipe and spice level, so submitting the
/// same week twice does not churn rows. Such an item replacing a dropped row of the same
/// recipe therefore becomes an update of that row. A locked week only accepts updates of
/// rows it already has.
pub fn diff_week(persisted: &[WeekMapping], submitted: &[PlanItem], locked: bool) -> WeekDiff {
    let known = persisted.iter().map(|m| m.mapping_id).collect::<HashSet<_>>();
    let mut claimed = submitted
        .iter()
        .filter_map(|item| item.mapping_id)
        .filter(|id| known.contains(id))
        .collect::<HashSet<_>>();

    let mut items = submitted.to_vec();
    for item in items.iter_mut().filter(|item| item.mapping_id.map_or(true, |id| !known.contains(&id))) {
        let twin = persisted.iter().find(|m| {
            !claimed.contains(&m.mapping_id) && m.recipe_id == item.recipe_id && m.spice_level_id == item.spice_level_id
        });
        if let Some(twin) = twin {
            item.mapping_id = Some(twin.mapping_id);
            claimed.insert(twin.mapping_id);
        }
    }

    let mut diff = WeekDiff::default();
    for item in items {
        match item.mapping_id {
            Some(id) if known.contains(&id) => diff.to_update.push((id, item)),
            _ if locked => diff.skipped.push(item),
            _ => diff.to_insert.push(item),
        }
    }
    if !locked {
        diff.to_delete = persisted
            .iter()
            .map(|m| m.mapping_id)
            .filter(|id| !claimed.contains(id))
            .collect();
    }

    diff
}

/// Applies a submitted week: inserts, then deletes, then updates.
pub fn reconcile_week(
    conn: &mut dyn RepoConnection,
    order_id: OrderId,
    details: &WeekDetails,
    items: &[PlanItem],
) -> Result<WeekDiff, FailureError> {
    let persisted = conn.select_mappings(WeekMappingFilter {
        order_id: Some(order_id),
        week: Some(details.week),
        ..Default::default()
    })?;

    let locked = details.paid || persisted.iter().any(WeekMapping::is_paid) || items.iter().any(|i| i.payment_id.is_some());
    if !locked && items.len() != details.meals_per_week as usize {
        return Err(format_err!(
            "Week {} of order {} has {} items, expected {}",
            details.week,
            order_id,
            items.len(),
            details.meals_per_week
        ).context(Error::Validation)
            .into());
    }

    let diff = diff_week(&persisted, items, locked);
    for item in &diff.skipped {
        warn!(
            "Skipping recipe {} submitted for paid week {} of order {}: no stored row matches",
            item.recipe_id, details.week, order_id
        );
    }

    let due_amount = persisted.first().map(|m| m.due_amount).unwrap_or(0.0);
    for item in &diff.to_insert {
        let inserted = conn.insert_mapping(WeekMappingInserter {
            order_id,
            week: details.week,
            recipe_id: item.recipe_id,
            recipe_price: item.recipe_price,
            spice_level_id: item.spice_level_id,
            delivery_date: details.delivery_date,
            number_of_people: details.number_of_people,
            meals_per_week: details.meals_per_week,
            due_amount,
        })?;
        debug!("Inserted mapping {} into week {} of order {}", inserted.mapping_id, details.week, order_id);
    }

    for mapping_id in &diff.to_delete {
        conn.delete_mappings(WeekMappingFilter {
            mapping_id: Some(*mapping_id),
            order_id: Some(order_id),
            ..Default::default()
        })?;
        debug!("Deleted mapping {} from week {} of order {}", mapping_id, details.week, order_id);
    }

    for (mapping_id, item) in &diff.to_update {
        conn.update_mappings(WeekMappingUpdater {
            mask: WeekMappingFilter {
                mapping_id: Some(*mapping_id),
                order_id: Some(order_id),
                ..Default::default()
            },
            data: WeekMappingUpdateData {
                recipe_id: Some(item.recipe_id),
                recipe_price: Some(item.recipe_price),
                spice_level_id: Some(item.spice_level_id),
                delivery_date: Some(details.delivery_date),
                number_of_people: Some(details.number_of_people),
                meals_per_week: Some(details.meals_per_week),
                ..Default::default()
            },
        })?;
    }

    info!(
        "Reconciled week {} of order {}: {} inserted, {} deleted, {} updated",
        details.week,
        order_id,
        diff.to_insert.len(),
        diff.to_delete.len(),
        diff.to_update.len()
    );

    Ok(diff)
}
