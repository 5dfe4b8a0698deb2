use postgres::Row;

use super::common::*;
use errors::*;
use repos::types::*;
use util::*;

const SNACKS_MAPPING_ID_COLUMN: &str = "snacks_mapping_id";
const ORDER_ID_COLUMN: &str = "order_id";
const WEEK_COLUMN: &str = "week";
const SNACKS_ID_COLUMN: &str = "snacks_id";
const SNACKS_PRICE_COLUMN: &str = "snacks_price";
const PORTION_COLUMN: &str = "portion";
const DUE_AMOUNT_COLUMN: &str = "due_amount";
const PAYMENT_ID_COLUMN: &str = "payment_id";
const PAID_AMOUNT_COLUMN: &str = "paid_amount";

/// A snack bought on top of the recipes of one week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnackMapping {
    pub snacks_mapping_id: SnackMappingId,
    pub order_id: OrderId,
    pub week: Week,
    pub snacks_id: SnackId,
    pub snacks_price: f64,
    pub portion: i32,
    pub due_amount: f64,
    pub payment_id: Option<PaymentId>,
    pub paid_amount: Option<f64>,
}

impl FromRow for SnackMapping {
    fn from_row(row: &Row) -> RepoResult<Self> {
        Ok(Self {
            snacks_mapping_id: SnackMappingId(row.try_get(SNACKS_MAPPING_ID_COLUMN)?),
            order_id: OrderId(row.try_get(ORDER_ID_COLUMN)?),
            week: row.try_get(WEEK_COLUMN)?,
            snacks_id: SnackId(row.try_get(SNACKS_ID_COLUMN)?),
            snacks_price: row.try_get(SNACKS_PRICE_COLUMN)?,
            portion: row.try_get(PORTION_COLUMN)?,
            due_amount: row.try_get(DUE_AMOUNT_COLUMN)?,
            payment_id: row.try_get::<_, Option<String>>(PAYMENT_ID_COLUMN)?.map(PaymentId),
            paid_amount: row.try_get(PAID_AMOUNT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnackMappingInserter {
    pub order_id: OrderId,
    pub week: Week,
    pub snacks_id: SnackId,
    pub snacks_price: f64,
    pub portion: i32,
    pub due_amount: f64,
}

impl SnackMappingInserter {
    pub fn into_mapping(self, snacks_mapping_id: SnackMappingId) -> SnackMapping {
        SnackMapping {
            snacks_mapping_id,
            order_id: self.order_id,
            week: self.week,
            snacks_id: self.snacks_id,
            snacks_price: self.snacks_price,
            portion: self.portion,
            due_amount: self.due_amount,
            payment_id: None,
            paid_amount: None,
        }
    }
}

impl Inserter for SnackMappingInserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(ORDER_ID_COLUMN, self.order_id.0)
            .with_arg(WEEK_COLUMN, self.week)
            .with_arg(SNACKS_ID_COLUMN, self.snacks_id.0)
            .with_arg(SNACKS_PRICE_COLUMN, self.snacks_price)
            .with_arg(PORTION_COLUMN, self.portion)
            .with_arg(DUE_AMOUNT_COLUMN, self.due_amount)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SnackMappingFilter {
    pub snacks_mapping_ids: Option<Vec<SnackMappingId>>,
    pub order_id: Option<OrderId>,
    pub week: Option<Week>,
}

impl SnackMappingFilter {
    pub fn matches(&self, mapping: &SnackMapping) -> bool {
        self.snacks_mapping_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&mapping.snacks_mapping_id))
            && self.order_id.map_or(true, |v| v == mapping.order_id)
            && self.week.map_or(true, |v| v == mapping.week)
    }
}

impl From<OrderId> for SnackMappingFilter {
    fn from(v: OrderId) -> Self {
        Self {
            order_id: Some(v),
            ..Default::default()
        }
    }
}

impl Filter for SnackMappingFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.snacks_mapping_ids {
            b = b.with_any(SNACKS_MAPPING_ID_COLUMN, v.into_iter().map(|id| id.0).collect::<Vec<i32>>());
        }

        if let Some(v) = self.order_id {
            b = b.with_filter(ORDER_ID_COLUMN, v.0);
        }

        if let Some(v) = self.week {
            b = b.with_filter(WEEK_COLUMN, v);
        }

        b.with_extra(format!("ORDER BY {}", SNACKS_MAPPING_ID_COLUMN))
    }
}

#[derive(Clone, Debug, Default)]
pub struct SnackMappingUpdateData {
    pub payment_id: Option<PaymentId>,
    pub paid_amount: Option<f64>,
}

impl SnackMappingUpdateData {
    pub fn apply(&self, mapping: &mut SnackMapping) {
        if let Some(ref v) = self.payment_id {
            mapping.payment_id = Some(v.clone());
        }
        if let Some(v) = self.paid_amount {
            mapping.paid_amount = Some(v);
        }
    }
}

#[derive(Clone, Debug)]
pub struct SnackMappingUpdater {
    pub mask: SnackMappingFilter,
    pub data: SnackMappingUpdateData,
}

impl Updater for SnackMappingUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let SnackMappingUpdater { mask, data } = self;

        let mut b = UpdateBuilder::from(mask.into_filtered_operation_builder(table));

        if let Some(v) = data.payment_id {
            b = b.with_value(PAYMENT_ID_COLUMN, v.0);
        }
        if let Some(v) = data.paid_amount {
            b = b.with_value(PAID_AMOUNT_COLUMN, v);
        }

        b
    }
}

/// Links a snack mapping to the order week it was bought for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderWeekSnack {
    pub order_id: OrderId,
    pub week: Week,
    pub snacks_mapping_id: SnackMappingId,
}

impl FromRow for OrderWeekSnack {
    fn from_row(row: &Row) -> RepoResult<Self> {
        Ok(Self {
            order_id: OrderId(row.try_get(ORDER_ID_COLUMN)?),
            week: row.try_get(WEEK_COLUMN)?,
            snacks_mapping_id: SnackMappingId(row.try_get(SNACKS_MAPPING_ID_COLUMN)?),
        })
    }
}

impl Inserter for OrderWeekSnack {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(ORDER_ID_COLUMN, self.order_id.0)
            .with_arg(WEEK_COLUMN, self.week)
            .with_arg(SNACKS_MAPPING_ID_COLUMN, self.snacks_mapping_id.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderWeekSnackFilter {
    pub order_id: Option<OrderId>,
    pub week: Option<Week>,
}

impl OrderWeekSnackFilter {
    pub fn matches(&self, link: &OrderWeekSnack) -> bool {
        self.order_id.map_or(true, |v| v == link.order_id) && self.week.map_or(true, |v| v == link.week)
    }
}

impl Filter for OrderWeekSnackFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.order_id {
            b = b.with_filter(ORDER_ID_COLUMN, v.0);
        }

        if let Some(v) = self.week {
            b = b.with_filter(WEEK_COLUMN, v);
        }

        b.with_extra(format!("ORDER BY {}", SNACKS_MAPPING_ID_COLUMN))
    }
}
