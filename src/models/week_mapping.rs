use chrono::prelude::*;
use postgres::Row;

use super::common::*;
use errors::*;
use repos::types::*;
use util::*;

const MAPPING_ID_COLUMN: &str = "mapping_id";
const ORDER_ID_COLUMN: &str = "order_id";
const WEEK_COLUMN: &str = "week";
const RECIPE_ID_COLUMN: &str = "recipe_id";
const RECIPE_PRICE_COLUMN: &str = "recipe_price";
const SPICE_LEVEL_ID_COLUMN: &str = "spice_level_id";
const DELIVERY_DATE_COLUMN: &str = "delivery_date";
const NUMBER_OF_PEOPLE_COLUMN: &str = "number_of_people";
const MEALS_PER_WEEK_COLUMN: &str = "meals_per_week";
const PAYMENT_ID_COLUMN: &str = "payment_id";
const PAYMENT_DATE_COLUMN: &str = "payment_date";
const PAID_AMOUNT_COLUMN: &str = "paid_amount";
const DUE_AMOUNT_COLUMN: &str = "due_amount";

/// One recipe slot of one week of an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeekMapping {
    pub mapping_id: MappingId,
    pub order_id: OrderId,
    pub week: Week,
    pub recipe_id: RecipeId,
    pub recipe_price: f64,
    pub spice_level_id: SpiceLevelId,
    pub delivery_date: NaiveDate,
    pub number_of_people: i32,
    pub meals_per_week: i32,
    pub payment_id: Option<PaymentId>,
    pub payment_date: Option<NaiveDateTime>,
    pub paid_amount: Option<f64>,
    pub due_amount: f64,
}

impl WeekMapping {
    pub fn is_paid(&self) -> bool {
        self.payment_id.is_some()
    }
}

impl FromRow for WeekMapping {
    fn from_row(row: &Row) -> RepoResult<Self> {
        Ok(Self {
            mapping_id: MappingId(row.try_get(MAPPING_ID_COLUMN)?),
            order_id: OrderId(row.try_get(ORDER_ID_COLUMN)?),
            week: row.try_get(WEEK_COLUMN)?,
            recipe_id: RecipeId(row.try_get(RECIPE_ID_COLUMN)?),
            recipe_price: row.try_get(RECIPE_PRICE_COLUMN)?,
            spice_level_id: SpiceLevelId(row.try_get(SPICE_LEVEL_ID_COLUMN)?),
            delivery_date: row.try_get(DELIVERY_DATE_COLUMN)?,
            number_of_people: row.try_get(NUMBER_OF_PEOPLE_COLUMN)?,
            meals_per_week: row.try_get(MEALS_PER_WEEK_COLUMN)?,
            payment_id: row.try_get::<_, Option<String>>(PAYMENT_ID_COLUMN)?.map(PaymentId),
            payment_date: row.try_get(PAYMENT_DATE_COLUMN)?,
            paid_amount: row.try_get(PAID_AMOUNT_COLUMN)?,
            due_amount: row.try_get(DUE_AMOUNT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeekMappingInserter {
    pub order_id: OrderId,
    pub week: Week,
    pub recipe_id: RecipeId,
    pub recipe_price: f64,
    pub spice_level_id: SpiceLevelId,
    pub delivery_date: NaiveDate,
    pub number_of_people: i32,
    pub meals_per_week: i32,
    pub due_amount: f64,
}

impl WeekMappingInserter {
    pub fn into_mapping(self, mapping_id: MappingId) -> WeekMapping {
        WeekMapping {
            mapping_id,
            order_id: self.order_id,
            week: self.week,
            recipe_id: self.recipe_id,
            recipe_price: self.recipe_price,
            spice_level_id: self.spice_level_id,
            delivery_date: self.delivery_date,
            number_of_people: self.number_of_people,
            meals_per_week: self.meals_per_week,
            payment_id: None,
            payment_date: None,
            paid_amount: None,
            due_amount: self.due_amount,
        }
    }
}

impl Inserter for WeekMappingInserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(ORDER_ID_COLUMN, self.order_id.0)
            .with_arg(WEEK_COLUMN, self.week)
            .with_arg(RECIPE_ID_COLUMN, self.recipe_id.0)
            .with_arg(RECIPE_PRICE_COLUMN, self.recipe_price)
            .with_arg(SPICE_LEVEL_ID_COLUMN, self.spice_level_id.0)
            .with_arg(DELIVERY_DATE_COLUMN, self.delivery_date)
            .with_arg(NUMBER_OF_PEOPLE_COLUMN, self.number_of_people)
            .with_arg(MEALS_PER_WEEK_COLUMN, self.meals_per_week)
            .with_arg(DUE_AMOUNT_COLUMN, self.due_amount)
    }
}

#[derive(Clone, Debug, Default)]
pub struct WeekMappingFilter {
    pub mapping_id: Option<MappingId>,
    pub order_id: Option<OrderId>,
    pub week: Option<Week>,
    pub payment_id: Option<PaymentId>,
    pub unpaid: bool,
}

impl WeekMappingFilter {
    pub fn matches(&self, mapping: &WeekMapping) -> bool {
        self.mapping_id.map_or(true, |v| v == mapping.mapping_id)
            && self.order_id.map_or(true, |v| v == mapping.order_id)
            && self.week.map_or(true, |v| v == mapping.week)
            && self.payment_id
                .as_ref()
                .map_or(true, |v| Some(v) == mapping.payment_id.as_ref())
            && (!self.unpaid || mapping.payment_id.is_none())
    }
}

impl From<OrderId> for WeekMappingFilter {
    fn from(v: OrderId) -> Self {
        Self {
            order_id: Some(v),
            ..Default::default()
        }
    }
}

impl From<MappingId> for WeekMappingFilter {
    fn from(v: MappingId) -> Self {
        Self {
            mapping_id: Some(v),
            ..Default::default()
        }
    }
}

impl Filter for WeekMappingFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.mapping_id {
            b = b.with_filter(MAPPING_ID_COLUMN, v.0);
        }

        if let Some(v) = self.order_id {
            b = b.with_filter(ORDER_ID_COLUMN, v.0);
        }

        if let Some(v) = self.week {
            b = b.with_filter(WEEK_COLUMN, v);
        }

        if let Some(v) = self.payment_id {
            b = b.with_filter(PAYMENT_ID_COLUMN, v.0);
        }

        if self.unpaid {
            b = b.with_null(PAYMENT_ID_COLUMN);
        }

        b.with_extra(format!("ORDER BY {}, {}", WEEK_COLUMN, MAPPING_ID_COLUMN))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeekMappingUpdateData {
    pub recipe_id: Option<RecipeId>,
    pub recipe_price: Option<f64>,
    pub spice_level_id: Option<SpiceLevelId>,
    pub delivery_date: Option<NaiveDate>,
    pub number_of_people: Option<i32>,
    pub meals_per_week: Option<i32>,
    pub payment_id: Option<PaymentId>,
    pub payment_date: Option<NaiveDateTime>,
    pub paid_amount: Option<f64>,
}

impl WeekMappingUpdateData {
    pub fn apply(&self, mapping: &mut WeekMapping) {
        if let Some(v) = self.recipe_id {
            mapping.recipe_id = v;
        }
        if let Some(v) = self.recipe_price {
            mapping.recipe_price = v;
        }
        if let Some(v) = self.spice_level_id {
            mapping.spice_level_id = v;
        }
        if let Some(v) = self.delivery_date {
            mapping.delivery_date = v;
        }
        if let Some(v) = self.number_of_people {
            mapping.number_of_people = v;
        }
        if let Some(v) = self.meals_per_week {
            mapping.meals_per_week = v;
        }
        if let Some(ref v) = self.payment_id {
            mapping.payment_id = Some(v.clone());
        }
        if let Some(v) = self.payment_date {
            mapping.payment_date = Some(v);
        }
        if let Some(v) = self.paid_amount {
            mapping.paid_amount = Some(v);
        }
    }
}

#[derive(Clone, Debug)]
pub struct WeekMappingUpdater {
    pub mask: WeekMappingFilter,
    pub data: WeekMappingUpdateData,
}

impl Updater for WeekMappingUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let WeekMappingUpdater { mask, data } = self;

        let mut b = UpdateBuilder::from(mask.into_filtered_operation_builder(table));

        if let Some(v) = data.recipe_id {
            b = b.with_value(RECIPE_ID_COLUMN, v.0);
        }
        if let Some(v) = data.recipe_price {
            b = b.with_value(RECIPE_PRICE_COLUMN, v);
        }
        if let Some(v) = data.spice_level_id {
            b = b.with_value(SPICE_LEVEL_ID_COLUMN, v.0);
        }
        if let Some(v) = data.delivery_date {
            b = b.with_value(DELIVERY_DATE_COLUMN, v);
        }
        if let Some(v) = data.number_of_people {
            b = b.with_value(NUMBER_OF_PEOPLE_COLUMN, v);
        }
        if let Some(v) = data.meals_per_week {
            b = b.with_value(MEALS_PER_WEEK_COLUMN, v);
        }
        if let Some(v) = data.payment_id {
            b = b.with_value(PAYMENT_ID_COLUMN, v.0);
        }
        if let Some(v) = data.payment_date {
            b = b.with_value(PAYMENT_DATE_COLUMN, v);
        }
        if let Some(v) = data.paid_amount {
            b = b.with_value(PAID_AMOUNT_COLUMN, v);
        }

        b
    }
}
