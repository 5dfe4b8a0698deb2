use postgres::Row;

use errors::*;
use models::*;
use util::*;

/// Builds a model out of a returned database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> RepoResult<Self>;
}

pub trait Inserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder;
}

pub trait Filter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder;
}

pub trait Updater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder;
}

/// A single open transaction. Dropping it without `commit` rolls everything back.
pub trait RepoConnection {
    fn insert_order(&mut self, inserter: OrderInserter) -> RepoResult<Order>;
    fn select_orders(&mut self, filter: OrderFilter) -> RepoResult<Vec<Order>>;
    /// Takes the row lock of an order without waiting for other holders.
    fn lock_order(&mut self, order_id: OrderId) -> RepoResult<Option<Order>>;
    fn update_orders(&mut self, updater: OrderUpdater) -> RepoResult<Vec<Order>>;
    fn delete_orders(&mut self, filter: OrderFilter) -> RepoResult<Vec<Order>>;

    fn insert_mapping(&mut self, inserter: WeekMappingInserter) -> RepoResult<WeekMapping>;
    fn select_mappings(&mut self, filter: WeekMappingFilter) -> RepoResult<Vec<WeekMapping>>;
    fn update_mappings(&mut self, updater: WeekMappingUpdater) -> RepoResult<Vec<WeekMapping>>;
    fn delete_mappings(&mut self, filter: WeekMappingFilter) -> RepoResult<Vec<WeekMapping>>;

    fn insert_snack_mapping(&mut self, inserter: SnackMappingInserter) -> RepoResult<SnackMapping>;
    fn select_snack_mappings(&mut self, filter: SnackMappingFilter) -> RepoResult<Vec<SnackMapping>>;
    fn update_snack_mappings(&mut self, updater: SnackMappingUpdater) -> RepoResult<Vec<SnackMapping>>;
    fn delete_snack_mappings(&mut self, filter: SnackMappingFilter) -> RepoResult<Vec<SnackMapping>>;

    fn link_snack(&mut self, link: OrderWeekSnack) -> RepoResult<OrderWeekSnack>;
    fn select_snack_links(&mut self, filter: OrderWeekSnackFilter) -> RepoResult<Vec<OrderWeekSnack>>;
    fn delete_snack_links(&mut self, filter: OrderWeekSnackFilter) -> RepoResult<Vec<OrderWeekSnack>>;

    fn select_categories(&mut self) -> RepoResult<Vec<Category>>;
    fn select_recipes(&mut self, filter: RecipeFilter) -> RepoResult<Vec<Recipe>>;
    fn select_spice_levels(&mut self) -> RepoResult<Vec<SpiceLevel>>;
    fn select_snacks(&mut self) -> RepoResult<Vec<Snack>>;
    fn select_customers(&mut self, filter: CustomerFilter) -> RepoResult<Vec<Customer>>;

    fn commit(self: Box<Self>) -> RepoResult<()>;
}

pub trait ConnectionPool: Send + Sync {
    /// Opens a connection with a transaction already started.
    fn connect(&self) -> RepoResult<Box<dyn RepoConnection>>;
}

/// Runs `f` in one transaction: committed when it returns `Ok`, rolled back otherwise.
pub fn with_transaction<T, E, F>(pool: &dyn ConnectionPool, f: F) -> Result<T, E>
where
    E: From<RepoError>,
    F: FnOnce(&mut dyn RepoConnection) -> Result<T, E>,
{
    let mut conn = pool.connect()?;
    let out = f(&mut *conn)?;
    conn.commit()?;
    Ok(out)
}
