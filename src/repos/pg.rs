use postgres::types::ToSql;
use postgres::{Config as PgConfig, NoTls};
use r2d2;
use r2d2::PooledConnection;
use r2d2_postgres::PostgresConnectionManager;

use super::types::*;
use super::*;
use errors::*;
use models::*;
use util::*;

type Manager = PostgresConnectionManager<NoTls>;

/// Postgres-backed pool. Each connection it hands out runs inside `BEGIN ... COMMIT`.
#[derive(Clone)]
pub struct PgPool {
    pool: r2d2::Pool<Manager>,
}

impl PgPool {
    pub fn new(dsn: &str, pool_size: u32) -> RepoResult<Self> {
        let config = dsn.parse::<PgConfig>()?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = r2d2::Pool::builder().max_size(pool_size).build(manager)?;

        Ok(Self { pool })
    }

    /// Runs raw statements outside of any managed transaction.
    pub fn batch_execute(&self, sql: &str) -> RepoResult<()> {
        let mut conn = self.pool.get()?;
        conn.batch_execute(sql)?;
        Ok(())
    }
}

impl ConnectionPool for PgPool {
    fn connect(&self) -> RepoResult<Box<dyn RepoConnection>> {
        let mut conn = self.pool.get()?;
        conn.batch_execute("BEGIN")?;

        Ok(Box::new(PgConnection { conn, finished: false }))
    }
}

pub struct PgConnection {
    conn: PooledConnection<Manager>,
    finished: bool,
}

impl PgConnection {
    fn query<T: FromRow>(&mut self, (query, args): (String, Vec<SqlArg>)) -> RepoResult<Vec<T>> {
        debug!("Executing query: {}", query);
        let params = args.iter().map(|v| &**v as &(dyn ToSql + Sync)).collect::<Vec<_>>();
        let rows = self.conn.query(query.as_str(), &params)?;

        rows.iter().map(T::from_row).collect()
    }

    fn query_one<T: FromRow>(&mut self, statement: (String, Vec<SqlArg>)) -> RepoResult<T> {
        self.query(statement)?.into_iter().next().ok_or(RepoError::NotFound)
    }

    fn insert<T: FromRow, I: Inserter>(&mut self, table: &'static str, inserter: I) -> RepoResult<T> {
        self.query_one(inserter.into_insert_builder(table).build())
    }

    fn select<T: FromRow, F: Filter>(&mut self, table: &'static str, filter: F) -> RepoResult<Vec<T>> {
        self.query(filter.into_filtered_operation_builder(table).build(FilteredOperation::Select))
    }

    fn update<T: FromRow, U: Updater>(&mut self, table: &'static str, updater: U) -> RepoResult<Vec<T>> {
        self.query(updater.into_update_builder(table).build())
    }

    fn delete<T: FromRow, F: Filter>(&mut self, table: &'static str, filter: F) -> RepoResult<Vec<T>> {
        self.query(filter.into_filtered_operation_builder(table).build(FilteredOperation::Delete))
    }

    fn select_all<T: FromRow>(&mut self, table: &'static str, order_by: &str) -> RepoResult<Vec<T>> {
        self.query(
            FilteredOperationBuilder::new(table)
                .with_extra(format!("ORDER BY {}", order_by))
                .build(FilteredOperation::Select),
        )
    }
}

impl RepoConnection for PgConnection {
    fn insert_order(&mut self, inserter: OrderInserter) -> RepoResult<Order> {
        self.insert(ORDERS_TABLE, inserter)
    }

    fn select_orders(&mut self, filter: OrderFilter) -> RepoResult<Vec<Order>> {
        self.select(ORDERS_TABLE, filter)
    }

    fn lock_order(&mut self, order_id: OrderId) -> RepoResult<Option<Order>> {
        let statement = OrderFilter::from(order_id)
            .into_filtered_operation_builder(ORDERS_TABLE)
            .build(FilteredOperation::SelectForUpdate);

        Ok(self.query(statement)?.into_iter().next())
    }

    fn update_orders(&mut self, updater: OrderUpdater) -> RepoResult<Vec<Order>> {
        self.update(ORDERS_TABLE, updater)
    }

    fn delete_orders(&mut self, filter: OrderFilter) -> RepoResult<Vec<Order>> {
        self.delete(ORDERS_TABLE, filter)
    }

    fn insert_mapping(&mut self, inserter: WeekMappingInserter) -> RepoResult<WeekMapping> {
        self.insert(WEEK_MAPPINGS_TABLE, inserter)
    }

    fn select_mappings(&mut self, filter: WeekMappingFilter) -> RepoResult<Vec<WeekMapping>> {
        self.select(WEEK_MAPPINGS_TABLE, filter)
    }

    fn update_mappings(&mut self, updater: WeekMappingUpdater) -> RepoResult<Vec<WeekMapping>> {
        self.update(WEEK_MAPPINGS_TABLE, updater)
    }

    fn delete_mappings(&mut self, filter: WeekMappingFilter) -> RepoResult<Vec<WeekMapping>> {
        self.delete(WEEK_MAPPINGS_TABLE, filter)
    }

    fn insert_snack_mapping(&mut self, inserter: SnackMappingInserter) -> RepoResult<SnackMapping> {
        self.insert(SNACK_MAPPINGS_TABLE, inserter)
    }

    fn select_snack_mappings(&mut self, filter: SnackMappingFilter) -> RepoResult<Vec<SnackMapping>> {
        self.select(SNACK_MAPPINGS_TABLE, filter)
    }

    fn update_snack_mappings(&mut self, updater: SnackMappingUpdater) -> RepoResult<Vec<SnackMapping>> {
        self.update(SNACK_MAPPINGS_TABLE, updater)
    }

    fn delete_snack_mappings(&mut self, filter: SnackMappingFilter) -> RepoResult<Vec<SnackMapping>> {
        self.delete(SNACK_MAPPINGS_TABLE, filter)
    }

    fn link_snack(&mut self, link: OrderWeekSnack) -> RepoResult<OrderWeekSnack> {
        self.insert(SNACK_LINKS_TABLE, link)
    }

    fn select_snack_links(&mut self, filter: OrderWeekSnackFilter) -> RepoResult<Vec<OrderWeekSnack>> {
        self.select(SNACK_LINKS_TABLE, filter)
    }

    fn delete_snack_links(&mut self, filter: OrderWeekSnackFilter) -> RepoResult<Vec<OrderWeekSnack>> {
        self.delete(SNACK_LINKS_TABLE, filter)
    }

    fn select_categories(&mut self) -> RepoResult<Vec<Category>> {
        self.select_all(CATEGORIES_TABLE, "category_id")
    }

    fn select_recipes(&mut self, filter: RecipeFilter) -> RepoResult<Vec<Recipe>> {
        self.select(RECIPES_TABLE, filter)
    }

    fn select_spice_levels(&mut self) -> RepoResult<Vec<SpiceLevel>> {
        self.select_all(SPICE_LEVELS_TABLE, "spice_level_id")
    }

    fn select_snacks(&mut self) -> RepoResult<Vec<Snack>> {
        self.select_all(SNACKS_TABLE, "snacks_id")
    }

    fn select_customers(&mut self, filter: CustomerFilter) -> RepoResult<Vec<Customer>> {
        self.select(CUSTOMERS_TABLE, filter)
    }

    fn commit(mut self: Box<Self>) -> RepoResult<()> {
        self.finished = true;
        self.conn.batch_execute("COMMIT")?;
        Ok(())
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.batch_execute("ROLLBACK") {
                error!("Failed to roll back transaction: {}", e);
            }
        }
    }
}
