use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use super::types::*;
use errors::*;
use models::*;

#[derive(Clone, Debug, Default)]
pub struct MemoryData {
    pub orders: Vec<Order>,
    pub mappings: Vec<WeekMapping>,
    pub snack_mappings: Vec<SnackMapping>,
    pub snack_links: Vec<OrderWeekSnack>,
    pub categories: Vec<Category>,
    pub recipes: Vec<Recipe>,
    pub spice_levels: Vec<SpiceLevel>,
    pub snacks: Vec<Snack>,
    pub customers: Vec<Customer>,
    next_order_id: i32,
    next_mapping_id: i32,
    next_snack_mapping_id: i32,
}

impl MemoryData {
    fn next_order_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        OrderId(self.next_order_id)
    }

    fn next_mapping_id(&mut self) -> MappingId {
        self.next_mapping_id += 1;
        MappingId(self.next_mapping_id)
    }

    fn next_snack_mapping_id(&mut self) -> SnackMappingId {
        self.next_snack_mapping_id += 1;
        SnackMappingId(self.next_snack_mapping_id)
    }

    fn has_order(&self, order_id: OrderId) -> bool {
        self.orders.iter().any(|o| o.order_id == order_id)
    }
}

#[derive(Default)]
struct Shared {
    data: Mutex<MemoryData>,
    busy: Mutex<bool>,
    idle: Condvar,
    held_rows: Mutex<HashSet<OrderId>>,
}

/// In-process store with the same transactional contract as the Postgres pool.
///
/// Transactions are serialized: a connection works on a private copy of the data which
/// replaces the shared state on commit and is discarded otherwise.
#[derive(Clone, Default)]
pub struct MemoryPool {
    shared: Arc<Shared>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn seed<F: FnOnce(&mut MemoryData)>(&self, f: F) -> &Self {
        let mut data = self.shared.data.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut data);
        self
    }

    pub fn add_category(&self, category_id: i32, category_name: &str) -> &Self {
        self.seed(|data| {
            data.categories.push(Category {
                category_id: CategoryId(category_id),
                category_name: category_name.to_string(),
            })
        })
    }

    pub fn add_recipe(&self, recipe_id: i32, category_id: i32, title: &str, price: f64) -> &Self {
        self.seed(|data| {
            data.recipes.push(Recipe {
                recipe_id: RecipeId(recipe_id),
                category_id: CategoryId(category_id),
                title: title.to_string(),
                price,
                image_url: None,
            })
        })
    }

    pub fn add_spice_level(&self, spice_level_id: i32, spice_level_name: &str) -> &Self {
        self.seed(|data| {
            data.spice_levels.push(SpiceLevel {
                spice_level_id: SpiceLevelId(spice_level_id),
                spice_level_name: spice_level_name.to_string(),
            })
        })
    }

    pub fn add_snack(&self, snacks_id: i32, name: &str, price: f64) -> &Self {
        self.seed(|data| {
            data.snacks.push(Snack {
                snacks_id: SnackId(snacks_id),
                name: name.to_string(),
                price,
            })
        })
    }

    pub fn add_customer(&self, customer_id: i32, email: &str, first_name: &str, last_name: &str) -> &Self {
        self.seed(|data| {
            data.customers.push(Customer {
                customer_id: CustomerId(customer_id),
                email: email.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
            })
        })
    }

    /// Simulates another session holding the row lock of an order.
    pub fn hold_row_lock(&self, order_id: OrderId) {
        self.shared
            .held_rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order_id);
    }

    pub fn release_row_lock(&self, order_id: OrderId) {
        self.shared
            .held_rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&order_id);
    }

    /// Committed state.
    pub fn snapshot(&self) -> MemoryData {
        self.shared.data.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ConnectionPool for MemoryPool {
    fn connect(&self) -> RepoResult<Box<dyn RepoConnection>> {
        {
            let mut busy = self.shared.busy.lock().unwrap_or_else(PoisonError::into_inner);
            while *busy {
                busy = self.shared.idle.wait(busy).unwrap_or_else(PoisonError::into_inner);
            }
            *busy = true;
        }

        let data = self.snapshot();
        Ok(Box::new(MemoryConnection {
            shared: self.shared.clone(),
            data,
        }))
    }
}

pub struct MemoryConnection {
    shared: Arc<Shared>,
    data: MemoryData,
}

fn take_matching<T, P: Fn(&T) -> bool>(rows: &mut Vec<T>, pred: P) -> Vec<T> {
    let mut removed = vec![];
    let mut kept = vec![];
    for row in rows.drain(..) {
        if pred(&row) {
            removed.push(row);
        } else {
            kept.push(row);
        }
    }
    *rows = kept;
    removed
}

impl RepoConnection for MemoryConnection {
    fn insert_order(&mut self, inserter: OrderInserter) -> RepoResult<Order> {
        if !self.data.customers.iter().any(|c| c.customer_id == inserter.customer_id) {
            return Err(RepoError::Constraint {
                reason: format!("customer {} does not exist", inserter.customer_id),
            });
        }
        let order = inserter.into_order(self.data.next_order_id());
        self.data.orders.push(order.clone());
        Ok(order)
    }

    fn select_orders(&mut self, filter: OrderFilter) -> RepoResult<Vec<Order>> {
        let mut out = self.data
            .orders
            .iter()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect::<Vec<_>>();
        match filter.sort {
            Some(SortOrder::Descending) => out.sort_by(|a, b| b.order_id.cmp(&a.order_id)),
            _ => out.sort_by(|a, b| a.order_id.cmp(&b.order_id)),
        }
        Ok(out)
    }

    fn lock_order(&mut self, order_id: OrderId) -> RepoResult<Option<Order>> {
        if self.shared
            .held_rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&order_id)
        {
            return Err(RepoError::ConcurrentModification);
        }
        Ok(self.data.orders.iter().find(|o| o.order_id == order_id).cloned())
    }

    fn update_orders(&mut self, updater: OrderUpdater) -> RepoResult<Vec<Order>> {
        let mut out = vec![];
        for order in self.data.orders.iter_mut().filter(|o| updater.mask.matches(o)) {
            updater.data.apply(order);
            out.push(order.clone());
        }
        Ok(out)
    }

    fn delete_orders(&mut self, filter: OrderFilter) -> RepoResult<Vec<Order>> {
        let targets = self.data
            .orders
            .iter()
            .filter(|o| filter.matches(o))
            .map(|o| o.order_id)
            .collect::<Vec<_>>();
        let referenced = self.data.mappings.iter().any(|m| targets.contains(&m.order_id))
            || self.data.snack_mappings.iter().any(|m| targets.contains(&m.order_id))
            || self.data.snack_links.iter().any(|l| targets.contains(&l.order_id));
        if referenced {
            return Err(RepoError::Constraint {
                reason: "order is still referenced".to_string(),
            });
        }
        Ok(take_matching(&mut self.data.orders, |o| filter.matches(o)))
    }

    fn insert_mapping(&mut self, inserter: WeekMappingInserter) -> RepoResult<WeekMapping> {
        if !self.data.has_order(inserter.order_id) {
            return Err(RepoError::Constraint {
                reason: format!("order {} does not exist", inserter.order_id),
            });
        }
        let mapping = inserter.into_mapping(self.data.next_mapping_id());
        self.data.mappings.push(mapping.clone());
        Ok(mapping)
    }

    fn select_mappings(&mut self, filter: WeekMappingFilter) -> RepoResult<Vec<WeekMapping>> {
        let mut out = self.data
            .mappings
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by_key(|m| (m.week, m.mapping_id));
        Ok(out)
    }

    fn update_mappings(&mut self, updater: WeekMappingUpdater) -> RepoResult<Vec<WeekMapping>> {
        let mut out = vec![];
        for mapping in self.data.mappings.iter_mut().filter(|m| updater.mask.matches(m)) {
            updater.data.apply(mapping);
            out.push(mapping.clone());
        }
        Ok(out)
    }

    fn delete_mappings(&mut self, filter: WeekMappingFilter) -> RepoResult<Vec<WeekMapping>> {
        Ok(take_matching(&mut self.data.mappings, |m| filter.matches(m)))
    }

    fn insert_snack_mapping(&mut self, inserter: SnackMappingInserter) -> RepoResult<SnackMapping> {
        if !self.data.has_order(inserter.order_id) {
            return Err(RepoError::Constraint {
                reason: format!("order {} does not exist", inserter.order_id),
            });
        }
        let mapping = inserter.into_mapping(self.data.next_snack_mapping_id());
        self.data.snack_mappings.push(mapping.clone());
        Ok(mapping)
    }

    fn select_snack_mappings(&mut self, filter: SnackMappingFilter) -> RepoResult<Vec<SnackMapping>> {
        let mut out = self.data
            .snack_mappings
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by_key(|m| m.snacks_mapping_id);
        Ok(out)
    }

    fn update_snack_mappings(&mut self, updater: SnackMappingUpdater) -> RepoResult<Vec<SnackMapping>> {
        let mut out = vec![];
        for mapping in self.data.snack_mappings.iter_mut().filter(|m| updater.mask.matches(m)) {
            updater.data.apply(mapping);
            out.push(mapping.clone());
        }
        Ok(out)
    }

    fn delete_snack_mappings(&mut self, filter: SnackMappingFilter) -> RepoResult<Vec<SnackMapping>> {
        let removed = take_matching(&mut self.data.snack_mappings, |m| filter.matches(m));
        let ids = removed.iter().map(|m| m.snacks_mapping_id).collect::<Vec<_>>();
        take_matching(&mut self.data.snack_links, |l| ids.contains(&l.snacks_mapping_id));
        Ok(removed)
    }

    fn link_snack(&mut self, link: OrderWeekSnack) -> RepoResult<OrderWeekSnack> {
        let known = self.data
            .snack_mappings
            .iter()
            .any(|m| m.snacks_mapping_id == link.snacks_mapping_id);
        if !known || !self.data.has_order(link.order_id) {
            return Err(RepoError::Constraint {
                reason: format!("snack mapping {} cannot be linked", link.snacks_mapping_id),
            });
        }
        if self.data.snack_links.contains(&link) {
            return Err(RepoError::Constraint {
                reason: format!("snack mapping {} is already linked", link.snacks_mapping_id),
            });
        }
        self.data.snack_links.push(link.clone());
        Ok(link)
    }

    fn select_snack_links(&mut self, filter: OrderWeekSnackFilter) -> RepoResult<Vec<OrderWeekSnack>> {
        let mut out = self.data
            .snack_links
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by_key(|l| l.snacks_mapping_id);
        Ok(out)
    }

    fn delete_snack_links(&mut self, filter: OrderWeekSnackFilter) -> RepoResult<Vec<OrderWeekSnack>> {
        Ok(take_matching(&mut self.data.snack_links, |l| filter.matches(l)))
    }

    fn select_categories(&mut self) -> RepoResult<Vec<Category>> {
        let mut out = self.data.categories.clone();
        out.sort_by_key(|c| c.category_id);
        Ok(out)
    }

    fn select_recipes(&mut self, filter: RecipeFilter) -> RepoResult<Vec<Recipe>> {
        let mut out = self.data
            .recipes
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by_key(|r| r.recipe_id);
        Ok(out)
    }

    fn select_spice_levels(&mut self) -> RepoResult<Vec<SpiceLevel>> {
        let mut out = self.data.spice_levels.clone();
        out.sort_by_key(|s| s.spice_level_id);
        Ok(out)
    }

    fn select_snacks(&mut self) -> RepoResult<Vec<Snack>> {
        let mut out = self.data.snacks.clone();
        out.sort_by_key(|s| s.snacks_id);
        Ok(out)
    }

    fn select_customers(&mut self, filter: CustomerFilter) -> RepoResult<Vec<Customer>> {
        Ok(self.data
            .customers
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    fn commit(self: Box<Self>) -> RepoResult<()> {
        let mut data = self.shared.data.lock().unwrap_or_else(PoisonError::into_inner);
        *data = self.data.clone();
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut busy = self.shared.busy.lock().unwrap_or_else(PoisonError::into_inner);
        *busy = false;
        self.shared.idle.notify_one();
    }
}
