use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use failure::{Error as FailureError, Fail};

use errors::*;
use models::*;
use repos::*;

/// Process-wide registry of per-order mutexes.
#[derive(Default)]
pub struct OrderLocks {
    locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    pub fn lock_for(&self, order_id: OrderId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Entries nobody else holds can go.
        locks.retain(|id, lock| *id == order_id || Arc::strong_count(lock) > 1);
        locks.entry(order_id).or_insert_with(Default::default).clone()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Runs `f` in one transaction while holding both the in-process lock and the row lock of the order.
pub fn with_order_lock<T, F>(db_pool: &dyn ConnectionPool, locks: &OrderLocks, order_id: OrderId, f: F) -> Result<T, FailureError>
where
    F: FnOnce(&mut dyn RepoConnection, Order) -> Result<T, FailureError>,
{
    let lock = locks.lock_for(order_id);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    with_transaction(db_pool, move |conn| {
        let order = match conn.lock_order(order_id) {
            Ok(Some(order)) => order,
            Ok(None) => return Err(format_err!("Order {} not found", order_id).context(Error::NotFound).into()),
            Err(RepoError::ConcurrentModification) => {
                return Err(format_err!("Order {} is locked by another transaction", order_id)
                    .context(Error::ConcurrentModification)
                    .into())
            }
            Err(e) => return Err(e.context(Error::Connection).into()),
        };
        debug!("Locked order {}", order_id);

        f(conn, order)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_order_shares_one_mutex() {
        let locks = OrderLocks::default();
        let a = locks.lock_for(OrderId(1));
        let b = locks.lock_for(OrderId(1));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn released_entries_are_pruned() {
        let locks = OrderLocks::default();
        {
            let _a = locks.lock_for(OrderId(1));
            let _b = locks.lock_for(OrderId(2));
            assert_eq!(locks.len(), 2);
        }
        let _c = locks.lock_for(OrderId(3));
        assert_eq!(locks.len(), 1);
    }
}
