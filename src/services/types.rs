use std::sync::Arc;

use failure::Error as FailureError;
use futures::prelude::*;
use futures_cpupool::CpuPool;

use super::locks::OrderLocks;
use clients::notification::Notifier;
use types::*;

pub type ServiceFuture<T> = Box<dyn Future<Item = T, Error = FailureError> + Send>;

/// Everything a service needs to run blocking work against the store.
#[derive(Clone)]
pub struct ServiceContext {
    pub db_pool: DbPool,
    pub cpu_pool: CpuPool,
    pub locks: Arc<OrderLocks>,
    pub notifier: Arc<dyn Notifier>,
}

impl ServiceContext {
    pub fn new(db_pool: DbPool, cpu_pool: CpuPool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db_pool,
            cpu_pool,
            locks: Arc::new(OrderLocks::default()),
            notifier,
        }
    }

    /// Moves `f` onto the cpu pool.
    pub fn spawn<T, F>(&self, f: F) -> ServiceFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, FailureError> + Send + 'static,
    {
        Box::new(self.cpu_pool.spawn_fn(f))
    }
}
