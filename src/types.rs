use std::sync::Arc;

use repos::ConnectionPool;

pub type DbPool = Arc<dyn ConnectionPool>;
