pub mod types;
pub use self::types::*;

pub mod memory;
pub use self::memory::MemoryPool;

pub mod pg;
pub use self::pg::PgPool;

pub const ORDERS_TABLE: &str = "orderdetails";
pub const WEEK_MAPPINGS_TABLE: &str = "orderrecipemapping";
pub const SNACK_MAPPINGS_TABLE: &str = "snacks_mapping";
pub const SNACK_LINKS_TABLE: &str = "order_week_snacks";
pub const CATEGORIES_TABLE: &str = "categories";
pub const RECIPES_TABLE: &str = "recipes";
pub const SPICE_LEVELS_TABLE: &str = "spicelevels";
pub const SNACKS_TABLE: &str = "snacks";
pub const CUSTOMERS_TABLE: &str = "customer";
