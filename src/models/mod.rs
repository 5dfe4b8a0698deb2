pub mod common;
pub use self::common::*;

pub mod catalog;
pub use self::catalog::*;

pub mod customer;
pub use self::customer::*;

pub mod order;
pub use self::order::*;

pub mod week_mapping;
pub use self::week_mapping::*;

pub mod snack;
pub use self::snack::*;

pub mod plan;
pub use self::plan::*;
