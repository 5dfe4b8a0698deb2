pub mod types;
pub use self::types::*;

pub mod locks;

pub mod allocation;
pub mod payment_state;
pub mod reconciliation;

pub mod system;
pub use self::system::*;

pub mod catalog;
pub use self::catalog::*;

pub mod order;
pub use self::order::*;

pub mod snack;
pub use self::snack::*;

pub mod payment;
pub use self::payment::*;
