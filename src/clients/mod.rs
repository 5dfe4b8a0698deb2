pub mod notification;
pub mod payment;
pub mod webhook;

pub use self::notification::*;
pub use self::payment::*;
pub use self::webhook::*;
