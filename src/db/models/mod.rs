//! Database models split into separate files.

pub mod business;
pub mod campaign;
pub mod campaign_delivery;
pub mod customer;
pub mod payment;

pub use self::business::*;
pub use self::campaign::*;
pub use self::campaign_delivery::*;
pub use self::customer::*;
pub use self::payment::*;
