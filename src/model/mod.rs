//! Database models module

mod subscription;
mod table;

pub use subscription::{Subscription, SubscriptionKeys, SubscriptionRow};
pub use table::Table;
