//! Page and service-worker side of push notifications, written against
//! platform traits so the browser runtime can be swapped for a fake.

pub mod lifecycle;
pub mod platform;
pub mod service_worker;

pub use lifecycle::{Availability, LifecycleState, SubscriptionManager};
pub use platform::{Permission, PushPlatform};
pub use service_worker::{ServiceWorkerHandler, WorkerEvent, WorkerRuntime};
