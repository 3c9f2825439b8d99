pub use self::{
    notification::NotificationPayload,
    push::{Claims, PushHeader, Urgency},
    subscription::{EndpointQuery, PushSubscription},
};

pub mod notification;
mod push;
mod subscription;
