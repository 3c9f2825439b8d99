pub use self::{
    database::DatabasePool,
    push::{generate_vapid_keys, PushClient, SendError, WebPushClient},
};

mod database;
pub mod push;
