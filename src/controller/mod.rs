pub mod send_notification;
pub mod subscribe;
pub mod vapid;
pub mod version;
