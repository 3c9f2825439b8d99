use serde::{Deserialize, Serialize};

use crate::model::SubscriptionKeys;

/// Browser `PushSubscription.toJSON()` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(
        alias = "expirationTime",
        rename(serialize = "expirationTime"),
        default
    )]
    pub expiration_time: Option<i64>,
    #[serde(default)]
    pub keys: Option<SubscriptionKeys>,
}

#[derive(Debug, Deserialize)]
pub struct EndpointQuery {
    pub endpoint: String,
}
