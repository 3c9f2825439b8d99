use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Error;

/// Encryption material the browser hands out with each subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    #[serde(default)]
    pub p256dh: String,
    #[serde(default)]
    pub auth: String,
}

impl SubscriptionKeys {
    pub fn new(p256dh: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            p256dh: p256dh.into(),
            auth: auth.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.p256dh.trim().is_empty() && !self.auth.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub created_at: DateTime<Utc>,
}

/// Row as stored: `keys` is a TEXT column holding `{p256dh, auth}` JSON.
#[derive(Debug, FromRow)]
pub struct SubscriptionRow {
    pub id: i64,
    pub endpoint: String,
    pub keys: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = Error;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let keys = serde_json::from_str(&row.keys)?;
        Ok(Subscription {
            id: row.id,
            endpoint: row.endpoint,
            keys,
            created_at: row.created_at,
        })
    }
}
