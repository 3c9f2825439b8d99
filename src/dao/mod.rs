//! Subscription storage
//!
//! [`SubscriptionStore`] is the only way the rest of the crate touches
//! persisted subscriptions. Every call goes to the backend, nothing is cached.

use std::fmt;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    error::Error,
    model::{Subscription, SubscriptionKeys},
};

mod memory;
mod postgre;

pub use memory::MemoryStore;
pub use postgre::{PoolOption, PoolType, QueryResult};

#[async_trait]
pub trait SubscriptionStore: Send + Sync + fmt::Debug {
    /// Inserts or, on endpoint conflict, replaces the keys and refreshes
    /// `created_at`. Returns `Ok(false)` without touching storage when the
    /// endpoint or keys are incomplete.
    async fn upsert(
        &self,
        endpoint: &str,
        keys: &SubscriptionKeys,
    ) -> Result<bool, Error>;

    /// Newest first.
    async fn list_all(&self) -> Result<Vec<Subscription>, Error>;

    async fn count(&self) -> Result<i64, Error>;

    /// Absence is not an error.
    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<(), Error>;

    /// Absence is not an error.
    async fn delete_by_id(&self, id: i64) -> Result<(), Error>;

    async fn list_or_empty(&self) -> Vec<Subscription> {
        match self.list_all().await {
            Ok(items) => items,
            Err(e) => {
                warn!("Subscription list degraded to empty: {}", e);
                vec![]
            },
        }
    }

    async fn count_or_zero(&self) -> i64 {
        match self.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Subscription count degraded to zero: {}", e);
                0
            },
        }
    }

    async fn try_upsert(
        &self,
        endpoint: &str,
        keys: &SubscriptionKeys,
    ) -> bool {
        match self.upsert(endpoint, keys).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Subscription sync skipped: {}", e);
                false
            },
        }
    }

    async fn try_delete_by_endpoint(&self, endpoint: &str) -> bool {
        match self.delete_by_endpoint(endpoint).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Subscription delete skipped: {}", e);
                false
            },
        }
    }
}

/// Stand-in used when no database is configured.
#[derive(Debug, Default)]
pub struct UnconfiguredStore;

impl UnconfiguredStore {
    fn unavailable() -> Error {
        Error::StoreUnavailable(String::from("DATABASE_URL is not configured"))
    }
}

#[async_trait]
impl SubscriptionStore for UnconfiguredStore {
    async fn upsert(
        &self,
        _endpoint: &str,
        _keys: &SubscriptionKeys,
    ) -> Result<bool, Error> {
        Err(Self::unavailable())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, Error> {
        Err(Self::unavailable())
    }

    async fn count(&self) -> Result<i64, Error> {
        Err(Self::unavailable())
    }

    async fn delete_by_endpoint(&self, _endpoint: &str) -> Result<(), Error> {
        Err(Self::unavailable())
    }

    async fn delete_by_id(&self, _id: i64) -> Result<(), Error> {
        Err(Self::unavailable())
    }
}

pub(crate) fn is_persistable(endpoint: &str, keys: &SubscriptionKeys) -> bool {
    !endpoint.trim().is_empty() && keys.is_complete()
}
