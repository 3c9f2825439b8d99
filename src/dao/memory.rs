use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    dao::{is_persistable, SubscriptionStore},
    error::Error,
    model::{Subscription, SubscriptionKeys},
};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    rows: HashMap<String, Subscription>,
}

/// In-process backend keyed by endpoint.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, endpoint: &str) -> Option<Subscription> {
        self.inner.read().await.rows.get(endpoint).cloned()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn upsert(
        &self,
        endpoint: &str,
        keys: &SubscriptionKeys,
    ) -> Result<bool, Error> {
        if !is_persistable(endpoint, keys) {
            return Ok(false);
        }

        let mut inner = self.inner.write().await;
        let now = Utc::now();

        if let Some(row) = inner.rows.get_mut(endpoint) {
            row.keys = keys.clone();
            row.created_at = now;
            return Ok(true);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.insert(
            endpoint.to_owned(),
            Subscription {
                id,
                endpoint: endpoint.to_owned(),
                keys: keys.clone(),
                created_at: now,
            },
        );

        Ok(true)
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, Error> {
        let inner = self.inner.read().await;
        let mut items: Vec<Subscription> =
            inner.rows.values().cloned().collect();
        items.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
        });
        Ok(items)
    }

    async fn count(&self) -> Result<i64, Error> {
        Ok(self.inner.read().await.rows.len() as i64)
    }

    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<(), Error> {
        self.inner.write().await.rows.remove(endpoint);
        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), Error> {
        self.inner.write().await.rows.retain(|_, row| row.id != id);
        Ok(())
    }
}
