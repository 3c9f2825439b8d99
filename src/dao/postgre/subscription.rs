use async_trait::async_trait;
use sqlx::error::Error;
use tracing::warn;

use super::QueryResult;
use crate::{
    dao::{is_persistable, SubscriptionStore},
    error,
    model::{Subscription, SubscriptionKeys, SubscriptionRow, Table},
};

impl Table<Subscription> {
    pub async fn insert_or_refresh(
        &self,
        endpoint: &str,
        keys: &str,
    ) -> Result<QueryResult, Error> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (endpoint, keys, created_at)
            VALUES($1, $2, NOW())
            ON CONFLICT (endpoint)
            DO UPDATE SET keys = EXCLUDED.keys, created_at = NOW()
            "#,
        )
        .bind(endpoint)
        .bind(keys)
        .execute(&self.pool)
        .await
    }

    pub async fn get_all(&self) -> Result<Vec<SubscriptionRow>, Error> {
        sqlx::query_as(
            r#"
            SELECT id, endpoint, keys, created_at
            FROM subscriptions
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .persistent(true)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_count(&self) -> Result<i64, Error> {
        let (value,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM subscriptions
            "#,
        )
        .persistent(true)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }

    pub async fn delete_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<QueryResult, Error> {
        sqlx::query(
            r#"
            DELETE FROM subscriptions WHERE endpoint = $1
            "#,
        )
        .bind(endpoint)
        .execute(&self.pool)
        .await
    }

    pub async fn delete_id(&self, id: i64) -> Result<QueryResult, Error> {
        sqlx::query(
            r#"
            DELETE FROM subscriptions WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
    }
}

#[async_trait]
impl SubscriptionStore for Table<Subscription> {
    async fn upsert(
        &self,
        endpoint: &str,
        keys: &SubscriptionKeys,
    ) -> Result<bool, error::Error> {
        if !is_persistable(endpoint, keys) {
            return Ok(false);
        }

        let keys = serde_json::to_string(keys)?;
        self.insert_or_refresh(endpoint, &keys).await?;

        Ok(true)
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, error::Error> {
        let rows = self.get_all().await?;
        let items = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                match Subscription::try_from(row) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!(
                            "Skipping subscription {} with bad keys: {}",
                            id, e
                        );
                        None
                    },
                }
            })
            .collect();

        Ok(items)
    }

    async fn count(&self) -> Result<i64, error::Error> {
        Ok(self.get_count().await?)
    }

    async fn delete_by_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<(), error::Error> {
        self.delete_endpoint(endpoint).await?;
        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), error::Error> {
        self.delete_id(id).await?;
        Ok(())
    }
}
