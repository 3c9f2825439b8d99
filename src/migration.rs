//! Database migrations
//!
//! SQL files under `migrations/` are embedded at compile time and applied in
//! version order. Each file holds one idempotent statement.

use tracing::info;

use crate::{dao::PoolType, error::Error};

pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_subscriptions",
        sql: include_str!("../migrations/V001__create_subscriptions.sql"),
    },
    Migration {
        version: 2,
        name: "index_subscriptions_created_at",
        sql: include_str!("../migrations/V002__index_subscriptions_created_at.sql"),
    },
];

pub async fn run_migrations(pool: &PoolType) -> Result<(), Error> {
    info!("Running database migrations...");

    for migration in MIGRATIONS {
        sqlx::query(migration.sql).execute(pool).await?;
        info!(
            "Applied migration: V{:03}__{}",
            migration.version, migration.name
        );
    }

    Ok(())
}
