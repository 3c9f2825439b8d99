use std::{str::FromStr, time::Duration};

use sqlx::postgres::PgConnectOptions;

use crate::{
    configuration::{Config, DATABASE_URL},
    dao::{PoolOption, PoolType},
    error::Error,
    model::{Subscription, Table},
};

#[derive(Debug)]
pub struct DatabasePool {
    pub subscription: Table<Subscription>,
    pub pool: PoolType,
}

impl DatabasePool {
    /// Builds a lazily connecting pool: an unreachable database surfaces on
    /// first use, not here.
    pub fn new(config: &Config) -> Result<DatabasePool, Error> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            Error::MissingConfiguration(vec![String::from(DATABASE_URL)])
        })?;

        let mut options = PgConnectOptions::from_str(url)?;
        if let Some(token) = &config.database_auth_token {
            options = options.password(token);
        }

        let pool = PoolOption::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy_with(options);

        Ok(DatabasePool {
            subscription: Table::new(pool.clone()),
            pool,
        })
    }

    pub fn get_pool(&self) -> &PoolType {
        &self.pool
    }
}
