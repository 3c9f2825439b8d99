//! CLI module for the push service
//!
//! Provides maintenance commands that run without starting the HTTP server.

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::{
    configuration::{get_configuration, set_configuration, Config, State},
    error::Error,
    migration,
    provider::{generate_vapid_keys, DatabasePool},
    types::NotificationPayload,
};

/// Web push notification service
#[derive(Parser)]
#[command(name = "pushcast")]
#[command(about = "Web push store and dispatcher", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default if no command specified)
    Serve,

    /// Create the subscriptions table and indexes
    Migrate,

    /// Push one notification to every stored subscription
    Send {
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        message: Option<String>,

        /// Page opened when the notification is clicked
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        image: Option<String>,
    },

    /// Print the number of stored subscriptions
    Count,

    /// Generate a fresh VAPID key pair
    VapidKeys,
}

pub fn init_config() -> Result<Config, Error> {
    set_configuration()?;
    get_configuration()
}

pub async fn run_migrate() -> Result<(), Error> {
    let config = init_config()?;
    config
        .database_url
        .as_ref()
        .context("DATABASE_URL is required to run migrations")?;

    let database = DatabasePool::new(&config)?;
    migration::run_migrations(database.get_pool()).await?;
    tracing::info!("Migrations complete");

    Ok(())
}

pub async fn run_send(
    title: Option<String>,
    message: Option<String>,
    url: Option<String>,
    image: Option<String>,
) -> Result<(), Error> {
    let state = State::new(init_config()?).await?;
    let dispatcher = state.ready_dispatcher()?;

    let request = serde_json::json!({
        "title": title,
        "message": message,
        "url": url,
        "image": image,
    });
    let payload = NotificationPayload::from_request(&request);
    let report = dispatcher.notify_all(&payload).await?;

    tracing::info!(
        "Sent {} of {} notifications ({} failed)",
        report.total_sent,
        report.total_attempted,
        report.failed()
    );
    for failure in &report.failures {
        tracing::warn!(
            "{}: {}",
            failure.endpoint,
            failure.reason.as_deref().unwrap_or("unknown")
        );
    }

    Ok(())
}

pub async fn run_count() -> Result<(), Error> {
    let state = State::new(init_config()?).await?;
    let count = state.store.count().await?;
    println!("{}", count);
    Ok(())
}

pub fn run_vapid_keys() {
    let (public_key, private_key) = generate_vapid_keys();
    println!("VAPID_PUBLIC_KEY={}", public_key);
    println!("VAPID_PRIVATE_KEY={}", private_key);
}
