use clap::Parser;
use tracing::error;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use pushcast::{
    cli::{self, Cli, Commands},
    configuration::{AppState, State},
    error::Error,
    server,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let result = app_main().await;

    if let Err(err) = &result {
        error!("{}", err);
    }

    result
}

async fn app_main() -> Result<(), Error> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_level(true)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Serve) => serve().await,
        Some(Commands::Migrate) => cli::run_migrate().await,
        Some(Commands::Send {
            title,
            message,
            url,
            image,
        }) => cli::run_send(title, message, url, image).await,
        Some(Commands::Count) => cli::run_count().await,
        Some(Commands::VapidKeys) => {
            cli::run_vapid_keys();
            Ok(())
        },
    }
}

async fn serve() -> Result<(), Error> {
    let config = match cli::init_config() {
        Ok(config) => config,
        Err(e) => return Err(Error::ConfigurationError(e.to_string())),
    };

    let missing = config.missing();
    if !missing.is_empty() {
        tracing::warn!(
            "Starting without {}; dependent routes will report it",
            missing.join(", ")
        );
    }

    let state = State::new(config).await?;
    let app_state = AppState::new(state);

    server::server_task(&app_state).await
}
