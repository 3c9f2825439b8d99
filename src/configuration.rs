use std::{env, fs, ops::Deref, path::Path, str::FromStr, sync::Arc};

use tracing::{info, warn};

use crate::{
    dao::{SubscriptionStore, UnconfiguredStore},
    error::Error,
    handler::dispatch::Dispatcher,
    migration,
    provider::{DatabasePool, PushClient, WebPushClient},
    types::Urgency,
};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_AUTH_TOKEN: &str = "DATABASE_AUTH_TOKEN";
pub const VAPID_PUBLIC_KEY: &str = "VAPID_PUBLIC_KEY";
pub const VAPID_PRIVATE_KEY: &str = "VAPID_PRIVATE_KEY";
pub const VAPID_SUBJECT: &str = "VAPID_SUBJECT";

#[derive(Debug)]
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

#[derive(Debug)]
pub struct State {
    pub config: Config,
    pub store: Arc<dyn SubscriptionStore>,
    pub dispatcher: Option<Dispatcher>,
}

impl State {
    pub async fn new(config: Config) -> Result<State, Error> {
        let store = Self::init_store(&config).await?;
        let client = match config.vapid() {
            Ok(credentials) => Some(Arc::new(WebPushClient::new(
                &config,
                credentials,
            )?) as Arc<dyn PushClient>),
            Err(e) => {
                warn!("Push delivery disabled: {}", e);
                None
            },
        };

        Ok(Self::with_parts(config, store, client))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn SubscriptionStore>,
        client: Option<Arc<dyn PushClient>>,
    ) -> State {
        let dispatcher = client.map(|client| {
            Dispatcher::new(store.clone(), client, config.max_push_tasks)
        });

        Self {
            config,
            store,
            dispatcher,
        }
    }

    async fn init_store(
        config: &Config,
    ) -> Result<Arc<dyn SubscriptionStore>, Error> {
        if config.database_url.is_none() {
            warn!(
                "{} is not set, subscription store is unconfigured",
                DATABASE_URL
            );
            return Ok(Arc::new(UnconfiguredStore));
        }

        let database = DatabasePool::new(config)?;

        if let Err(e) = migration::run_migrations(database.get_pool()).await {
            warn!("Subscription store unreachable, running degraded: {}", e);
        }

        Ok(Arc::new(database.subscription))
    }

    /// Dispatcher for the dispatch entry point, or the exact names of the
    /// settings that keep it from running.
    pub fn ready_dispatcher(&self) -> Result<&Dispatcher, Error> {
        let missing = self.config.missing();
        if !missing.is_empty() {
            return Err(Error::MissingConfiguration(missing));
        }

        self.dispatcher.as_ref().ok_or_else(|| {
            Error::ConfigurationError(String::from(
                "push client is not initialized",
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub public_key: String,
    pub private_key: String,
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_auth_token: Option<String>,
    pub database_max_connections: u32,
    pub vapid_public_key: Option<String>,
    pub vapid_private_key: Option<String>,
    pub vapid_subject: Option<String>,
    pub server_host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub push_timeout: u64,
    pub push_ttl: i64,
    pub push_urgency: Urgency,
    pub max_push_tasks: usize,
    pub status_code_to_delete: Vec<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_auth_token: None,
            database_max_connections: 10,
            vapid_public_key: None,
            vapid_private_key: None,
            vapid_subject: None,
            server_host: String::from("0.0.0.0"),
            port: 8080,
            allowed_origins: vec![String::from("*")],
            push_timeout: 5,
            push_ttl: 24 * 60 * 60,
            push_urgency: Urgency::Normal,
            max_push_tasks: 64,
            status_code_to_delete: vec![404, 410],
        }
    }
}

impl Config {
    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let database_max_connections = match value("DATABASE_MAX_CONNECTIONS") {
            Some(v) => parse_setting("DATABASE_MAX_CONNECTIONS", &v)?,
            None => defaults.database_max_connections,
        };
        let port = match value("PORT") {
            Some(v) => parse_setting("PORT", &v)?,
            None => defaults.port,
        };
        let push_timeout = match value("PUSH_TIMEOUT_IN_SEC") {
            Some(v) => parse_setting("PUSH_TIMEOUT_IN_SEC", &v)?,
            None => defaults.push_timeout,
        };
        let push_ttl = match value("PUSH_TTL_IN_SEC") {
            Some(v) => parse_setting("PUSH_TTL_IN_SEC", &v)?,
            None => defaults.push_ttl,
        };
        let push_urgency = match value("PUSH_URGENCY") {
            Some(v) => Urgency::from_str(&v)?,
            None => defaults.push_urgency,
        };
        let max_push_tasks: usize = match value("MAX_PUSH_TASKS") {
            Some(v) => parse_setting("MAX_PUSH_TASKS", &v)?,
            None => defaults.max_push_tasks,
        };
        if max_push_tasks == 0 {
            return Err(Error::ConfigurationError(String::from(
                "MAX_PUSH_TASKS must be greater than zero",
            )));
        }

        let allowed_origins = match value("ALLOWED_ORIGINS") {
            Some(v) => split_list(&v),
            None => defaults.allowed_origins,
        };

        let status_code_to_delete = match value("STATUS_CODES_TO_DELETE") {
            Some(v) => {
                let mut codes = vec![];
                for code in split_list(&v) {
                    codes.push(parse_setting("STATUS_CODES_TO_DELETE", &code)?);
                }
                codes
            },
            None => defaults.status_code_to_delete,
        };

        Ok(Config {
            database_url: value(DATABASE_URL),
            database_auth_token: value(DATABASE_AUTH_TOKEN),
            database_max_connections,
            vapid_public_key: value(VAPID_PUBLIC_KEY),
            vapid_private_key: value(VAPID_PRIVATE_KEY),
            vapid_subject: value(VAPID_SUBJECT),
            server_host: value("SERVER_HOST").unwrap_or(defaults.server_host),
            port,
            allowed_origins,
            push_timeout,
            push_ttl,
            push_urgency,
            max_push_tasks,
            status_code_to_delete,
        })
    }

    /// Names of required settings that are absent.
    pub fn missing(&self) -> Vec<String> {
        [
            (DATABASE_URL, &self.database_url),
            (VAPID_PUBLIC_KEY, &self.vapid_public_key),
            (VAPID_PRIVATE_KEY, &self.vapid_private_key),
            (VAPID_SUBJECT, &self.vapid_subject),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name.to_owned())
        .collect()
    }

    pub fn vapid(&self) -> Result<VapidCredentials, Error> {
        match (
            &self.vapid_public_key,
            &self.vapid_private_key,
            &self.vapid_subject,
        ) {
            (Some(public_key), Some(private_key), Some(subject)) => {
                Ok(VapidCredentials {
                    public_key: public_key.to_owned(),
                    private_key: private_key.to_owned(),
                    subject: subject.to_owned(),
                })
            },
            _ => Err(Error::MissingConfiguration(
                self.missing()
                    .into_iter()
                    .filter(|name| name.starts_with("VAPID_"))
                    .collect(),
            )),
        }
    }

    pub fn cors_access_all(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_setting<T: FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value.parse().map_err(|_| {
        Error::ConfigurationError(format!(
            "{} has invalid value {}",
            key, value
        ))
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_owned())
        .filter(|item| !item.is_empty())
        .collect()
}

pub fn get_configuration() -> Result<Config, Error> {
    Config::from_lookup(|key| env::var(key).ok())
}

/// Seeds the process environment from `.env` in the working directory.
/// Variables already set are left alone.
pub fn set_configuration() -> Result<(), Error> {
    let path = Path::new(".env");
    if !path.exists() {
        return Ok(());
    }

    let config_string = fs::read_to_string(path)?;
    let mut loaded = 0;

    for (key, value) in parse_config_string(&config_string) {
        if env::var_os(&key).is_none() {
            env::set_var(key, value);
            loaded += 1;
        }
    }

    info!("Loaded {} settings from .env", loaded);
    Ok(())
}

fn parse_config_string(config: &str) -> Vec<(String, String)> {
    config
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(v);
            (k.trim().to_owned(), v.to_owned())
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(
        pairs: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.push_timeout, 5);
        assert_eq!(config.status_code_to_delete, vec![404, 410]);
        assert!(config.cors_access_all());
        assert_eq!(
            config.missing(),
            vec![
                "DATABASE_URL",
                "VAPID_PUBLIC_KEY",
                "VAPID_PRIVATE_KEY",
                "VAPID_SUBJECT"
            ]
        );
    }

    #[test]
    fn test_missing_names_only_absent_items() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/push"),
            ("VAPID_PUBLIC_KEY", "BPub"),
            ("VAPID_SUBJECT", "  "),
        ]))
        .unwrap();

        assert_eq!(
            config.missing(),
            vec!["VAPID_PRIVATE_KEY", "VAPID_SUBJECT"]
        );

        match config.vapid() {
            Err(Error::MissingConfiguration(items)) => {
                assert_eq!(items, vec!["VAPID_PRIVATE_KEY", "VAPID_SUBJECT"])
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let err =
            Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let invalid = [("PUSH_URGENCY", "asap"), ("MAX_PUSH_TASKS", "0")];
        for pair in invalid {
            assert!(Config::from_lookup(lookup(&[pair])).is_err());
        }
    }

    #[test]
    fn test_lists_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("STATUS_CODES_TO_DELETE", "410"),
        ]))
        .unwrap();

        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(!config.cors_access_all());
        assert_eq!(config.status_code_to_delete, vec![410]);
    }

    #[test]
    fn test_parse_config_string() {
        let parsed = parse_config_string(concat!(
            "# comment\n",
            "DATABASE_URL=postgres://u:p@h/db?x=1\n",
            "\n",
            "VAPID_SUBJECT=\"mailto:ops@example.com\"\n",
            "broken line\n",
        ));

        assert_eq!(
            parsed,
            vec![
                (
                    String::from("DATABASE_URL"),
                    String::from("postgres://u:p@h/db?x=1")
                ),
                (
                    String::from("VAPID_SUBJECT"),
                    String::from("mailto:ops@example.com")
                ),
            ]
        );
    }
}
