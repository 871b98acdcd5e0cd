use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 5;
const DEFAULT_LIST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct UserServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

/// Time bounds for store calls and for the connection lifecycle.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub operation_timeout: Duration,
    pub list_timeout: Duration,
    pub connect_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
            list_timeout: Duration::from_secs(DEFAULT_LIST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub environment: String,
    pub otlp_endpoint: String,
}

impl UserServiceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Resolves the service settings from `lookup` (normally the process environment).
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let is_prod = environment == "prod";

        let uri = match lookup("MONGO_URI") {
            Some(uri) => uri,
            None => compose_mongo_uri(
                &get_env(&lookup, "MONGO_USER", Some("root"), is_prod)?,
                &get_env(&lookup, "MONGO_PASSWORD", Some("password"), is_prod)?,
                &get_env(&lookup, "MONGO_HOST", Some("mongodb"), is_prod)?,
            ),
        };

        Ok(UserServiceConfig {
            common,
            mongodb: MongoConfig {
                uri,
                database: get_env(&lookup, "MONGO_DB", Some("go_api_demo"), is_prod)?,
                collection: "users".to_string(),
            },
            store: StoreConfig {
                operation_timeout: Duration::from_secs(
                    lookup("STORE_TIMEOUT_SECS")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS),
                ),
                list_timeout: Duration::from_secs(
                    lookup("STORE_LIST_TIMEOUT_SECS")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(DEFAULT_LIST_TIMEOUT_SECS),
                ),
                ..StoreConfig::default()
            },
            telemetry: TelemetryConfig {
                service_name: lookup("SERVICE_NAME").unwrap_or_else(|| "user-service".to_string()),
                otlp_endpoint: lookup("OTLP_ENDPOINT")
                    .unwrap_or_else(|| "http://tempo:4317".to_string()),
                environment,
            },
        })
    }
}

pub fn compose_mongo_uri(user: &str, password: &str, host: &str) -> String {
    format!(
        "mongodb://{}:{}@{}:27017/?authSource=admin",
        user, password, host
    )
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
