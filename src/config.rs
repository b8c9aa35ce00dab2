use anyhow::{anyhow, Context, Result};
use std::{
    env::{self, VarError},
    net::SocketAddr,
    path::PathBuf,
};

pub const LISTEN_ADDR_ENV: &str = "LISTEN_ADDR";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS_ENV: &str = "DATABASE_MAX_CONNECTIONS";
pub const TRACE_LOG_FILE_ENV: &str = "TRACE_LOG_FILE";
pub const CORS_CONFIG_FILE_ENV: &str = "CORS_CONFIG_FILE";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3030";
const DEFAULT_TRACE_LOG_FILE: &str = "logs/tracing.log";
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub trace_log_file: PathBuf,
    pub cors_config_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let listen_addr_str =
            env::var(LISTEN_ADDR_ENV).unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr_str.parse::<SocketAddr>().with_context(|| {
            format!(
                "environment variable {LISTEN_ADDR_ENV} expected to be a socket address, got {listen_addr_str}"
            )
        })?;

        let database_url = match env::var(DATABASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url,
            Ok(_) | Err(VarError::NotPresent) => {
                return Err(anyhow!("environment variable {DATABASE_URL_ENV} must be set"))
            }
            Err(VarError::NotUnicode(_)) => {
                return Err(anyhow!(
                    "environment variable {DATABASE_URL_ENV} must be valid UTF-8"
                ))
            }
        };

        let database_max_connections = parse_u32_env(
            DATABASE_MAX_CONNECTIONS_ENV,
            DEFAULT_DATABASE_MAX_CONNECTIONS,
        )?;
        if database_max_connections == 0 {
            return Err(anyhow!(
                "environment variable {DATABASE_MAX_CONNECTIONS_ENV} must be greater than zero"
            ));
        }

        let trace_log_file = PathBuf::from(
            env::var(TRACE_LOG_FILE_ENV).unwrap_or_else(|_| DEFAULT_TRACE_LOG_FILE.to_string()),
        );

        let cors_config_file = env::var_os(CORS_CONFIG_FILE_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            listen_addr,
            database_url,
            database_max_connections,
            trace_log_file,
            cors_config_file,
        })
    }
}

fn parse_u32_env(key: &str, default: u32) -> Result<u32> {
    match env::var(key) {
        Ok(value) => value.parse::<u32>().with_context(|| {
            format!("environment variable {key} expected to be a positive integer, got {value}")
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => {
            Err(anyhow!("environment variable {key} must be valid UTF-8"))
        }
    }
}
