use anyhow::{Context, Result};
use axum::http::{HeaderName, HeaderValue, Method};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};

const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::HEAD, Method::OPTIONS];

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Empty, or containing `"*"`, allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Empty allows any request header.
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    pub fn layer(&self) -> Result<CorsLayer> {
        let origin = if self.allowed_origins.is_empty()
            || self.allowed_origins.iter().any(|origin| origin == "*")
        {
            AllowOrigin::from(Any)
        } else {
            let origins = self
                .allowed_origins
                .iter()
                .map(|origin| {
                    HeaderValue::from_str(origin)
                        .with_context(|| format!("invalid CORS origin {origin}"))
                })
                .collect::<Result<Vec<_>>>()?;
            AllowOrigin::list(origins)
        };

        let headers = if self.allowed_headers.is_empty() {
            AllowHeaders::from(Any)
        } else {
            let headers = self
                .allowed_headers
                .iter()
                .map(|name| {
                    HeaderName::from_bytes(name.as_bytes())
                        .with_context(|| format!("invalid CORS header name {name}"))
                })
                .collect::<Result<Vec<_>>>()?;
            AllowHeaders::list(headers)
        };

        let mut layer = CorsLayer::new()
            .allow_origin(origin)
            .allow_headers(headers)
            .allow_methods(ALLOWED_METHODS);
        if let Some(secs) = self.max_age_secs {
            layer = layer.max_age(Duration::from_secs(secs));
        }
        Ok(layer)
    }
}

pub fn read_cors_config_file(toml_config: &Path) -> Result<CorsConfig> {
    let contents = fs::read_to_string(toml_config)
        .with_context(|| format!("failed to read CORS config file {}", toml_config.display()))?;

    if contents.trim().is_empty() {
        return Ok(CorsConfig::default());
    }

    #[derive(Deserialize)]
    struct CorsConfigWrapper {
        cors: CorsConfig,
    }

    toml::from_str::<CorsConfigWrapper>(&contents)
        .map(|wrapper| wrapper.cors)
        .with_context(|| {
            format!(
                "failed to parse CORS config file {}",
                toml_config.display()
            )
        })
}
