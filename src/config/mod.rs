pub mod routes;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use routes::{load_routes, parse_routes, BlockError, RouteConfig, RouteConfigError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub filter: FilterConfig,
    pub client_ip: ClientIpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Route definition file
    pub routes_file: String,
    /// Directory `if_allowed` / `if_blocked` refs are resolved against
    pub template_dir: String,
    /// Directory served under the static prefix
    pub static_dir: String,
    /// `Domain` attribute of the visitor cookie; omitted when empty
    pub cookie_domain: String,
    /// MaxMind City or Country database; lookups resolve to nothing when unset
    pub geoip_db_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket peer address only
    None,
    /// Trust `Forwarded` / `X-Forwarded-For`
    Standard,
    /// Trust `CF-Connecting-IP`
    Cloudflare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIpConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    pub num_trusted_proxies: Option<usize>,
}

impl Default for ClientIpConfig {
    fn default() -> Self {
        Self {
            trusted_proxy_mode: TrustedProxyMode::None,
            num_trusted_proxies: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./lib/cookie.db".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let host = std::env::var("LISTEN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("LISTEN_PORT")
            .unwrap_or_else(|_| "80".to_string())
            .parse::<u16>()
            .context("LISTEN_PORT must be a valid port number")?;
        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .context("REQUEST_TIMEOUT_SECS must be a number of seconds")?;

        let trusted_proxy_mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };
        let num_trusted_proxies = match std::env::var("NUM_TRUSTED_PROXIES") {
            Ok(v) => Some(
                v.parse::<usize>()
                    .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?,
            ),
            Err(_) => None,
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig {
                host,
                port,
                request_timeout_secs,
            },
            filter: FilterConfig {
                routes_file: std::env::var("ROUTES_FILE")
                    .unwrap_or_else(|_| "routes.txt".to_string()),
                template_dir: std::env::var("TEMPLATE_DIR")
                    .unwrap_or_else(|_| "./template".to_string()),
                static_dir: std::env::var("STATIC_DIR")
                    .unwrap_or_else(|_| "./static".to_string()),
                cookie_domain: std::env::var("COOKIE_DOMAIN").unwrap_or_default(),
                geoip_db_path: std::env::var("GEOIP_DB_PATH").ok(),
            },
            client_ip: ClientIpConfig {
                trusted_proxy_mode,
                num_trusted_proxies,
            },
        })
    }
}
