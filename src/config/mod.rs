use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    /// Prefix used to build the full short URL, e.g. `https://qr.example.com`
    pub redirect_base_url: String,
    pub redirect_status: RedirectMode,
    pub short_code_length: usize,
    pub cache: CacheConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
}

/// Status code used for short-code redirects. Scans must not be cached by
/// browsers, so only non-permanent redirects are offered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    /// 302 Found
    #[default]
    Found,
    /// 307 Temporary Redirect
    Temporary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Ignore forwarding headers and use the socket address
    #[default]
    None,
    /// Honor `Forwarded` / `X-Forwarded-For`
    Standard,
    /// Honor `CF-Connecting-IP`
    Cloudflare,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    /// Proxies allowed to set forwarding headers. Empty means any peer.
    pub trusted_proxies: Vec<IpNet>,
    /// Number of proxy hops to skip from the right of `X-Forwarded-For`
    pub num_trusted_proxies: Option<usize>,
}

pub const MIN_SHORT_CODE_LENGTH: usize = 4;
pub const MAX_SHORT_CODE_LENGTH: usize = 32;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = parse_backend(&env_or("DATABASE_BACKEND", "sqlite"));
        let database_url = env_or("DATABASE_URL", "sqlite://./qrtrack.db?mode=rwc");
        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = env_or("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a valid port")?;

        let redirect_host = env_or("REDIRECT_HOST", "127.0.0.1");
        let redirect_port = env_or("REDIRECT_PORT", "3000")
            .parse::<u16>()
            .context("REDIRECT_PORT must be a valid port")?;

        let redirect_base_url = env_or("REDIRECT_BASE_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();

        let redirect_status = parse_redirect_mode(&env_or("REDIRECT_STATUS", "found"));

        let short_code_length = env_or("SHORT_CODE_LENGTH", "7")
            .parse::<usize>()
            .context("SHORT_CODE_LENGTH must be an integer")?;
        if !(MIN_SHORT_CODE_LENGTH..=MAX_SHORT_CODE_LENGTH).contains(&short_code_length) {
            anyhow::bail!(
                "SHORT_CODE_LENGTH must be between {MIN_SHORT_CODE_LENGTH} and {MAX_SHORT_CODE_LENGTH}"
            );
        }

        let cache_max_entries = env_or("CACHE_MAX_ENTRIES", "10000")
            .parse::<u64>()
            .context("CACHE_MAX_ENTRIES must be an integer")?;
        let cache_ttl_secs = env_or("CACHE_TTL_SECS", "300")
            .parse::<u64>()
            .context("CACHE_TTL_SECS must be an integer")?;

        let trusted_proxy_mode = parse_proxy_mode(&env_or("TRUSTED_PROXY_MODE", "none"));
        let trusted_proxies = parse_trusted_proxies(&env_or("TRUSTED_PROXIES", ""))?;
        let num_trusted_proxies = match std::env::var("NUM_TRUSTED_PROXIES") {
            Ok(v) => Some(
                v.parse::<usize>()
                    .context("NUM_TRUSTED_PROXIES must be an integer")?,
            ),
            Err(_) => None,
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            redirect_base_url,
            redirect_status,
            short_code_length,
            cache: CacheConfig {
                max_entries: cache_max_entries,
                ttl_secs: cache_ttl_secs,
            },
            proxy: ProxyConfig {
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_backend(value: &str) -> DatabaseBackend {
    match value.to_lowercase().as_str() {
        "postgres" | "postgresql" => DatabaseBackend::Postgres,
        "sqlite" => DatabaseBackend::Sqlite,
        other => {
            tracing::warn!("Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'");
            DatabaseBackend::Sqlite
        }
    }
}

fn parse_redirect_mode(value: &str) -> RedirectMode {
    match value.to_lowercase().as_str() {
        "found" | "302" => RedirectMode::Found,
        "temporary" | "307" => RedirectMode::Temporary,
        other => {
            tracing::warn!(
                "Unknown REDIRECT_STATUS '{other}', falling back to 'found'. Supported values: found, temporary"
            );
            RedirectMode::Found
        }
    }
}

fn parse_proxy_mode(value: &str) -> TrustedProxyMode {
    match value.to_lowercase().as_str() {
        "none" => TrustedProxyMode::None,
        "standard" => TrustedProxyMode::Standard,
        "cloudflare" => TrustedProxyMode::Cloudflare,
        other => {
            tracing::warn!(
                "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
            );
            TrustedProxyMode::None
        }
    }
}

fn parse_trusted_proxies(value: &str) -> anyhow::Result<Vec<IpNet>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            // Bare addresses are accepted as single-host networks
            s.parse::<IpNet>()
                .or_else(|_| s.parse::<std::net::IpAddr>().map(IpNet::from))
                .with_context(|| format!("invalid TRUSTED_PROXIES entry '{s}'"))
        })
        .collect()
}
