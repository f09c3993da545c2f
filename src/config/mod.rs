//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{MIN_SERVER_PORT, StoreBackend};

pub use cli::{
    CliArgs, Command, CommonOverrides, DeleteArgs, InvalidateArgs, ResolveArgs, ServeArgs,
    ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tessera";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_ROUTE_SNAPSHOT: &str = "route_cache.json";
const DEFAULT_RESERVED_PREFIX: &str = "system";
const DEFAULT_CACHE_NAMESPACE: &str = "tessera";
const DEFAULT_CACHE_SERVER_IP: &str = "127.0.0.1";
const DEFAULT_CACHE_SERVER_PORT: u32 = 11211;
const DEFAULT_DEPENDENCY_SNAPSHOT: &str = "deplist.json";
const DEFAULT_CACHE_IO_TIMEOUT_MS: u64 = 250;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub routing: RoutingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RoutingSettings {
    /// Send unmatched paths to the root index handler instead of a 404.
    pub user_404: bool,
    /// Resolve through the persisted route table.
    pub cache_route: bool,
    pub route_snapshot_path: PathBuf,
    /// First path segments rejected before resolution.
    pub reserved_prefixes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub cache_content: bool,
    pub namespace: String,
    pub backend: StoreBackend,
    pub server_ip: IpAddr,
    pub server_port: u16,
    pub dependency_snapshot_path: PathBuf,
    pub io_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("TESSERA")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("routing.reserved_prefixes")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_common_overrides(&cli.overrides);
    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(_) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    routing: RawRoutingSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(cache_route) = overrides.cache_route {
            self.routing.cache_route = Some(cache_route);
        }
        if let Some(user_404) = overrides.user_404 {
            self.routing.user_404 = Some(user_404);
        }
        if let Some(path) = overrides.route_snapshot_path.as_ref() {
            self.routing.route_snapshot_path = Some(path.clone());
        }
        if let Some(namespace) = overrides.cache_namespace.as_ref() {
            self.cache.namespace = Some(namespace.clone());
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(ip) = overrides.cache_server_ip.as_ref() {
            self.cache.server_ip = Some(ip.clone());
        }
        if let Some(port) = overrides.cache_server_port {
            self.cache.server_port = Some(port);
        }
        if let Some(path) = overrides.dependency_snapshot_path.as_ref() {
            self.cache.dependency_snapshot_path = Some(path.clone());
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(cache_content) = overrides.cache_content {
            self.cache.cache_content = Some(cache_content);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            routing,
            cache,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let routing = build_routing_settings(routing)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            server,
            logging,
            routing,
            cache,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_routing_settings(routing: RawRoutingSettings) -> Result<RoutingSettings, LoadError> {
    let route_snapshot_path = routing
        .route_snapshot_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROUTE_SNAPSHOT));
    if route_snapshot_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "routing.route_snapshot_path",
            "path must not be empty",
        ));
    }

    let reserved_prefixes = routing
        .reserved_prefixes
        .unwrap_or_else(|| vec![DEFAULT_RESERVED_PREFIX.to_string()])
        .into_iter()
        .map(|prefix| prefix.trim().trim_matches('/').to_string())
        .filter(|prefix| !prefix.is_empty())
        .collect();

    Ok(RoutingSettings {
        user_404: routing.user_404.unwrap_or(false),
        cache_route: routing.cache_route.unwrap_or(false),
        route_snapshot_path,
        reserved_prefixes,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let namespace = cache
        .namespace
        .unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE.to_string());
    if namespace.trim().is_empty() {
        return Err(LoadError::invalid(
            "cache.namespace",
            "namespace must not be empty",
        ));
    }

    let backend = match cache.backend {
        Some(value) => StoreBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("cache.backend", reason))?,
        None => StoreBackend::Memcached,
    };

    let server_ip = cache
        .server_ip
        .unwrap_or_else(|| DEFAULT_CACHE_SERVER_IP.to_string());
    let server_ip = IpAddr::from_str(server_ip.trim()).map_err(|err| {
        LoadError::invalid("cache.server_ip", format!("`{server_ip}` is not an IP: {err}"))
    })?;

    let server_port = cache.server_port.unwrap_or(DEFAULT_CACHE_SERVER_PORT);
    let server_port = u16::try_from(server_port)
        .ok()
        .filter(|port| *port >= MIN_SERVER_PORT)
        .ok_or_else(|| {
            LoadError::invalid(
                "cache.server_port",
                format!("{server_port} is outside {MIN_SERVER_PORT}-65535"),
            )
        })?;

    let dependency_snapshot_path = cache
        .dependency_snapshot_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPENDENCY_SNAPSHOT));
    if dependency_snapshot_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.dependency_snapshot_path",
            "path must not be empty",
        ));
    }

    let io_timeout_ms = cache.io_timeout_ms.unwrap_or(DEFAULT_CACHE_IO_TIMEOUT_MS);
    if io_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.io_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        cache_content: cache.cache_content.unwrap_or(false),
        namespace,
        backend,
        server_ip,
        server_port,
        dependency_snapshot_path,
        io_timeout: Duration::from_millis(io_timeout_ms),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRoutingSettings {
    user_404: Option<bool>,
    cache_route: Option<bool>,
    route_snapshot_path: Option<PathBuf>,
    reserved_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    cache_content: Option<bool>,
    namespace: Option<String>,
    backend: Option<String>,
    server_ip: Option<String>,
    server_port: Option<u32>,
    dependency_snapshot_path: Option<PathBuf>,
    io_timeout_ms: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
