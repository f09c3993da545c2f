//! Page cache configuration.

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use super::CacheError;

const DEFAULT_NAMESPACE: &str = "tessera";
const DEFAULT_SERVER_PORT: u16 = 11211;
const DEFAULT_DEPENDENCY_SNAPSHOT: &str = "deplist.json";
const DEFAULT_IO_TIMEOUT_MS: u64 = 250;

/// Lowest port the cache server may listen on.
pub const MIN_SERVER_PORT: u16 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memcached,
    Memory,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Memcached => "memcached",
            StoreBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memcached" => Ok(StoreBackend::Memcached),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!(
                "unknown cache backend `{other}`, expected `memcached` or `memory`"
            )),
        }
    }
}

/// Settings the tracker and the page cache middleware run with.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Store successful GET responses.
    pub cache_content: bool,
    /// Prefix prepended to every store key.
    pub namespace: String,
    pub backend: StoreBackend,
    pub server_ip: IpAddr,
    pub server_port: u16,
    pub dependency_snapshot_path: PathBuf,
    /// Socket read/write timeout for the memcached connection.
    pub io_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_content: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            backend: StoreBackend::Memcached,
            server_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            server_port: DEFAULT_SERVER_PORT,
            dependency_snapshot_path: PathBuf::from(DEFAULT_DEPENDENCY_SNAPSHOT),
            io_timeout: Duration::from_millis(DEFAULT_IO_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            cache_content: settings.cache_content,
            namespace: settings.namespace.clone(),
            backend: settings.backend,
            server_ip: settings.server_ip,
            server_port: settings.server_port,
            dependency_snapshot_path: settings.dependency_snapshot_path.clone(),
            io_timeout: settings.io_timeout,
        }
    }
}

impl CacheConfig {
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.server_port)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.namespace.trim().is_empty() {
            return Err(CacheError::configuration("cache namespace must not be empty"));
        }
        if self.server_port < MIN_SERVER_PORT {
            return Err(CacheError::configuration(format!(
                "cache server port {} is outside {MIN_SERVER_PORT}-65535",
                self.server_port
            )));
        }
        if self.io_timeout.is_zero() {
            return Err(CacheError::configuration(
                "cache io timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}
