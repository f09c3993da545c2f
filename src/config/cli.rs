use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Tessera binary.
#[derive(Debug, Parser)]
#[command(name = "tessera", version, about = "Tessera page cache server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TESSERA_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CommonOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Rebuild the dependency snapshot and print it.
    Index,
    /// Rebuild the route snapshot and print it.
    Routes,
    /// Resolve a request path in the configured routing mode.
    Resolve(ResolveArgs),
    /// Evict every page affected by a data key mutation.
    Invalidate(InvalidateArgs),
    /// Delete a single store key as given.
    Delete(DeleteArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    /// Request path, e.g. `/news/42/`.
    #[arg(value_name = "PATH")]
    pub path: String,
}

#[derive(Debug, Args, Clone)]
pub struct InvalidateArgs {
    /// Data key that was written.
    #[arg(value_name = "KEY")]
    pub key: String,

    /// JSON payload passed to the handlers' invalidation rules.
    #[arg(value_name = "PAYLOAD_JSON")]
    pub payload: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct DeleteArgs {
    /// Full store key, namespace included.
    #[arg(value_name = "KEY")]
    pub key: String,
}

/// Overrides accepted by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Toggle the precomputed route table.
    #[arg(
        long = "routing-cache-route",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_route: Option<bool>,

    /// Route unmatched paths to the root index handler.
    #[arg(
        long = "routing-user-404",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub user_404: Option<bool>,

    /// Override the page cache namespace.
    #[arg(long = "cache-namespace", value_name = "NAMESPACE", global = true)]
    pub cache_namespace: Option<String>,

    /// Override the page store backend (memcached|memory).
    #[arg(long = "cache-backend", value_name = "BACKEND", global = true)]
    pub cache_backend: Option<String>,

    /// Override the memcached server address.
    #[arg(long = "cache-server-ip", value_name = "IP", global = true)]
    pub cache_server_ip: Option<String>,

    /// Override the memcached server port.
    #[arg(long = "cache-server-port", value_name = "PORT", global = true)]
    pub cache_server_port: Option<u32>,

    /// Override the dependency snapshot location.
    #[arg(
        long = "cache-dependency-snapshot",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub dependency_snapshot_path: Option<PathBuf>,

    /// Override the route snapshot location.
    #[arg(
        long = "routing-snapshot",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub route_snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Toggle storing rendered pages.
    #[arg(
        long = "cache-content",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_content: Option<bool>,
}
