//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "mediateca";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 900;
const DEFAULT_CACHE_CAPACITY: usize = 1024;
const DEFAULT_FILES_BASE_URI: &str = "https://files.mediateca.example";
const DEFAULT_FILES_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DEFINITIONS_DIR: &str = "definitions";

/// Command-line arguments for the Mediateca binary.
#[derive(Debug, Parser)]
#[command(name = "mediateca", version, about = "Mediateca listing service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "MEDIATECA_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Mediateca HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
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

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the base listing-cache expiration.
    #[arg(long = "cache-expiration-seconds", value_name = "SECONDS")]
    pub cache_expiration_seconds: Option<u64>,

    /// Override the listing-cache entry capacity.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,

    /// Override the public files base URI.
    #[arg(long = "files-base-uri", value_name = "URI")]
    pub files_base_uri: Option<String>,

    /// Override the files gateway endpoint.
    #[arg(long = "files-gateway-url", value_name = "URL")]
    pub files_gateway_url: Option<String>,

    /// Override the files gateway request timeout.
    #[arg(long = "files-timeout-seconds", value_name = "SECONDS")]
    pub files_timeout_seconds: Option<u64>,

    /// Override the definition-set directory.
    #[arg(long = "definitions-directory", value_name = "PATH")]
    pub definitions_directory: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub files: FilesSettings,
    pub definitions: DefinitionsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: SocketAddr,
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
pub struct CacheSettings {
    /// Base TTL. Assembled responses live half of this; row and total
    /// hints live the full span.
    pub expiration: Duration,
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct FilesSettings {
    /// Public base URI the stored media sentinel resolves against; kept
    /// without a trailing slash.
    pub base_uri: String,
    /// Files service endpoint; `None` disables attachment lookup.
    pub gateway_url: Option<Url>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DefinitionsSettings {
    pub directory: PathBuf,
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

    builder = builder.add_source(Environment::with_prefix("MEDIATECA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    files: RawFilesSettings,
    definitions: RawDefinitionsSettings,
}

impl RawSettings {
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
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.cache_expiration_seconds {
            self.cache.expiration_seconds = Some(seconds);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(base) = overrides.files_base_uri.as_ref() {
            self.files.base_uri = Some(base.clone());
        }
        if let Some(url) = overrides.files_gateway_url.as_ref() {
            self.files.gateway_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.files_timeout_seconds {
            self.files.timeout_seconds = Some(seconds);
        }
        if let Some(directory) = overrides.definitions_directory.as_ref() {
            self.definitions.directory = Some(directory.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            files,
            definitions,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let files = build_files_settings(files)?;
        let definitions = build_definitions_settings(definitions)?;

        Ok(Self {
            server,
            logging,
            cache,
            files,
            definitions,
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

    let listen = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.listen", reason))?;

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
        listen,
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

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let expiration_secs = cache
        .expiration_seconds
        .unwrap_or(DEFAULT_CACHE_EXPIRATION_SECS);
    if expiration_secs == 0 {
        return Err(LoadError::invalid(
            "cache.expiration_seconds",
            "must be greater than zero",
        ));
    }

    let capacity_value = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    let capacity = NonZeroUsize::new(capacity_value)
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        expiration: Duration::from_secs(expiration_secs),
        capacity,
    })
}

fn build_files_settings(files: RawFilesSettings) -> Result<FilesSettings, LoadError> {
    let base_uri = files
        .base_uri
        .unwrap_or_else(|| DEFAULT_FILES_BASE_URI.to_string());
    let base_uri = base_uri.trim().trim_end_matches('/').to_string();
    if base_uri.is_empty() {
        return Err(LoadError::invalid(
            "files.base_uri",
            "base URI must not be empty",
        ));
    }

    let gateway_url = match files.gateway_url.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(Url::parse(raw).map_err(|err| {
            LoadError::invalid("files.gateway_url", format!("invalid URL `{raw}`: {err}"))
        })?),
    };

    let timeout_secs = files.timeout_seconds.unwrap_or(DEFAULT_FILES_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "files.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(FilesSettings {
        base_uri,
        gateway_url,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_definitions_settings(
    definitions: RawDefinitionsSettings,
) -> Result<DefinitionsSettings, LoadError> {
    let directory = definitions
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DEFINITIONS_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "definitions.directory",
            "path must not be empty",
        ));
    }

    Ok(DefinitionsSettings { directory })
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
struct RawCacheSettings {
    expiration_seconds: Option<u64>,
    capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFilesSettings {
    base_uri: Option<String>,
    gateway_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDefinitionsSettings {
    directory: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
