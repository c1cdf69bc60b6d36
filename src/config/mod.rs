//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "webclip";
const ENV_PREFIX: &str = "WEBCLIP";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;
const DEFAULT_RENDERER_BINARY: &str = "wkhtmltopdf";
const DEFAULT_RENDERER_WORKERS: u64 = 10;
const DEFAULT_FETCH_USER_AGENT: &str = concat!("webclip/", env!("CARGO_PKG_VERSION"));
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub renderer: RendererSettings,
    pub fetch: FetchSettings,
    pub presets: PresetSettings,
    pub diagnostics: DiagnosticsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub max_body_bytes: usize,
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
pub struct RendererSettings {
    pub binary_path: PathBuf,
    /// Capacity of the admission gateway.
    pub workers: NonZeroUsize,
    pub print_args: bool,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct PresetSettings {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSettings {
    pub dump_dir: Option<PathBuf>,
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

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_pipeline_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

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
    renderer: RawRendererSettings,
    fetch: RawFetchSettings,
    presets: RawPresetSettings,
    diagnostics: RawDiagnosticsSettings,
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
        if let Some(bytes) = overrides.server_max_body_bytes {
            self.server.max_body_bytes = Some(bytes);
        }
        if let Some(workers) = overrides.renderer_workers {
            self.renderer.workers = Some(workers);
        }

        self.apply_pipeline_overrides(&overrides.pipeline);
    }

    fn apply_pipeline_overrides(&mut self, overrides: &PipelineOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.renderer_binary_path.as_ref() {
            self.renderer.binary_path = Some(path.clone());
        }
        if let Some(print_args) = overrides.renderer_print_args {
            self.renderer.print_args = Some(print_args);
        }
        if let Some(path) = overrides.presets_file.as_ref() {
            self.presets.file = Some(path.clone());
        }
        if let Some(dir) = overrides.dump_dir.as_ref() {
            self.diagnostics.dump_dir = Some(dir.clone());
        }
        if let Some(agent) = overrides.fetch_user_agent.as_ref() {
            self.fetch.user_agent = Some(agent.clone());
        }
        if let Some(seconds) = overrides.fetch_timeout_seconds {
            self.fetch.timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            renderer,
            fetch,
            presets,
            diagnostics,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            renderer: build_renderer_settings(renderer)?,
            fetch: build_fetch_settings(fetch)?,
            presets: PresetSettings {
                file: non_empty_path(presets.file),
            },
            diagnostics: DiagnosticsSettings {
                dump_dir: non_empty_path(diagnostics.dump_dir),
            },
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

    let max_body_bytes = non_zero_usize(
        server.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
        "server.max_body_bytes",
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        max_body_bytes: max_body_bytes.get(),
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

fn build_renderer_settings(renderer: RawRendererSettings) -> Result<RendererSettings, LoadError> {
    let binary_path = renderer
        .binary_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RENDERER_BINARY));
    if binary_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "renderer.binary_path",
            "path must not be empty",
        ));
    }

    let workers = non_zero_usize(
        renderer.workers.unwrap_or(DEFAULT_RENDERER_WORKERS),
        "renderer.workers",
    )?;

    Ok(RendererSettings {
        binary_path,
        workers,
        print_args: renderer.print_args.unwrap_or(false),
    })
}

fn build_fetch_settings(fetch: RawFetchSettings) -> Result<FetchSettings, LoadError> {
    let user_agent = fetch
        .user_agent
        .map(|agent| agent.trim().to_string())
        .filter(|agent| !agent.is_empty())
        .unwrap_or_else(|| DEFAULT_FETCH_USER_AGENT.to_string());

    let timeout_secs = fetch.timeout_seconds.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "fetch.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(FetchSettings {
        user_agent,
        timeout: Duration::from_secs(timeout_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    max_body_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRendererSettings {
    binary_path: Option<PathBuf>,
    workers: Option<u64>,
    print_args: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFetchSettings {
    user_agent: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPresetSettings {
    file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDiagnosticsSettings {
    dump_dir: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_empty_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|path| !path.as_os_str().is_empty())
}

#[cfg(test)]
mod tests;
