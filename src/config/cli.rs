use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the webclip binary.
#[derive(Debug, Parser)]
#[command(name = "webclip", version, about = "Web page clipping and PDF rendering service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "WEBCLIP_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the clip HTTP service.
    Serve(Box<ServeArgs>),
    /// Clip a single page and write the rendered document.
    Render(Box<RenderArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

/// Overrides shared by every command that runs the clip pipeline.
#[derive(Debug, Args, Default, Clone)]
pub struct PipelineOverrides {
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

    /// Override the wkhtmltopdf executable path.
    #[arg(long = "renderer-binary-path", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub renderer_binary_path: Option<PathBuf>,

    /// Log the full renderer argument list for every request.
    #[arg(
        long = "renderer-print-args",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub renderer_print_args: Option<bool>,

    /// Override the preset definitions file.
    #[arg(long = "presets-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub presets_file: Option<PathBuf>,

    /// Write every rewritten document below this directory.
    #[arg(long = "diagnostics-dump-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub dump_dir: Option<PathBuf>,

    /// Override the user agent sent when fetching source pages.
    #[arg(long = "fetch-user-agent", value_name = "AGENT")]
    pub fetch_user_agent: Option<String>,

    /// Override the source page fetch timeout.
    #[arg(long = "fetch-timeout-seconds", value_name = "SECONDS")]
    pub fetch_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub pipeline: PipelineOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the largest accepted request body in bytes.
    #[arg(long = "server-max-body-bytes", value_name = "BYTES")]
    pub server_max_body_bytes: Option<u64>,

    /// Override the number of concurrent renderer processes.
    #[arg(long = "renderer-workers", value_name = "COUNT")]
    pub renderer_workers: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: PipelineOverrides,

    /// Page to clip.
    #[arg(long, value_name = "URL", value_hint = ValueHint::Url)]
    pub url: String,

    /// Preset reference; repeat to apply several in order. `auto` matches by URL.
    #[arg(long = "preset", value_name = "NAME")]
    pub presets: Vec<String>,

    /// Render parameter using its form field name, e.g. `--param query=#main`.
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Output file, `-` for stdout.
    #[arg(long, value_name = "PATH", default_value = "-", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got `{raw}`")),
    }
}
