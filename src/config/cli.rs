use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the mdkv binary.
#[derive(Debug, Parser)]
#[command(name = "mdkv", version, about = "Markdown to HTML conversion service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MDKV_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Render a file (or stdin) to stdout without touching the store.
    Convert(ConvertArgs),
    /// Inspect or reset the conversion history.
    History(HistoryArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackendArg {
    Memory,
    File,
    Postgres,
}

impl StoreBackendArg {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackendArg::Memory => "memory",
            StoreBackendArg::File => "file",
            StoreBackendArg::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverrides {
    /// Override the key-value store backend.
    #[arg(long = "store-backend", value_name = "BACKEND", value_enum)]
    pub store_backend: Option<StoreBackendArg>,

    /// Override the directory used by the file backend.
    #[arg(long = "store-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub store_directory: Option<PathBuf>,

    /// Override the database URL used by the postgres backend.
    #[arg(long = "store-database-url", value_name = "URL")]
    pub store_database_url: Option<String>,

    /// Override the per-call store timeout.
    #[arg(long = "store-timeout-ms", value_name = "MILLIS")]
    pub store_timeout_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub store: StoreOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

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

    /// Override the maximum accepted input size in bytes.
    #[arg(long = "render-max-input-bytes", value_name = "BYTES")]
    pub render_max_input_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    /// Stylesheet to wrap the rendered HTML with.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub css: Option<PathBuf>,

    /// Convert HTML to Markdown instead.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub reverse: bool,

    /// Input file; stdin when omitted.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub store: StoreOverrides,

    #[command(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum HistoryCommand {
    /// Print the history log as JSON.
    List,
    /// Remove every history entry.
    Clear,
}
