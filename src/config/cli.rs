use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the codebox binary.
#[derive(Debug, Parser)]
#[command(name = "codebox", version, about = "Live HTML/CSS/JS playground")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CODEBOX_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SettingsOverrides {
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

    /// Override the preview debounce window in milliseconds.
    #[arg(long = "debounce-ms", value_name = "MS", global = true)]
    pub debounce_ms: Option<u64>,

    /// Override the session file location.
    #[arg(
        long = "storage-path",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub storage_path: Option<PathBuf>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Assemble the stored session into a preview document.
    Assemble(AssembleArgs),
    /// Clear every stored buffer.
    Clear(ClearArgs),
    /// Reformat one stored buffer in place.
    Format(FormatArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct AssembleArgs {
    /// Replace the stored markup with the contents of a file.
    #[arg(long = "markup", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub markup: Option<PathBuf>,

    /// Replace the stored style sheet with the contents of a file.
    #[arg(long = "style", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub style: Option<PathBuf>,

    /// Replace the stored script with the contents of a file.
    #[arg(long = "script", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub script: Option<PathBuf>,

    /// Write the document to a file instead of stdout.
    #[arg(long = "out", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,

    /// Persist the overridden buffers back to the session.
    #[arg(long = "save")]
    pub save: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct FormatArgs {
    /// Buffer to format: html, css or js.
    #[arg(value_name = "LANGUAGE")]
    pub language: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ClearArgs {
    /// Skip the confirmation prompt.
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,
}
