//! Everything needed for parsing Gopa's CLI arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Struct containing the CLI configuration for Gopa.
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Specify the log level of the interpreter.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    pub verbosity: LogLevel,
}

impl Cli {
    pub fn init() -> Self {
        Cli::parse()
    }
}

/// Enum for specifying the log level of Gopa.
#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogLevel {
    /// The default log level. Only critical errors will be logged.
    #[default]
    #[value(alias("0"))]
    Error,

    /// A log level, where also warnings (like a failing scheduled task) are logged.
    #[value(alias("1"))]
    Warn,

    /// Also log information about the general state of the interpreter.
    #[value(alias("2"))]
    Info,

    /// Log everything which happens internally in the interpreter.
    #[value(alias("3"))]
    Debug,

    /// Log extra information, including non-critical parse/runtime noise.
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a Gopa source file.
    Run(RunArgs),

    /// Start an interactive Gopa session.
    Repl(ReplArgs),

    /// Run the bundled conformance test suite (tests/cases vs tests/expected).
    Test,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// The path to the .gopa source file.
    #[arg(index = 1)]
    pub file: std::path::PathBuf,

    /// Comma-separated capability grants: network,files,graphics,sound,
    /// packages,python,server,timers,cron. Omit for a fully sandboxed run.
    #[arg(long = "perm", visible_alias = "permissions", default_value = "")]
    pub perm: String,

    /// Let runtime errors propagate and abort the program instead of being
    /// caught at each top-level statement.
    #[arg(long)]
    pub debug: bool,

    /// Keep the process alive after the program's top-level statements
    /// finish, pumping the scheduler once a second for servers/cron/every.
    #[arg(long)]
    pub forever: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReplArgs {
    /// Comma-separated capability grants, same syntax as `run --perm`.
    #[arg(long = "perm", visible_alias = "permissions", default_value = "")]
    pub perm: String,

    /// Let runtime errors propagate and abort the session instead of being
    /// caught and printed per top-level statement.
    #[arg(long)]
    pub debug: bool,
}
