use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hoverfly-run",
    version,
    about = "Run a command against a Hoverfly sandbox in record or replay mode"
)]
pub struct Cli {
    /// Path to a TOML config file (default: ./hoverfly.toml if present)
    #[arg(long, env = "HOVERFLY_HARNESS_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory with simulation files. Environment variables are expanded.
    #[arg(long, global = true, value_name = "DIR")]
    pub simulation_path: Option<PathBuf>,

    /// Hoverfly image for a managed container
    #[arg(long, global = true)]
    pub image: Option<String>,

    /// Hoverfly's CA certificate, so HTTPS clients trust it
    #[arg(long, global = true, value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// Seconds to wait for the container to become ready
    #[arg(long, global = true, value_name = "SECONDS")]
    pub start_timeout: Option<f64>,

    /// Arguments for the hoverfly command. Passed as is.
    #[arg(long = "hoverfly-args", global = true, allow_hyphen_values = true)]
    pub hoverfly_args: Option<String>,

    /// When to colorize output
    #[arg(long, value_enum, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Debug, Copy, Default)]
pub enum ColorChoice {
    /// Colorize if the terminal supports it
    #[default]
    Auto,
    /// Always colorize output
    Always,
    /// Never colorize output
    Never,
}

impl ColorChoice {
    pub fn apply(self) {
        match self {
            ColorChoice::Auto => {}
            ColorChoice::Always => colored::control::set_override(true),
            ColorChoice::Never => colored::control::set_override(false),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provide a Hoverfly instance to a command through HOVERFLY_HOST,
    /// HOVERFLY_ADMIN_PORT and HOVERFLY_PROXY_PORT
    Serve {
        /// Command to run, after `--`
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
    /// Run a command with its HTTP traffic replayed from, or recorded to, a
    /// simulation file
    #[command(after_help = "DIRECTIVE is NAME[,record][,stateful], e.g. `archive_org,record`")]
    Session {
        /// Simulation to use and how
        directive: String,

        /// Command to run, after `--`
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}
