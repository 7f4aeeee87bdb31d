//! malt - a small tiling terminal multiplexer
//!
//! malt runs several shells side by side in one terminal. Each shell gets
//! its own pseudo-terminal and a bordered box; boxes are tiled automatically
//! as sessions come and go.
//!
//! # Quick Start
//!
//! ```text
//! malt               # Start with the configured shell (bash)
//! malt -s zsh        # Start with zsh
//! ```
//!
//! # Keybindings (Ctrl+A prefix)
//!
//! | Key | Action |
//! |-----|--------|
//! | c / C | New session |
//! | q | Quit |
//! | Up / Right | Focus next session |
//! | Down / Left | Focus previous session |
//!
//! Clicking a session focuses it.

mod app;
mod config;
mod core;
mod signals;
mod ui;
mod wm;

use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::App;
use crate::config::Config;
use crate::ui::{Renderer, TerminalGuard};
use crate::wm::SessionManager;

/// Environment variable holding a log filter that overrides the config
const LOG_ENV: &str = "MALT_LOG";

/// Command line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    shell: Option<String>,
    config: Option<PathBuf>,
    log: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Run(Options),
    Help,
    Version,
}

fn print_help() {
    println!(
        r#"malt {} - a small tiling terminal multiplexer

USAGE:
    malt [OPTIONS]

OPTIONS:
    -s, --shell <CMD>     Shell to run in each session (default: bash)
    -c, --config <PATH>   Read configuration from PATH
        --log <PATH>      Write the log to PATH
    -h, --help            Print this help
    -v, --version         Print version

KEYBINDINGS (prefix Ctrl+A):
    c, C                  New session
    q                     Quit
    Up, Right             Focus next session
    Down, Left            Focus previous session

Configuration is read from ~/.malt/config.toml; set {} to override the log filter."#,
        env!("CARGO_PKG_VERSION"),
        LOG_ENV
    );
}

fn print_version() {
    println!("malt {}", env!("CARGO_PKG_VERSION"));
}

/// Parse command line arguments (program name excluded)
fn parse_args<I>(args: I) -> Result<Invocation, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "-v" | "--version" => return Ok(Invocation::Version),
            "-s" | "--shell" => {
                options.shell = Some(args.next().ok_or("Missing shell argument")?);
            }
            "-c" | "--config" => {
                let path = args.next().ok_or("Missing config path")?;
                options.config = Some(PathBuf::from(path));
            }
            "--log" => {
                let path = args.next().ok_or("Missing log path")?;
                options.log = Some(PathBuf::from(path));
            }
            other => {
                return Err(format!("Unknown argument: {}. Use -h for help.", other));
            }
        }
    }

    Ok(Invocation::Run(options))
}

/// Send tracing output to the log file; the terminal belongs to the renderer
fn init_logging(config: &Config) {
    let Some(log_path) = config.log_path() else {
        return;
    };
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) else {
        return;
    };

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<()> {
    let options = match parse_args(env::args().skip(1)) {
        Ok(Invocation::Run(options)) => options,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            print_version();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(2);
        }
    };

    // Command line values override the file
    let (mut config, config_error) = match &options.config {
        Some(path) => (
            Config::load_from(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None,
        ),
        None => Config::load(),
    };
    if let Some(shell) = options.shell {
        config.shell = shell;
        config.shell_args.clear();
    }
    if let Some(log) = options.log {
        config.log_file = Some(log);
    }

    init_logging(&config);
    info!("malt {} starting", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        warn!("{}; using defaults", e);
    }

    let (cols, rows) = ui::terminal::size().context("failed to query terminal size")?;
    info!(cols, rows, shell = %config.shell, "terminal");

    signals::install_handlers().context("failed to install signal handlers")?;
    crate::core::export_term();

    let mut manager = SessionManager::new(cols, rows, config.shell_command());
    manager
        .spawn()
        .with_context(|| format!("failed to start {}", config.shell))?;

    let result = {
        let _guard = TerminalGuard::enter().context("failed to enter raw mode")?;
        let renderer = Renderer::new(BufWriter::new(io::stdout()), config.palette());
        let mut app = App::new(manager, renderer, config.poll_timeout_ms);
        app.run()
    };

    match &result {
        Ok(()) => info!("malt exiting"),
        Err(e) => error!("malt exiting: {:#}", e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(parse_args(args(&[])), Ok(Invocation::Run(Options::default())));
    }

    #[test]
    fn test_all_options() {
        let parsed = parse_args(args(&["-s", "zsh", "--config", "/tmp/c.toml", "--log", "/tmp/m.log"]));
        assert_eq!(
            parsed,
            Ok(Invocation::Run(Options {
                shell: Some("zsh".to_string()),
                config: Some(PathBuf::from("/tmp/c.toml")),
                log: Some(PathBuf::from("/tmp/m.log")),
            }))
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args(args(&["--help"])), Ok(Invocation::Help));
        assert_eq!(parse_args(args(&["-v"])), Ok(Invocation::Version));
    }

    #[test]
    fn test_errors() {
        assert!(parse_args(args(&["--shell"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
    }
}
