//! Configuration for malt.
//!
//! Settings are read from `~/.malt/config.toml`:
//!
//! ```toml
//! # Shell started in every session
//! shell = "zsh"
//! shell_args = ["-l"]
//!
//! # Event loop wake-up interval
//! poll_timeout_ms = 10000
//!
//! # Log level and destination (MALT_LOG overrides the level)
//! log_level = "debug"
//! log_file = "/tmp/malt.log"
//!
//! [colors]
//! focused = { r = 0, g = 128, b = 64 }
//! unfocused = { r = 64, g = 64, b = 64 }
//! cursor_marker = { r = 128, g = 128, b = 128 }
//! ```
//!
//! Every field is optional.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ShellCommand;
use crate::ui::Palette;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell program for new sessions
    pub shell: String,
    /// Extra arguments for the shell
    pub shell_args: Vec<String>,
    /// Maximum time the event loop sleeps in poll
    pub poll_timeout_ms: u32,
    /// Default log filter
    pub log_level: String,
    /// Log destination; `~/.malt/malt.log` when unset
    pub log_file: Option<PathBuf>,
    pub colors: ColorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            shell_args: Vec::new(),
            poll_timeout_ms: 10_000,
            log_level: "info".to_string(),
            log_file: None,
            colors: ColorConfig::default(),
        }
    }
}

/// Border colours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub focused: Color,
    pub unfocused: Color,
    pub cursor_marker: Color,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            focused: Color::new(0, 128, 64),
            unfocused: Color::new(64, 64, 64),
            cursor_marker: Color::new(128, 128, 128),
        }
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

impl Config {
    /// Load `~/.malt/config.toml`, falling back to defaults.
    ///
    /// A file that exists but cannot be used is returned as the error, to be
    /// logged once logging is up.
    pub fn load() -> (Self, Option<ConfigError>) {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_or_default(&path),
            _ => (Self::default(), None),
        }
    }

    pub fn load_or_default(path: &Path) -> (Self, Option<ConfigError>) {
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.malt`
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".malt"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Where logs go: the configured file or `~/.malt/malt.log`
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| Self::config_dir().map(|dir| dir.join("malt.log")))
    }

    pub fn shell_command(&self) -> ShellCommand {
        ShellCommand::new(self.shell.clone()).with_args(self.shell_args.clone())
    }

    pub fn palette(&self) -> Palette {
        Palette {
            focused: self.colors.focused.to_crossterm(),
            unfocused: self.colors.unfocused.to_crossterm(),
            cursor_marker: self.colors.cursor_marker.to_crossterm(),
        }
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
