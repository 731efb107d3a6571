//! Configuration file support
//!
//! Loads settings from ~/.rbpeek.toml (or %USERPROFILE%\.rbpeek.toml on Windows)
//!
//! Example:
//! ```toml
//! color = true
//! terminal-width = 100
//! indent-size = 2
//!
//! [colors]
//! keyword = "bright_blue"
//! string = "green"
//! default = "bright_white"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::ansi::{encode_name, Style};
use crate::error::{Error, Result};
use crate::syntax::{Role, TokenKind};

/// Style for token kinds without a role
const DEFAULT_STYLE: &str = "bright_white";

/// Token role to style mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    roles: HashMap<Role, Style>,
    default: Style,
    enabled: bool,
}

impl Default for Palette {
    fn default() -> Self {
        let roles = Role::ALL
            .into_iter()
            .filter_map(|role| {
                encode_name(role.default_style_name())
                    .ok()
                    .map(|style| (role, style))
            })
            .collect();

        Self {
            roles,
            default: encode_name(DEFAULT_STYLE).unwrap_or_default(),
            enabled: true,
        }
    }
}

impl Palette {
    /// A palette that styles nothing
    pub fn plain() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Style for a token kind; kinds without a role get the default style
    pub fn style_for(&self, kind: TokenKind) -> Style {
        if !self.enabled {
            return Style::reset();
        }
        kind.role()
            .and_then(|role| self.roles.get(&role))
            .unwrap_or(&self.default)
            .clone()
    }

    #[cfg(test)]
    fn role_style(&self, role: Role) -> Option<&Style> {
        self.roles.get(&role)
    }

    pub fn set_role(&mut self, role: Role, style: Style) {
        self.roles.insert(role, style);
    }

    pub fn set_default(&mut self, style: Style) {
        self.default = style;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Configuration settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether output is styled
    pub color: bool,
    /// Fixed output width; the terminal is queried when unset
    pub terminal_width: Option<usize>,
    /// Indentation of listings
    pub indent_size: usize,
    pub palette: Palette,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color: true,
            terminal_width: None,
            indent_size: 2,
            palette: Palette::default(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            std::env::var("USERPROFILE")
                .ok()
                .map(|home| PathBuf::from(home).join(".rbpeek.toml"))
        }

        #[cfg(not(windows))]
        {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".rbpeek.toml"))
        }
    }

    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Config::default();
        };
        let Ok(contents) = fs::read_to_string(&path) else {
            return Config::default();
        };

        match Self::parse(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring configuration file");
                Config::default()
            }
        }
    }

    /// Parse config file contents
    ///
    /// Malformed TOML is an error; individual bad values are skipped.
    pub fn parse(contents: &str) -> Result<Self> {
        let table: toml::Table = contents
            .parse()
            .map_err(|e: toml::de::Error| Error::Config(e.message().to_string()))?;

        let mut config = Config::default();
        config.apply(&table);
        Ok(config)
    }

    /// Apply settings from a parsed table
    fn apply(&mut self, table: &toml::Table) {
        if let Some(value) = table.get("color") {
            match value.as_bool() {
                Some(color) => self.color = color,
                None => tracing::warn!(%value, "color must be a boolean"),
            }
        }

        if let Some(value) = table.get("terminal-width") {
            match value.as_integer().and_then(|n| usize::try_from(n).ok()) {
                Some(n) => self.terminal_width = Some(n.max(20)),
                None => tracing::warn!(%value, "terminal-width must be a positive integer"),
            }
        }

        if let Some(value) = table.get("indent-size") {
            match value.as_integer().and_then(|n| usize::try_from(n).ok()) {
                Some(n) => self.indent_size = n.min(16),
                None => tracing::warn!(%value, "indent-size must be a positive integer"),
            }
        }

        if let Some(colors) = table.get("colors").and_then(toml::Value::as_table) {
            for (key, value) in colors {
                self.apply_color(key, value);
            }
        }

        self.palette.set_enabled(self.color);
    }

    fn apply_color(&mut self, key: &str, value: &toml::Value) {
        let Some(name) = value.as_str() else {
            tracing::warn!(key, %value, "style must be a string");
            return;
        };
        let style = match encode_name(name) {
            Ok(style) => style,
            Err(e) => {
                tracing::warn!(key, error = %e, "skipping style");
                return;
            }
        };

        if key == "default" {
            self.palette.set_default(style);
        } else if let Some(role) = Role::from_name(key) {
            self.palette.set_role(role, style);
        } else {
            tracing::warn!(key, "unknown color role");
        }
    }
}
