//! Terminal queries using crossterm

use std::io::{self, Write};

use crossterm::terminal;
use crossterm::tty::IsTty;

use crate::ansi::StyledText;
use crate::config::Config;
use crate::error::Result;

/// Width used when nothing else is known
const FALLBACK_WIDTH: usize = 78;

/// Output width: configuration, then the terminal, then `$COLUMNS`
pub fn width(config: &Config) -> usize {
    if let Some(width) = config.terminal_width {
        return width;
    }
    if let Ok((cols, _)) = terminal::size() {
        if cols > 0 {
            return usize::from(cols);
        }
    }
    columns_env().unwrap_or(FALLBACK_WIDTH)
}

fn columns_env() -> Option<usize> {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .filter(|&n| n > 0)
}

/// Check if standard output is a terminal
pub fn is_tty() -> bool {
    io::stdout().is_tty()
}

/// Write styled text to standard output
///
/// Escape sequences are written only when `color` is set.
pub fn print(text: &StyledText, color: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if color {
        stdout.write_all(text.serialize().as_bytes())?;
    } else {
        stdout.write_all(text.plain().as_bytes())?;
    }
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_width_wins() {
        let config = Config {
            terminal_width: Some(120),
            ..Config::default()
        };
        assert_eq!(width(&config), 120);
    }

    #[test]
    fn test_width_is_positive() {
        assert!(width(&Config::default()) > 0);
    }
}
