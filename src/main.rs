//! rbpeek - print Ruby definitions with syntax highlighting

use std::env;
use std::io::{self, Read, Write};
use std::process;

use rbpeek::ansi::StyledText;
use rbpeek::config::Config;
use rbpeek::error::{Error, Result};
use rbpeek::layout::columns;
use rbpeek::source::{Extractor, SignatureCache, Strategy};
use rbpeek::syntax::TokenKind;
use rbpeek::terminal;

/// Environment variable holding the log filter
const LOG_ENV: &str = "RBPEEK_LOG";

fn main() {
    init_tracing();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr, only when `RBPEEK_LOG` is set
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if env::var(LOG_ENV).is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_env(LOG_ENV))
            .init();
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut config = Config::load();
    let mut strategy = Strategy::Structural;
    let mut positional: Vec<&str> = Vec::new();

    for arg in &args {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-V" => {
                print_version();
                return Ok(());
            }
            "--no-color" => config.color = false,
            "--balance" => strategy = Strategy::DelimiterBalance,
            flag if flag.starts_with("--") => {
                return Err(Error::Usage(format!("Unknown option: {flag}")));
            }
            other => positional.push(other),
        }
    }

    let color = config.color && terminal::is_tty();
    config.palette.set_enabled(color);

    match positional.as_slice() {
        ["show", file, line] => show(&config, strategy, file, parse_line(line)?, true),
        ["at", file, line] => show(&config, strategy, file, parse_line(line)?, false),
        ["params", file, line, name] => params(file, parse_line(line)?, name),
        ["defs", file] => defs(&config, file),
        ["decode"] => decode(),
        [] => {
            print_usage();
            Ok(())
        }
        [command, ..] => Err(Error::Usage(format!(
            "Bad arguments for {command:?} (see --help)"
        ))),
    }
}

fn parse_line(text: &str) -> Result<usize> {
    text.parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| Error::Usage(format!("Invalid line number: {text}")))
}

/// Print one definition, optionally with its doc comment
fn show(config: &Config, strategy: Strategy, file: &str, line: usize, docs: bool) -> Result<()> {
    let extractor = Extractor::new(config.palette.clone()).with_strategy(strategy);
    let text = if docs {
        extractor.extract_method(file, line)?
    } else {
        extractor.extract_at(file, line)?
    };
    terminal::print(&text, config.palette.is_enabled())
}

/// Print the parameter signature of one definition
fn params(file: &str, line: usize, name: &str) -> Result<()> {
    match SignatureCache::global().lookup(file, line, name)? {
        Some(signature) => {
            println!("{signature}");
            Ok(())
        }
        None => Err(Error::DefinitionNotFound { line }),
    }
}

/// List every definition in a file in columns
fn defs(config: &Config, file: &str) -> Result<()> {
    let name_style = config.palette.style_for(TokenKind::Ident);
    let items: Vec<StyledText> = SignatureCache::global()
        .signatures(file)?
        .iter()
        .map(|signature| {
            let mut item = StyledText::with_style(&signature.qualified_name(), &name_style);
            item.push_str(&format!("({})", signature.pretty()));
            item
        })
        .collect();

    let width = terminal::width(config).saturating_sub(config.indent_size);
    let indent = " ".repeat(config.indent_size);
    let listing: StyledText = columns(&items, width)
        .lines()
        .map(|row| StyledText::new(&indent) + &row)
        .collect();
    terminal::print(&listing, config.palette.is_enabled())
}

/// Re-serialize escape-coded text from stdin
fn decode() -> Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(StyledText::decode(&input).serialize().as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn print_usage() {
    println!("rbpeek {} - Ruby definitions with syntax highlighting", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: rbpeek [OPTIONS] COMMAND");
    println!();
    println!("Commands:");
    println!("  show FILE LINE         Print the definition at LINE with its doc comment");
    println!("  at FILE LINE           Print the definition starting at LINE");
    println!("  params FILE LINE NAME  Print the parameter list of NAME defined at LINE");
    println!("  defs FILE              List every definition in FILE");
    println!("  decode                 Normalize escape sequences read from stdin");
    println!();
    println!("Options:");
    println!("  --no-color     Print without escape sequences");
    println!("  --balance      Find the end of a definition by counting keywords");
    println!("  -h, --help     Show this help message");
    println!("  -V, --version  Show version information");
    println!();
    println!("Settings are read from ~/.rbpeek.toml; set {LOG_ENV} to enable logging.");
}

fn print_version() {
    println!("rbpeek {}", env!("CARGO_PKG_VERSION"));
}
