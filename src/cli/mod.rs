/// This file defines the behaviour of the CLI.
/// As the whole program is a CLI executable, this is the actual "main" file
mod parse;

use clap::{Parser, Subcommand};

use simplelog::{
    ColorChoice, CombinedLogger, Config as LogConfig, LevelFilter, TermLogger,
    TerminalMode,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)] // read from cargo.toml
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Show scanner and parser traces for development debugging
    #[arg(short, long, default_value_t = false)]
    pub(crate) debug: bool,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a LaTeX math expression and print its AST
    Parse {
        expression: String,

        #[arg(short, long, default_value_t = false)]
        strict: bool,

        /// Print the AST in tree format (the only output format)
        #[arg(long, default_value_t = true)]
        tree: bool,
    },
    /// Exit successfully iff the expression parses
    Check { expression: String },
}

/// Init logger according to debug flag
fn init_logger(debug: bool) {
    let log_filter = if debug {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };

    CombinedLogger::init(vec![TermLogger::new(
        log_filter,
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .unwrap();
}

/// CLI entry function
pub fn cli() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger(cli.debug);

    match &cli.command {
        Commands::Parse {
            expression,
            strict,
            tree,
        } => {
            parse::parse(expression, *strict, *tree)?;
        }
        Commands::Check { expression } => {
            parse::check(expression)?;
        }
    }
    Ok(())
}
