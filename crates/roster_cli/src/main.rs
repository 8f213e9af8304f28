//! Roster console entry point.
//!
//! # Responsibility
//! - Resolve configuration (file, environment, flags).
//! - Open the store, start logging and hand stdin/stdout to the menu shell.

mod shell;

use anyhow::Context;
use clap::Parser;
use roster_core::{init_logging, open_db, open_db_in_memory, RosterConfig, RosterService};
use std::io::{self, BufWriter};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "roster")]
#[command(author, version, about = "Accounts, posts and roles from the console", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file; in-memory when neither this nor the config sets one.
    #[arg(long)]
    db: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    /// Directory for rolling log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print the resolved configuration and exit.
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn resolve_config(&self) -> anyhow::Result<RosterConfig> {
        let mut config = RosterConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.db {
            config.database.path = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.logging.dir = Some(dir.clone());
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    if let Some(dir) = &config.logging.dir {
        init_logging(&config.logging.level, dir).context("failed to start logging")?;
    }

    let mut conn = match &config.database.path {
        Some(path) => open_db(path)
            .with_context(|| format!("failed to open database `{}`", path.display()))?,
        None => open_db_in_memory().context("failed to open in-memory database")?,
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut shell = shell::Shell::new(
        RosterService::new(&mut conn),
        stdin.lock(),
        BufWriter::new(stdout.lock()),
    );
    shell.run()?;
    log::info!("event=app_exit module=cli status=ok");
    Ok(())
}
