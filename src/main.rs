use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;

use anyhow::{Context as AnyhowContext, Result};
use clap::Parser as ClapParser;
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tern::cli::{split_versions, Args, CliCommand};
use tern::config::{self, ResolvedConfig, TernConfig};
use tern::driver::{self, NullDriver, SqlDriver};
use tern::error::{DriverError, TernError};
use tern::files;
use tern::runner::Migrator;

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("{} {e:#}", "error:".red());
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = TernConfig::load(&args.config)?;

    colored::control::set_override(config.color);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(config.color)
        .with_target(false)
        .init();

    match args.command {
        CliCommand::New { name } => {
            let path = files::create_migration(Path::new(&config.migration_dir), &name)?;
            println!("Created {}", path.display());
            Ok(())
        }
        CliCommand::Config => {
            println!("{}", config.to_json_string()?);
            Ok(())
        }
        command => run_with_driver(command, &config),
    }
}

fn run_with_driver(command: CliCommand, config: &ResolvedConfig) -> Result<()> {
    let mut driver = open_driver(config)?;
    let mut migrator = Migrator::new(config, driver.as_mut())?;
    let migrations = files::discover(Path::new(&config.migration_dir))?;

    match command {
        CliCommand::Init => {
            if migrator.init()? {
                println!("Created version table {}", config.version_table);
            } else {
                println!("Version table {} already present", config.version_table);
            }
        }
        CliCommand::Version => match migrator.latest_version()? {
            Some(version) => println!("{version}"),
            None => println!("No versions recorded"),
        },
        CliCommand::Versions => {
            for version in migrator.applied_versions()? {
                println!("{version}");
            }
        }
        CliCommand::Migrate { only_versions } => {
            let only = only_versions.map(|list| split_versions(&list));
            let applied = migrator.migrate(&migrations, only.as_deref())?;
            println!("Applied {applied} migration(s)");
        }
        CliCommand::Rollback => match migrator.rollback(&migrations)? {
            Some(version) => println!("Rolled back {version}"),
            None => println!("Nothing to roll back"),
        },
        CliCommand::Reset { yes } => {
            if !yes && !confirm_reset()? {
                println!("Aborted");
                return Ok(());
            }
            let count = migrator.reset(&migrations)?;
            println!("Rolled back {count} migration(s)");
        }
        CliCommand::Missing => {
            for version in migrator.missing(&migrations)? {
                println!("{version}");
            }
        }
        CliCommand::New { .. } | CliCommand::Config => unreachable!("handled before driver setup"),
    }
    Ok(())
}

/// Open the native driver for the configured backend. Backends without one
/// still work in dry-run mode against the empty-schema assumption.
fn open_driver(config: &ResolvedConfig) -> Result<Box<dyn SqlDriver>> {
    if !tern::dialect::is_supported(&config.db.subprotocol) {
        return Err(TernError::UnsupportedBackend(config.db.subprotocol.clone()).into());
    }
    match driver::open_driver(&config.db) {
        Ok(driver) => Ok(driver),
        Err(DriverError::NoNativeDriver(subprotocol)) if config::dry_run_enabled() => {
            warn!("no native driver for {subprotocol}; compiling against an empty schema");
            Ok(Box::new(NullDriver))
        }
        Err(e) => Err(e).with_context(|| {
            format!("could not open a driver for {}", config.db.subprotocol)
        }),
    }
}

fn confirm_reset() -> Result<bool> {
    print!("Roll back every applied migration? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
