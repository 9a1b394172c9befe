use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Declarative, backend-independent schema migrations for relational databases", long_about = None)]
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "tern.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Create the version-tracking table if it is missing
    Init,

    /// Print the highest version recorded in the database
    Version,

    /// Print all recorded versions
    Versions,

    /// Apply pending migrations
    Migrate {
        /// Restrict to these versions (comma/space/semicolon separated)
        only_versions: Option<String>,
    },

    /// Run the down program of the newest applied migration
    Rollback,

    /// Roll back every applied migration in reverse order
    Reset {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Print versions present as files but absent from the registry
    Missing,

    /// Create a new timestamped migration file
    New {
        /// Descriptive name; becomes the filename slug
        name: String,
    },

    /// Echo the effective configuration
    Config,
}

/// Split a `migrate` version filter on its accepted separators.
pub fn split_versions(list: &str) -> Vec<String> {
    list.split([',', ';', ' '])
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
