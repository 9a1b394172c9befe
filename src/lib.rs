//! # Tern
//!
//! Tern records versioned, declarative schema changes in a
//! backend-independent data form and applies or reverts them against
//! PostgreSQL, MySQL, Microsoft SQL Server or H2 (v1 and v2).
//!
//! This crate provides both a command-line interface and a library that can
//! be used programmatically in other Rust applications.
//!
//! ## Features
//!
//! - Declarative migration commands compiled to backend-specific SQL
//! - Idempotent compilation against live-database introspection
//! - Intra-migration plan awareness (later commands see what earlier ones
//!   tore down or created)
//! - Pluggable SQL drivers behind a small synchronous trait
//!
//! ## Examples
//!
//! ### Compiling a command
//!
//! ```
//! use tern::commands::{Command, CreateTable, ColumnSpec};
//! use tern::dialect::{Context, DialectImpl};
//! use tern::dialect::mysql::MysqlDialect;
//! use tern::plan::Plan;
//!
//! let command = Command::CreateTable(CreateTable {
//!     table: "foo".to_string(),
//!     columns: vec![ColumnSpec::new("a", &["INT"])],
//!     ..CreateTable::default()
//! });
//!
//! let plan = Plan::new();
//! let mut ctx = Context::empty(&plan);
//! let statements = MysqlDialect::new().compile(&command, &mut ctx).unwrap();
//! assert_eq!(statements, vec!["CREATE TABLE foo (a INT)".to_string()]);
//! ```
//!
//! ### Running migrations
//!
//! ```no_run
//! use std::path::Path;
//! use tern::config::TernConfig;
//! use tern::driver;
//! use tern::files;
//! use tern::runner::Migrator;
//!
//! let config = TernConfig::load(Path::new("tern.json")).unwrap();
//! let mut driver = driver::open_driver(&config.db).unwrap();
//! let mut migrator = Migrator::new(&config, driver.as_mut()).unwrap();
//! let migrations = files::discover(Path::new(&config.migration_dir)).unwrap();
//! migrator.migrate(&migrations, None).unwrap();
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod files;
pub mod plan;
pub mod registry;
pub mod runner;

// Re-export commonly used types for convenience
pub use commands::{parse_commands, Command};
pub use config::{ResolvedConfig, TernConfig};
pub use dialect::{resolve_dialect, Context, DialectImpl, Introspector};
pub use driver::{NullDriver, SqlDriver};
pub use error::{DriverError, TernError};
pub use files::{discover, MigrationFile};
pub use plan::Plan;
pub use runner::Migrator;

// Tests are defined in their respective modules with #[cfg(test)]
