//! The migration runner: binds a dialect, a driver and a fresh plan for
//! each migration, compiles command by command, executes the emitted
//! statements in order and maintains the version registry.

use tracing::info;

use crate::commands::Command;
use crate::config::{self, ResolvedConfig, ResolvedDbConfig};
use crate::dialect::{resolve_dialect, Context, DialectImpl};
use crate::driver::SqlDriver;
use crate::error::TernError;
use crate::files::MigrationFile;
use crate::plan::Plan;
use crate::registry::VersionRegistry;

pub struct Migrator<'a> {
    dialect: Box<dyn DialectImpl>,
    driver: &'a mut dyn SqlDriver,
    db: ResolvedDbConfig,
    version_table: String,
    dry_run: bool,
}

impl<'a> Migrator<'a> {
    /// Resolve the dialect for the configured backend (probing the H2
    /// version where applicable) and bind the driver.
    pub fn new(
        resolved: &ResolvedConfig,
        driver: &'a mut dyn SqlDriver,
    ) -> Result<Self, TernError> {
        let dialect = resolve_dialect(&resolved.db.subprotocol, &mut *driver)?;
        Ok(Migrator {
            dialect,
            driver,
            db: resolved.db.clone(),
            version_table: resolved.version_table.clone(),
            dry_run: config::dry_run_enabled(),
        })
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    pub fn dialect(&self) -> &dyn DialectImpl {
        self.dialect.as_ref()
    }

    /// Create the version table if missing. Returns whether it was created.
    pub fn init(&mut self) -> Result<bool, TernError> {
        if self.dry_run {
            info!("dry run, skipping version table creation");
            return Ok(false);
        }
        let registry = VersionRegistry::new(self.dialect.as_ref(), &self.version_table);
        registry.ensure_table(&mut *self.driver, &self.db)
    }

    pub fn applied_versions(&mut self) -> Result<Vec<String>, TernError> {
        let registry = VersionRegistry::new(self.dialect.as_ref(), &self.version_table);
        registry.versions(&mut *self.driver)
    }

    pub fn latest_version(&mut self) -> Result<Option<String>, TernError> {
        Ok(self.applied_versions()?.pop())
    }

    /// Versions present as files but absent from the registry.
    pub fn missing(&mut self, migrations: &[MigrationFile]) -> Result<Vec<String>, TernError> {
        let applied = self.applied_versions()?;
        Ok(migrations
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .map(|m| m.version.clone())
            .collect())
    }

    /// Apply pending migrations in version order. With `only`, the missing
    /// set is filtered to the explicitly named versions (which allows
    /// back-filling holes left by branch merges); otherwise everything
    /// strictly after the current version is applied.
    pub fn migrate(
        &mut self,
        migrations: &[MigrationFile],
        only: Option<&[String]>,
    ) -> Result<usize, TernError> {
        let applied = self.applied_versions()?;
        let current = applied.last().cloned();
        let pending: Vec<&MigrationFile> = migrations
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .filter(|m| match only {
                Some(names) => names.contains(&m.version),
                None => current
                    .as_deref()
                    .map(|c| m.version.as_str() > c)
                    .unwrap_or(true),
            })
            .collect();

        if pending.is_empty() {
            info!("no pending migrations");
            return Ok(0);
        }
        for migration in &pending {
            self.run_up(migration)?;
        }
        Ok(pending.len())
    }

    /// Run the down program of the newest applied migration. Returns the
    /// version rolled back, if there was one.
    pub fn rollback(&mut self, migrations: &[MigrationFile]) -> Result<Option<String>, TernError> {
        let Some(version) = self.latest_version()? else {
            info!("no versions recorded, nothing to roll back");
            return Ok(None);
        };
        let migration = migrations
            .iter()
            .find(|m| m.version == version)
            .ok_or_else(|| {
                TernError::Validation(format!("no migration file for version {version}"))
            })?;
        self.run_down(migration)?;
        Ok(Some(version))
    }

    /// Roll back every applied migration, newest first. Returns how many
    /// were rolled back.
    pub fn reset(&mut self, migrations: &[MigrationFile]) -> Result<usize, TernError> {
        let mut count = 0;
        while self.rollback(migrations)?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    pub fn run_up(&mut self, migration: &MigrationFile) -> Result<(), TernError> {
        info!("applying {}", migration.version);
        self.run_commands(&migration.up)?;
        // The version is recorded only after every statement succeeded.
        let registry = VersionRegistry::new(self.dialect.as_ref(), &self.version_table);
        if self.dry_run {
            info!("dry run, not recording version {}", migration.version);
        } else {
            registry.record(&mut *self.driver, &migration.version)?;
        }
        Ok(())
    }

    pub fn run_down(&mut self, migration: &MigrationFile) -> Result<(), TernError> {
        info!("rolling back {}", migration.version);
        self.run_commands(&migration.down)?;
        let registry = VersionRegistry::new(self.dialect.as_ref(), &self.version_table);
        if self.dry_run {
            info!("dry run, not erasing version {}", migration.version);
        } else {
            registry.erase(&mut *self.driver, &migration.version)?;
        }
        Ok(())
    }

    /// Compile and execute one command program against a fresh plan. The
    /// plan records each command after its compilation succeeds and before
    /// the next command compiles.
    fn run_commands(&mut self, commands: &[Command]) -> Result<(), TernError> {
        let mut plan = Plan::new();
        for command in commands {
            let statements = {
                let mut introspector = self.dialect.introspector(&mut *self.driver, &self.db);
                let mut ctx = Context::new(Some(&mut *introspector), &plan);
                self.dialect.compile(command, &mut ctx)?
            };
            plan.record(command.clone());
            if statements.is_empty() {
                info!(
                    "{} compiled to no statements, skipping",
                    command.dispatch_key()
                );
                continue;
            }
            for statement in &statements {
                if self.dry_run {
                    info!("dry run, skipping: {statement}");
                } else {
                    info!("executing: {statement}");
                    self.driver.execute(statement)?;
                }
            }
        }
        Ok(())
    }
}
