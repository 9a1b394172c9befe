//! The version registry: one row per applied migration in a backend table
//! (`version VARCHAR(14)`, `created` in the backend's preferred type).

use tracing::info;

use crate::config::ResolvedDbConfig;
use crate::dialect::{to_sql_name, DialectImpl};
use crate::driver::SqlDriver;
use crate::error::TernError;

pub struct VersionRegistry<'a> {
    dialect: &'a dyn DialectImpl,
    table: &'a str,
}

impl<'a> VersionRegistry<'a> {
    pub fn new(dialect: &'a dyn DialectImpl, table: &'a str) -> Self {
        VersionRegistry { dialect, table }
    }

    /// Create the registry table if the live database lacks it. Returns
    /// whether it was created.
    pub fn ensure_table(
        &self,
        driver: &mut dyn SqlDriver,
        db: &ResolvedDbConfig,
    ) -> Result<bool, TernError> {
        let exists = {
            let mut introspector = self.dialect.introspector(&mut *driver, db);
            introspector.table_exists(&to_sql_name(self.table))?
        };
        if exists {
            info!("version table {} already exists", self.table);
            return Ok(false);
        }
        driver.execute(&self.dialect.version_table_ddl(self.table))?;
        info!("created version table {}", self.table);
        Ok(true)
    }

    /// All recorded versions in ascending lexicographic order.
    pub fn versions(&self, driver: &mut dyn SqlDriver) -> Result<Vec<String>, TernError> {
        let mut versions = driver.query_names(&self.dialect.version_select(self.table))?;
        versions.sort();
        Ok(versions)
    }

    /// The highest recorded version, if any.
    pub fn latest(&self, driver: &mut dyn SqlDriver) -> Result<Option<String>, TernError> {
        Ok(self.versions(driver)?.pop())
    }

    pub fn record(&self, driver: &mut dyn SqlDriver, version: &str) -> Result<(), TernError> {
        driver.execute(&self.dialect.version_insert(self.table, version))?;
        Ok(())
    }

    pub fn erase(&self, driver: &mut dyn SqlDriver, version: &str) -> Result<(), TernError> {
        driver.execute(&self.dialect.version_delete(self.table, version))?;
        Ok(())
    }
}
