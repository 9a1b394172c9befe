use crate::error::DriverError;

/// Read-only interface to the live database, answering the existence
/// questions the compilers need for their idempotency decisions.
///
/// Implementations are backend-specific (each dialect module provides one)
/// and issue catalog queries through the SQL driver. Methods take names in
/// their dialect-neutral SQL form (hyphens already replaced); each
/// implementation applies its own casing rules.
pub trait Introspector {
    fn table_exists(&mut self, table: &str) -> Result<bool, DriverError>;

    fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, DriverError>;

    /// The declared type of a column, if the column exists.
    fn column_type(&mut self, table: &str, column: &str) -> Result<Option<String>, DriverError>;

    fn primary_key_exists(&mut self, table: &str) -> Result<bool, DriverError>;

    /// The primary-key constraint name, needed by the backends that can
    /// only drop a primary key through `DROP CONSTRAINT`.
    fn primary_key_name(&mut self, table: &str) -> Result<Option<String>, DriverError>;

    fn foreign_key_exists(&mut self, table: &str, name: &str) -> Result<bool, DriverError>;

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool, DriverError>;

    /// Names of foreign keys covering the given (fk table, fk column,
    /// pk table, pk column) tuple. Only the H2 compilers consult this, for
    /// their duplicate-constraint auto-drop.
    fn matching_foreign_keys(
        &mut self,
        _fk_table: &str,
        _fk_column: &str,
        _pk_table: &str,
        _pk_column: &str,
    ) -> Result<Vec<String>, DriverError> {
        Ok(Vec::new())
    }
}
