use tracing::debug;

use crate::commands::{AlterTable, ColumnSpec};
use crate::config::ResolvedDbConfig;
use crate::dialect::common::{self, DropConstraint};
use crate::dialect::dialect_trait::{Context, DialectImpl};
use crate::dialect::introspect::Introspector;
use crate::driver::SqlDriver;
use crate::error::{DriverError, TernError};

/// Implementation of DialectImpl for PostgreSQL.
pub struct PostgresDialect;

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresDialect {
    pub fn new() -> Self {
        PostgresDialect
    }

    /// PostgreSQL cannot take a whole column spec in one ALTER COLUMN; the
    /// type, nullability and default each get their own statement.
    fn modify_column_statements(&self, table: &str, column: &ColumnSpec) -> Vec<String> {
        let name = self.sql_name(&column.name);
        let mut type_tokens: Vec<&str> = Vec::new();
        let mut set_not_null = false;
        let mut drop_not_null = false;
        let mut default = None;
        for token in &column.spec {
            let upper = token.to_uppercase();
            if upper == "NOT NULL" {
                set_not_null = true;
            } else if upper == "NULL" {
                drop_not_null = true;
            } else if upper.starts_with("DEFAULT ") {
                default = Some(token["DEFAULT ".len()..].trim().to_string());
            } else {
                type_tokens.push(token);
            }
        }

        let mut statements = Vec::new();
        if !type_tokens.is_empty() {
            statements.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {name} TYPE {}",
                type_tokens.join(" ")
            ));
        }
        if let Some(value) = default {
            statements.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {name} SET DEFAULT {value}"
            ));
        }
        if set_not_null {
            statements.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {name} SET NOT NULL"
            ));
        }
        if drop_not_null {
            statements.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {name} DROP NOT NULL"
            ));
        }
        statements
    }
}

impl DialectImpl for PostgresDialect {
    fn subprotocol(&self) -> &'static str {
        "postgresql"
    }

    fn compile_alter_table(
        &self,
        at: &AlterTable,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError> {
        let directives = common::filter_alter_table(at, ctx)?;
        let table = self.sql_name(&at.table);
        let mut statements = Vec::new();

        if !directives.table_options.is_empty() {
            debug!("table options are not supported on postgresql, ignoring");
        }
        if directives.character_set.is_some() {
            debug!("character sets are not supported on postgresql, ignoring");
        }
        for drop in &directives.drop_constraints {
            let name = match drop {
                DropConstraint::ForeignKey(name) => self.sql_name(name),
                DropConstraint::PrimaryKey => ctx
                    .primary_key_name(&common::to_sql_name(&at.table))?
                    .unwrap_or_else(|| format!("{table}_pkey")),
            };
            statements.push(format!("ALTER TABLE {table} DROP CONSTRAINT {name}"));
        }
        for column in &directives.drop_columns {
            statements.push(format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                self.sql_name(column)
            ));
        }
        for column in &directives.add_columns {
            statements.push(format!(
                "ALTER TABLE {table} ADD COLUMN {}",
                common::render_column(self, column)
            ));
        }
        for column in directives.modify_columns {
            statements.extend(self.modify_column_statements(&table, column));
        }
        if let Some(pk) = directives.primary_key {
            if let Some(fragment) = common::primary_key_fragment(self, pk) {
                statements.push(format!("ALTER TABLE {table} ADD {fragment}"));
            }
        }
        for constraint in &directives.add_constraints {
            statements.push(format!(
                "ALTER TABLE {table} ADD {}",
                common::constraint_fragment(self, constraint)
            ));
        }
        Ok(statements)
    }

    fn version_table_ddl(&self, table: &str) -> String {
        format!(
            "CREATE TABLE {} (version VARCHAR(14) NOT NULL, created TIMESTAMP NOT NULL)",
            self.sql_name(table)
        )
    }

    fn introspector<'a>(
        &self,
        driver: &'a mut dyn SqlDriver,
        db: &ResolvedDbConfig,
    ) -> Box<dyn Introspector + 'a> {
        Box::new(PostgresIntrospector {
            driver,
            database: db.database.clone(),
        })
    }
}

/// information_schema / pg_catalog queries against the public schema of the
/// configured database.
pub struct PostgresIntrospector<'a> {
    driver: &'a mut dyn SqlDriver,
    database: String,
}

impl Introspector for PostgresIntrospector<'_> {
    fn table_exists(&mut self, table: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_catalog = '{}' AND table_schema = 'public' AND table_name = '{}'",
            self.database, table
        ))?;
        Ok(count > 0)
    }

    fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.columns \
             WHERE table_catalog = '{}' AND table_schema = 'public' \
             AND table_name = '{}' AND column_name = '{}'",
            self.database, table, column
        ))?;
        Ok(count > 0)
    }

    fn column_type(&mut self, table: &str, column: &str) -> Result<Option<String>, DriverError> {
        let types = self.driver.query_names(&format!(
            "SELECT data_type FROM information_schema.columns \
             WHERE table_catalog = '{}' AND table_schema = 'public' \
             AND table_name = '{}' AND column_name = '{}'",
            self.database, table, column
        ))?;
        Ok(types.into_iter().next())
    }

    fn primary_key_exists(&mut self, table: &str) -> Result<bool, DriverError> {
        Ok(self.primary_key_name(table)?.is_some())
    }

    fn primary_key_name(&mut self, table: &str) -> Result<Option<String>, DriverError> {
        let names = self.driver.query_names(&format!(
            "SELECT constraint_name FROM information_schema.table_constraints \
             WHERE constraint_type = 'PRIMARY KEY' \
             AND table_catalog = '{}' AND table_schema = 'public' AND table_name = '{}'",
            self.database, table
        ))?;
        Ok(names.into_iter().next())
    }

    fn foreign_key_exists(&mut self, table: &str, name: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.table_constraints \
             WHERE constraint_type = 'FOREIGN KEY' \
             AND table_catalog = '{}' AND table_schema = 'public' \
             AND table_name = '{}' AND constraint_name = '{}'",
            self.database, table, name
        ))?;
        Ok(count > 0)
    }

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM pg_indexes \
             WHERE schemaname = 'public' AND tablename = '{}' AND indexname = '{}'",
            table, index
        ))?;
        Ok(count > 0)
    }
}
