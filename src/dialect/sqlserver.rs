use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::commands::{AlterTable, ColumnSpec};
use crate::config::ResolvedDbConfig;
use crate::dialect::common::{self, DropConstraint};
use crate::dialect::dialect_trait::{Context, DialectImpl};
use crate::dialect::introspect::Introspector;
use crate::driver::SqlDriver;
use crate::error::{DriverError, TernError};

lazy_static! {
    static ref INT_WITH_LENGTH: Regex = Regex::new(r"(?i)^int\(\d+\)$").unwrap();
    static ref TINYINT_WITH_LENGTH: Regex = Regex::new(r"(?i)^tinyint\(\d+\)$").unwrap();
    static ref ENUM_TOKEN: Regex = Regex::new(r"(?i)^ENUM\((.*)\)$").unwrap();
    static ref ENUM_VALUE: Regex = Regex::new(r"'([^']*)'").unwrap();
    static ref VARBINARY_WITH_LENGTH: Regex = Regex::new(r"(?i)^varbinary\((\d+)\)$").unwrap();
    static ref CHARACTER_SET: Regex = Regex::new(r"(?i)^CHARACTER\s+SET\b").unwrap();
    static ref COLLATE: Regex = Regex::new(r"(?i)^COLLATE\b").unwrap();
}

/// Identifiers SQL Server needs bracket-quoted.
const RESERVED: &[&str] = &["public", "user"];

/// Table options SQL Server has no syntax for.
const IGNORED_OPTIONS: &[&str] = &["row_format"];

/// Largest VARBINARY length T-SQL accepts before requiring `max`.
const MAX_VARBINARY: u32 = 8000;

/// Implementation of DialectImpl for Microsoft SQL Server.
pub struct SqlServerDialect;

impl Default for SqlServerDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlServerDialect {
    pub fn new() -> Self {
        SqlServerDialect
    }

    /// Rewrite one MySQL-flavored type token into its T-SQL counterpart.
    /// Rules run in order; the first hit wins.
    fn rewrite_token(&self, column: &str, token: &str) -> Option<String> {
        let lower = token.to_lowercase();
        let mapped = match lower.as_str() {
            "auto_increment" => Some("identity"),
            "blob" | "longblob" => Some("varbinary(max)"),
            "boolean" | "tinyint(1)" => Some("bit"),
            "text" | "longtext" | "mediumtext" | "shorttext" => Some("varchar(max)"),
            "timestamp" => Some("datetime"),
            "double" => Some("float"),
            _ => None,
        };
        if let Some(mapped) = mapped {
            return Some(mapped.to_string());
        }
        if INT_WITH_LENGTH.is_match(token) {
            return Some("int".to_string());
        }
        if TINYINT_WITH_LENGTH.is_match(token) {
            return Some("tinyint".to_string());
        }
        if CHARACTER_SET.is_match(token) || COLLATE.is_match(token) {
            return None;
        }
        if let Some(captures) = ENUM_TOKEN.captures(token) {
            let values = captures.get(1).map_or("", |m| m.as_str());
            let width = ENUM_VALUE
                .captures_iter(values)
                .map(|c| c[1].len())
                .max()
                .unwrap_or(0);
            return Some(format!(
                "VARCHAR({width}) CHECK ({} IN({values}))",
                self.sql_name(column)
            ));
        }
        if let Some(captures) = VARBINARY_WITH_LENGTH.captures(token) {
            if captures[1].parse::<u32>().map(|n| n > MAX_VARBINARY).unwrap_or(false) {
                return Some("varbinary(max)".to_string());
            }
        }
        Some(token.to_string())
    }
}

impl DialectImpl for SqlServerDialect {
    fn subprotocol(&self) -> &'static str {
        "sqlserver"
    }

    fn sql_name(&self, ident: &str) -> String {
        let name = common::to_sql_name(ident);
        if RESERVED.contains(&name.to_lowercase().as_str()) {
            format!("[{name}]")
        } else {
            name
        }
    }

    fn sanitize_column(&self, column: &ColumnSpec) -> ColumnSpec {
        let spec = column
            .spec
            .iter()
            .filter_map(|token| self.rewrite_token(&column.name, token))
            .collect();
        ColumnSpec {
            name: column.name.clone(),
            spec,
        }
    }

    fn compile_alter_table(
        &self,
        at: &AlterTable,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError> {
        let directives = common::filter_alter_table(at, ctx)?;
        let table = self.sql_name(&at.table);
        let mut statements = Vec::new();

        let mut drop_parts = Vec::new();
        for drop in &directives.drop_constraints {
            let name = match drop {
                DropConstraint::ForeignKey(name) => self.sql_name(name),
                DropConstraint::PrimaryKey => ctx
                    .primary_key_name(&common::to_sql_name(&at.table))?
                    .unwrap_or_else(|| format!("PK_{}", common::to_sql_name(&at.table))),
            };
            drop_parts.push(format!("CONSTRAINT {name}"));
        }
        for column in &directives.drop_columns {
            drop_parts.push(format!("COLUMN {}", self.sql_name(column)));
        }
        if !drop_parts.is_empty() {
            statements.push(format!("ALTER TABLE {table} DROP {}", drop_parts.join(", ")));
        }

        let mut add_parts = Vec::new();
        for column in &directives.add_columns {
            add_parts.push(common::render_column(self, column));
        }
        for constraint in &directives.add_constraints {
            add_parts.push(common::constraint_fragment(self, constraint));
        }
        if !add_parts.is_empty() {
            statements.push(format!("ALTER TABLE {table} ADD {}", add_parts.join(", ")));
        }

        for column in directives.modify_columns {
            statements.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {}",
                common::render_column(self, column)
            ));
        }
        if let Some(pk) = directives.primary_key {
            if let Some(fragment) = common::primary_key_fragment(self, pk) {
                statements.push(format!("ALTER TABLE {table} ADD {fragment}"));
            }
        }
        for option in directives.table_options {
            if IGNORED_OPTIONS.contains(&option.name.to_lowercase().as_str()) {
                debug!("table option {} is not supported on sqlserver, ignoring", option.name);
                continue;
            }
            statements.push(format!("ALTER TABLE {table} {}={}", option.name, option.value));
        }
        if directives.character_set.is_some() {
            debug!("character sets are not supported on sqlserver, ignoring");
        }
        Ok(statements)
    }

    fn drop_index_sql(&self, index: &str, table: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.sql_name(index),
            self.sql_name(table)
        )
    }

    /// SQL Server groups column drops into one statement.
    fn drop_column_statements(&self, table: &str, columns: &[&str]) -> Vec<String> {
        let parts: Vec<String> = columns
            .iter()
            .map(|c| format!("COLUMN {}", self.sql_name(c)))
            .collect();
        vec![format!(
            "ALTER TABLE {} DROP {}",
            self.sql_name(table),
            parts.join(", ")
        )]
    }

    fn version_table_ddl(&self, table: &str) -> String {
        format!(
            "CREATE TABLE {} (version VARCHAR(14) NOT NULL, created DATETIME NOT NULL)",
            self.sql_name(table)
        )
    }

    fn introspector<'a>(
        &self,
        driver: &'a mut dyn SqlDriver,
        db: &ResolvedDbConfig,
    ) -> Box<dyn Introspector + 'a> {
        Box::new(SqlServerIntrospector {
            driver,
            database: db.database.clone(),
        })
    }
}

/// information_schema queries filtered by table_catalog, with sys.indexes
/// for index existence (SQL Server has no information_schema view for
/// indexes). Identifier quoting is deliberately absent here: these queries
/// want the bare names.
pub struct SqlServerIntrospector<'a> {
    driver: &'a mut dyn SqlDriver,
    database: String,
}

impl Introspector for SqlServerIntrospector<'_> {
    fn table_exists(&mut self, table: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_catalog = '{}' AND table_name = '{}'",
            self.database, table
        ))?;
        Ok(count > 0)
    }

    fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.columns \
             WHERE table_catalog = '{}' AND table_name = '{}' AND column_name = '{}'",
            self.database, table, column
        ))?;
        Ok(count > 0)
    }

    fn column_type(&mut self, table: &str, column: &str) -> Result<Option<String>, DriverError> {
        let types = self.driver.query_names(&format!(
            "SELECT data_type FROM information_schema.columns \
             WHERE table_catalog = '{}' AND table_name = '{}' AND column_name = '{}'",
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
             AND table_catalog = '{}' AND table_name = '{}'",
            self.database, table
        ))?;
        Ok(names.into_iter().next())
    }

    fn foreign_key_exists(&mut self, table: &str, name: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.table_constraints \
             WHERE constraint_type = 'FOREIGN KEY' \
             AND table_catalog = '{}' AND table_name = '{}' AND constraint_name = '{}'",
            self.database, table, name
        ))?;
        Ok(count > 0)
    }

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM sys.indexes i \
             JOIN sys.tables t ON i.object_id = t.object_id \
             WHERE t.name = '{}' AND i.name = '{}'",
            table, index
        ))?;
        Ok(count > 0)
    }
}
