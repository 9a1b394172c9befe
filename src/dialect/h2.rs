use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::commands::{AlterTable, ColumnSpec, Command, ConstraintSpec, CreateIndex};
use crate::config::ResolvedDbConfig;
use crate::dialect::common::{self, DropConstraint};
use crate::dialect::dialect_trait::{Context, DialectImpl};
use crate::dialect::introspect::Introspector;
use crate::driver::SqlDriver;
use crate::error::{DriverError, TernError};

lazy_static! {
    /// The `(col) REFERENCES other(col)` head of a constraint ref-spec.
    static ref REF_SPEC: Regex = Regex::new(r"\((\w+)\)\s+REFERENCES\s+(\w+)\((\w+)\)").unwrap();
    /// Length suffix on a column *name*, e.g. `name(20)`.
    static ref NAME_LENGTH: Regex = Regex::new(r"\(\d+\)$").unwrap();
    static ref CHARACTER_SET: Regex = Regex::new(r"(?i)^CHARACTER\s+SET\b").unwrap();
    static ref COLLATE: Regex = Regex::new(r"(?i)^COLLATE\b").unwrap();
}

/// Column types H2 refuses to index.
const NON_INDEXABLE: &[&str] = &[
    "CLOB",
    "NCLOB",
    "BLOB",
    "TINYBLOB",
    "MEDIUMBLOB",
    "LONGBLOB",
    "IMAGE",
    "OID",
    "TINYTEXT",
    "TEXT",
    "MEDIUMTEXT",
    "LONGTEXT",
    "NTEXT",
];

/// Identifiers H2 v2 treats as reserved and needs quoted.
const V2_RESERVED: &[&str] = &["VALUE", "USER"];

/// Major versions of H2 with incompatible SQL surfaces. Resolved once per
/// migrator from `SELECT h2version()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H2Version {
    V1,
    V2,
}

/// Implementation of DialectImpl for H2, parameterized by major version.
pub struct H2Dialect {
    version: H2Version,
}

impl H2Dialect {
    pub fn new(version: H2Version) -> Self {
        H2Dialect { version }
    }

    pub fn v1() -> Self {
        Self::new(H2Version::V1)
    }

    pub fn v2() -> Self {
        Self::new(H2Version::V2)
    }

    fn drop_constraint_sql(&self, table: &str, name: &str) -> String {
        match self.version {
            H2Version::V1 => format!("ALTER TABLE {table} DROP FOREIGN KEY {name}"),
            H2Version::V2 => format!("ALTER TABLE {table} DROP CONSTRAINT IF EXISTS {name}"),
        }
    }

    fn is_non_indexable(&self, declared: &str) -> bool {
        let base = declared
            .split('(')
            .next()
            .unwrap_or(declared)
            .trim()
            .to_uppercase();
        NON_INDEXABLE.contains(&base.as_str())
            || (self.version == H2Version::V2 && base == "CHARACTER LARGE OBJECT")
    }

    /// H2 refuses a second foreign key over the same column pair under a
    /// different name, so any pre-existing match is dropped first unless
    /// something in this migration already drops it.
    fn duplicate_fk_drops(
        &self,
        at: &AlterTable,
        constraint: &ConstraintSpec,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError> {
        let spec_text = constraint.ref_specs.join(" ");
        let captures = match REF_SPEC.captures(&spec_text) {
            Some(captures) => captures,
            None => {
                error!(
                    "could not parse ref-spec '{spec_text}' of constraint {}",
                    constraint.name
                );
                return Ok(Vec::new());
            }
        };
        let fk_column = common::to_sql_name(&captures[1]);
        let pk_table = common::to_sql_name(&captures[2]);
        let pk_column = common::to_sql_name(&captures[3]);
        let table = common::to_sql_name(&at.table);

        let existing = ctx.matching_foreign_keys(&table, &fk_column, &pk_table, &pk_column)?;
        let new_name = common::to_sql_name(&constraint.name);

        let mut scheduled: Vec<String> = at
            .drop_constraints
            .iter()
            .map(|name| common::to_sql_name(name))
            .collect();
        for command in ctx.plan.commands() {
            if let Command::AlterTable(prior) = command {
                if prior.table == at.table {
                    scheduled.extend(prior.drop_constraints.iter().map(|n| common::to_sql_name(n)));
                }
            }
        }

        let mut statements = Vec::new();
        for name in existing {
            if name.eq_ignore_ascii_case(&new_name) {
                continue;
            }
            if scheduled.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
                continue;
            }
            info!(
                "dropping foreign key {name} on {} superseded by {}",
                at.table, constraint.name
            );
            statements.push(self.drop_constraint_sql(&self.sql_name(&at.table), &name));
        }
        Ok(statements)
    }
}

impl DialectImpl for H2Dialect {
    fn subprotocol(&self) -> &'static str {
        "h2"
    }

    fn sql_name(&self, ident: &str) -> String {
        match self.version {
            H2Version::V1 => common::to_sql_name(ident),
            H2Version::V2 => {
                let name = common::to_sql_name(ident).to_uppercase();
                if V2_RESERVED.contains(&name.as_str()) {
                    format!("`{name}`")
                } else {
                    name
                }
            }
        }
    }

    fn sanitize_column(&self, column: &ColumnSpec) -> ColumnSpec {
        let name = NAME_LENGTH.replace(&column.name, "").into_owned();
        let mut spec = Vec::with_capacity(column.spec.len());
        for token in &column.spec {
            if CHARACTER_SET.is_match(token) || COLLATE.is_match(token) {
                continue;
            }
            if self.version == H2Version::V1 && token.eq_ignore_ascii_case("DEFAULT NULL") {
                spec.push("NULL".to_string());
                continue;
            }
            spec.push(token.clone());
        }
        ColumnSpec { name, spec }
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
            debug!("table options are not supported on h2, ignoring");
        }
        if directives.character_set.is_some() {
            debug!("character sets are not supported on h2, ignoring");
        }
        for drop in &directives.drop_constraints {
            statements.push(match drop {
                DropConstraint::ForeignKey(name) => {
                    self.drop_constraint_sql(&table, &self.sql_name(name))
                }
                DropConstraint::PrimaryKey => format!("ALTER TABLE {table} DROP PRIMARY KEY"),
            });
        }
        if !directives.drop_columns.is_empty() {
            let names: Vec<String> = directives
                .drop_columns
                .iter()
                .map(|c| self.sql_name(c))
                .collect();
            statements.push(format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                names.join(", ")
            ));
        }
        if !directives.add_columns.is_empty() {
            let definitions: Vec<String> = directives
                .add_columns
                .iter()
                .map(|column| common::render_column(self, column))
                .collect();
            statements.push(format!(
                "ALTER TABLE {table} ADD COLUMN ({})",
                definitions.join(", ")
            ));
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
        for constraint in &directives.add_constraints {
            statements.extend(self.duplicate_fk_drops(at, constraint, ctx)?);
            statements.push(format!(
                "ALTER TABLE {table} ADD {}",
                common::constraint_fragment(self, constraint)
            ));
        }
        Ok(statements)
    }

    fn index_columns(
        &self,
        ci: &CreateIndex,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError> {
        let table = common::to_sql_name(&ci.on);
        let mut keep = Vec::with_capacity(ci.columns.len());
        for column in &ci.columns {
            let declared = match ctx.column_type(&table, &common::to_sql_name(column))? {
                Some(declared) => Some(declared),
                None => ctx.plan.declared_column_type(&ci.on, column),
            };
            match declared {
                Some(ref ty) if self.is_non_indexable(ty) => {
                    warn!(
                        "column {column} of type {ty} is not indexable on h2, \
                         stripping from index {}",
                        ci.index
                    );
                }
                _ => keep.push(self.sql_name(column)),
            }
        }
        Ok(keep)
    }

    /// H2 drops several columns in one statement.
    fn drop_column_statements(&self, table: &str, columns: &[&str]) -> Vec<String> {
        let names: Vec<String> = columns.iter().map(|c| self.sql_name(c)).collect();
        vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.sql_name(table),
            names.join(", ")
        )]
    }

    fn version_table_ddl(&self, table: &str) -> String {
        match self.version {
            H2Version::V1 => format!(
                "CREATE TABLE {} (version VARCHAR(14) NOT NULL, created BIGINT NOT NULL)",
                self.sql_name(table)
            ),
            H2Version::V2 => format!(
                "CREATE TABLE {} (version VARCHAR(14) NOT NULL, \
                 created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
                self.sql_name(table)
            ),
        }
    }

    fn version_insert(&self, table: &str, version: &str) -> String {
        match self.version {
            H2Version::V1 => format!(
                "INSERT INTO {} (version, created) VALUES ('{}', {})",
                self.sql_name(table),
                version,
                chrono::Utc::now().timestamp_millis()
            ),
            H2Version::V2 => format!(
                "INSERT INTO {} (version, created) VALUES ('{}', CURRENT_TIMESTAMP)",
                self.sql_name(table),
                version
            ),
        }
    }

    fn introspector<'a>(
        &self,
        driver: &'a mut dyn SqlDriver,
        _db: &ResolvedDbConfig,
    ) -> Box<dyn Introspector + 'a> {
        match self.version {
            H2Version::V1 => Box::new(H2IntrospectorV1 { driver }),
            H2Version::V2 => Box::new(H2IntrospectorV2 { driver }),
        }
    }
}

/// H2 1.x INFORMATION_SCHEMA queries. Names are uppercased; the session
/// schema comes from `SCHEMA()`.
pub struct H2IntrospectorV1<'a> {
    driver: &'a mut dyn SqlDriver,
}

impl Introspector for H2IntrospectorV1<'_> {
    fn table_exists(&mut self, table: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}'",
            table.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' AND COLUMN_NAME = '{}'",
            table.to_uppercase(),
            column.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn column_type(&mut self, table: &str, column: &str) -> Result<Option<String>, DriverError> {
        let types = self.driver.query_names(&format!(
            "SELECT TYPE_NAME FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' AND COLUMN_NAME = '{}'",
            table.to_uppercase(),
            column.to_uppercase()
        ))?;
        Ok(types.into_iter().next())
    }

    fn primary_key_exists(&mut self, table: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.CONSTRAINTS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' \
             AND CONSTRAINT_TYPE = 'PRIMARY KEY'",
            table.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn primary_key_name(&mut self, table: &str) -> Result<Option<String>, DriverError> {
        let names = self.driver.query_names(&format!(
            "SELECT CONSTRAINT_NAME FROM INFORMATION_SCHEMA.CONSTRAINTS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' \
             AND CONSTRAINT_TYPE = 'PRIMARY KEY'",
            table.to_uppercase()
        ))?;
        Ok(names.into_iter().next())
    }

    fn foreign_key_exists(&mut self, table: &str, name: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.CONSTRAINTS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' \
             AND CONSTRAINT_TYPE = 'REFERENTIAL' AND CONSTRAINT_NAME = '{}'",
            table.to_uppercase(),
            name.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.INDEXES \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' AND INDEX_NAME = '{}'",
            table.to_uppercase(),
            index.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn matching_foreign_keys(
        &mut self,
        fk_table: &str,
        fk_column: &str,
        pk_table: &str,
        pk_column: &str,
    ) -> Result<Vec<String>, DriverError> {
        self.driver.query_names(&format!(
            "SELECT FK_NAME FROM INFORMATION_SCHEMA.CROSS_REFERENCES \
             WHERE FKTABLE_NAME = '{}' AND FKCOLUMN_NAME = '{}' \
             AND PKTABLE_NAME = '{}' AND PKCOLUMN_NAME = '{}'",
            fk_table.to_uppercase(),
            fk_column.to_uppercase(),
            pk_table.to_uppercase(),
            pk_column.to_uppercase()
        ))
    }
}

/// H2 2.x INFORMATION_SCHEMA queries. The CROSS_REFERENCES view is gone;
/// matching foreign keys are derived from the standard constraint views.
pub struct H2IntrospectorV2<'a> {
    driver: &'a mut dyn SqlDriver,
}

impl Introspector for H2IntrospectorV2<'_> {
    fn table_exists(&mut self, table: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}'",
            table.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' AND COLUMN_NAME = '{}'",
            table.to_uppercase(),
            column.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn column_type(&mut self, table: &str, column: &str) -> Result<Option<String>, DriverError> {
        let types = self.driver.query_names(&format!(
            "SELECT DATA_TYPE FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' AND COLUMN_NAME = '{}'",
            table.to_uppercase(),
            column.to_uppercase()
        ))?;
        Ok(types.into_iter().next())
    }

    fn primary_key_exists(&mut self, table: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' \
             AND CONSTRAINT_TYPE = 'PRIMARY KEY'",
            table.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn primary_key_name(&mut self, table: &str) -> Result<Option<String>, DriverError> {
        let names = self.driver.query_names(&format!(
            "SELECT CONSTRAINT_NAME FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' \
             AND CONSTRAINT_TYPE = 'PRIMARY KEY'",
            table.to_uppercase()
        ))?;
        Ok(names.into_iter().next())
    }

    fn foreign_key_exists(&mut self, table: &str, name: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' \
             AND CONSTRAINT_TYPE = 'FOREIGN KEY' AND CONSTRAINT_NAME = '{}'",
            table.to_uppercase(),
            name.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.INDEXES \
             WHERE TABLE_SCHEMA = SCHEMA() AND TABLE_NAME = '{}' AND INDEX_NAME = '{}'",
            table.to_uppercase(),
            index.to_uppercase()
        ))?;
        Ok(count > 0)
    }

    fn matching_foreign_keys(
        &mut self,
        fk_table: &str,
        fk_column: &str,
        pk_table: &str,
        pk_column: &str,
    ) -> Result<Vec<String>, DriverError> {
        self.driver.query_names(&format!(
            "SELECT TC.CONSTRAINT_NAME \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS TC \
             JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS RC \
               ON TC.CONSTRAINT_NAME = RC.CONSTRAINT_NAME \
             JOIN INFORMATION_SCHEMA.CONSTRAINT_COLUMN_USAGE FK \
               ON FK.CONSTRAINT_NAME = TC.CONSTRAINT_NAME \
             JOIN INFORMATION_SCHEMA.CONSTRAINT_COLUMN_USAGE PK \
               ON PK.CONSTRAINT_NAME = RC.UNIQUE_CONSTRAINT_NAME \
             WHERE TC.CONSTRAINT_TYPE = 'FOREIGN KEY' \
             AND FK.TABLE_NAME = '{}' AND FK.COLUMN_NAME = '{}' \
             AND PK.TABLE_NAME = '{}' AND PK.COLUMN_NAME = '{}'",
            fk_table.to_uppercase(),
            fk_column.to_uppercase(),
            pk_table.to_uppercase(),
            pk_column.to_uppercase()
        ))
    }
}
