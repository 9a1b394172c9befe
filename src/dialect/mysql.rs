use crate::commands::AlterTable;
use crate::config::ResolvedDbConfig;
use crate::dialect::common::{self, DropConstraint, StringQuoting};
use crate::dialect::dialect_trait::{Context, DialectImpl};
use crate::dialect::introspect::Introspector;
use crate::driver::SqlDriver;
use crate::error::{DriverError, TernError};

/// Implementation of DialectImpl for MySQL.
pub struct MysqlDialect;

impl Default for MysqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl MysqlDialect {
    pub fn new() -> Self {
        MysqlDialect
    }
}

impl DialectImpl for MysqlDialect {
    fn subprotocol(&self) -> &'static str {
        "mysql"
    }

    fn string_quoting(&self) -> StringQuoting {
        StringQuoting::Double
    }

    fn compile_alter_table(
        &self,
        at: &AlterTable,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError> {
        let directives = common::filter_alter_table(at, ctx)?;
        let table = self.sql_name(&at.table);
        let alter = |fragment: String| format!("ALTER TABLE {table} {fragment}");
        let mut statements = Vec::new();

        for option in directives.table_options {
            statements.push(alter(format!("{}={}", option.name, option.value)));
        }
        if let Some(charset) = directives.character_set {
            let mut fragment = format!("CONVERT TO CHARACTER SET {}", charset.name);
            if let Some(collation) = &charset.collation {
                fragment.push_str(&format!(" COLLATE {collation}"));
            }
            statements.push(alter(fragment));
        }
        for drop in &directives.drop_constraints {
            statements.push(alter(match drop {
                DropConstraint::ForeignKey(name) => {
                    format!("DROP FOREIGN KEY {}", self.sql_name(name))
                }
                DropConstraint::PrimaryKey => "DROP PRIMARY KEY".to_string(),
            }));
        }
        for column in &directives.drop_columns {
            statements.push(alter(format!("DROP COLUMN {}", self.sql_name(column))));
        }
        for column in &directives.add_columns {
            statements.push(alter(format!(
                "ADD COLUMN {}",
                common::render_column(self, column)
            )));
        }
        for column in directives.modify_columns {
            statements.push(alter(format!(
                "MODIFY COLUMN {}",
                common::render_column(self, column)
            )));
        }
        if let Some(pk) = directives.primary_key {
            if let Some(fragment) = common::primary_key_fragment(self, pk) {
                statements.push(alter(format!("ADD {fragment}")));
            }
        }
        for constraint in &directives.add_constraints {
            statements.push(alter(format!(
                "ADD {}",
                common::constraint_fragment(self, constraint)
            )));
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

    fn version_table_ddl(&self, table: &str) -> String {
        format!(
            "CREATE TABLE {} (version VARCHAR(14) NOT NULL, created BIGINT NOT NULL)",
            self.sql_name(table)
        )
    }

    fn version_insert(&self, table: &str, version: &str) -> String {
        format!(
            "INSERT INTO {} (version, created) VALUES ('{}', {})",
            self.sql_name(table),
            version,
            chrono::Utc::now().timestamp_millis()
        )
    }

    fn introspector<'a>(
        &self,
        driver: &'a mut dyn SqlDriver,
        db: &ResolvedDbConfig,
    ) -> Box<dyn Introspector + 'a> {
        Box::new(MysqlIntrospector {
            driver,
            database: db.database.clone(),
        })
    }
}

/// information_schema queries scoped to the configured database.
pub struct MysqlIntrospector<'a> {
    driver: &'a mut dyn SqlDriver,
    database: String,
}

impl Introspector for MysqlIntrospector<'_> {
    fn table_exists(&mut self, table: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = '{}' AND table_name = '{}'",
            self.database, table
        ))?;
        Ok(count > 0)
    }

    fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.columns \
             WHERE table_schema = '{}' AND table_name = '{}' AND column_name = '{}'",
            self.database, table, column
        ))?;
        Ok(count > 0)
    }

    fn column_type(&mut self, table: &str, column: &str) -> Result<Option<String>, DriverError> {
        let types = self.driver.query_names(&format!(
            "SELECT data_type FROM information_schema.columns \
             WHERE table_schema = '{}' AND table_name = '{}' AND column_name = '{}'",
            self.database, table, column
        ))?;
        Ok(types.into_iter().next())
    }

    fn primary_key_exists(&mut self, table: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.table_constraints \
             WHERE constraint_type = 'PRIMARY KEY' \
             AND table_schema = '{}' AND table_name = '{}'",
            self.database, table
        ))?;
        Ok(count > 0)
    }

    fn primary_key_name(&mut self, table: &str) -> Result<Option<String>, DriverError> {
        let names = self.driver.query_names(&format!(
            "SELECT constraint_name FROM information_schema.table_constraints \
             WHERE constraint_type = 'PRIMARY KEY' \
             AND table_schema = '{}' AND table_name = '{}'",
            self.database, table
        ))?;
        Ok(names.into_iter().next())
    }

    fn foreign_key_exists(&mut self, table: &str, name: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.table_constraints \
             WHERE constraint_type = 'FOREIGN KEY' \
             AND table_schema = '{}' AND table_name = '{}' AND constraint_name = '{}'",
            self.database, table, name
        ))?;
        Ok(count > 0)
    }

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool, DriverError> {
        let count = self.driver.query_count(&format!(
            "SELECT COUNT(*) FROM information_schema.statistics \
             WHERE table_schema = '{}' AND table_name = '{}' AND index_name = '{}'",
            self.database, table, index
        ))?;
        Ok(count > 0)
    }
}
