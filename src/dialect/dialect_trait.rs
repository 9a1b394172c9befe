use tracing::{info, warn};

use crate::commands::{
    AlterTable, ColumnSpec, Command, CreateIndex, CreateTable, DropIndex, InsertInto, Update,
};
use crate::config::ResolvedDbConfig;
use crate::dialect::common::{self, StringQuoting};
use crate::dialect::introspect::Introspector;
use crate::driver::SqlDriver;
use crate::error::TernError;
use crate::plan::Plan;

/// Ambient state one command is compiled against: the live-database
/// introspector (absent in tests and dry runs against driverless backends,
/// in which case every existence check answers false) and the plan of
/// commands already compiled in this migration.
pub struct Context<'a> {
    pub introspector: Option<&'a mut dyn Introspector>,
    pub plan: &'a Plan,
}

impl<'a> Context<'a> {
    pub fn new(introspector: Option<&'a mut dyn Introspector>, plan: &'a Plan) -> Self {
        Context { introspector, plan }
    }

    /// Context with no live database: the empty-schema assumption.
    pub fn empty(plan: &'a Plan) -> Self {
        Context {
            introspector: None,
            plan,
        }
    }

    pub fn table_exists(&mut self, table: &str) -> Result<bool, TernError> {
        match self.introspector.as_deref_mut() {
            Some(i) => Ok(i.table_exists(table)?),
            None => Ok(false),
        }
    }

    pub fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, TernError> {
        match self.introspector.as_deref_mut() {
            Some(i) => Ok(i.column_exists(table, column)?),
            None => Ok(false),
        }
    }

    pub fn column_type(&mut self, table: &str, column: &str) -> Result<Option<String>, TernError> {
        match self.introspector.as_deref_mut() {
            Some(i) => Ok(i.column_type(table, column)?),
            None => Ok(None),
        }
    }

    pub fn primary_key_exists(&mut self, table: &str) -> Result<bool, TernError> {
        match self.introspector.as_deref_mut() {
            Some(i) => Ok(i.primary_key_exists(table)?),
            None => Ok(false),
        }
    }

    pub fn primary_key_name(&mut self, table: &str) -> Result<Option<String>, TernError> {
        match self.introspector.as_deref_mut() {
            Some(i) => Ok(i.primary_key_name(table)?),
            None => Ok(None),
        }
    }

    pub fn foreign_key_exists(&mut self, table: &str, name: &str) -> Result<bool, TernError> {
        match self.introspector.as_deref_mut() {
            Some(i) => Ok(i.foreign_key_exists(table, name)?),
            None => Ok(false),
        }
    }

    pub fn index_exists(&mut self, table: &str, index: &str) -> Result<bool, TernError> {
        match self.introspector.as_deref_mut() {
            Some(i) => Ok(i.index_exists(table, index)?),
            None => Ok(false),
        }
    }

    pub fn matching_foreign_keys(
        &mut self,
        fk_table: &str,
        fk_column: &str,
        pk_table: &str,
        pk_column: &str,
    ) -> Result<Vec<String>, TernError> {
        match self.introspector.as_deref_mut() {
            Some(i) => Ok(i.matching_foreign_keys(fk_table, fk_column, pk_table, pk_column)?),
            None => Ok(Vec::new()),
        }
    }
}

/// Trait that defines the interface for all dialect implementations.
///
/// `compile` translates one backend-independent command into zero or more
/// SQL statements; an empty result means the live state already satisfies
/// the command and is not an error. The generic algorithms live in default
/// methods; each backend overrides the hooks where its SQL surface
/// diverges. `alter-table` has no useful common rendering, so it is the one
/// required compilation method.
pub trait DialectImpl {
    /// The subprotocol this dialect serves; also the `update` override key.
    fn subprotocol(&self) -> &'static str;

    /// Identifier conversion, including any reserved-word quoting.
    fn sql_name(&self, ident: &str) -> String {
        common::to_sql_name(ident)
    }

    /// How string literals are quoted in `insert-into` values.
    fn string_quoting(&self) -> StringQuoting {
        StringQuoting::Single
    }

    /// Per-dialect column-spec sanitizer; the default passes tokens
    /// through verbatim.
    fn sanitize_column(&self, column: &ColumnSpec) -> ColumnSpec {
        column.clone()
    }

    fn compile(&self, command: &Command, ctx: &mut Context<'_>) -> Result<Vec<String>, TernError> {
        match command {
            Command::CreateTable(ct) => self.compile_create_table(ct, ctx),
            Command::DropTable(dt) => Ok(vec![format!("DROP TABLE {}", self.sql_name(&dt.table))]),
            Command::AlterTable(at) => self.compile_alter_table(at, ctx),
            Command::CreateIndex(ci) => self.compile_create_index(ci, ctx),
            Command::DropIndex(di) => self.compile_drop_index(di, ctx),
            Command::InsertInto(ii) => self.compile_insert_into(ii),
            Command::Update(update) => self.compile_update(update),
        }
    }

    fn compile_create_table(
        &self,
        ct: &CreateTable,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError> {
        let table = self.sql_name(&ct.table);
        if ctx.table_exists(&common::to_sql_name(&ct.table))? && !ctx.plan.drops_table(&ct.table) {
            info!("table {table} already exists, skipping create-table");
            return Ok(Vec::new());
        }
        if !ct.table_options.is_empty() {
            // Some backends only accept table options on a standalone
            // ALTER, so options route the whole creation through one.
            return common::expand_create_table(self, ct, ctx);
        }
        let mut parts: Vec<String> = ct
            .columns
            .iter()
            .map(|column| common::render_column(self, column))
            .collect();
        if let Some(pk) = common::primary_key_fragment(self, &ct.primary_key) {
            parts.push(pk);
        }
        for constraint in &ct.constraints {
            parts.push(common::constraint_fragment(self, constraint));
        }
        Ok(vec![format!("CREATE TABLE {} ({})", table, parts.join(", "))])
    }

    fn compile_alter_table(
        &self,
        at: &AlterTable,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError>;

    fn compile_create_index(
        &self,
        ci: &CreateIndex,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError> {
        let index = self.sql_name(&ci.index);
        let table = self.sql_name(&ci.on);
        if ctx.index_exists(&common::to_sql_name(&ci.on), &common::to_sql_name(&ci.index))?
            && !ctx.plan.drops_index(&ci.on, &ci.index)
        {
            info!("index {index} on {table} already exists, skipping create-index");
            return Ok(Vec::new());
        }
        let columns = self.index_columns(ci, ctx)?;
        if columns.is_empty() {
            warn!("no indexable columns for index {index} on {table}, emitting nothing");
            return Ok(Vec::new());
        }
        let unique = if ci.unique { "UNIQUE " } else { "" };
        Ok(vec![format!(
            "CREATE {}INDEX {} ON {} ({})",
            unique,
            index,
            table,
            columns.join(", ")
        )])
    }

    /// The columns an index may cover. H2 overrides this to strip columns
    /// of non-indexable types.
    fn index_columns(
        &self,
        ci: &CreateIndex,
        _ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError> {
        Ok(ci.columns.iter().map(|c| self.sql_name(c)).collect())
    }

    fn compile_drop_index(
        &self,
        di: &DropIndex,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<String>, TernError> {
        if !ctx.index_exists(&common::to_sql_name(&di.on), &common::to_sql_name(&di.index))? {
            info!(
                "index {} on {} does not exist, skipping drop-index",
                di.index, di.on
            );
            return Ok(Vec::new());
        }
        Ok(vec![self.drop_index_sql(&di.index, &di.on)])
    }

    fn drop_index_sql(&self, index: &str, _table: &str) -> String {
        format!("DROP INDEX {}", self.sql_name(index))
    }

    /// Statements dropping the given columns, used by the alter paths and
    /// by the placeholder expansion (which must bypass idempotency checks).
    fn drop_column_statements(&self, table: &str, columns: &[&str]) -> Vec<String> {
        columns
            .iter()
            .map(|column| {
                format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    self.sql_name(table),
                    self.sql_name(column)
                )
            })
            .collect()
    }

    fn compile_insert_into(&self, ii: &InsertInto) -> Result<Vec<String>, TernError> {
        let table = self.sql_name(&ii.table);
        let columns = if ii.columns.is_empty() {
            String::new()
        } else {
            let names: Vec<String> = ii.columns.iter().map(|c| self.sql_name(c)).collect();
            format!(" ({})", common::to_sql_list(&names))
        };
        if !ii.values.is_empty() {
            let mut groups = Vec::with_capacity(ii.values.len());
            for row in &ii.values {
                let mut rendered = Vec::with_capacity(row.len());
                for value in row {
                    rendered.push(common::sql_literal(value, self.string_quoting())?);
                }
                groups.push(format!("({})", rendered.join(",")));
            }
            Ok(vec![format!(
                "INSERT INTO {}{} VALUES {}",
                table,
                columns,
                groups.join(",")
            )])
        } else if let Some(query) = ii.query.as_deref().filter(|q| !q.is_empty()) {
            Ok(vec![format!("INSERT INTO {}{} {}", table, columns, query)])
        } else {
            Err(TernError::Validation(
                "insert-into requires values or query".to_string(),
            ))
        }
    }

    fn compile_update(&self, update: &Update) -> Result<Vec<String>, TernError> {
        match update.query_for(self.subprotocol()) {
            Some(query) => Ok(vec![query.to_string()]),
            None => Err(TernError::Validation("update requires a query".to_string())),
        }
    }

    /// DDL for the version registry table; the `created` column type is
    /// backend-specific.
    fn version_table_ddl(&self, table: &str) -> String;

    fn version_insert(&self, table: &str, version: &str) -> String {
        format!(
            "INSERT INTO {} (version, created) VALUES ('{}', CURRENT_TIMESTAMP)",
            self.sql_name(table),
            version
        )
    }

    fn version_delete(&self, table: &str, version: &str) -> String {
        format!(
            "DELETE FROM {} WHERE version = '{}'",
            self.sql_name(table),
            version
        )
    }

    fn version_select(&self, table: &str) -> String {
        format!("SELECT version FROM {} ORDER BY version", self.sql_name(table))
    }

    /// Build the live-database introspector for this dialect over the
    /// given driver.
    fn introspector<'a>(
        &self,
        driver: &'a mut dyn SqlDriver,
        db: &ResolvedDbConfig,
    ) -> Box<dyn Introspector + 'a>;
}
