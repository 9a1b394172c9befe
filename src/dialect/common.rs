//! Helpers shared by every dialect compiler: identifier conversion,
//! fragment rendering, literal quoting, the alter-table idempotency filter
//! and the create-table placeholder expansion.

use tracing::info;

use crate::commands::{
    AlterTable, CharacterSet, ColumnSpec, Command, ConstraintSpec, CreateTable, TableOption,
    PRIMARY_KEY_SENTINEL,
};
use crate::dialect::dialect_trait::{Context, DialectImpl};
use crate::error::TernError;
use serde_json::Value;

/// Name of the throwaway column the placeholder expansion creates.
pub const PLACEHOLDER_COLUMN: &str = "__placeholder";

/// Convert an identifier-like value to its SQL form: `-` becomes `_`.
pub fn to_sql_name(ident: &str) -> String {
    ident.replace('-', "_")
}

pub fn to_sql_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

/// How a dialect quotes string literals in `insert-into` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringQuoting {
    /// Standard SQL single quotes, doubled to escape.
    Single,
    /// MySQL-style double quotes (non-standard, kept for compatibility).
    Double,
}

/// Render one JSON scalar as a SQL literal.
pub fn sql_literal(value: &Value, quoting: StringQuoting) -> Result<String, TernError> {
    match value {
        Value::String(s) => Ok(match quoting {
            StringQuoting::Single => format!("'{}'", s.replace('\'', "''")),
            StringQuoting::Double => format!("\"{}\"", s.replace('"', "\\\"")),
        }),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("NULL".to_string()),
        Value::Array(_) | Value::Object(_) => Err(TernError::Validation(
            "insert-into values must be scalars".to_string(),
        )),
    }
}

/// `name TOKEN TOKEN ...` after the dialect's sanitizer has run.
pub fn render_column<D: DialectImpl + ?Sized>(dialect: &D, column: &ColumnSpec) -> String {
    let sanitized = dialect.sanitize_column(column);
    let name = dialect.sql_name(&sanitized.name);
    if sanitized.spec.is_empty() {
        name
    } else {
        format!("{} {}", name, sanitized.spec.join(" "))
    }
}

pub fn primary_key_fragment<D: DialectImpl + ?Sized>(
    dialect: &D,
    columns: &[String],
) -> Option<String> {
    if columns.is_empty() {
        return None;
    }
    let names: Vec<String> = columns.iter().map(|c| dialect.sql_name(c)).collect();
    Some(format!("PRIMARY KEY ({})", to_sql_list(&names)))
}

/// `CONSTRAINT name FOREIGN KEY <ref-spec tail>`.
pub fn constraint_fragment<D: DialectImpl + ?Sized>(
    dialect: &D,
    constraint: &ConstraintSpec,
) -> String {
    format!(
        "CONSTRAINT {} FOREIGN KEY {}",
        dialect.sql_name(&constraint.name),
        constraint.ref_specs.join(" ")
    )
}

/// A drop-constraints entry after the primary-key sentinel is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum DropConstraint<'a> {
    ForeignKey(&'a str),
    PrimaryKey,
}

/// The directives of one alter-table after idempotency filtering, in the
/// fixed fragment order every dialect renders: options, charset, dropped
/// constraints, dropped columns, added columns, modified columns,
/// primary-key add, added constraints.
pub struct AlterDirectives<'a> {
    pub table_options: &'a [TableOption],
    pub character_set: Option<&'a CharacterSet>,
    pub drop_constraints: Vec<DropConstraint<'a>>,
    pub drop_columns: Vec<&'a str>,
    pub add_columns: Vec<&'a ColumnSpec>,
    pub modify_columns: &'a [ColumnSpec],
    pub primary_key: Option<&'a [String]>,
    pub add_constraints: Vec<&'a ConstraintSpec>,
}

/// Apply the uniform idempotency rules to one alter-table against the live
/// schema and the current plan.
pub fn filter_alter_table<'a>(
    at: &'a AlterTable,
    ctx: &mut Context<'_>,
) -> Result<AlterDirectives<'a>, TernError> {
    let table = to_sql_name(&at.table);

    let mut drop_constraints = Vec::new();
    for name in &at.drop_constraints {
        if name == PRIMARY_KEY_SENTINEL {
            if ctx.primary_key_exists(&table)? {
                drop_constraints.push(DropConstraint::PrimaryKey);
            } else {
                info!("no primary key on {table}, skipping drop");
            }
        } else if ctx.foreign_key_exists(&table, &to_sql_name(name))? {
            drop_constraints.push(DropConstraint::ForeignKey(name));
        } else {
            info!("constraint {name} does not exist on {table}, skipping drop");
        }
    }

    let mut drop_columns = Vec::new();
    for column in &at.drop_columns {
        if ctx.column_exists(&table, &to_sql_name(column))? {
            drop_columns.push(column.as_str());
        } else {
            info!("column {column} does not exist on {table}, skipping drop");
        }
    }

    let mut add_columns = Vec::new();
    for column in &at.add_columns {
        let exists = ctx.column_exists(&table, &to_sql_name(&column.name))?;
        if !exists || ctx.plan.drops_column(&at.table, &column.name) {
            add_columns.push(column);
        } else {
            info!("column {} already exists on {table}, skipping add", column.name);
        }
    }

    let mut add_constraints = Vec::new();
    for constraint in &at.add_constraints {
        let exists = ctx.foreign_key_exists(&table, &to_sql_name(&constraint.name))?;
        if !exists || ctx.plan.drops_constraint(&at.table, &constraint.name) {
            add_constraints.push(constraint);
        } else {
            info!(
                "constraint {} already exists on {table}, skipping add",
                constraint.name
            );
        }
    }

    let primary_key = if at.primary_key.is_empty() {
        None
    } else if ctx.primary_key_exists(&table)? && !ctx.plan.drops_primary_key(&at.table) {
        info!("primary key already exists on {table}, skipping add");
        None
    } else {
        Some(&at.primary_key[..])
    };

    Ok(AlterDirectives {
        table_options: &at.table_options,
        character_set: at.character_set.as_ref(),
        drop_constraints,
        drop_columns,
        add_columns,
        modify_columns: &at.modify_columns,
        primary_key,
        add_constraints,
    })
}

/// The four-step rewrite of a create-table that carries table options:
/// create the table with a throwaway column, route columns, options,
/// constraints and primary key through one synthetic alter-table, then drop
/// the throwaway column. The trailing drop is emitted directly because the
/// drop-column idempotency rule would otherwise swallow it under an
/// empty-schema introspector.
pub fn expand_create_table<D: DialectImpl + ?Sized>(
    dialect: &D,
    ct: &CreateTable,
    ctx: &mut Context<'_>,
) -> Result<Vec<String>, TernError> {
    let placeholder = CreateTable {
        table: ct.table.clone(),
        columns: vec![ColumnSpec::new(PLACEHOLDER_COLUMN, &["int"])],
        ..CreateTable::default()
    };
    let mut statements = dialect.compile(&Command::CreateTable(placeholder), ctx)?;

    let alter = AlterTable {
        table: ct.table.clone(),
        add_columns: ct.columns.clone(),
        add_constraints: ct.constraints.clone(),
        primary_key: ct.primary_key.clone(),
        table_options: ct.table_options.clone(),
        ..AlterTable::default()
    };
    statements.extend(dialect.compile(&Command::AlterTable(alter), ctx)?);
    statements.extend(dialect.drop_column_statements(&ct.table, &[PLACEHOLDER_COLUMN]));
    Ok(statements)
}
