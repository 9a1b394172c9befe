//! Typed representation of the declarative migration commands.
//!
//! A command on disk is a JSON map carrying exactly one dispatch key
//! (`create-table`, `alter-table`, ...). That shape is serde's externally
//! tagged enum representation, so [`Command`] deserializes directly from it.
//! [`parse_commands`] validates the raw value first so shape errors and
//! unknown dispatch keys produce the exact contract error messages.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use crate::error::TernError;

/// Sentinel constraint name: dropping it means dropping the primary key.
pub const PRIMARY_KEY_SENTINEL: &str = "primary-key";

/// The dispatch keys this engine understands, in documentation order.
pub const DISPATCH_KEYS: &[&str] = &[
    "create-table",
    "drop-table",
    "alter-table",
    "create-index",
    "drop-index",
    "insert-into",
    "update",
];

/// One declarative migration command, discriminated by its dispatch key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Command {
    #[serde(rename = "create-table")]
    CreateTable(CreateTable),
    #[serde(rename = "drop-table")]
    DropTable(DropTable),
    #[serde(rename = "alter-table")]
    AlterTable(AlterTable),
    #[serde(rename = "create-index")]
    CreateIndex(CreateIndex),
    #[serde(rename = "drop-index")]
    DropIndex(DropIndex),
    #[serde(rename = "insert-into")]
    InsertInto(InsertInto),
    #[serde(rename = "update")]
    Update(Update),
}

impl Command {
    /// The dispatch key this command was parsed from.
    pub fn dispatch_key(&self) -> &'static str {
        match self {
            Command::CreateTable(_) => "create-table",
            Command::DropTable(_) => "drop-table",
            Command::AlterTable(_) => "alter-table",
            Command::CreateIndex(_) => "create-index",
            Command::DropIndex(_) => "drop-index",
            Command::InsertInto(_) => "insert-into",
            Command::Update(_) => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CreateTable {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(rename = "primary-key", default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
    #[serde(rename = "table-options", default)]
    pub table_options: Vec<TableOption>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DropTable {
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AlterTable {
    pub table: String,
    #[serde(rename = "add-columns", default)]
    pub add_columns: Vec<ColumnSpec>,
    #[serde(rename = "drop-columns", default)]
    pub drop_columns: Vec<String>,
    #[serde(rename = "modify-columns", default)]
    pub modify_columns: Vec<ColumnSpec>,
    #[serde(rename = "add-constraints", default)]
    pub add_constraints: Vec<ConstraintSpec>,
    #[serde(rename = "drop-constraints", default)]
    pub drop_constraints: Vec<String>,
    #[serde(rename = "primary-key", default)]
    pub primary_key: Vec<String>,
    #[serde(rename = "table-options", default)]
    pub table_options: Vec<TableOption>,
    #[serde(rename = "character-set", default)]
    pub character_set: Option<CharacterSet>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateIndex {
    pub index: String,
    pub on: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DropIndex {
    pub index: String,
    pub on: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct InsertInto {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
    #[serde(default)]
    pub query: Option<String>,
}

/// Raw update statement, optionally overridden per backend. The override
/// keys are subprotocol names (`mysql`, `postgresql`, `h2`, `sqlserver`).
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(flatten)]
    pub overrides: BTreeMap<String, String>,
}

impl Update {
    /// The statement text for the given subprotocol: a non-empty override
    /// wins over the generic query.
    pub fn query_for(&self, subprotocol: &str) -> Option<&str> {
        if let Some(text) = self.overrides.get(subprotocol) {
            if !text.is_empty() {
                return Some(text);
            }
        }
        self.query.as_deref().filter(|q| !q.is_empty())
    }
}

/// Column name plus its free-form type-and-modifier tokens. On disk this is
/// an array whose head is the name: `["a", "INT", "NOT NULL"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub spec: Vec<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, spec: &[&str]) -> Self {
        ColumnSpec {
            name: name.into(),
            spec: spec.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl<'de> Deserialize<'de> for ColumnSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parts = Vec::<String>::deserialize(deserializer)?;
        let mut iter = parts.into_iter();
        let name = iter
            .next()
            .ok_or_else(|| de::Error::custom("column spec requires a name"))?;
        Ok(ColumnSpec {
            name,
            spec: iter.collect(),
        })
    }
}

/// Constraint name plus the tail of its `FOREIGN KEY ... REFERENCES ...`
/// fragment: `["fk_a", "(a) REFERENCES foo(a)"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSpec {
    pub name: String,
    pub ref_specs: Vec<String>,
}

impl ConstraintSpec {
    pub fn new(name: impl Into<String>, ref_specs: &[&str]) -> Self {
        ConstraintSpec {
            name: name.into(),
            ref_specs: ref_specs.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl<'de> Deserialize<'de> for ConstraintSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = ConstraintSpec;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [name, ref-spec, ...] array")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let name: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("constraint spec requires a name"))?;
                let mut ref_specs = Vec::new();
                while let Some(part) = seq.next_element::<String>()? {
                    ref_specs.push(part);
                }
                Ok(ConstraintSpec { name, ref_specs })
            }
        }

        deserializer.deserialize_seq(SpecVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CharacterSet {
    pub name: String,
    #[serde(default)]
    pub collation: Option<String>,
}

/// Validate and parse one direction (`up` or `down`) of a migration.
///
/// The value must be a map or a list of maps; each map must carry exactly
/// one dispatch key from the supported set.
pub fn parse_commands(value: &Value) -> Result<Vec<Command>, TernError> {
    let maps: Vec<&Value> = match value {
        Value::Object(_) => vec![value],
        Value::Array(items) if items.iter().all(Value::is_object) => items.iter().collect(),
        _ => {
            return Err(TernError::Validation(
                "up/down must be a map or list of maps".to_string(),
            ))
        }
    };

    let mut commands = Vec::with_capacity(maps.len());
    for map in maps {
        commands.push(parse_command(map)?);
    }
    Ok(commands)
}

fn parse_command(value: &Value) -> Result<Command, TernError> {
    let object = value
        .as_object()
        .expect("parse_commands only passes objects");
    if object.len() != 1 {
        return Err(TernError::Validation(format!(
            "command must carry exactly one dispatch key, found {}",
            object.len()
        )));
    }
    let key = object.keys().next().expect("len checked above");
    if !DISPATCH_KEYS.contains(&key.as_str()) {
        return Err(TernError::UnknownCommand(key.clone()));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| TernError::Validation(format!("invalid {key} command: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_create_table() {
        let value = json!({
            "create-table": {
                "table": "foo",
                "columns": [["a", "INT"], ["b", "VARCHAR(255)", "NOT NULL"]],
                "primary-key": ["a"]
            }
        });
        let commands = parse_commands(&value).unwrap();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            Command::CreateTable(ct) => {
                assert_eq!(ct.table, "foo");
                assert_eq!(ct.columns[0], ColumnSpec::new("a", &["INT"]));
                assert_eq!(ct.columns[1].spec, vec!["VARCHAR(255)", "NOT NULL"]);
                assert_eq!(ct.primary_key, vec!["a"]);
                assert!(ct.constraints.is_empty());
            }
            other => panic!("expected create-table, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_of_commands_preserves_order() {
        let value = json!([
            {"drop-index": {"index": "idx_a", "on": "foo"}},
            {"drop-table": {"table": "foo"}}
        ]);
        let commands = parse_commands(&value).unwrap();
        assert_eq!(commands[0].dispatch_key(), "drop-index");
        assert_eq!(commands[1].dispatch_key(), "drop-table");
    }

    #[test]
    fn test_unknown_dispatch_key_is_rejected() {
        let value = json!([{"create-view": {"view": "v"}}]);
        let err = parse_commands(&value).unwrap_err();
        assert_eq!(err.to_string(), "don't know how to process: create-view");
    }

    #[test]
    fn test_non_map_input_is_rejected() {
        let err = parse_commands(&json!("CREATE TABLE foo")).unwrap_err();
        assert_eq!(err.to_string(), "up/down must be a map or list of maps");

        let err = parse_commands(&json!([["not", "a", "map"]])).unwrap_err();
        assert_eq!(err.to_string(), "up/down must be a map or list of maps");
    }

    #[test]
    fn test_multiple_dispatch_keys_rejected() {
        let value = json!([{
            "create-table": {"table": "foo"},
            "drop-table": {"table": "foo"}
        }]);
        assert!(parse_commands(&value).is_err());
    }

    #[test]
    fn test_update_override_lookup() {
        let value = json!({
            "update": {
                "query": "UPDATE foo SET a = 1",
                "h2": "UPDATE foo SET a = 2"
            }
        });
        let commands = parse_commands(&value).unwrap();
        match &commands[0] {
            Command::Update(update) => {
                assert_eq!(update.query_for("h2"), Some("UPDATE foo SET a = 2"));
                assert_eq!(update.query_for("mysql"), Some("UPDATE foo SET a = 1"));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_constraint_spec_parses_name_and_tail() {
        let value = json!({
            "create-table": {
                "table": "foo",
                "columns": [["a", "INT"]],
                "constraints": [["fk_a", "(a) REFERENCES foo(a)"]]
            }
        });
        let commands = parse_commands(&value).unwrap();
        match &commands[0] {
            Command::CreateTable(ct) => {
                assert_eq!(ct.constraints[0].name, "fk_a");
                assert_eq!(ct.constraints[0].ref_specs, vec!["(a) REFERENCES foo(a)"]);
            }
            other => panic!("expected create-table, got {other:?}"),
        }
    }
}
