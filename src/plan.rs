//! The plan recorder: an ordered buffer of the commands already compiled in
//! the current migration. The dialect compilers consult it to decide whether
//! an apparently-redundant command is in fact re-creating something an
//! earlier command in the same migration tore down.

use crate::commands::{Command, PRIMARY_KEY_SENTINEL};

#[derive(Debug, Default)]
pub struct Plan {
    commands: Vec<Command>,
}

impl Plan {
    pub fn new() -> Self {
        Plan::default()
    }

    /// Record a successfully compiled command. Called by the runner, never
    /// by the compilers themselves, so failed compilations cannot pollute
    /// the plan.
    pub fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Any prior drop-table for this table?
    pub fn drops_table(&self, table: &str) -> bool {
        self.commands.iter().any(|c| match c {
            Command::DropTable(dt) => dt.table == table,
            _ => false,
        })
    }

    /// Any prior alter-table that drops this column on this table?
    pub fn drops_column(&self, table: &str, column: &str) -> bool {
        self.commands.iter().any(|c| match c {
            Command::AlterTable(at) => {
                at.table == table && at.drop_columns.iter().any(|d| d == column)
            }
            _ => false,
        })
    }

    /// Any prior alter-table that drops this named constraint on this table?
    pub fn drops_constraint(&self, table: &str, name: &str) -> bool {
        self.commands.iter().any(|c| match c {
            Command::AlterTable(at) => {
                at.table == table && at.drop_constraints.iter().any(|d| d == name)
            }
            _ => false,
        })
    }

    /// Any prior alter-table that drops the primary key on this table?
    pub fn drops_primary_key(&self, table: &str) -> bool {
        self.drops_constraint(table, PRIMARY_KEY_SENTINEL)
    }

    /// Any prior drop-index for this (table, index) pair?
    pub fn drops_index(&self, table: &str, index: &str) -> bool {
        self.commands.iter().any(|c| match c {
            Command::DropIndex(di) => di.on == table && di.index == index,
            _ => false,
        })
    }

    /// The type token a prior create-table or alter-table add-columns in
    /// this migration declared for the column, if any. Later declarations
    /// win.
    pub fn declared_column_type(&self, table: &str, column: &str) -> Option<String> {
        let mut declared = None;
        for command in &self.commands {
            let columns = match command {
                Command::CreateTable(ct) if ct.table == table => &ct.columns,
                Command::AlterTable(at) if at.table == table => &at.add_columns,
                _ => continue,
            };
            for spec in columns {
                if spec.name == column {
                    if let Some(ty) = spec.spec.first() {
                        declared = Some(ty.clone());
                    }
                }
            }
        }
        declared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AlterTable, ColumnSpec, CreateTable, DropIndex, DropTable};

    fn drop_table(table: &str) -> Command {
        Command::DropTable(DropTable {
            table: table.to_string(),
        })
    }

    #[test]
    fn test_plan_preserves_submission_order_and_length() {
        let mut plan = Plan::new();
        assert!(plan.is_empty());
        plan.record(drop_table("a"));
        plan.record(drop_table("b"));
        plan.record(drop_table("c"));
        assert_eq!(plan.len(), 3);
        let tables: Vec<&str> = plan
            .commands()
            .iter()
            .map(|c| match c {
                Command::DropTable(dt) => dt.table.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(tables, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_drop_queries_match_table_scope() {
        let mut plan = Plan::new();
        plan.record(Command::AlterTable(AlterTable {
            table: "foo".to_string(),
            drop_columns: vec!["bar".to_string()],
            drop_constraints: vec!["fk_bar".to_string(), PRIMARY_KEY_SENTINEL.to_string()],
            ..AlterTable::default()
        }));
        plan.record(Command::DropIndex(DropIndex {
            index: "idx_bar".to_string(),
            on: "foo".to_string(),
        }));

        assert!(plan.drops_column("foo", "bar"));
        assert!(!plan.drops_column("other", "bar"));
        assert!(plan.drops_constraint("foo", "fk_bar"));
        assert!(plan.drops_primary_key("foo"));
        assert!(plan.drops_index("foo", "idx_bar"));
        assert!(!plan.drops_index("foo", "idx_other"));
        assert!(!plan.drops_table("foo"));
    }

    #[test]
    fn test_declared_column_type_later_declaration_wins() {
        let mut plan = Plan::new();
        plan.record(Command::CreateTable(CreateTable {
            table: "foo".to_string(),
            columns: vec![ColumnSpec::new("body", &["TEXT"])],
            ..CreateTable::default()
        }));
        assert_eq!(
            plan.declared_column_type("foo", "body").as_deref(),
            Some("TEXT")
        );

        plan.record(Command::AlterTable(AlterTable {
            table: "foo".to_string(),
            add_columns: vec![ColumnSpec::new("body", &["VARCHAR(64)"])],
            ..AlterTable::default()
        }));
        assert_eq!(
            plan.declared_column_type("foo", "body").as_deref(),
            Some("VARCHAR(64)")
        );
        assert_eq!(plan.declared_column_type("foo", "missing"), None);
    }
}
