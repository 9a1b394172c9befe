//! The SQL execution seam.
//!
//! The compiler and runner never talk to a database directly; they go
//! through [`SqlDriver`], which executes one statement at a time and
//! answers the two query shapes introspection needs (a count, a column of
//! names). Native synchronous drivers are bundled for PostgreSQL and MySQL.
//! SQL Server and H2 have no synchronous Rust client, so those backends run
//! against [`NullDriver`] in dry-run mode or an embedder-supplied driver.

use mysql::prelude::Queryable;
use tracing::debug;

use crate::config::ResolvedDbConfig;
use crate::error::{clean_driver_message, DriverError};

pub trait SqlDriver {
    /// Execute a statement, returning the affected-row count.
    fn execute(&mut self, sql: &str) -> Result<u64, DriverError>;

    /// Run a query whose first column of the first row is a count.
    /// No rows means zero.
    fn query_count(&mut self, sql: &str) -> Result<i64, DriverError>;

    /// Run a query returning a single string column; NULLs are dropped.
    fn query_names(&mut self, sql: &str) -> Result<Vec<String>, DriverError>;
}

/// Open a native driver for the configured backend.
pub fn open_driver(db: &ResolvedDbConfig) -> Result<Box<dyn SqlDriver>, DriverError> {
    match db.subprotocol.as_str() {
        "postgresql" => Ok(Box::new(PostgresDriver::connect(db)?)),
        "mysql" => Ok(Box::new(MysqlDriver::connect(db)?)),
        other => Err(DriverError::NoNativeDriver(other.to_string())),
    }
}

/// Driver that accepts every statement and reports an empty schema.
/// Backs dry runs for backends without a native driver, and tests.
#[derive(Debug, Default)]
pub struct NullDriver;

impl SqlDriver for NullDriver {
    fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
        debug!("null driver discarding statement: {sql}");
        Ok(0)
    }

    fn query_count(&mut self, _sql: &str) -> Result<i64, DriverError> {
        Ok(0)
    }

    fn query_names(&mut self, _sql: &str) -> Result<Vec<String>, DriverError> {
        Ok(Vec::new())
    }
}

pub struct PostgresDriver {
    client: postgres::Client,
}

impl PostgresDriver {
    pub fn connect(db: &ResolvedDbConfig) -> Result<Self, DriverError> {
        let mut config = postgres::Config::new();
        config
            .host(&db.host)
            .port(db.port)
            .dbname(&db.database)
            .user(&db.user);
        if !db.password.is_empty() {
            config.password(&db.password);
        }
        let client = config
            .connect(postgres::NoTls)
            .map_err(|e| DriverError::Connect(clean_driver_message(&e.to_string())))?;
        Ok(PostgresDriver { client })
    }
}

impl SqlDriver for PostgresDriver {
    fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
        debug!("postgresql: {sql}");
        self.client
            .execute(sql, &[])
            .map_err(|e| DriverError::Execute(clean_driver_message(&e.to_string())))
    }

    fn query_count(&mut self, sql: &str) -> Result<i64, DriverError> {
        let rows = self
            .client
            .query(sql, &[])
            .map_err(|e| DriverError::Execute(clean_driver_message(&e.to_string())))?;
        match rows.first() {
            Some(row) => row
                .try_get(0)
                .map_err(|e| DriverError::Execute(clean_driver_message(&e.to_string()))),
            None => Ok(0),
        }
    }

    fn query_names(&mut self, sql: &str) -> Result<Vec<String>, DriverError> {
        let rows = self
            .client
            .query(sql, &[])
            .map_err(|e| DriverError::Execute(clean_driver_message(&e.to_string())))?;
        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: Option<String> = row
                .try_get(0)
                .map_err(|e| DriverError::Execute(clean_driver_message(&e.to_string())))?;
            if let Some(name) = name {
                names.push(name);
            }
        }
        Ok(names)
    }
}

pub struct MysqlDriver {
    conn: mysql::Conn,
}

impl MysqlDriver {
    pub fn connect(db: &ResolvedDbConfig) -> Result<Self, DriverError> {
        let opts = mysql::OptsBuilder::new()
            .ip_or_hostname(Some(db.host.clone()))
            .tcp_port(db.port)
            .db_name(Some(db.database.clone()))
            .user(Some(db.user.clone()))
            .pass(Some(db.password.clone()));
        let conn = mysql::Conn::new(opts)
            .map_err(|e| DriverError::Connect(clean_driver_message(&e.to_string())))?;
        Ok(MysqlDriver { conn })
    }
}

impl SqlDriver for MysqlDriver {
    fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
        debug!("mysql: {sql}");
        self.conn
            .query_drop(sql)
            .map_err(|e| DriverError::Execute(clean_driver_message(&e.to_string())))?;
        Ok(self.conn.affected_rows())
    }

    fn query_count(&mut self, sql: &str) -> Result<i64, DriverError> {
        let row: Option<(i64,)> = self
            .conn
            .query_first(sql)
            .map_err(|e| DriverError::Execute(clean_driver_message(&e.to_string())))?;
        Ok(row.map(|(count,)| count).unwrap_or(0))
    }

    fn query_names(&mut self, sql: &str) -> Result<Vec<String>, DriverError> {
        let rows: Vec<(Option<String>,)> = self
            .conn
            .query(sql)
            .map_err(|e| DriverError::Execute(clean_driver_message(&e.to_string())))?;
        Ok(rows.into_iter().filter_map(|(name,)| name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_driver_reports_empty_schema() {
        let mut driver = NullDriver;
        assert_eq!(driver.execute("DROP TABLE foo").unwrap(), 0);
        assert_eq!(driver.query_count("SELECT COUNT(*) FROM t").unwrap(), 0);
        assert!(driver.query_names("SELECT name FROM t").unwrap().is_empty());
    }

    #[test]
    fn test_open_driver_rejects_driverless_backends() {
        let db = ResolvedDbConfig {
            subprotocol: "h2".to_string(),
            host: "localhost".to_string(),
            port: 9092,
            database: String::new(),
            schema: Some("test".to_string()),
            user: String::new(),
            password: String::new(),
        };
        match open_driver(&db) {
            Err(DriverError::NoNativeDriver(name)) => assert_eq!(name, "h2"),
            Err(e) => panic!("expected NoNativeDriver, got {e}"),
            Ok(_) => panic!("expected NoNativeDriver, got Ok(_)"),
        }
    }
}
