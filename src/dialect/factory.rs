use tracing::debug;

use crate::dialect::dialect_trait::DialectImpl;
use crate::dialect::h2::{H2Dialect, H2Version};
use crate::dialect::mysql::MysqlDialect;
use crate::dialect::postgres::PostgresDialect;
use crate::dialect::sqlserver::SqlServerDialect;
use crate::driver::SqlDriver;
use crate::error::TernError;

/// Factory function to get the dialect implementation for a subprotocol.
/// `h2_version` only matters for `h2`; the other backends ignore it.
pub fn get_dialect_impl(subprotocol: &str, h2_version: H2Version) -> Option<Box<dyn DialectImpl>> {
    match subprotocol {
        "mysql" => Some(Box::new(MysqlDialect::new())),
        "postgresql" => Some(Box::new(PostgresDialect::new())),
        "sqlserver" => Some(Box::new(SqlServerDialect::new())),
        "h2" => Some(Box::new(H2Dialect::new(h2_version))),
        _ => None,
    }
}

/// Whether a subprotocol has a dialect in the registry at all.
pub fn is_supported(subprotocol: &str) -> bool {
    matches!(subprotocol, "mysql" | "postgresql" | "sqlserver" | "h2")
}

/// Resolve the dialect for a subprotocol, probing the live H2 major
/// version once so every subsequent operation dispatches to the right
/// compiler.
pub fn resolve_dialect(
    subprotocol: &str,
    driver: &mut dyn SqlDriver,
) -> Result<Box<dyn DialectImpl>, TernError> {
    let h2_version = if subprotocol == "h2" {
        probe_h2_version(driver)
    } else {
        H2Version::V2
    };
    get_dialect_impl(subprotocol, h2_version)
        .ok_or_else(|| TernError::UnsupportedBackend(subprotocol.to_string()))
}

/// `SELECT h2version()` against the target, keeping only the major
/// version. A failed or empty probe (null driver, dry run) assumes v2.
pub fn probe_h2_version(driver: &mut dyn SqlDriver) -> H2Version {
    match driver.query_names("SELECT h2version()") {
        Ok(rows) => {
            let major = rows
                .first()
                .and_then(|version| version.split('.').next())
                .and_then(|major| major.parse::<u32>().ok());
            match major {
                Some(major) if major < 2 => H2Version::V1,
                Some(_) => H2Version::V2,
                None => {
                    debug!("h2version() returned nothing, assuming v2");
                    H2Version::V2
                }
            }
        }
        Err(e) => {
            debug!("h2version() probe failed ({e}), assuming v2");
            H2Version::V2
        }
    }
}
