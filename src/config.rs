use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// On-disk configuration for tern.
/// All fields are optional to support partial configurations and merging.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TernConfig {
    #[serde(rename = "migration-dir", skip_serializing_if = "Option::is_none")]
    pub migration_dir: Option<String>,
    #[serde(rename = "version-table", skip_serializing_if = "Option::is_none")]
    pub version_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<DbConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DbConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subprotocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// H2 schemas live in a file path rather than a server-side database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Configuration with resolved values (no Options except genuinely
/// optional settings).
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub migration_dir: String,
    pub version_table: String,
    pub color: bool,
    pub db: ResolvedDbConfig,
}

#[derive(Debug, Clone)]
pub struct ResolvedDbConfig {
    pub subprotocol: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: Option<String>,
    pub user: String,
    pub password: String,
}

impl TernConfig {
    /// Load configuration from the given file, apply environment overrides
    /// and resolve defaults. A missing file is not an error: the defaults
    /// plus environment are used (handy for `new` and dry runs).
    pub fn load(path: &Path) -> Result<ResolvedConfig> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            TernConfig::default()
        };
        config.apply_env_overrides();
        Ok(config.resolve_with_defaults())
    }

    fn load_from_file(path: &Path) -> Result<TernConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("TERN_MIGRATION_DIR") {
            if !dir.is_empty() {
                self.migration_dir = Some(dir);
            }
        }
        if let Ok(table) = env::var("TERN_VERSION_TABLE") {
            if !table.is_empty() {
                self.version_table = Some(table);
            }
        }
        if let Ok(color) = env::var("TERN_COLOR") {
            match color.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.color = Some(true),
                "0" | "false" | "no" => self.color = Some(false),
                _ => {}
            }
        }
    }

    fn resolve_with_defaults(self) -> ResolvedConfig {
        let db = self.db.unwrap_or_default();
        let subprotocol = db.subprotocol.unwrap_or_default();
        let port = db.port.unwrap_or_else(|| default_port(&subprotocol));
        ResolvedConfig {
            migration_dir: self.migration_dir.unwrap_or_else(|| "migrations".to_string()),
            version_table: self
                .version_table
                .unwrap_or_else(|| "migration_versions".to_string()),
            color: self.color.unwrap_or(true),
            db: ResolvedDbConfig {
                subprotocol,
                host: db.host.unwrap_or_else(|| "localhost".to_string()),
                port,
                database: db.database.unwrap_or_default(),
                schema: db.schema,
                user: db.user.unwrap_or_default(),
                password: db.password.unwrap_or_default(),
            },
        }
    }
}

impl ResolvedConfig {
    /// Pretty-printed JSON of the effective configuration, for `tern config`.
    pub fn to_json_string(&self) -> Result<String> {
        let config = TernConfig {
            migration_dir: Some(self.migration_dir.clone()),
            version_table: Some(self.version_table.clone()),
            color: Some(self.color),
            db: Some(DbConfig {
                subprotocol: Some(self.db.subprotocol.clone()),
                host: Some(self.db.host.clone()),
                port: Some(self.db.port),
                database: Some(self.db.database.clone()),
                schema: self.db.schema.clone(),
                user: Some(self.db.user.clone()),
                // Echoed verbatim: the operator wrote it into the file.
                password: Some(self.db.password.clone()),
            }),
        };
        serde_json::to_string_pretty(&config).context("Failed to serialize configuration")
    }
}

fn default_port(subprotocol: &str) -> u16 {
    match subprotocol {
        "mysql" => 3306,
        "postgresql" => 5432,
        "sqlserver" => 1433,
        "h2" => 9092,
        _ => 0,
    }
}

/// `TERN_DRYRUN` set to any non-empty value suppresses statement execution
/// while still driving compilation.
pub fn dry_run_enabled() -> bool {
    env::var("TERN_DRYRUN").map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_resolution() {
        let resolved = TernConfig::default().resolve_with_defaults();
        assert_eq!(resolved.migration_dir, "migrations");
        assert_eq!(resolved.version_table, "migration_versions");
        assert!(resolved.color);
        assert_eq!(resolved.db.host, "localhost");
    }

    #[test]
    fn test_default_ports_per_backend() {
        assert_eq!(default_port("mysql"), 3306);
        assert_eq!(default_port("postgresql"), 5432);
        assert_eq!(default_port("sqlserver"), 1433);
        assert_eq!(default_port("h2"), 9092);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"migration-dir": "db/migrations",
                "db": {{"subprotocol": "postgresql", "database": "appdb", "user": "app"}}}}"#
        )
        .unwrap();
        let resolved = TernConfig::load(file.path()).unwrap();
        assert_eq!(resolved.migration_dir, "db/migrations");
        assert_eq!(resolved.db.subprotocol, "postgresql");
        assert_eq!(resolved.db.port, 5432);
        assert_eq!(resolved.db.database, "appdb");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let resolved = TernConfig::load(Path::new("/nonexistent/tern.json")).unwrap();
        assert_eq!(resolved.migration_dir, "migrations");
    }
}
