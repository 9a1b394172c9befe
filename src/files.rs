//! Migration file store: discovers on-disk migration definitions, orders
//! them by filename and parses each into its up/down command programs.
//!
//! Filenames follow `<version-id>-<slug>.json`; the version id is
//! everything before the first hyphen and is compared lexicographically
//! over ASCII, so discovery yields a deterministic total order.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::commands::{parse_commands, Command};
use crate::error::TernError;

const MIGRATION_EXTENSION: &str = "json";

/// One parsed migration definition.
#[derive(Debug)]
pub struct MigrationFile {
    pub version: String,
    pub path: PathBuf,
    pub up: Vec<Command>,
    pub down: Vec<Command>,
}

/// The version id encoded in a migration file name: the stem up to the
/// first hyphen.
pub fn version_of(file_name: &str) -> String {
    let stem = file_name
        .strip_suffix(&format!(".{MIGRATION_EXTENSION}"))
        .unwrap_or(file_name);
    stem.split('-').next().unwrap_or(stem).to_string()
}

/// Discover and parse every migration under the directory, sorted by
/// filename. A missing directory yields an empty set.
pub fn discover(dir: &Path) -> Result<Vec<MigrationFile>, TernError> {
    if !dir.is_dir() {
        debug!("migration directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(MIGRATION_EXTENSION)
        })
        .collect();
    paths.sort();

    let mut migrations = Vec::with_capacity(paths.len());
    for path in paths {
        migrations.push(parse_migration_file(&path)?);
    }
    Ok(migrations)
}

fn parse_migration_file(path: &Path) -> Result<MigrationFile, TernError> {
    let invalid = |message: String| TernError::InvalidMigration {
        path: path.display().to_string(),
        message,
    };

    let content = fs::read_to_string(path)?;
    let root: Value =
        serde_json::from_str(&content).map_err(|e| invalid(format!("not valid JSON: {e}")))?;
    let object = root
        .as_object()
        .ok_or_else(|| invalid("migration must be a map with up and down".to_string()))?;

    let up = object
        .get("up")
        .ok_or_else(|| invalid("migration is missing its up program".to_string()))?;
    let down = object
        .get("down")
        .ok_or_else(|| invalid("migration is missing its down program".to_string()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    Ok(MigrationFile {
        version: version_of(file_name),
        path: path.to_path_buf(),
        up: parse_commands(up)?,
        down: parse_commands(down)?,
    })
}

/// Create a new timestamped migration file with an empty up/down template.
/// Returns the path of the created file.
pub fn create_migration(dir: &Path, name: &str) -> Result<PathBuf, TernError> {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '_' { '-' } else { c })
        .collect();
    let version = Utc::now().format("%Y%m%d%H%M%S");
    let path = dir.join(format!("{version}-{slug}.{MIGRATION_EXTENSION}"));

    fs::create_dir_all(dir)?;
    fs::write(&path, "{\n  \"up\": [],\n  \"down\": []\n}\n")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_migration(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_version_of() {
        assert_eq!(version_of("20240101120000-create-foo.json"), "20240101120000");
        assert_eq!(version_of("001.json"), "001");
    }

    #[test]
    fn test_discover_sorts_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        write_migration(
            dir.path(),
            "002-second.json",
            r#"{"up": [], "down": []}"#,
        );
        write_migration(
            dir.path(),
            "001-first.json",
            r#"{"up": [{"drop-table": {"table": "foo"}}], "down": []}"#,
        );
        write_migration(dir.path(), "ignored.txt", "not a migration");

        let migrations = discover(dir.path()).unwrap();
        let versions: Vec<&str> = migrations.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, vec!["001", "002"]);
        assert_eq!(migrations[0].up.len(), 1);
    }

    #[test]
    fn test_discover_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(discover(&missing).unwrap().is_empty());
    }

    #[test]
    fn test_single_map_program_becomes_singleton() {
        let dir = tempfile::tempdir().unwrap();
        write_migration(
            dir.path(),
            "001-single.json",
            r#"{"up": {"drop-table": {"table": "foo"}}, "down": []}"#,
        );
        let migrations = discover(dir.path()).unwrap();
        assert_eq!(migrations[0].up.len(), 1);
    }

    #[test]
    fn test_malformed_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        write_migration(dir.path(), "001-bad.json", r#"{"up": []}"#);
        let err = discover(dir.path()).unwrap_err();
        match err {
            TernError::InvalidMigration { path, message } => {
                assert!(path.contains("001-bad.json"));
                assert!(message.contains("down"));
            }
            other => panic!("expected InvalidMigration, got {other}"),
        }
    }

    #[test]
    fn test_create_migration_slugifies_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_migration(dir.path(), "Add User Table").unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.ends_with("-add-user-table.json"));
        // 14-digit timestamp prefix
        assert_eq!(version_of(file_name).len(), 14);
        let migrations = discover(dir.path()).unwrap();
        assert!(migrations[0].up.is_empty());
        assert!(migrations[0].down.is_empty());
    }
}
