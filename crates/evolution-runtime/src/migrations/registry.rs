//! Discovery of migration files.
//!
//! Migrations are named like:
//! - `0001_create_users.sql`
//! - `0002_add_posts.sql`
//!
//! Entries that do not match the naming scheme are ignored, not errors.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use evolution_core::error::{EvolutionError, Result};

use super::template::{render, struct_name, template_for, template_vars};

/// A discovered migration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationEntry {
    pub version: i64,
    pub slug: String,
    pub filename: String,
    pub path: PathBuf,
}

/// Catalog of migration files in one directory.
#[derive(Debug, Clone)]
pub struct MigrationRegistry {
    directory: PathBuf,
    extension: String,
    pattern: Regex,
}

impl MigrationRegistry {
    pub fn new(directory: impl Into<PathBuf>, extension: &str) -> Result<Self> {
        let extension = extension.trim_start_matches('.').to_string();
        if extension.is_empty() {
            return Err(EvolutionError::Config(
                "Migration file extension must not be empty".to_string(),
            ));
        }

        let pattern = Regex::new(&format!(
            r"^(\d+)_([a-z0-9_]+)\.{}$",
            regex::escape(&extension)
        ))
        .map_err(|e| EvolutionError::Config(format!("Invalid migration extension: {}", e)))?;

        Ok(Self {
            directory: directory.into(),
            extension,
            pattern,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn exists(&self) -> bool {
        self.directory.is_dir()
    }

    /// Create the migrations directory if absent. Returns whether it was created.
    pub fn ensure_directory(&self) -> Result<bool> {
        if self.exists() {
            return Ok(false);
        }
        std::fs::create_dir_all(&self.directory)?;
        info!("Created migrations directory {}", self.directory.display());
        Ok(true)
    }

    /// Parse a file name into `(version, slug)` if it follows the naming scheme.
    pub fn parse_filename(&self, filename: &str) -> Option<(i64, String)> {
        let caps = self.pattern.captures(filename)?;
        let version = caps[1].parse::<i64>().ok()?;
        Some((version, caps[2].to_string()))
    }

    /// All migration files, ordered by version.
    pub fn list(&self) -> Result<Vec<MigrationEntry>> {
        if !self.exists() {
            return Err(not_initialized(&self.directory));
        }

        let mut entries = Vec::new();
        let mut seen: HashMap<i64, String> = HashMap::new();

        for dir_entry in std::fs::read_dir(&self.directory)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            let filename = match dir_entry.file_name().to_str() {
                Some(name) => name.to_string(),
                None => continue,
            };

            let Some((version, slug)) = self.parse_filename(&filename) else {
                continue;
            };

            if version == 0 {
                warn!("Ignoring {}: migration versions start at 1", filename);
                continue;
            }

            if let Some(existing) = seen.insert(version, filename.clone()) {
                return Err(EvolutionError::InvalidMigration(format!(
                    "Version {} is used by both {} and {}",
                    version, existing, filename
                )));
            }

            entries.push(MigrationEntry {
                version,
                slug,
                path: dir_entry.path(),
                filename,
            });
        }

        entries.sort_by_key(|e| e.version);

        debug!("Discovered {} migration files", entries.len());
        Ok(entries)
    }

    /// Highest version present, or 0 if none.
    pub fn max_version(&self) -> Result<i64> {
        Ok(self.list()?.last().map(|e| e.version).unwrap_or(0))
    }

    /// Files with a version greater than `after`, ascending.
    pub fn pending(&self, after: i64) -> Result<Vec<MigrationEntry>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|e| e.version > after)
            .collect())
    }

    /// The file for `version`, if one exists.
    pub fn file_for_version(&self, version: i64) -> Result<Option<MigrationEntry>> {
        Ok(self.list()?.into_iter().find(|e| e.version == version))
    }

    /// Write a new scaffolded migration named after `name`.
    ///
    /// The version is always one past the highest existing version; gaps
    /// left by deleted files are never reused.
    pub fn create(&self, name: &str) -> Result<PathBuf> {
        if !self.exists() {
            return Err(not_initialized(&self.directory));
        }

        let slug = slugify(name);
        if slug.is_empty() {
            return Err(EvolutionError::InvalidMigration(format!(
                "Migration name {:?} has no usable characters",
                name
            )));
        }

        let version = self.max_version()?.checked_add(1).ok_or_else(|| {
            EvolutionError::InvalidMigration(format!(
                "No version left after {} in {}",
                i64::MAX,
                self.directory.display()
            ))
        })?;
        let filename = format!("{:04}_{}.{}", version, slug, self.extension);
        let path = self.directory.join(&filename);

        let version_str = version.to_string();
        let struct_name = struct_name(version, &slug);
        let created_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let vars = template_vars!(
            "name" => name.trim(),
            "version" => version_str.as_str(),
            "struct_name" => struct_name.as_str(),
            "created_at" => created_at.as_str(),
        );
        let body = render(template_for(&self.extension), &vars);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(body.as_bytes())?;

        info!("Created migration {}", filename);
        Ok(path)
    }
}

/// Normalize a human-provided name: lowercase, spaces to underscores,
/// everything outside `[a-z0-9_]` removed.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

fn not_initialized(directory: &Path) -> EvolutionError {
    EvolutionError::NotInitialized(format!(
        "The migrations folder {} does not exist",
        directory.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> MigrationRegistry {
        MigrationRegistry::new(dir.path(), "sql").unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Add Users Table"), "add_users_table");
        assert_eq!(slugify("drop-column: age!"), "dropcolumn_age");
        assert_eq!(slugify("  v2 fix  "), "v2_fix");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_list_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("0002_second.sql"), "").unwrap();
        fs::write(dir.path().join("0010_tenth.sql"), "").unwrap();
        fs::write(dir.path().join("0001_first.sql"), "").unwrap();
        fs::write(dir.path().join("readme.txt"), "").unwrap();
        fs::write(dir.path().join("0003_Upper.sql"), "").unwrap();
        fs::write(dir.path().join("0004_other.rs"), "").unwrap();
        fs::write(dir.path().join("backup.sql.bak"), "").unwrap();
        fs::create_dir(dir.path().join("0005_dir.sql")).unwrap();

        let entries = registry(&dir).list().unwrap();
        let versions: Vec<i64> = entries.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![1, 2, 10]);
        assert_eq!(entries[0].slug, "first");
        assert_eq!(entries[2].filename, "0010_tenth.sql");
    }

    #[test]
    fn test_list_rejects_duplicate_versions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("0001_a.sql"), "").unwrap();
        fs::write(dir.path().join("001_b.sql"), "").unwrap();

        let err = registry(&dir).list().unwrap_err();
        assert!(matches!(err, EvolutionError::InvalidMigration(_)));
    }

    #[test]
    fn test_max_version_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(registry(&dir).max_version().unwrap(), 0);
    }

    #[test]
    fn test_missing_directory_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        let registry = MigrationRegistry::new(dir.path().join("migrations"), "sql").unwrap();

        assert!(matches!(
            registry.list(),
            Err(EvolutionError::NotInitialized(_))
        ));
        assert!(matches!(
            registry.create("add users"),
            Err(EvolutionError::NotInitialized(_))
        ));
        assert!(!registry.exists());
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let registry = MigrationRegistry::new(dir.path().join("migrations"), "sql").unwrap();
        assert!(registry.ensure_directory().unwrap());
        assert!(!registry.ensure_directory().unwrap());
        assert!(registry.exists());
    }

    #[test]
    fn test_create_assigns_increasing_versions() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let first = registry.create("Create Users").unwrap();
        let second = registry.create("add posts").unwrap();
        assert!(first.ends_with("0001_create_users.sql"));
        assert!(second.ends_with("0002_add_posts.sql"));

        let body = fs::read_to_string(&first).unwrap();
        assert!(body.contains("-- Migration: Create Users"));
        assert!(body.contains("-- @irreversible"));
    }

    #[test]
    fn test_create_never_backfills_gaps() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let first = registry.create("a").unwrap();
        let second = registry.create("b").unwrap();
        registry.create("c").unwrap();
        fs::remove_file(first).unwrap();
        fs::remove_file(second).unwrap();

        let fourth = registry.create("d").unwrap();
        assert!(fourth.ends_with("0004_d.sql"));
    }

    #[test]
    fn test_create_rejects_empty_slug() {
        let dir = TempDir::new().unwrap();
        let err = registry(&dir).create("???").unwrap_err();
        assert!(matches!(err, EvolutionError::InvalidMigration(_)));
    }

    #[test]
    fn test_create_after_max_version_is_invalid() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("9223372036854775807_x.sql"), "").unwrap();

        let err = registry(&dir).create("next").unwrap_err();
        assert!(matches!(err, EvolutionError::InvalidMigration(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_create_rust_scaffold() {
        let dir = TempDir::new().unwrap();
        let registry = MigrationRegistry::new(dir.path(), ".rs").unwrap();
        let path = registry.create("add users").unwrap();
        assert!(path.ends_with("0001_add_users.rs"));

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.contains("pub struct M0001AddUsers;"));
        assert!(body.contains("impl MigrationUnit for M0001AddUsers"));
    }

    #[test]
    fn test_file_for_version_scans_every_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("0001_a.sql"), "").unwrap();
        fs::write(dir.path().join("0002_b.sql"), "").unwrap();
        fs::write(dir.path().join("0003_c.sql"), "").unwrap();

        let registry = registry(&dir);
        let entry = registry.file_for_version(3).unwrap().unwrap();
        assert_eq!(entry.filename, "0003_c.sql");
        assert!(registry.file_for_version(4).unwrap().is_none());
    }

    #[test]
    fn test_pending_after_version() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("0001_a.sql"), "").unwrap();
        fs::write(dir.path().join("0002_b.sql"), "").unwrap();
        fs::write(dir.path().join("0003_c.sql"), "").unwrap();

        let pending = registry(&dir).pending(1).unwrap();
        let names: Vec<&str> = pending.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["0002_b.sql", "0003_c.sql"]);
    }
}
