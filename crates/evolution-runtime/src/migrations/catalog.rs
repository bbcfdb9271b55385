//! Units registered in code, keyed by version.

use std::collections::BTreeMap;
use std::sync::Arc;

use evolution_core::error::{EvolutionError, Result};
use evolution_core::migration::MigrationUnit;

use super::registry::MigrationEntry;
use super::sql::SqlMigration;

/// Compile-time registration of migration units.
///
/// A discovered file is executed by the unit registered under its version.
/// Without one, `.sql` files are parsed and run as [`SqlMigration`]s.
#[derive(Clone, Default)]
pub struct UnitCatalog {
    units: BTreeMap<i64, Arc<dyn MigrationUnit>>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `unit` under `version`.
    pub fn register<U: MigrationUnit>(&mut self, version: i64, unit: U) -> Result<()> {
        self.register_arc(version, Arc::new(unit))
    }

    pub fn register_arc(&mut self, version: i64, unit: Arc<dyn MigrationUnit>) -> Result<()> {
        if version <= 0 {
            return Err(EvolutionError::InvalidMigration(format!(
                "Version {} is not a positive integer",
                version
            )));
        }
        if self.units.contains_key(&version) {
            return Err(EvolutionError::InvalidMigration(format!(
                "Version {} is registered twice",
                version
            )));
        }
        self.units.insert(version, unit);
        Ok(())
    }

    pub fn get(&self, version: i64) -> Option<Arc<dyn MigrationUnit>> {
        self.units.get(&version).cloned()
    }

    pub fn contains(&self, version: i64) -> bool {
        self.units.contains_key(&version)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn versions(&self) -> Vec<i64> {
        self.units.keys().copied().collect()
    }

    /// The unit that executes `entry`.
    pub fn resolve(&self, entry: &MigrationEntry) -> Result<Arc<dyn MigrationUnit>> {
        if let Some(unit) = self.get(entry.version) {
            return Ok(unit);
        }

        let is_sql = entry
            .path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("sql"))
            .unwrap_or(false);
        if is_sql {
            return Ok(Arc::new(SqlMigration::from_file(&entry.path)?));
        }

        Err(EvolutionError::InvalidMigration(format!(
            "No unit is registered for version {} ({})",
            entry.version, entry.filename
        )))
    }
}

impl std::fmt::Debug for UnitCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitCatalog")
            .field("versions", &self.versions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Noop;

    impl MigrationUnit for Noop {}

    fn entry(dir: &std::path::Path, version: i64, filename: &str) -> MigrationEntry {
        MigrationEntry {
            version,
            slug: "x".to_string(),
            filename: filename.to_string(),
            path: dir.join(filename),
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut catalog = UnitCatalog::new();
        catalog.register(2, Noop).unwrap();
        catalog.register(1, Noop).unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(1));
        assert!(catalog.get(3).is_none());
        assert_eq!(catalog.versions(), vec![1, 2]);
    }

    #[test]
    fn test_register_rejects_duplicates_and_non_positive() {
        let mut catalog = UnitCatalog::new();
        catalog.register(1, Noop).unwrap();
        assert!(matches!(
            catalog.register(1, Noop),
            Err(EvolutionError::InvalidMigration(_))
        ));
        assert!(matches!(
            catalog.register(0, Noop),
            Err(EvolutionError::InvalidMigration(_))
        ));
    }

    #[test]
    fn test_resolve_sql_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("0001_a.sql"), "-- up\nSELECT 1;").unwrap();

        let catalog = UnitCatalog::new();
        assert!(catalog.resolve(&entry(dir.path(), 1, "0001_a.sql")).is_ok());
    }

    #[test]
    fn test_resolve_unregistered_rust_unit_fails() {
        let catalog = UnitCatalog::new();
        let entry = MigrationEntry {
            version: 4,
            slug: "x".to_string(),
            filename: "0004_x.rs".to_string(),
            path: PathBuf::from("migrations/0004_x.rs"),
        };
        let err = catalog.resolve(&entry).err().unwrap();
        assert!(matches!(err, EvolutionError::InvalidMigration(_)));
    }

    #[test]
    fn test_registered_unit_wins_over_file() {
        let mut catalog = UnitCatalog::new();
        catalog.register(1, Noop).unwrap();
        // The file is never read when a unit is registered.
        let entry = entry(std::path::Path::new("/nonexistent"), 1, "0001_a.sql");
        assert!(catalog.resolve(&entry).is_ok());
    }
}
