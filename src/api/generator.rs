//! SnapshotGenerator - catalog to schema snapshot
//!
//! Reads every non-excluded namespace through a [`CatalogSource`], renders the
//! snapshot and only then saves it, so a failed generation leaves the previous
//! snapshot in place.

use crate::catalog::{CatalogSource, NamespaceCatalog, PgCatalogReader, SchemaAssembler};
use crate::config::Config;
use crate::error::Result;
use crate::storage::SnapshotStore;
use std::path::PathBuf;

/// Generates and stores schema snapshots
#[derive(Debug, Clone)]
pub struct SnapshotGenerator {
    assembler: SchemaAssembler,
    store: SnapshotStore,
    exclude_reserved: bool,
}

impl SnapshotGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            assembler: SchemaAssembler::new(config.catalog.clone()),
            store: SnapshotStore::new(&config.storage.base_dir),
            exclude_reserved: config.catalog.exclude_reserved,
        }
    }

    /// Override whether reserved namespaces are skipped
    pub fn with_exclusion(mut self, exclude_reserved: bool) -> Self {
        self.exclude_reserved = exclude_reserved;
        self
    }

    pub fn excludes_reserved(&self) -> bool {
        self.exclude_reserved
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Render the snapshot text from any catalog source
    pub async fn render<S: CatalogSource + ?Sized>(&self, source: &mut S) -> Result<String> {
        let mut catalogs: Vec<NamespaceCatalog> = Vec::new();
        for namespace in source.namespaces().await? {
            if self.exclude_reserved && self.assembler.is_excluded(&namespace) {
                log::debug!("Skipping reserved namespace {}", namespace);
                continue;
            }
            let catalog = source.read_namespace(&namespace).await?;
            log::info!("Read namespace {}", namespace);
            catalogs.push(catalog);
        }
        Ok(self.assembler.assemble_all(&catalogs, self.exclude_reserved))
    }

    /// Render from `source` and save under `db_name`
    pub async fn generate_with<S: CatalogSource + ?Sized>(
        &self,
        db_name: &str,
        source: &mut S,
    ) -> Result<PathBuf> {
        let text = self.render(source).await?;
        self.store.save(db_name, &text)
    }

    /// Connect, generate, and release the connection on every path
    pub async fn generate(&self, db_name: &str, database_url: &str) -> Result<PathBuf> {
        let mut reader = PgCatalogReader::connect(database_url).await?;
        let rendered = self.render(&mut reader).await;
        reader.close().await;
        let text = rendered?;
        self.store.save(db_name, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnRow;
    use crate::error::DbotError;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FixtureSource {
        namespaces: Vec<NamespaceCatalog>,
        fail_on: Option<String>,
        reads: Vec<String>,
    }

    #[async_trait]
    impl CatalogSource for FixtureSource {
        async fn namespaces(&mut self) -> Result<Vec<String>> {
            Ok(self.namespaces.iter().map(|n| n.name.clone()).collect())
        }

        async fn read_namespace(&mut self, namespace: &str) -> Result<NamespaceCatalog> {
            self.reads.push(namespace.to_string());
            if self.fail_on.as_deref() == Some(namespace) {
                return Err(DbotError::ConnectionFailure("connection reset".to_string()));
            }
            Ok(self
                .namespaces
                .iter()
                .find(|n| n.name == namespace)
                .cloned()
                .unwrap_or_else(|| NamespaceCatalog::new(namespace)))
        }
    }

    fn fixture() -> FixtureSource {
        let mut sales = NamespaceCatalog::new("sales");
        sales.columns = vec![ColumnRow {
            table_name: "orders".to_string(),
            column_name: "id".to_string(),
            data_type: "int".to_string(),
            not_null: true,
            position: 1,
        }];
        FixtureSource {
            namespaces: vec![NamespaceCatalog::new("pg_catalog"), NamespaceCatalog::new("public"), sales],
            fail_on: None,
            reads: Vec::new(),
        }
    }

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.base_dir = dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_generate_skips_reserved_namespaces() {
        let dir = TempDir::new().unwrap();
        let generator = SnapshotGenerator::new(&config(&dir));
        let mut source = fixture();

        generator.generate_with("shop", &mut source).await.unwrap();
        assert_eq!(source.reads, vec!["sales"]);

        let text = generator.store().load("shop").unwrap();
        assert_eq!(
            text,
            "-- Schema: sales\n\n-- Tables\nCREATE TABLE sales.orders (id int NOT NULL);\n\n"
        );
    }

    #[tokio::test]
    async fn test_generate_can_keep_reserved_namespaces() {
        let dir = TempDir::new().unwrap();
        let generator = SnapshotGenerator::new(&config(&dir)).with_exclusion(false);
        let mut source = fixture();

        let text = generator.render(&mut source).await.unwrap();
        assert!(text.starts_with("-- Schema: pg_catalog\n"));
        assert_eq!(source.reads.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let generator = SnapshotGenerator::new(&config(&dir));
        generator.store().save("shop", "previous").unwrap();

        let mut source = fixture();
        source.fail_on = Some("sales".to_string());
        let err = generator.generate_with("shop", &mut source).await.unwrap_err();

        assert!(matches!(err, DbotError::ConnectionFailure(_)));
        assert_eq!(generator.store().load("shop").unwrap(), "previous");
    }
}
