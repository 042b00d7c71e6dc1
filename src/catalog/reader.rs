//! Catalog readers
//!
//! [`CatalogSource`] is the seam between the live database and the pure
//! rendering in [`crate::catalog::assembler`]. [`PgCatalogReader`] implements it
//! over a single PostgreSQL connection using only `SELECT` statements.

use crate::catalog::queries;
use crate::catalog::rows::*;
use crate::error::{DbotError, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgConnection, Row};

/// Anything that can enumerate namespaces and describe their objects
#[async_trait]
pub trait CatalogSource: Send {
    /// All namespace names, ordered by name
    async fn namespaces(&mut self) -> Result<Vec<String>>;

    /// Rows for every object kind in one namespace
    async fn read_namespace(&mut self, namespace: &str) -> Result<NamespaceCatalog>;
}

/// Reads catalog metadata from one PostgreSQL connection
pub struct PgCatalogReader {
    conn: PgConnection,
}

impl PgCatalogReader {
    /// Open a dedicated connection for one snapshot generation
    pub async fn connect(database_url: &str) -> Result<Self> {
        let conn = PgConnection::connect(database_url)
            .await
            .map_err(|e| DbotError::ConnectionFailure(format!("Failed to connect: {}", e)))?;
        log::debug!("Opened catalog connection");
        Ok(Self { conn })
    }

    /// Wrap an already-open connection
    pub fn from_connection(conn: PgConnection) -> Self {
        Self { conn }
    }

    /// Close the connection, logging rather than failing on a dirty shutdown
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            log::warn!("Catalog connection did not close cleanly: {}", e);
        } else {
            log::debug!("Closed catalog connection");
        }
    }

    async fn fetch(&mut self, sql: &str, namespace: &str) -> Result<Vec<PgRow>> {
        let rows = sqlx::query(sql)
            .bind(namespace)
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows)
    }

    async fn enums(&mut self, namespace: &str) -> Result<Vec<EnumRow>> {
        self.fetch(queries::ENUMS, namespace)
            .await?
            .iter()
            .map(|row| -> Result<EnumRow> {
                Ok(EnumRow {
                    type_name: row.try_get("type_name")?,
                    labels: row.try_get("labels")?,
                })
            })
            .collect()
    }

    async fn composite_attributes(&mut self, namespace: &str) -> Result<Vec<CompositeAttributeRow>> {
        self.fetch(queries::COMPOSITE_ATTRIBUTES, namespace)
            .await?
            .iter()
            .map(|row| -> Result<CompositeAttributeRow> {
                Ok(CompositeAttributeRow {
                    type_name: row.try_get("type_name")?,
                    attribute_name: row.try_get("attribute_name")?,
                    data_type: row.try_get("data_type")?,
                    position: row.try_get("position")?,
                })
            })
            .collect()
    }

    async fn columns(&mut self, namespace: &str) -> Result<Vec<ColumnRow>> {
        self.fetch(queries::TABLE_COLUMNS, namespace)
            .await?
            .iter()
            .map(|row| -> Result<ColumnRow> {
                Ok(ColumnRow {
                    table_name: row.try_get("table_name")?,
                    column_name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    not_null: row.try_get("not_null")?,
                    position: row.try_get("position")?,
                })
            })
            .collect()
    }

    async fn constraints(&mut self, namespace: &str) -> Result<Vec<ConstraintRow>> {
        self.fetch(queries::TABLE_CONSTRAINTS, namespace)
            .await?
            .iter()
            .map(|row| -> Result<ConstraintRow> {
                let keyword: String = row.try_get("constraint_type")?;
                let kind = ConstraintKind::from_keyword(&keyword).ok_or_else(|| {
                    DbotError::MalformedCatalogRow(format!("unexpected constraint type {}", keyword))
                })?;
                Ok(ConstraintRow {
                    table_name: row.try_get("table_name")?,
                    column_name: row.try_get("column_name")?,
                    kind,
                })
            })
            .collect()
    }

    async fn views(&mut self, sql: &str, namespace: &str) -> Result<Vec<ViewRow>> {
        self.fetch(sql, namespace)
            .await?
            .iter()
            .map(|row| -> Result<ViewRow> {
                Ok(ViewRow {
                    view_name: row.try_get("view_name")?,
                    definition: row.try_get("definition")?,
                })
            })
            .collect()
    }

    async fn functions(&mut self, namespace: &str) -> Result<Vec<FunctionRow>> {
        self.fetch(queries::FUNCTIONS, namespace)
            .await?
            .iter()
            .map(|row| -> Result<FunctionRow> {
                Ok(FunctionRow {
                    function_name: row.try_get("function_name")?,
                    arguments: row.try_get("arguments")?,
                    result: row.try_get("result")?,
                    definition: row.try_get("definition")?,
                    language: row.try_get("language")?,
                })
            })
            .collect()
    }

    async fn indexes(&mut self, namespace: &str) -> Result<Vec<IndexRow>> {
        self.fetch(queries::INDEXES, namespace)
            .await?
            .iter()
            .map(|row| -> Result<IndexRow> {
                Ok(IndexRow {
                    table_name: row.try_get("table_name")?,
                    index_name: row.try_get("index_name")?,
                    definition: row.try_get("definition")?,
                })
            })
            .collect()
    }

    async fn triggers(&mut self, namespace: &str) -> Result<Vec<TriggerRow>> {
        self.fetch(queries::TRIGGERS, namespace)
            .await?
            .iter()
            .map(|row| -> Result<TriggerRow> {
                Ok(TriggerRow {
                    trigger_name: row.try_get("trigger_name")?,
                    trigger_type: row.try_get("trigger_type")?,
                    table_namespace: row.try_get("table_namespace")?,
                    table_name: row.try_get("table_name")?,
                    function_namespace: row.try_get("function_namespace")?,
                    function_name: row.try_get("function_name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CatalogSource for PgCatalogReader {
    async fn namespaces(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query(queries::NAMESPACES)
            .fetch_all(&mut self.conn)
            .await?;
        rows.iter()
            .map(|row| -> Result<String> { Ok(row.try_get("namespace_name")?) })
            .collect()
    }

    async fn read_namespace(&mut self, namespace: &str) -> Result<NamespaceCatalog> {
        let catalog = NamespaceCatalog {
            name: namespace.to_string(),
            enums: self.enums(namespace).await?,
            composite_attributes: self.composite_attributes(namespace).await?,
            columns: self.columns(namespace).await?,
            constraints: self.constraints(namespace).await?,
            views: self.views(queries::VIEWS, namespace).await?,
            materialized_views: self.views(queries::MATERIALIZED_VIEWS, namespace).await?,
            functions: self.functions(namespace).await?,
            indexes: self.indexes(namespace).await?,
            triggers: self.triggers(namespace).await?,
        };
        log::debug!(
            "Read namespace {}: {} columns, {} views, {} functions",
            namespace,
            catalog.columns.len(),
            catalog.views.len(),
            catalog.functions.len()
        );
        Ok(catalog)
    }
}
