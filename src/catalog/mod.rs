//! Catalog introspection and DDL rendering
//!
//! The reader talks to the database; the assembler is pure and works on the
//! rows the reader returns.

pub mod assembler;
pub mod queries;
pub mod reader;
pub mod rows;

pub use assembler::SchemaAssembler;
pub use reader::{CatalogSource, PgCatalogReader};
pub use rows::{
    ColumnRow, CompositeAttributeRow, ConstraintKind, ConstraintOrder, ConstraintRow, EnumRow,
    FunctionRow, IndexRow, NamespaceCatalog, ObjectKind, TriggerRow, ViewRow,
};
