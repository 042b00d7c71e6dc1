//! Read-only catalog queries
//!
//! Each query takes the namespace name as `$1` and returns the columns read by
//! [`crate::catalog::reader::PgCatalogReader`]. Identifiers of type `name` are
//! cast to `text` so they decode as strings. Every query is explicitly ordered.

/// All namespaces, by name
pub const NAMESPACES: &str = r#"
SELECT nspname::text AS namespace_name
FROM pg_catalog.pg_namespace
ORDER BY nspname;
"#;

/// Enumerated types with labels in sort order
pub const ENUMS: &str = r#"
SELECT
  t.typname::text AS type_name,
  array_agg(e.enumlabel::text ORDER BY e.enumsortorder) AS labels
FROM pg_catalog.pg_type t
  JOIN pg_catalog.pg_namespace n ON t.typnamespace = n.oid
  JOIN pg_catalog.pg_enum e ON t.oid = e.enumtypid
WHERE n.nspname = $1
  AND t.typtype = 'e'
GROUP BY t.typname
ORDER BY t.typname;
"#;

/// Attributes of standalone composite types
pub const COMPOSITE_ATTRIBUTES: &str = r#"
SELECT
  t.typname::text AS type_name,
  a.attname::text AS attribute_name,
  pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
  a.attnum AS position
FROM pg_catalog.pg_type t
  JOIN pg_catalog.pg_namespace n ON t.typnamespace = n.oid
  JOIN pg_catalog.pg_class c ON t.typrelid = c.oid
  JOIN pg_catalog.pg_attribute a ON t.typrelid = a.attrelid
WHERE n.nspname = $1
  AND t.typtype = 'c'
  AND c.relkind = 'c'
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY t.typname, a.attnum;
"#;

/// Columns of ordinary tables in declaration order
pub const TABLE_COLUMNS: &str = r#"
SELECT
  c.relname::text AS table_name,
  a.attname::text AS column_name,
  pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
  a.attnotnull AS not_null,
  a.attnum AS position
FROM pg_catalog.pg_attribute a
  JOIN pg_catalog.pg_class c ON a.attrelid = c.oid
  JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
WHERE n.nspname = $1
  AND c.relkind = 'r'
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY c.relname, a.attnum;
"#;

/// Key constraints per column
pub const TABLE_CONSTRAINTS: &str = r#"
SELECT
  tc.table_name::text AS table_name,
  kcu.column_name::text AS column_name,
  tc.constraint_type::text AS constraint_type
FROM information_schema.table_constraints tc
  JOIN information_schema.key_column_usage kcu
    ON tc.constraint_catalog = kcu.constraint_catalog
    AND tc.constraint_schema = kcu.constraint_schema
    AND tc.constraint_name = kcu.constraint_name
WHERE tc.constraint_type IN ('PRIMARY KEY', 'FOREIGN KEY', 'UNIQUE')
  AND tc.table_schema = $1
ORDER BY tc.table_name, kcu.column_name, tc.constraint_name;
"#;

/// Views (`relkind = 'v'`)
pub const VIEWS: &str = r#"
SELECT
  c.relname::text AS view_name,
  pg_catalog.pg_get_viewdef(c.oid) AS definition
FROM pg_catalog.pg_class c
  JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
WHERE c.relkind = 'v'
  AND n.nspname = $1
ORDER BY c.relname;
"#;

/// Materialized views (`relkind = 'm'`)
pub const MATERIALIZED_VIEWS: &str = r#"
SELECT
  c.relname::text AS view_name,
  pg_catalog.pg_get_viewdef(c.oid) AS definition
FROM pg_catalog.pg_class c
  JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
WHERE c.relkind = 'm'
  AND n.nspname = $1
ORDER BY c.relname;
"#;

/// Plain functions (`prokind = 'f'`)
pub const FUNCTIONS: &str = r#"
SELECT
  p.proname::text AS function_name,
  pg_catalog.pg_get_function_arguments(p.oid) AS arguments,
  pg_catalog.pg_get_function_result(p.oid) AS result,
  pg_catalog.pg_get_functiondef(p.oid) AS definition,
  l.lanname::text AS language
FROM pg_catalog.pg_proc p
  JOIN pg_catalog.pg_namespace n ON p.pronamespace = n.oid
  JOIN pg_catalog.pg_language l ON p.prolang = l.oid
WHERE n.nspname = $1
  AND p.prokind = 'f'
ORDER BY p.proname, p.oid;
"#;

/// Index definitions
pub const INDEXES: &str = r#"
SELECT
  tablename::text AS table_name,
  indexname::text AS index_name,
  indexdef AS definition
FROM pg_catalog.pg_indexes
WHERE schemaname = $1
ORDER BY tablename, indexname;
"#;

/// User-defined triggers
pub const TRIGGERS: &str = r#"
SELECT
  t.tgname::text AS trigger_name,
  t.tgtype AS trigger_type,
  n.nspname::text AS table_namespace,
  c.relname::text AS table_name,
  np.nspname::text AS function_namespace,
  p.proname::text AS function_name
FROM pg_catalog.pg_trigger t
  JOIN pg_catalog.pg_class c ON t.tgrelid = c.oid
  JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
  JOIN pg_catalog.pg_proc p ON t.tgfoid = p.oid
  JOIN pg_catalog.pg_namespace np ON p.pronamespace = np.oid
WHERE n.nspname = $1
  AND NOT t.tgisinternal
ORDER BY c.relname, t.tgname;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_are_read_only_and_parameterised() {
        let per_namespace = [
            ENUMS,
            COMPOSITE_ATTRIBUTES,
            TABLE_COLUMNS,
            TABLE_CONSTRAINTS,
            VIEWS,
            MATERIALIZED_VIEWS,
            FUNCTIONS,
            INDEXES,
            TRIGGERS,
        ];
        for sql in per_namespace {
            assert!(sql.trim_start().starts_with("SELECT"));
            assert!(sql.contains("$1"));
            assert!(sql.contains("ORDER BY"));
        }
        assert!(NAMESPACES.trim_start().starts_with("SELECT"));
    }
}
