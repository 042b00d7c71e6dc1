//! Schema snapshot rendering
//!
//! [`SchemaAssembler`] turns [`NamespaceCatalog`] rows into DDL text. It does no
//! I/O: the column/constraint join, grouping and aggregation all happen here, so
//! the output can be checked against hand-built fixtures.

use crate::catalog::rows::*;
use crate::config::CatalogConfig;
use std::collections::HashMap;

/// Renders catalog rows into a canonical schema snapshot
#[derive(Debug, Clone, Default)]
pub struct SchemaAssembler {
    config: CatalogConfig,
}

impl SchemaAssembler {
    pub fn new(config: CatalogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Whether a namespace falls in the configured exclusion set
    pub fn is_excluded(&self, namespace: &str) -> bool {
        self.config.is_excluded(namespace)
    }

    /// Render one namespace block
    pub fn assemble(&self, catalog: &NamespaceCatalog) -> String {
        let mut out = format!("-- Schema: {}\n", catalog.name);

        for kind in ObjectKind::ALL {
            let statements = self.render_kind(kind, catalog);
            if statements.is_empty() {
                continue;
            }
            out.push('\n');
            out.push_str("-- ");
            out.push_str(kind.header());
            out.push('\n');
            for statement in statements {
                out.push_str(&statement);
                out.push('\n');
            }
        }

        out.push('\n');
        out
    }

    /// Concatenate namespace blocks in the given order
    pub fn assemble_all(&self, catalogs: &[NamespaceCatalog], exclude_reserved: bool) -> String {
        let mut out = String::new();
        for catalog in catalogs {
            if exclude_reserved && self.is_excluded(&catalog.name) {
                log::debug!("Skipping reserved namespace {}", catalog.name);
                continue;
            }
            out.push_str(&self.assemble(catalog));
        }
        out
    }

    /// Statements for one object kind, empty when the kind is absent
    pub fn render_kind(&self, kind: ObjectKind, catalog: &NamespaceCatalog) -> Vec<String> {
        let ns = catalog.name.as_str();
        match kind {
            ObjectKind::Enum => catalog.enums.iter().map(|row| render_enum(ns, row)).collect(),
            ObjectKind::CompositeType => render_composites(ns, &catalog.composite_attributes),
            ObjectKind::Table => self.render_tables(ns, &catalog.columns, &catalog.constraints),
            ObjectKind::View => catalog
                .views
                .iter()
                .filter_map(|row| render_view(ns, "VIEW", row))
                .collect(),
            ObjectKind::MaterializedView => catalog
                .materialized_views
                .iter()
                .filter_map(|row| render_view(ns, "MATERIALIZED VIEW", row))
                .collect(),
            ObjectKind::Function => catalog
                .functions
                .iter()
                .filter_map(|row| render_function(ns, row))
                .collect(),
            ObjectKind::Index => catalog.indexes.iter().filter_map(render_index).collect(),
            ObjectKind::Trigger => catalog.triggers.iter().map(render_trigger).collect(),
        }
    }

    fn render_tables(
        &self,
        ns: &str,
        columns: &[ColumnRow],
        constraints: &[ConstraintRow],
    ) -> Vec<String> {
        // (table, column) -> constraint kinds in catalog order
        let mut by_column: HashMap<(&str, &str), Vec<ConstraintKind>> = HashMap::new();
        for row in constraints {
            by_column
                .entry((row.table_name.as_str(), row.column_name.as_str()))
                .or_default()
                .push(row.kind);
        }

        group_rows(columns, |c| c.table_name.as_str())
            .into_iter()
            .map(|(table, mut cols)| {
                cols.sort_by_key(|c| c.position);
                let rendered: Vec<String> = cols
                    .iter()
                    .map(|col| {
                        let mut kinds = by_column
                            .get(&(table, col.column_name.as_str()))
                            .cloned()
                            .unwrap_or_default();
                        // stable sort keeps catalog order among equal kinds
                        kinds.sort_by(|a, b| self.config.constraint_order.compare(*a, *b));
                        render_column(col, &kinds)
                    })
                    .collect();
                format!("CREATE TABLE {}.{} ({});", ns, table, rendered.join(", "))
            })
            .collect()
    }
}

/// Group rows by owning object name, objects in first-seen order
fn group_rows<'a, T>(rows: &'a [T], key: impl Fn(&'a T) -> &'a str) -> Vec<(&'a str, Vec<&'a T>)> {
    let mut slots: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<(&'a str, Vec<&'a T>)> = Vec::new();
    for row in rows {
        let name = key(row);
        match slots.get(name) {
            Some(&slot) => groups[slot].1.push(row),
            None => {
                slots.insert(name, groups.len());
                groups.push((name, vec![row]));
            }
        }
    }
    groups
}

fn render_column(column: &ColumnRow, kinds: &[ConstraintKind]) -> String {
    let mut out = format!("{} {}", column.column_name, column.data_type);
    if column.not_null {
        out.push_str(" NOT NULL");
    }
    if !kinds.is_empty() {
        let annotations: Vec<String> = kinds
            .iter()
            .map(|kind| format!("{} ({})", kind.keyword(), column.column_name))
            .collect();
        out.push(' ');
        out.push_str(&annotations.join(", "));
    }
    out
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn render_enum(ns: &str, row: &EnumRow) -> String {
    let labels: Vec<String> = row.labels.iter().map(|l| quote_literal(l)).collect();
    format!("CREATE TYPE {}.{} AS ENUM ({});", ns, row.type_name, labels.join(", "))
}

fn render_composites(ns: &str, attributes: &[CompositeAttributeRow]) -> Vec<String> {
    group_rows(attributes, |a| a.type_name.as_str())
        .into_iter()
        .map(|(name, mut attrs)| {
            attrs.sort_by_key(|a| a.position);
            let fields: Vec<String> = attrs
                .iter()
                .map(|a| format!("{} {}", a.attribute_name, a.data_type))
                .collect();
            format!("CREATE TYPE {}.{} AS ({});", ns, name, fields.join(", "))
        })
        .collect()
}

fn render_view(ns: &str, keyword: &str, row: &ViewRow) -> Option<String> {
    let definition = row.definition.as_deref()?.trim();
    if definition.is_empty() {
        return None;
    }
    Some(format!("CREATE {} {}.{} AS {}", keyword, ns, row.view_name, definition))
}

fn render_function(ns: &str, row: &FunctionRow) -> Option<String> {
    let definition = row.definition.as_deref()?;
    if definition.trim().is_empty() {
        return None;
    }
    let result = row.result.as_deref().filter(|r| !r.trim().is_empty())?;
    Some(format!(
        "CREATE OR REPLACE FUNCTION {}.{}({}) RETURNS {} AS $function_body$ {}$function_body$ LANGUAGE {};",
        ns, row.function_name, row.arguments, result, definition, row.language
    ))
}

fn render_index(row: &IndexRow) -> Option<String> {
    let definition = row.definition.as_deref()?.trim();
    if definition.is_empty() {
        return None;
    }
    Some(format!("{};", definition.trim_end_matches(';')))
}

const TRIGGER_ROW: i16 = 1 << 0;
const TRIGGER_BEFORE: i16 = 1 << 1;
const TRIGGER_INSERT: i16 = 1 << 2;
const TRIGGER_DELETE: i16 = 1 << 3;
const TRIGGER_UPDATE: i16 = 1 << 4;
const TRIGGER_TRUNCATE: i16 = 1 << 5;
const TRIGGER_INSTEAD: i16 = 1 << 6;

fn render_trigger(row: &TriggerRow) -> String {
    let bits = row.trigger_type;
    let timing = if bits & TRIGGER_INSTEAD != 0 {
        "INSTEAD OF"
    } else if bits & TRIGGER_BEFORE != 0 {
        "BEFORE"
    } else {
        "AFTER"
    };

    let events: Vec<&str> = [
        (TRIGGER_INSERT, "INSERT"),
        (TRIGGER_UPDATE, "UPDATE"),
        (TRIGGER_DELETE, "DELETE"),
        (TRIGGER_TRUNCATE, "TRUNCATE"),
    ]
    .iter()
    .filter(|(bit, _)| bits & bit != 0)
    .map(|(_, name)| *name)
    .collect();

    let level = if bits & TRIGGER_ROW != 0 { "ROW" } else { "STATEMENT" };

    format!(
        "CREATE TRIGGER {} {} {} ON {}.{} FOR EACH {} EXECUTE FUNCTION {}.{}();",
        row.trigger_name,
        timing,
        events.join(" OR "),
        row.table_namespace,
        row.table_name,
        level,
        row.function_namespace,
        row.function_name
    )
}
