//! Structured catalog rows
//!
//! One type per object kind, carrying exactly the fields the assembler needs to
//! render a statement. Rows are plain data so fixtures can be built by hand.

use serde::{Deserialize, Serialize};

/// Object kinds in snapshot section order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Enum,
    CompositeType,
    Table,
    View,
    MaterializedView,
    Function,
    Index,
    Trigger,
}

impl ObjectKind {
    /// Fixed section order of a namespace block
    pub const ALL: [ObjectKind; 8] = [
        ObjectKind::Enum,
        ObjectKind::CompositeType,
        ObjectKind::Table,
        ObjectKind::View,
        ObjectKind::MaterializedView,
        ObjectKind::Function,
        ObjectKind::Index,
        ObjectKind::Trigger,
    ];

    /// Section header text
    pub fn header(&self) -> &'static str {
        match self {
            ObjectKind::Enum => "Enums",
            ObjectKind::CompositeType => "Types",
            ObjectKind::Table => "Tables",
            ObjectKind::View => "Views",
            ObjectKind::MaterializedView => "Materialized Views",
            ObjectKind::Function => "Functions",
            ObjectKind::Index => "Indexes",
            ObjectKind::Trigger => "Triggers",
        }
    }
}

/// An enumerated type and its labels in sort order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumRow {
    pub type_name: String,
    pub labels: Vec<String>,
}

/// One attribute of a composite type; rows arrive ordered by type then position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeAttributeRow {
    pub type_name: String,
    pub attribute_name: String,
    pub data_type: String,
    pub position: i16,
}

/// One column of an ordinary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRow {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub not_null: bool,
    pub position: i16,
}

/// Key constraint kinds that annotate columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
}

impl ConstraintKind {
    /// Keyword as reported by `information_schema.table_constraints`
    pub fn keyword(&self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::Unique => "UNIQUE",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "PRIMARY KEY" => Some(ConstraintKind::PrimaryKey),
            "FOREIGN KEY" => Some(ConstraintKind::ForeignKey),
            "UNIQUE" => Some(ConstraintKind::Unique),
            _ => None,
        }
    }

    fn priority(&self) -> u8 {
        match self {
            ConstraintKind::PrimaryKey => 0,
            ConstraintKind::ForeignKey => 1,
            ConstraintKind::Unique => 2,
        }
    }
}

/// How multiple constraint annotations on one column are ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOrder {
    /// PRIMARY KEY, then FOREIGN KEY, then UNIQUE
    #[default]
    KindPriority,
    /// Reverse alphabetical by keyword (UNIQUE, PRIMARY KEY, FOREIGN KEY)
    DescendingName,
}

impl ConstraintOrder {
    pub fn compare(&self, a: ConstraintKind, b: ConstraintKind) -> std::cmp::Ordering {
        match self {
            ConstraintOrder::KindPriority => a.priority().cmp(&b.priority()),
            ConstraintOrder::DescendingName => b.keyword().cmp(a.keyword()),
        }
    }
}

/// A key constraint touching one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRow {
    pub table_name: String,
    pub column_name: String,
    pub kind: ConstraintKind,
}

/// A view or materialized view definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    pub view_name: String,
    pub definition: Option<String>,
}

/// A plain function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRow {
    pub function_name: String,
    pub arguments: String,
    pub result: Option<String>,
    pub definition: Option<String>,
    pub language: String,
}

/// An index definition as reported by `pg_indexes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    pub table_name: String,
    pub index_name: String,
    pub definition: Option<String>,
}

/// A user-defined trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRow {
    pub trigger_name: String,
    /// Raw `pg_trigger.tgtype` bit set
    pub trigger_type: i16,
    pub table_namespace: String,
    pub table_name: String,
    pub function_namespace: String,
    pub function_name: String,
}

/// Everything the catalog holds for one namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceCatalog {
    pub name: String,
    pub enums: Vec<EnumRow>,
    pub composite_attributes: Vec<CompositeAttributeRow>,
    pub columns: Vec<ColumnRow>,
    pub constraints: Vec<ConstraintRow>,
    pub views: Vec<ViewRow>,
    pub materialized_views: Vec<ViewRow>,
    pub functions: Vec<FunctionRow>,
    pub indexes: Vec<IndexRow>,
    pub triggers: Vec<TriggerRow>,
}

impl NamespaceCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True when no object of any kind was found
    pub fn is_empty(&self) -> bool {
        self.enums.is_empty()
            && self.composite_attributes.is_empty()
            && self.columns.is_empty()
            && self.views.is_empty()
            && self.materialized_views.is_empty()
            && self.functions.is_empty()
            && self.indexes.is_empty()
            && self.triggers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_kind_order_and_headers() {
        let headers: Vec<&str> = ObjectKind::ALL.iter().map(|k| k.header()).collect();
        assert_eq!(
            headers,
            vec![
                "Enums",
                "Types",
                "Tables",
                "Views",
                "Materialized Views",
                "Functions",
                "Indexes",
                "Triggers"
            ]
        );
    }

    #[test]
    fn test_constraint_keyword_round_trip() {
        for kind in [ConstraintKind::PrimaryKey, ConstraintKind::ForeignKey, ConstraintKind::Unique] {
            assert_eq!(ConstraintKind::from_keyword(kind.keyword()), Some(kind));
        }
        assert_eq!(ConstraintKind::from_keyword("CHECK"), None);
    }

    #[test]
    fn test_constraint_orders() {
        let priority = ConstraintOrder::KindPriority;
        assert_eq!(
            priority.compare(ConstraintKind::PrimaryKey, ConstraintKind::Unique),
            Ordering::Less
        );
        assert_eq!(
            priority.compare(ConstraintKind::ForeignKey, ConstraintKind::Unique),
            Ordering::Less
        );

        let descending = ConstraintOrder::DescendingName;
        assert_eq!(
            descending.compare(ConstraintKind::Unique, ConstraintKind::PrimaryKey),
            Ordering::Less
        );
        assert_eq!(
            descending.compare(ConstraintKind::PrimaryKey, ConstraintKind::ForeignKey),
            Ordering::Less
        );
    }
}
