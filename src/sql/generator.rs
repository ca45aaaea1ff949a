//! Generated queries for catalog nodes
//!
//! Builds the "browse", sample and count statements offered for tables and
//! columns in the catalog tree. Identifiers are quoted whenever PostgreSQL
//! would otherwise fold or reject them.

use crate::db::SchemaNode;

/// Row limit of the fixed sample templates
pub const SAMPLE_LIMIT: u64 = 100;

/// Reserved words that cannot appear as bare identifiers
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both", "case",
    "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false", "fetch",
    "for", "foreign", "from", "grant", "group", "having", "in", "initially", "intersect", "into",
    "lateral", "leading", "limit", "localtime", "localtimestamp", "not", "null", "offset", "on",
    "only", "or", "order", "placing", "primary", "references", "returning", "select",
    "session_user", "some", "symmetric", "table", "then", "to", "trailing", "true", "union",
    "unique", "user", "using", "variadic", "when", "where", "window", "with",
];

/// A template offered for a catalog node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTemplate {
    /// `SELECT *` limited by the configured row limit
    Browse,
    SelectAll,
    CountRows,
    SelectColumn,
    SelectDistinct,
    CountDistinct,
}

impl QueryTemplate {
    pub fn label(&self) -> &'static str {
        match self {
            QueryTemplate::Browse => "Browse Data",
            QueryTemplate::SelectAll => "SELECT *",
            QueryTemplate::CountRows => "COUNT(*)",
            QueryTemplate::SelectColumn => "SELECT column",
            QueryTemplate::SelectDistinct => "SELECT DISTINCT column",
            QueryTemplate::CountDistinct => "COUNT DISTINCT column",
        }
    }

    /// Templates that apply to a node kind
    pub fn for_node(node: &SchemaNode) -> &'static [QueryTemplate] {
        match node {
            SchemaNode::Schema { .. } => &[],
            SchemaNode::Table { .. } => &[
                QueryTemplate::Browse,
                QueryTemplate::SelectAll,
                QueryTemplate::CountRows,
            ],
            SchemaNode::Column { .. } => &[
                QueryTemplate::SelectColumn,
                QueryTemplate::SelectDistinct,
                QueryTemplate::CountDistinct,
            ],
        }
    }
}

/// Quote an identifier unless it is a plain lower-case non-reserved name
pub fn quote_ident(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !RESERVED.contains(&name);
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// `schema.table` with both parts quoted as needed
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

pub fn browse_table(schema: &str, table: &str, limit: u64) -> String {
    format!("SELECT * FROM {} LIMIT {};", qualified(schema, table), limit)
}

pub fn select_all(schema: &str, table: &str) -> String {
    browse_table(schema, table, SAMPLE_LIMIT)
}

pub fn count_rows(schema: &str, table: &str) -> String {
    format!("SELECT COUNT(*) FROM {};", qualified(schema, table))
}

pub fn select_column(schema: &str, table: &str, column: &str) -> String {
    format!(
        "SELECT {} FROM {} LIMIT {};",
        quote_ident(column),
        qualified(schema, table),
        SAMPLE_LIMIT
    )
}

pub fn select_distinct(schema: &str, table: &str, column: &str) -> String {
    format!(
        "SELECT DISTINCT {} FROM {} LIMIT {};",
        quote_ident(column),
        qualified(schema, table),
        SAMPLE_LIMIT
    )
}

pub fn count_distinct(schema: &str, table: &str, column: &str) -> String {
    format!(
        "SELECT COUNT(DISTINCT {}) FROM {};",
        quote_ident(column),
        qualified(schema, table)
    )
}

/// SQL for a template on a node, or `None` when the template does not apply
pub fn generate(node: &SchemaNode, template: QueryTemplate, browse_limit: u64) -> Option<String> {
    match (node, template) {
        (SchemaNode::Table { schema, name }, QueryTemplate::Browse) => {
            Some(browse_table(schema, name, browse_limit))
        }
        (SchemaNode::Table { schema, name }, QueryTemplate::SelectAll) => {
            Some(select_all(schema, name))
        }
        (SchemaNode::Table { schema, name }, QueryTemplate::CountRows) => {
            Some(count_rows(schema, name))
        }
        (
            SchemaNode::Column {
                schema,
                table,
                name,
                ..
            },
            column_template,
        ) => match column_template {
            QueryTemplate::SelectColumn => Some(select_column(schema, table, name)),
            QueryTemplate::SelectDistinct => Some(select_distinct(schema, table, name)),
            QueryTemplate::CountDistinct => Some(count_distinct(schema, table, name)),
            _ => None,
        },
        _ => None,
    }
}
