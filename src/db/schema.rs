//! Database schema introspection
//!
//! Structures for the lazily loaded catalog tree: schemas, then tables,
//! then columns. A node's children are fetched the first time it is
//! expanded and cached until refreshed.

/// One catalog object shown in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    Schema {
        name: String,
    },
    Table {
        schema: String,
        name: String,
    },
    Column {
        schema: String,
        table: String,
        name: String,
        data_type: String,
        nullable: bool,
    },
}

/// Column metadata as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as the catalog spells it ("character varying", "integer", ...)
    pub data_type: String,
    pub nullable: bool,
}

/// One (index, column) pair; multi-column indexes produce several
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub column: String,
    /// Access method ("btree", "hash", "gin", ...)
    pub method: String,
}

/// Child state of a tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Children {
    /// Columns have no children
    Leaf,
    /// Not fetched yet; shown as a "Loading ..." placeholder
    Pending,
    /// Fetched; may be empty
    Loaded(Vec<TreeNode>),
}

/// Catalog lookup needed to fill a pending node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    Tables { schema: String },
    Columns { schema: String, table: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub node: SchemaNode,
    pub children: Children,
    pub expanded: bool,
}

/// The catalog tree for one connected session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogTree {
    pub roots: Vec<TreeNode>,
}

impl SchemaNode {
    pub fn name(&self) -> &str {
        match self {
            SchemaNode::Schema { name }
            | SchemaNode::Table { name, .. }
            | SchemaNode::Column { name, .. } => name,
        }
    }

    /// Tree label; columns include their type and nullability
    pub fn label(&self) -> String {
        match self {
            SchemaNode::Schema { name } | SchemaNode::Table { name, .. } => name.clone(),
            SchemaNode::Column {
                name,
                data_type,
                nullable,
                ..
            } => format!(
                "{} ({}, Nullable: {})",
                name,
                data_type,
                if *nullable { "YES" } else { "NO" }
            ),
        }
    }
}

impl TreeNode {
    fn schema(name: String) -> Self {
        Self {
            node: SchemaNode::Schema { name },
            children: Children::Pending,
            expanded: false,
        }
    }

    fn table(schema: &str, name: String) -> Self {
        Self {
            node: SchemaNode::Table {
                schema: schema.to_string(),
                name,
            },
            children: Children::Pending,
            expanded: false,
        }
    }

    fn column(schema: &str, table: &str, info: ColumnInfo) -> Self {
        Self {
            node: SchemaNode::Column {
                schema: schema.to_string(),
                table: table.to_string(),
                name: info.name,
                data_type: info.data_type,
                nullable: info.nullable,
            },
            children: Children::Leaf,
            expanded: false,
        }
    }

    /// The lookup that fills this node's children
    fn load_request(&self) -> Option<LoadRequest> {
        match &self.node {
            SchemaNode::Schema { name } => Some(LoadRequest::Tables {
                schema: name.clone(),
            }),
            SchemaNode::Table { schema, name } => Some(LoadRequest::Columns {
                schema: schema.clone(),
                table: name.clone(),
            }),
            SchemaNode::Column { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.children == Children::Pending
    }
}

impl CatalogTree {
    /// Top level of the tree; every schema starts pending
    pub fn from_schemas(names: Vec<String>) -> Self {
        Self {
            roots: names.into_iter().map(TreeNode::schema).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node(&self, path: &[usize]) -> Option<&TreeNode> {
        let (first, rest) = path.split_first()?;
        let mut current = self.roots.get(*first)?;
        for idx in rest {
            match &current.children {
                Children::Loaded(kids) => current = kids.get(*idx)?,
                _ => return None,
            }
        }
        Some(current)
    }

    fn node_mut(&mut self, path: &[usize]) -> Option<&mut TreeNode> {
        let (first, rest) = path.split_first()?;
        let mut current = self.roots.get_mut(*first)?;
        for idx in rest {
            match &mut current.children {
                Children::Loaded(kids) => current = kids.get_mut(*idx)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Expand a node. Returns the lookup to run when its children are
    /// still pending; loaded children are reused without a round trip.
    pub fn expand(&mut self, path: &[usize]) -> Option<LoadRequest> {
        let node = self.node_mut(path)?;
        if node.children == Children::Leaf {
            return None;
        }
        node.expanded = true;
        if node.is_pending() {
            node.load_request()
        } else {
            None
        }
    }

    pub fn collapse(&mut self, path: &[usize]) {
        if let Some(node) = self.node_mut(path) {
            node.expanded = false;
        }
    }

    /// Drop a node's cached children so the next expand reloads them.
    /// Returns the reload request when the node was expanded.
    pub fn refresh(&mut self, path: &[usize]) -> Option<LoadRequest> {
        let node = self.node_mut(path)?;
        if node.children == Children::Leaf {
            return None;
        }
        node.children = Children::Pending;
        if node.expanded {
            node.load_request()
        } else {
            None
        }
    }

    fn find_mut(&mut self, target: &LoadRequest) -> Option<&mut TreeNode> {
        match target {
            LoadRequest::Tables { schema } => self
                .roots
                .iter_mut()
                .find(|n| matches!(&n.node, SchemaNode::Schema { name } if name == schema)),
            LoadRequest::Columns { schema, table } => {
                let schema_node = self.roots.iter_mut().find(
                    |n| matches!(&n.node, SchemaNode::Schema { name } if name == schema),
                )?;
                match &mut schema_node.children {
                    Children::Loaded(tables) => tables.iter_mut().find(|n| {
                        matches!(&n.node, SchemaNode::Table { name, .. } if name == table)
                    }),
                    _ => None,
                }
            }
        }
    }

    /// Path of a loaded table node
    pub fn find_table(&self, schema: &str, table: &str) -> Option<Vec<usize>> {
        let si = self
            .roots
            .iter()
            .position(|n| matches!(&n.node, SchemaNode::Schema { name } if name == schema))?;
        match &self.roots[si].children {
            Children::Loaded(tables) => tables
                .iter()
                .position(|n| matches!(&n.node, SchemaNode::Table { name, .. } if name == table))
                .map(|ti| vec![si, ti]),
            _ => None,
        }
    }

    /// Path of a loaded column node
    pub fn find_column(&self, schema: &str, table: &str, column: &str) -> Option<Vec<usize>> {
        let mut path = self.find_table(schema, table)?;
        let node = self.node(&path)?;
        match &node.children {
            Children::Loaded(columns) => {
                let ci = columns.iter().position(|n| n.node.name() == column)?;
                path.push(ci);
                Some(path)
            }
            _ => None,
        }
    }

    /// Path of a schema node
    pub fn find_schema(&self, schema: &str) -> Option<Vec<usize>> {
        self.roots
            .iter()
            .position(|n| matches!(&n.node, SchemaNode::Schema { name } if name == schema))
            .map(|i| vec![i])
    }

    /// Fill a schema's tables. Ignored (returns false) when the schema is
    /// no longer in the tree.
    pub fn apply_tables(&mut self, schema: &str, tables: Vec<String>) -> bool {
        let request = LoadRequest::Tables {
            schema: schema.to_string(),
        };
        match self.find_mut(&request) {
            Some(node) => {
                node.children = Children::Loaded(
                    tables
                        .into_iter()
                        .map(|t| TreeNode::table(schema, t))
                        .collect(),
                );
                true
            }
            None => false,
        }
    }

    /// Fill a table's columns
    pub fn apply_columns(&mut self, schema: &str, table: &str, columns: Vec<ColumnInfo>) -> bool {
        let request = LoadRequest::Columns {
            schema: schema.to_string(),
            table: table.to_string(),
        };
        match self.find_mut(&request) {
            Some(node) => {
                node.children = Children::Loaded(
                    columns
                        .into_iter()
                        .map(|c| TreeNode::column(schema, table, c))
                        .collect(),
                );
                true
            }
            None => false,
        }
    }

    /// A lookup failed: the node stays pending and collapses so that
    /// expanding it again retries.
    pub fn load_failed(&mut self, request: &LoadRequest) {
        if let Some(node) = self.find_mut(request) {
            node.children = Children::Pending;
            node.expanded = false;
        }
    }

    /// Indented text rendering of the visible part of the tree
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for root in &self.roots {
            push_lines(root, 0, &mut out);
        }
        out
    }
}

fn push_lines(node: &TreeNode, depth: usize, out: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let marker = match (&node.children, node.expanded) {
        (Children::Leaf, _) => "  ",
        (_, true) => "v ",
        (_, false) => "> ",
    };
    out.push(format!("{}{}{}", indent, marker, node.node.label()));
    if !node.expanded {
        return;
    }
    let child_indent = "  ".repeat(depth + 1);
    let is_schema = matches!(node.node, SchemaNode::Schema { .. });
    match &node.children {
        Children::Leaf => {}
        Children::Pending => out.push(format!(
            "{}  {}",
            child_indent,
            if is_schema {
                "Loading tables..."
            } else {
                "Loading columns..."
            }
        )),
        Children::Loaded(kids) if kids.is_empty() => out.push(format!(
            "{}  {}",
            child_indent,
            if is_schema { "No tables" } else { "No columns" }
        )),
        Children::Loaded(kids) => {
            for kid in kids {
                push_lines(kid, depth + 1, out);
            }
        }
    }
}
