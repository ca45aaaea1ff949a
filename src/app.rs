//! Application state and event handling
//!
//! Central state machine: user operations and events come in, state
//! updates, actions go out. Nothing here touches the network; the
//! [`Driver`](crate::runtime::Driver) performs each [`Action`] and feeds the
//! resulting [`AppEvent`] back through [`App::handle_event`].

use crate::config::{ConnectionProfile, PreferenceStore};
use crate::db::{CatalogTree, IndexInfo, LoadRequest, QueryOutcome, SchemaNode};
use crate::error::{DbError, ExportResult};
use crate::export;
use crate::grid::Grid;
use crate::history::{HISTORY_CAPACITY, QueryHistory};
use crate::sql::{self, QueryTemplate};
use crate::viz::{ChartImage, ChartSpec, DataState, VisualizationEngine};
use std::path::Path;

/// Status message with severity level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub level: StatusLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Results of performed actions, fed back into the state machine
#[derive(Debug)]
pub enum AppEvent {
    /// A session is open for this profile
    Connected(ConnectionProfile),
    ConnectFailed(DbError),
    Disconnected,
    /// Closing reported an error; the session is gone regardless
    DisconnectFailed(DbError),
    SchemasLoaded(Vec<String>),
    TablesLoaded {
        schema: String,
        tables: Vec<String>,
    },
    ColumnsLoaded {
        schema: String,
        table: String,
        columns: Vec<crate::db::ColumnInfo>,
    },
    /// A catalog lookup failed; `request` is `None` for the schema list
    CatalogFailed {
        request: Option<LoadRequest>,
        error: DbError,
    },
    IndexesLoaded {
        schema: String,
        table: String,
        indexes: Vec<IndexInfo>,
    },
    QueryCompleted(QueryOutcome),
    QueryFailed(DbError),
    /// Background database connection lost
    ConnectionLost(String),
}

/// Work for the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Connect(ConnectionProfile),
    Disconnect,
    LoadSchemas,
    LoadChildren(LoadRequest),
    LoadIndexes { schema: String, table: String },
    ExecuteQuery { sql: String },
    None,
}

/// Indexes of the table last asked about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIndexes {
    pub schema: String,
    pub table: String,
    pub indexes: Vec<IndexInfo>,
}

pub struct App {
    prefs: PreferenceStore,
    /// Profile of the open session
    pub connection: Option<ConnectionProfile>,
    /// Profile of a connect in flight
    connecting: Option<ConnectionProfile>,
    /// Why the last session went away, until the next connect
    lost_reason: Option<String>,
    pub catalog: CatalogTree,
    pub grid: Grid,
    pub viz: VisualizationEngine,
    /// Last successfully rendered chart
    pub chart: Option<ChartImage>,
    pub indexes: Option<TableIndexes>,
    pub last_query: Option<String>,
    /// Browse cursor over the stored history, rebuilt whenever the store changes
    history_cursor: QueryHistory,
    pub status_message: Option<StatusMessage>,
    clipboard: Option<arboard::Clipboard>,
}

impl App {
    pub fn new(prefs: PreferenceStore) -> Self {
        let history_cursor = QueryHistory::from_entries(prefs.query_history(), HISTORY_CAPACITY);
        Self {
            prefs,
            connection: None,
            connecting: None,
            lost_reason: None,
            catalog: CatalogTree::default(),
            grid: Grid::default(),
            viz: VisualizationEngine::new(),
            chart: None,
            indexes: None,
            last_query: None,
            history_cursor,
            status_message: None,
            clipboard: None,
        }
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn set_status(&mut self, message: String, level: StatusLevel) {
        match level {
            StatusLevel::Error => tracing::warn!("{}", message),
            _ => tracing::debug!("{}", message),
        }
        self.status_message = Some(StatusMessage { message, level });
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Action {
        match event {
            AppEvent::Connected(profile) => {
                self.connecting = None;
                self.lost_reason = None;
                let name = profile.display_name();
                self.set_status(format!("Connected to {}", name), StatusLevel::Success);
                if let Err(e) = self.prefs.add_recent_connection(&profile) {
                    self.set_status(
                        format!("Connected to {} (could not save recent connections: {})", name, e),
                        StatusLevel::Warning,
                    );
                }
                self.connection = Some(profile);
                Action::LoadSchemas
            }
            AppEvent::ConnectFailed(error) => {
                self.connecting = None;
                self.set_status(error.to_string(), StatusLevel::Error);
                Action::None
            }
            AppEvent::Disconnected => {
                self.clear_session();
                self.set_status("Disconnected".to_string(), StatusLevel::Info);
                Action::None
            }
            AppEvent::DisconnectFailed(error) => {
                self.clear_session();
                self.set_status(error.to_string(), StatusLevel::Warning);
                Action::None
            }
            AppEvent::SchemasLoaded(names) => {
                let count = names.len();
                self.catalog = CatalogTree::from_schemas(names);
                self.set_status(format!("Loaded {} schemas", count), StatusLevel::Info);
                Action::None
            }
            AppEvent::TablesLoaded { schema, tables } => {
                self.catalog.apply_tables(&schema, tables);
                Action::None
            }
            AppEvent::ColumnsLoaded {
                schema,
                table,
                columns,
            } => {
                self.catalog.apply_columns(&schema, &table, columns);
                Action::None
            }
            AppEvent::CatalogFailed { request, error } => {
                if let Some(request) = &request {
                    self.catalog.load_failed(request);
                }
                self.report_failure(error, "catalog not loaded");
                Action::None
            }
            AppEvent::IndexesLoaded {
                schema,
                table,
                indexes,
            } => {
                self.set_status(
                    format!("{} index columns on {}.{}", indexes.len(), schema, table),
                    StatusLevel::Info,
                );
                self.indexes = Some(TableIndexes {
                    schema,
                    table,
                    indexes,
                });
                Action::None
            }
            AppEvent::QueryCompleted(outcome) => {
                self.apply_outcome(outcome);
                Action::None
            }
            AppEvent::QueryFailed(error) => {
                self.report_failure(error, "query not sent");
                Action::None
            }
            AppEvent::ConnectionLost(msg) => {
                self.clear_session();
                self.set_status(msg.clone(), StatusLevel::Error);
                self.lost_reason = Some(msg);
                Action::None
            }
        }
    }

    /// Work abandoned after the connection dropped keeps the reason it dropped
    fn report_failure(&mut self, error: DbError, abandoned: &str) {
        let message = match (&error, &self.lost_reason) {
            (DbError::NotConnected, Some(reason)) => format!("{}; {}", reason, abandoned),
            _ => error.to_string(),
        };
        self.set_status(message, StatusLevel::Error);
    }

    fn clear_session(&mut self) {
        self.connection = None;
        self.catalog = CatalogTree::default();
        self.indexes = None;
    }

    fn apply_outcome(&mut self, outcome: QueryOutcome) {
        let elapsed = outcome.execution_time().as_millis();
        match outcome {
            QueryOutcome::Rows(results) => {
                self.grid = Grid::from_results(&results);
                let state = self.viz.set_data(&results.columns, &results.rows);
                let mut message = format!("{} in {} ms", self.grid.status_text(), elapsed);
                if state == DataState::NoData {
                    message.push_str(" (no data to chart)");
                }
                self.set_status(message, StatusLevel::Success);
            }
            QueryOutcome::Affected { count, .. } => {
                self.grid = Grid::default();
                self.viz.set_data(&[], &[]);
                self.set_status(
                    format!("Query OK, {} rows affected in {} ms", count, elapsed),
                    StatusLevel::Success,
                );
            }
        }
    }

    /// Open a session. Only one session may be open at a time.
    pub fn connect(&mut self, profile: ConnectionProfile) -> Action {
        if self.connection.is_some() || self.connecting.is_some() {
            self.set_status(DbError::AlreadyConnected.to_string(), StatusLevel::Error);
            return Action::None;
        }
        self.set_status(
            format!("Connecting to {}...", profile.display_name()),
            StatusLevel::Info,
        );
        self.connecting = Some(profile.clone());
        Action::Connect(profile)
    }

    pub fn disconnect(&mut self) -> Action {
        if self.connection.is_none() {
            self.set_status(DbError::NotConnected.to_string(), StatusLevel::Warning);
            return Action::None;
        }
        Action::Disconnect
    }

    /// Re-read the schema list
    pub fn refresh_schemas(&mut self) -> Action {
        if self.connection.is_none() {
            self.set_status(DbError::NotConnected.to_string(), StatusLevel::Warning);
            return Action::None;
        }
        Action::LoadSchemas
    }

    /// Expand a tree node, loading its children on first use
    pub fn expand(&mut self, path: &[usize]) -> Action {
        match self.catalog.expand(path) {
            Some(request) => Action::LoadChildren(request),
            None => Action::None,
        }
    }

    pub fn collapse(&mut self, path: &[usize]) {
        self.catalog.collapse(path);
    }

    /// Drop cached children; reloads at once when the node is expanded
    pub fn refresh(&mut self, path: &[usize]) -> Action {
        match self.catalog.refresh(path) {
            Some(request) => Action::LoadChildren(request),
            None => Action::None,
        }
    }

    pub fn expand_schema(&mut self, schema: &str) -> Action {
        match self.catalog.find_schema(schema) {
            Some(path) => self.expand(&path),
            None => {
                self.set_status(format!("No schema named {}", schema), StatusLevel::Warning);
                Action::None
            }
        }
    }

    /// Expand a table whose schema has already been loaded
    pub fn expand_table(&mut self, schema: &str, table: &str) -> Action {
        match self.catalog.find_table(schema, table) {
            Some(path) => self.expand(&path),
            None => {
                self.set_status(
                    format!("No table named {}.{}", schema, table),
                    StatusLevel::Warning,
                );
                Action::None
            }
        }
    }

    pub fn show_indexes(&mut self, schema: &str, table: &str) -> Action {
        if self.connection.is_none() {
            self.set_status(DbError::NotConnected.to_string(), StatusLevel::Warning);
            return Action::None;
        }
        Action::LoadIndexes {
            schema: schema.to_string(),
            table: table.to_string(),
        }
    }

    /// Run a generated query for the node at `path`
    pub fn run_template(&mut self, path: &[usize], template: QueryTemplate) -> Action {
        let Some(node) = self.catalog.node(path).map(|n| n.node.clone()) else {
            return Action::None;
        };
        match sql::generate(&node, template, self.prefs.query_limit()) {
            Some(sql) => self.execute(&sql),
            None => {
                let kind = match node {
                    SchemaNode::Schema { .. } => "schema",
                    SchemaNode::Table { .. } => "table",
                    SchemaNode::Column { .. } => "column",
                };
                self.set_status(
                    format!("{} does not apply to a {}", template.label(), kind),
                    StatusLevel::Warning,
                );
                Action::None
            }
        }
    }

    /// Run SQL text. The trimmed text is recorded in the history before it
    /// is sent.
    pub fn execute(&mut self, sql: &str) -> Action {
        let sql = sql.trim();
        if sql.is_empty() {
            return Action::None;
        }
        if self.connection.is_none() {
            self.set_status(DbError::NotConnected.to_string(), StatusLevel::Error);
            return Action::None;
        }
        if let Err(e) = self.prefs.add_query_history(sql) {
            self.set_status(
                format!("Could not save query history: {}", e),
                StatusLevel::Warning,
            );
        }
        self.reload_history();
        self.last_query = Some(sql.to_string());
        Action::ExecuteQuery {
            sql: sql.to_string(),
        }
    }

    /// Newest-first history, as stored in the preferences
    pub fn history(&self) -> Vec<String> {
        self.prefs.query_history()
    }

    fn reload_history(&mut self) {
        self.history_cursor = QueryHistory::from_entries(self.prefs.query_history(), HISTORY_CAPACITY);
    }

    /// Older history entry; `current` is restored when stepping forward past
    /// the newest
    pub fn history_back(&mut self, current: &str) -> Option<String> {
        self.history_cursor.back(current).map(str::to_string)
    }

    pub fn history_forward(&mut self) -> Option<String> {
        self.history_cursor.forward().map(str::to_string)
    }

    pub fn clear_history(&mut self) {
        if let Err(e) = self.prefs.clear_query_history() {
            self.set_status(
                format!("Could not save query history: {}", e),
                StatusLevel::Warning,
            );
        }
        self.reload_history();
    }

    pub fn clear_recent_connections(&mut self) {
        if let Err(e) = self.prefs.clear_recent_connections() {
            self.set_status(
                format!("Could not save recent connections: {}", e),
                StatusLevel::Warning,
            );
        }
    }

    pub fn set_query_limit(&mut self, limit: u64) {
        if let Err(e) = self.prefs.set_query_limit(limit) {
            self.set_status(e.to_string(), StatusLevel::Warning);
        }
    }

    /// Copy the grid selection; also placed on the system clipboard when one
    /// is available
    pub fn copy_selection(&mut self) -> Option<String> {
        let Some(text) = self.grid.copy_selection() else {
            self.set_status("Nothing selected".to_string(), StatusLevel::Warning);
            return None;
        };
        self.copy_to_clipboard(&text);
        Some(text)
    }

    fn copy_to_clipboard(&mut self, text: &str) {
        if self.clipboard.is_none() {
            match arboard::Clipboard::new() {
                Ok(c) => self.clipboard = Some(c),
                Err(e) => {
                    self.set_status(format!("Clipboard unavailable: {}", e), StatusLevel::Warning);
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(text) {
                Ok(()) => self.set_status("Copied to clipboard".to_string(), StatusLevel::Success),
                Err(e) => {
                    self.set_status(format!("Clipboard error: {}", e), StatusLevel::Warning);
                }
            }
        }
    }

    pub fn export_csv(&mut self, path: &Path) -> ExportResult<usize> {
        match export::write_csv(&self.grid, path) {
            Ok(rows) => {
                self.set_status(
                    format!("Exported {} rows to {}", rows, path.display()),
                    StatusLevel::Success,
                );
                Ok(rows)
            }
            Err(e) => {
                self.set_status(e.to_string(), StatusLevel::Error);
                Err(e)
            }
        }
    }

    /// Render a chart. On failure the previous chart stays and the error
    /// becomes the status message.
    pub fn render_chart(&mut self, spec: &ChartSpec) -> Option<&ChartImage> {
        match self.viz.render(spec) {
            Ok(image) => {
                match image.warnings.first() {
                    Some(w) => self.set_status(w.clone(), StatusLevel::Warning),
                    None => self.set_status(
                        format!("Rendered {} chart", spec.kind()),
                        StatusLevel::Success,
                    ),
                }
                self.chart = Some(image);
                self.chart.as_ref()
            }
            Err(e) => {
                self.set_status(e.to_string(), StatusLevel::Error);
                None
            }
        }
    }

    pub fn export_chart(&mut self, spec: &ChartSpec, path: &Path) -> ExportResult<Vec<String>> {
        match self.viz.export(spec, path) {
            Ok(warnings) => {
                self.set_status(
                    format!("Saved chart to {}", path.display()),
                    StatusLevel::Success,
                );
                Ok(warnings)
            }
            Err(e) => {
                self.set_status(e.to_string(), StatusLevel::Error);
                Err(e)
            }
        }
    }
}
