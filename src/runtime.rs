//! Performs app actions against the database
//!
//! The driver owns the single session. It runs one action at a time and
//! hands the outcome back to the [`App`] as an [`AppEvent`], following any
//! action the app returns until the chain settles.

use crate::app::{Action, App, AppEvent};
use crate::db::{Database, LoadRequest};
use crate::error::DbError;

pub struct Driver<D: Database> {
    session: Option<D>,
}

impl<D: Database> Default for Driver<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Database> Driver<D> {
    pub fn new() -> Self {
        Self { session: None }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&D> {
        self.session.as_ref()
    }

    /// Carry out one action. `None` for [`Action::None`].
    pub async fn perform(&mut self, action: Action) -> Option<AppEvent> {
        let event = match action {
            Action::None => return None,
            Action::Connect(profile) => {
                if self.session.is_some() {
                    AppEvent::ConnectFailed(DbError::AlreadyConnected)
                } else {
                    match D::connect(&profile).await {
                        Ok(session) => {
                            self.session = Some(session);
                            AppEvent::Connected(profile)
                        }
                        Err(e) => AppEvent::ConnectFailed(e),
                    }
                }
            }
            Action::Disconnect => match self.session.take() {
                // The session reference is gone whatever close reports
                Some(session) => match session.close().await {
                    Ok(()) => AppEvent::Disconnected,
                    Err(e) => AppEvent::DisconnectFailed(e),
                },
                None => AppEvent::Disconnected,
            },
            Action::LoadSchemas => match self.connected() {
                Ok(session) => match session.list_schemas().await {
                    Ok(names) => AppEvent::SchemasLoaded(names),
                    Err(error) => AppEvent::CatalogFailed {
                        request: None,
                        error,
                    },
                },
                Err(error) => AppEvent::CatalogFailed {
                    request: None,
                    error,
                },
            },
            Action::LoadChildren(request) => self.load_children(request).await,
            Action::LoadIndexes { schema, table } => {
                let loaded = match self.connected() {
                    Ok(session) => session.list_indexes(&schema, &table).await,
                    Err(e) => Err(e),
                };
                match loaded {
                    Ok(indexes) => AppEvent::IndexesLoaded {
                        schema,
                        table,
                        indexes,
                    },
                    Err(error) => AppEvent::CatalogFailed {
                        request: None,
                        error,
                    },
                }
            }
            Action::ExecuteQuery { sql } => {
                let outcome = match self.connected() {
                    Ok(session) => session.execute(&sql).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(outcome) => AppEvent::QueryCompleted(outcome),
                    Err(e) => AppEvent::QueryFailed(e),
                }
            }
        };
        Some(event)
    }

    async fn load_children(&mut self, request: LoadRequest) -> AppEvent {
        let session = match self.connected() {
            Ok(session) => session,
            Err(error) => {
                return AppEvent::CatalogFailed {
                    request: Some(request),
                    error,
                };
            }
        };
        let result = match &request {
            LoadRequest::Tables { schema } => {
                session
                    .list_tables(schema)
                    .await
                    .map(|tables| AppEvent::TablesLoaded {
                        schema: schema.clone(),
                        tables,
                    })
            }
            LoadRequest::Columns { schema, table } => session
                .list_columns(schema, table)
                .await
                .map(|columns| AppEvent::ColumnsLoaded {
                    schema: schema.clone(),
                    table: table.clone(),
                    columns,
                }),
        };
        result.unwrap_or_else(|error| AppEvent::CatalogFailed {
            request: Some(request),
            error,
        })
    }

    fn connected(&self) -> Result<&D, DbError> {
        self.session.as_ref().ok_or(DbError::NotConnected)
    }

    /// Report a dead background connection, dropping the session
    pub fn poll_connection(&mut self) -> Option<AppEvent> {
        let message = self.session.as_mut()?.take_connection_error()?;
        tracing::warn!(error = %message, "Connection lost");
        self.session = None;
        Some(AppEvent::ConnectionLost(message))
    }

    /// Perform `action` and every follow-up action the app returns
    pub async fn run(&mut self, app: &mut App, action: Action) {
        let mut next = action;
        loop {
            if let Some(lost) = self.poll_connection() {
                app.handle_event(lost);
                if let Some(dropped) = not_performed(next) {
                    app.handle_event(dropped);
                }
                return;
            }
            match self.perform(next).await {
                Some(event) => next = app.handle_event(event),
                None => return,
            }
        }
    }
}

/// Failure event for an action abandoned because the session went away
fn not_performed(action: Action) -> Option<AppEvent> {
    let error = DbError::NotConnected;
    match action {
        Action::ExecuteQuery { .. } => Some(AppEvent::QueryFailed(error)),
        Action::LoadSchemas | Action::LoadIndexes { .. } => Some(AppEvent::CatalogFailed {
            request: None,
            error,
        }),
        Action::LoadChildren(request) => Some(AppEvent::CatalogFailed {
            request: Some(request),
            error,
        }),
        // Issued while the lost session was still open
        Action::Connect(_) => Some(AppEvent::ConnectFailed(DbError::AlreadyConnected)),
        Action::Disconnect | Action::None => None,
    }
}
