//! Read-only query execution against SQLite.
//!
//! [`ReadOnlyDatabase`] is an explicitly constructed handle owned by the
//! process bootstrap and shared through an `Arc`. Every constructor puts
//! the connection in `query_only` mode. [`QueryExecutor`] runs statements
//! on the blocking pool and interrupts them when the request deadline
//! passes or the caller goes away.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bizquery_llm::{Deadline, Interrupted};
use bizquery_types::Row;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, OpenFlags};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::guard::{GuardedSql, is_select, is_single_statement};

#[derive(Error, Debug)]
pub enum ExecError {
    /// Defense in depth: the statement does not begin with `SELECT`.
    #[error("refusing to execute a non-SELECT statement")]
    NotSelect,

    /// Defense in depth: more than one statement in the text.
    #[error("refusing to execute multiple statements")]
    MultipleStatements,

    /// SQLite reports the prepared statement could write.
    #[error("statement is not read-only")]
    NotReadOnly,

    #[error("{0}")]
    Engine(#[from] rusqlite::Error),

    #[error("query {0}")]
    Interrupted(#[from] Interrupted),

    #[error("query worker failed: {0}")]
    Join(String),
}

impl ExecError {
    /// The message to show as the engine's error.
    pub fn engine_message(&self) -> String {
        match self {
            Self::Engine(rusqlite::Error::SqliteFailure(_, Some(msg))) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// A SQLite connection that cannot write.
pub struct ReadOnlyDatabase {
    conn: Mutex<Connection>,
    interrupt: InterruptHandle,
    /// Ticket of the statement currently holding the connection.
    running: Mutex<Option<u64>>,
    next_ticket: AtomicU64,
    path: Option<PathBuf>,
}

impl ReadOnlyDatabase {
    /// Open an existing database file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let mut db = Self::from_connection(conn)?;
        db.path = Some(path.to_path_buf());
        debug!(path = %path.display(), "opened read-only database");
        Ok(db)
    }

    /// Wrap an existing connection (e.g. an in-memory fixture). The
    /// connection is switched to `query_only` before it is usable.
    pub fn from_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.pragma_update(None, "query_only", true)?;
        let interrupt = conn.get_interrupt_handle();
        Ok(Self {
            conn: Mutex::new(conn),
            interrupt,
            running: Mutex::new(None),
            next_ticket: AtomicU64::new(1),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `sql` and collect every row, in store order.
    pub fn query(&self, sql: &str) -> Result<Vec<Row>, ExecError> {
        let conn = self.conn.lock();
        query_rows(&conn, sql)
    }

    fn query_ticketed(
        &self,
        ticket: u64,
        sql: &str,
        stop: &CancellationToken,
    ) -> Result<Vec<Row>, ExecError> {
        let conn = self.conn.lock();
        *self.running.lock() = Some(ticket);
        let result = if stop.is_cancelled() {
            Err(ExecError::Interrupted(Interrupted::Cancelled))
        } else {
            query_rows(&conn, sql)
        };
        *self.running.lock() = None;
        result
    }

    /// Interrupt the statement for `ticket` if it holds the connection.
    fn interrupt_ticket(&self, ticket: u64) {
        let running = self.running.lock();
        if *running == Some(ticket) {
            self.interrupt.interrupt();
        }
    }
}

impl std::fmt::Debug for ReadOnlyDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyDatabase")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn query_rows(conn: &Connection, sql: &str) -> Result<Vec<Row>, ExecError> {
    if !is_select(sql) {
        return Err(ExecError::NotSelect);
    }
    // `prepare` compiles only the first statement and ignores the tail.
    if !is_single_statement(sql) {
        return Err(ExecError::MultipleStatements);
    }
    let mut stmt = conn.prepare(sql)?;
    if !stmt.readonly() {
        return Err(ExecError::NotReadOnly);
    }
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut mapped = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            mapped.push(name.clone(), value_to_json(row.get_ref(idx)?));
        }
        out.push(mapped);
    }
    Ok(out)
}

/// Map a SQLite value to JSON. Non-finite reals become null; blobs become
/// arrays of byte values.
pub fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

/// Runs guarded statements against a shared [`ReadOnlyDatabase`].
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    db: Arc<ReadOnlyDatabase>,
}

impl QueryExecutor {
    pub fn new(db: Arc<ReadOnlyDatabase>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<ReadOnlyDatabase> {
        &self.db
    }

    /// Execute a guarded statement, bounded by `deadline`.
    pub async fn run(&self, sql: &GuardedSql, deadline: &Deadline) -> Result<Vec<Row>, ExecError> {
        self.run_sql(sql.as_str(), deadline).await
    }

    async fn run_sql(&self, sql: &str, deadline: &Deadline) -> Result<Vec<Row>, ExecError> {
        if !is_select(sql) {
            warn!("non-SELECT statement reached the executor; refusing");
            return Err(ExecError::NotSelect);
        }
        deadline.check()?;

        let ticket = self.db.next_ticket.fetch_add(1, Ordering::Relaxed);
        let stop = CancellationToken::new();
        let db = Arc::clone(&self.db);
        let owned = sql.to_string();
        let worker_stop = stop.clone();
        let mut task =
            tokio::task::spawn_blocking(move || db.query_ticketed(ticket, &owned, &worker_stop));

        tokio::select! {
            joined = &mut task => joined.map_err(|e| ExecError::Join(e.to_string()))?,
            reason = deadline.interrupted() => {
                stop.cancel();
                self.db.interrupt_ticket(ticket);
                warn!(%reason, "query interrupted");
                Err(ExecError::Interrupted(reason))
            }
        }
    }
}
