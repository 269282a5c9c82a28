//! The shared handle every process opens directly onto `minion.db`.

use crate::content::ContentRoot;
use crate::error::StoreResult;
use crate::schema;
use legion_core::{Clock, IdGen, KernelError, UuidIdGen};
use legion_flows::FlowRegistry;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum busy-retry attempts before a write surfaces as
/// `KernelError::Conflict` rather than looping forever against another
/// process's `BEGIN IMMEDIATE` hold.
const MAX_BUSY_RETRIES: u32 = 3;

/// One connection per process, held behind the kernel's transactional
/// discipline rather than an internal mutex: SQLite's own locking (WAL +
/// `BEGIN IMMEDIATE`) is what makes concurrent processes safe, not a
/// Rust-level lock, since other OS processes hold their own connections.
pub struct Store {
    pub(crate) conn: Connection,
    /// `None` for in-memory stores, which have nothing to reopen after a
    /// corruption signal.
    db_path: Option<PathBuf>,
    pub(crate) content: ContentRoot,
    pub(crate) flows: FlowRegistry,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGen>,
}

impl Store {
    /// Open (creating if absent) the datastore at `db_path`, with
    /// referenced content files rooted at `work_dir`, and flow documents
    /// loaded from `docs_dir/flows` (missing directory is not an error).
    pub fn open(
        db_path: &Path,
        work_dir: &Path,
        docs_dir: &Path,
        clock: Arc<dyn Clock>,
    ) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        schema::apply(&conn)?;
        let mut flows = FlowRegistry::new();
        flows.load_dir(&docs_dir.join("flows"))?;
        Ok(Self {
            conn,
            db_path: Some(db_path.to_path_buf()),
            content: ContentRoot::new(work_dir),
            flows,
            clock,
            ids: Arc::new(UuidIdGen),
        })
    }

    /// An in-memory store for tests: no filesystem content, built-in
    /// `_base` flow only.
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::apply(&conn)?;
        Ok(Self {
            conn,
            db_path: None,
            content: ContentRoot::new(std::env::temp_dir().join("legion-test-content")),
            flows: FlowRegistry::new(),
            clock,
            ids: Arc::new(UuidIdGen),
        })
    }

    /// Same as [`Store::open_in_memory`] but with an injected id
    /// generator, for tests that assert on id values.
    pub fn open_in_memory_with_ids(clock: Arc<dyn Clock>, ids: Arc<dyn IdGen>) -> StoreResult<Self> {
        let mut store = Self::open_in_memory(clock)?;
        store.ids = ids;
        Ok(store)
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub(crate) fn next_id(&self, prefix: &str) -> String {
        self.ids.next_id(prefix)
    }

    pub fn flows(&self) -> &FlowRegistry {
        &self.flows
    }

    pub fn content(&self) -> &ContentRoot {
        &self.content
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction, retrying a busy
    /// database up to `MAX_BUSY_RETRIES` times with linear backoff.
    /// Exhausting the retries surfaces `KernelError::Conflict`, not the
    /// raw sqlite error, so callers see a precondition failure they can
    /// act on (retry the whole command) rather than an opaque I/O error.
    /// `SQLITE_CORRUPT`/`SQLITE_NOTADB` get one reopen attempt before
    /// `KernelError::Corruption` is declared fatal (§4.A).
    pub(crate) fn with_write_txn<T>(
        &mut self,
        f: impl Fn(&rusqlite::Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut attempt = 0;
        let mut reopened = false;
        loop {
            let txn = self
                .conn
                .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            match f(&txn) {
                Ok(v) => {
                    txn.commit()?;
                    tracing::debug!(attempt, "write transaction committed");
                    return Ok(v);
                }
                Err(crate::error::StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
                    if e.code == rusqlite::ErrorCode::DatabaseBusy =>
                {
                    drop(txn);
                    if attempt >= MAX_BUSY_RETRIES {
                        tracing::warn!(attempt, "busy retries exhausted, surfacing conflict");
                        return Err(crate::error::StoreError::Kernel(KernelError::Conflict {
                            retries: attempt,
                        }));
                    }
                    attempt += 1;
                    tracing::debug!(attempt, "database busy, retrying");
                    std::thread::sleep(std::time::Duration::from_millis(10 * attempt as u64));
                    continue;
                }
                Err(crate::error::StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
                    if is_corruption(e.code) && !reopened =>
                {
                    drop(txn);
                    reopened = true;
                    tracing::warn!("corruption signal from sqlite, attempting one reopen");
                    match self.reopen() {
                        Ok(()) => continue,
                        Err(err) => {
                            tracing::error!(error = %err, "failed to reopen datastore after corruption signal");
                            return Err(crate::error::StoreError::Kernel(KernelError::Corruption(
                                err.to_string(),
                            )));
                        }
                    }
                }
                Err(crate::error::StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
                    if is_corruption(e.code) =>
                {
                    drop(txn);
                    tracing::error!("corruption persists after reopen, declaring fatal");
                    return Err(crate::error::StoreError::Kernel(KernelError::Corruption(
                        format!("{e:?} persisted across reopen"),
                    )));
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "write transaction failed");
                    return Err(e);
                }
            }
        }
    }

    /// Closes and reopens `conn` against the same `db_path`, reapplying
    /// schema migrations. A no-op error for in-memory stores: there is
    /// nothing on disk to recover by reopening.
    fn reopen(&mut self) -> StoreResult<()> {
        let db_path = self
            .db_path
            .clone()
            .ok_or_else(|| crate::error::StoreError::Kernel(KernelError::Corruption(
                "in-memory datastore has no backing file to reopen".to_string(),
            )))?;
        self.conn = Connection::open(&db_path)?;
        schema::apply(&self.conn)?;
        Ok(())
    }
}

fn is_corruption(code: rusqlite::ErrorCode) -> bool {
    matches!(
        code,
        rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase
    )
}
