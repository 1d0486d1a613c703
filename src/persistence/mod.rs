//! Append-only table store
//!
//! Features:
//! - Write-once snapshots keyed by monotonically increasing `TableId`s
//! - No update or delete: every state of every game stays readable
//! - In-memory backend for tests and single-process play
//! - JSON-lines backend with BLAKE3 integrity digests that survives restarts

pub mod file;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use crate::table::{TableId, TableState};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Store failures
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No snapshot was ever written under this id
    NotFound(TableId),
    /// Backing storage failed (I/O, poisoned lock, corrupt record)
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "table {id} not found"),
            Self::Unavailable(reason) => write!(f, "table store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence contract the session layer relies on.
///
/// `write` either stores the whole snapshot and hands back a fresh id, or
/// fails leaving nothing behind. Two writes never receive the same id, and a
/// read of an id observes the complete snapshot written under it.
pub trait TableStore: Send + Sync {
    /// Store a snapshot under a newly allocated id
    fn write(&self, table: TableState) -> Result<TableId, StoreError>;

    /// Fetch the snapshot stored under `id`
    fn read(&self, id: TableId) -> Result<Arc<TableState>, StoreError>;

    /// Number of snapshots stored so far
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ids are 1-based positions in the append log
pub(crate) fn id_for_index(index: usize) -> TableId {
    TableId::new(index as u64 + 1)
}

/// Inverse of [`id_for_index`]; `None` for id 0
pub(crate) fn index_for_id(id: TableId) -> Option<usize> {
    id.get().checked_sub(1).and_then(|i| usize::try_from(i).ok())
}
