//! Durable JSON-lines store
//!
//! One versioned envelope per line: `{version, id, digest, table}`, where
//! `digest` is the BLAKE3 hash of the exact `table` bytes on disk. Opening
//! replays the log. A torn or corrupt last line is cut off; a damaged line
//! with records after it refuses to open, since ids are line positions.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::{StoreError, TableStore, id_for_index, index_for_id};
use crate::table::{TableId, TableState};

/// Current envelope format
pub const RECORD_VERSION: u32 = 1;

#[derive(Serialize)]
struct RecordRef<'a> {
    version: u32,
    id: TableId,
    digest: String,
    table: &'a RawValue,
}

#[derive(Deserialize)]
struct Record<'a> {
    version: u32,
    id: TableId,
    digest: String,
    #[serde(borrow)]
    table: &'a RawValue,
}

fn digest(table_json: &str) -> String {
    blake3::hash(table_json.as_bytes()).to_hex().to_string()
}

/// One log line for `table`, newline included
fn encode_line(id: TableId, table: &TableState) -> Result<Vec<u8>, serde_json::Error> {
    let table_json = RawValue::from_string(serde_json::to_string(table)?)?;
    let record = RecordRef {
        version: RECORD_VERSION,
        id,
        digest: digest(table_json.get()),
        table: &table_json,
    };
    let mut line = serde_json::to_vec(&record)?;
    line.push(b'\n');
    Ok(line)
}

/// Parse and verify one log line
fn decode_line(line: &[u8], expected: TableId) -> Result<TableState, String> {
    let record: Record<'_> = serde_json::from_slice(line).map_err(|e| e.to_string())?;
    if record.version != RECORD_VERSION {
        return Err(format!("unsupported record version {}", record.version));
    }
    if record.id != expected {
        return Err(format!("expected id {}, found {}", expected, record.id));
    }
    if digest(record.table.get()) != record.digest {
        return Err(format!("digest mismatch for id {}", record.id));
    }
    serde_json::from_str(record.table.get()).map_err(|e| e.to_string())
}

/// Append target for the log
pub trait LogWriter: Write + Send + Sync {
    /// Flush appended bytes to stable storage
    fn sync(&mut self) -> io::Result<()>;
    /// Cut the log back to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LogWriter for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

struct Inner<W> {
    file: W,
    /// Bytes of verified records on disk
    len: u64,
    tables: Vec<Arc<TableState>>,
}

/// Append-only store backed by a file
pub struct FileStore<W: LogWriter = File> {
    path: PathBuf,
    inner: RwLock<Inner<W>>,
}

fn io_error(context: &str, path: &Path, err: io::Error) -> StoreError {
    StoreError::Unavailable(format!("{context} {}: {err}", path.display()))
}

/// Verified records and the byte length they cover
fn replay(path: &Path, content: &[u8]) -> Result<(Vec<Arc<TableState>>, usize), StoreError> {
    let mut tables = Vec::new();
    let mut valid_len = 0usize;
    for line in content.split_inclusive(|b| *b == b'\n') {
        let reason = if line.last() != Some(&b'\n') {
            "torn record".to_string()
        } else {
            match decode_line(&line[..line.len() - 1], id_for_index(tables.len())) {
                Ok(table) => {
                    tables.push(Arc::new(table));
                    valid_len += line.len();
                    continue;
                }
                Err(reason) => reason,
            }
        };

        let rest = &content[valid_len + line.len()..];
        if rest.iter().all(u8::is_ascii_whitespace) {
            log::warn!("Bad last record in {}: {}", path.display(), reason);
            break;
        }
        return Err(StoreError::Unavailable(format!(
            "record {} in {} is damaged ({}) and later records follow",
            id_for_index(tables.len()),
            path.display(),
            reason
        )));
    }
    Ok((tables, valid_len))
}

impl FileStore<File> {
    /// Open (or create) the log at `path` and load every verified record
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| io_error("opening", &path, e))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| io_error("reading", &path, e))?;

        let (tables, valid_len) = replay(&path, &content)?;
        if valid_len < content.len() {
            log::warn!(
                "Truncating {} from {} to {} bytes",
                path.display(),
                content.len(),
                valid_len
            );
            file.set_len(valid_len as u64)
                .map_err(|e| io_error("truncating", &path, e))?;
        }

        log::info!("Opened table store {} ({} tables)", path.display(), tables.len());

        Ok(Self {
            path,
            inner: RwLock::new(Inner {
                file,
                len: valid_len as u64,
                tables,
            }),
        })
    }
}

impl<W: LogWriter> FileStore<W> {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<W: LogWriter> TableStore for FileStore<W> {
    fn write(&self, table: TableState) -> Result<TableId, StoreError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".into()))?;
        let inner = &mut *guard;

        let id = id_for_index(inner.tables.len());
        let line = encode_line(id, &table).map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if let Err(err) = inner.file.write_all(&line).and_then(|_| inner.file.sync()) {
            // Drop whatever part of the record made it to disk
            if let Err(rollback) = inner.file.truncate(inner.len) {
                log::error!("Rollback of {} failed: {}", self.path.display(), rollback);
            }
            return Err(io_error("appending to", &self.path, err));
        }

        inner.len += line.len() as u64;
        inner.tables.push(Arc::new(table));
        log::debug!("Stored table {} in {}", id, self.path.display());
        Ok(id)
    }

    fn read(&self, id: TableId) -> Result<Arc<TableState>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".into()))?;
        index_for_id(id)
            .and_then(|i| inner.tables.get(i))
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .tables
            .len()
    }
}
