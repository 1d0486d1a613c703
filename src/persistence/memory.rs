//! Process-lifetime store

use std::sync::{Arc, RwLock};

use super::{StoreError, TableStore, id_for_index, index_for_id};
use crate::table::{TableId, TableState};

/// Snapshots held in a vector; the id is the position plus one.
///
/// Allocation happens under the write lock, so concurrent writers are
/// serialized and each sees a distinct length.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Vec<Arc<TableState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemoryStore {
    fn write(&self, table: TableState) -> Result<TableId, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".into()))?;
        let id = id_for_index(tables.len());
        tables.push(Arc::new(table));
        log::debug!("Stored table {} in memory", id);
        Ok(id)
    }

    fn read(&self, id: TableId) -> Result<Arc<TableState>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".into()))?;
        index_for_id(id)
            .and_then(|i| tables.get(i))
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Ball, Origin};
    use glam::DVec2;
    use std::collections::HashSet;
    use std::thread;

    fn table(x: f64) -> TableState {
        TableState::new(
            "game",
            "p1",
            "p2",
            Origin::Break,
            vec![Ball::still(0, DVec2::new(x, 500.0))],
        )
        .unwrap()
    }

    #[test]
    fn test_first_id_is_one() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.write(table(100.0)).unwrap(), TableId::new(1));
        assert_eq!(store.write(table(200.0)).unwrap(), TableId::new(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_read_returns_written_state() {
        let store = MemoryStore::new();
        let id = store.write(table(321.0)).unwrap();
        assert_eq!(*store.read(id).unwrap(), table(321.0));
    }

    #[test]
    fn test_unknown_ids_not_found() {
        let store = MemoryStore::new();
        store.write(table(100.0)).unwrap();
        for raw in [0, 2, 999] {
            let id = TableId::new(raw);
            assert_eq!(store.read(id), Err(StoreError::NotFound(id)));
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_len_survives_poisoned_lock() {
        let store = Arc::new(MemoryStore::new());
        store.write(table(100.0)).unwrap();
        let poisoner = Arc::clone(&store);
        let _ = thread::spawn(move || {
            let _guard = poisoner.tables.write().unwrap();
            panic!("writer crashed");
        })
        .join();

        assert!(store.tables.is_poisoned());
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.write(table(200.0)),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_concurrent_writes_get_distinct_ids() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..50)
                        .map(|i| store.write(table(100.0 + (t * 50 + i) as f64)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id), "duplicate id {id}");
                // Each id resolves to a complete snapshot
                assert_eq!(store.read(id).unwrap().len(), 1);
            }
        }
        assert_eq!(ids.len(), 400);
        assert_eq!(store.len(), 400);
    }
}
