use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::AppError;
use crate::storage::StateStore;

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<FxHashMap<(String, String), Vec<u8>>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// While set, every `get` and `put` fails with `PersistenceUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `put` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::PersistenceUnavailable(
                "memory store marked unavailable".into(),
            ));
        }
        Ok(())
    }
}

impl StateStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), AppError> {
        self.check()?;
        self.entries
            .lock()
            .insert((namespace.to_string(), key.to_string()), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn counts_only_successful_puts() {
        let store = MemoryStore::default();
        store.put("ns", "key", &[1]).unwrap();

        store.set_unavailable(true);
        assert!(matches!(
            store.put("ns", "key", &[2]),
            Err(AppError::PersistenceUnavailable(_))
        ));
        store.set_unavailable(false);

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get("ns", "key").unwrap(), Some(vec![1]));
    }

    #[test]
    fn concurrent_puts_are_all_counted() {
        let store = Arc::new(MemoryStore::default());
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..250 {
                        store.put("ns", "key", &[i]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.write_count(), 1000);
    }
}
