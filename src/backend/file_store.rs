use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::storage::StateStore;

/// Stores each value as the file `<root>/<namespace>/<key>`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            AppError::PersistenceUnavailable(format!("create {}: {e}", root.display()))
        })?;
        Ok(Self { root })
    }

    fn entry_path(&self, namespace: &str, key: &str) -> Result<PathBuf, AppError> {
        for segment in [namespace, key] {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['/', '\\'])
            {
                return Err(AppError::PersistenceUnavailable(format!(
                    "invalid storage name '{segment}'"
                )));
            }
        }
        Ok(self.root.join(namespace).join(key))
    }
}

impl StateStore for FileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let path = self.entry_path(namespace, key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::PersistenceUnavailable(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), AppError> {
        let path = self.entry_path(namespace, key)?;
        let dir = self.root.join(namespace);
        let tmp = dir.join(format!(".{key}.tmp"));
        let io_err =
            |what: &str, e: std::io::Error| AppError::PersistenceUnavailable(format!("{what}: {e}"));

        fs::create_dir_all(&dir).map_err(|e| io_err("create namespace", e))?;

        // write-then-rename so a crash leaves either the old or the new value
        let mut file = fs::File::create(&tmp).map_err(|e| io_err("create temp file", e))?;
        file.write_all(value)
            .map_err(|e| io_err("write temp file", e))?;
        file.sync_all().map_err(|e| io_err("sync temp file", e))?;
        drop(file);

        fs::rename(&tmp, &path).map_err(|e| io_err("commit", e))?;
        Ok(())
    }
}
