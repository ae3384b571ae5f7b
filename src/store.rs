//! Where serialized games live between requests.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use parking_lot::RwLock;
use crate::error::CoupError;

/// An opaque key value store keyed by game id.
pub trait Store: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<String>, CoupError>;

    fn save(&self, id: &str, data: &str) -> Result<(), CoupError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    games: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load(&self, id: &str) -> Result<Option<String>, CoupError> {
        Ok(self.games.read().get(id).cloned())
    }

    fn save(&self, id: &str, data: &str) -> Result<(), CoupError> {
        self.games.write().insert(id.to_string(), data.to_string());
        Ok(())
    }
}

/// One JSON file per game.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self, CoupError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|err| CoupError::Storage(format!("creating {}: {err}", dir.display())))?;
        Ok(Self { dir })
    }

    fn path(&self, id: &str) -> Result<PathBuf, CoupError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoupError::NotFound(format!("no game {id:?}")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl Store for FileStore {
    fn load(&self, id: &str) -> Result<Option<String>, CoupError> {
        let path = self.path(id)?;
        match std::fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CoupError::Storage(format!("reading {}: {err}", path.display()))),
        }
    }

    fn save(&self, id: &str, data: &str) -> Result<(), CoupError> {
        let path = self.path(id)?;
        // write aside then rename, a reader never sees half a game
        let partial = path.with_extension("json.tmp");
        std::fs::write(&partial, data)
            .and_then(|_| std::fs::rename(&partial, &path))
            .map_err(|err| CoupError::Storage(format!("writing {}: {err}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CoupError;
    use crate::store::{FileStore, MemoryStore, Store};

    #[test]
    fn memory() {
        let store = MemoryStore::new();
        assert_eq!(store.load("abc").unwrap(), None);
        store.save("abc", "{}").unwrap();
        assert_eq!(store.load("abc").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn files() {
        let dir = std::env::temp_dir().join(format!("coup-store-{}", std::process::id()));
        let store = FileStore::open(&dir).unwrap();

        assert_eq!(store.load("abc").unwrap(), None);
        store.save("abc", "{\"a\":1}").unwrap();
        store.save("abc", "{\"a\":2}").unwrap();
        assert_eq!(store.load("abc").unwrap().as_deref(), Some("{\"a\":2}"));

        assert!(matches!(store.load("../etc"), Err(CoupError::NotFound(_))));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
