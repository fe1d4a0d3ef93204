use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Durable home for the raw token string: one file at a fixed path, the
/// moral equivalent of a browser's fixed localStorage key.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved token, if any. Whitespace is trimmed so a hand-edited file with
    /// a trailing newline still loads.
    pub fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token.to_string()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)
    }

    /// Clearing an already-absent token is not an error.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_store() -> TokenStore {
        let path = std::env::temp_dir()
            .join(format!("bazario-client-{}", Uuid::new_v4()))
            .join("token");
        TokenStore::new(path)
    }

    #[test]
    fn load_before_any_save_is_none() {
        let store = scratch_store();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_load_clear_round_trip() {
        let store = scratch_store();
        store.save("abc.def.ghi").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def.ghi"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // second clear is a no-op
        store.clear().unwrap();
    }

    #[test]
    fn load_trims_trailing_newline() {
        let store = scratch_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "abc.def.ghi\n").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn blank_file_counts_as_absent() {
        let store = scratch_store();
        store.save("   ").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
