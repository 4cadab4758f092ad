//! Profile persistence.
//!
//! Storage hands out documents of unknown vintage and takes back normalized
//! ones; it never migrates anything itself. [`load_normalized`] is the one
//! place the two meet.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::core_log::{self, CoreLog};
use crate::profile::normalizer::{NormalizationReport, ProfileNormalizer, needs_normalization};
use crate::profile::stored::ProfileDocument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(String),
    InvalidId(String),
    Io(String),
    Json(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "no profile '{id}'"),
            StoreError::InvalidId(id) => write!(f, "'{id}' is not a valid profile id"),
            StoreError::Io(e) => write!(f, "io: {e}"),
            StoreError::Json(e) => write!(f, "json: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub trait ProfileStore {
    fn load(&self, id: &str) -> Result<ProfileDocument, StoreError>;
    fn save(&self, id: &str, doc: &ProfileDocument) -> Result<(), StoreError>;
    /// Ids of every stored profile, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// One `<id>.json` file per profile.
pub struct FileProfileStore {
    dir: PathBuf,
    logger: Arc<dyn CoreLog>,
}

impl FileProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            logger: core_log::noop(),
        }
    }

    /// Store under `<data dir>/<app_id>/profiles`.
    pub fn open_default(app_id: &str) -> Result<Self, String> {
        let base = directories::BaseDirs::new().ok_or("Could not find user data directory")?;
        let dir = base.data_dir().join(app_id).join("profiles");
        fs::create_dir_all(&dir).map_err(|e| format!("create {}: {}", dir.display(), e))?;
        Ok(Self::new(dir))
    }

    pub fn with_logger(mut self, logger: &Arc<dyn CoreLog>) -> Self {
        self.logger = Arc::clone(logger);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.trim().is_empty()
            && !id.starts_with('.')
            && !id.contains(['/', '\\', ':'])
            && !id.chars().any(char::is_control);
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl ProfileStore for FileProfileStore {
    fn load(&self, id: &str) -> Result<ProfileDocument, StoreError> {
        let path = self.path_for(id)?;
        if !path.try_exists().unwrap_or(false) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| StoreError::Io(format!("read {}: {}", path.display(), e)))?;
        let doc = ProfileDocument::from_json(&content)
            .map_err(|e| StoreError::Json(format!("{}: {}", path.display(), e)))?;
        self.logger
            .debug(&format!("[store] loaded {}", path.display()));
        Ok(doc)
    }

    fn save(&self, id: &str, doc: &ProfileDocument) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::Io(format!("create {}: {}", self.dir.display(), e)))?;
        let json = doc.to_json().map_err(StoreError::Json)?;

        // Write next to the target, then swap it in.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| StoreError::Io(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path).map_err(|e| {
            StoreError::Io(format!("rename {} -> {}: {}", tmp.display(), path.display(), e))
        })?;
        self.logger.info(&format!("[store] wrote {}", path.display()));
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StoreError::Io(format!("read_dir {}: {}", self.dir.display(), e)))?;

        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Load `id`, normalize it in place, and write it back if anything needed it.
///
/// Returns the report when a rewrite happened.
pub fn load_normalized<S: ProfileStore + ?Sized>(
    store: &S,
    id: &str,
    normalizer: &ProfileNormalizer,
) -> Result<(ProfileDocument, Option<NormalizationReport>), StoreError> {
    let mut doc = store.load(id)?;
    if !needs_normalization(&doc) {
        return Ok((doc, None));
    }
    let report = normalizer.normalize_in_place(&mut doc);
    store.save(id, &doc)?;
    Ok((doc, Some(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_path_like_ids() {
        let store = FileProfileStore::new("/tmp/unused");
        for bad in ["", "  ", "../x", "a/b", "a\\b", ".hidden", "c:x"] {
            assert_eq!(
                store.path_for(bad),
                Err(StoreError::InvalidId(bad.to_string())),
                "{bad}"
            );
        }
        assert!(store.path_for("Main Build").is_ok());
    }

    #[test]
    fn save_load_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path().join("profiles"));
        assert_eq!(store.list().unwrap(), Vec::<String>::new());

        let doc = ProfileDocument::from_json(r#"{"name": "B", "builds": {}}"#).unwrap();
        store.save("beta", &doc).unwrap();
        store.save("alpha", &doc).unwrap();
        assert_eq!(store.list().unwrap(), vec!["alpha", "beta"]);
        assert_eq!(store.load("beta").unwrap(), doc);
        assert_eq!(
            store.load("gamma"),
            Err(StoreError::NotFound("gamma".into()))
        );
    }

    #[test]
    fn load_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        let store = FileProfileStore::new(dir.path());
        assert!(matches!(store.load("broken"), Err(StoreError::Json(_))));
    }
}
