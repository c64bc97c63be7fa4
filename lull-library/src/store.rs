//! Persisted mix collection
//!
//! Saved mixes live in a single named slot of a key-value blob store as a
//! JSON array, in save order. The slot is read once when the store opens
//! and rewritten in full on every change.

use crate::mix::SoundMix;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the mix store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value text storage
pub trait BlobStore: Send {
    /// `Ok(None)` when the slot has never been written
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
}

/// One `<key>.json` file per slot under a directory
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        // Write then rename so a crash never leaves a half-written slot
        let path = self.path(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)
    }
}

/// In-memory slots
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    slots: HashMap<String, String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.slots.insert(key.to_string(), value.to_string());
        self
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Serialize a collection as a pretty JSON array
pub fn to_json(mixes: &[SoundMix]) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(mixes)?)
}

pub fn from_json(json: &str) -> Result<Vec<SoundMix>, StoreError> {
    Ok(serde_json::from_str(json)?)
}

/// Ordered saved mixes backed by a blob slot.
///
/// Every mutation writes the whole collection. A failed write rolls the
/// in-memory change back so memory and storage never disagree.
pub struct MixStore {
    backend: Box<dyn BlobStore>,
    mixes: Vec<SoundMix>,
    load_error: Option<StoreError>,
}

impl MixStore {
    /// Slot holding the collection
    pub const SLOT: &'static str = "soundMixes";

    /// Read the slot; missing or malformed data yields an empty collection
    pub fn open(backend: Box<dyn BlobStore>) -> Self {
        let (mixes, load_error) = match Self::read(backend.as_ref()) {
            Ok(mixes) => {
                debug!("Loaded {} saved mixes", mixes.len());
                (mixes, None)
            }
            Err(e) => {
                warn!("Failed to load saved mixes: {}", e);
                (Vec::new(), Some(e))
            }
        };

        Self {
            backend,
            mixes,
            load_error,
        }
    }

    fn read(backend: &dyn BlobStore) -> Result<Vec<SoundMix>, StoreError> {
        match backend.get(Self::SLOT)? {
            Some(json) if !json.trim().is_empty() => from_json(&json),
            _ => Ok(Vec::new()),
        }
    }

    /// Error hit while opening, if any
    pub fn load_error(&self) -> Option<&StoreError> {
        self.load_error.as_ref()
    }

    pub fn mixes(&self) -> &[SoundMix] {
        &self.mixes
    }

    pub fn len(&self) -> usize {
        self.mixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mixes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SoundMix> {
        self.mixes.iter().find(|m| m.id == id)
    }

    /// First mix with exactly this name
    pub fn find_by_name(&self, name: &str) -> Option<&SoundMix> {
        self.mixes.iter().find(|m| m.name == name)
    }

    /// Fresh id derived from a millisecond timestamp
    pub fn next_id(&self, now_ms: u64) -> String {
        let base = format!("mix-{}", now_ms);
        if self.get(&base).is_none() {
            return base;
        }
        let mut n = 1;
        loop {
            let id = format!("{}-{}", base, n);
            if self.get(&id).is_none() {
                return id;
            }
            n += 1;
        }
    }

    pub fn append(&mut self, mix: SoundMix) -> Result<(), StoreError> {
        self.mixes.push(mix);
        if let Err(e) = self.persist() {
            self.mixes.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Remove by id; `Ok(None)` if absent
    pub fn remove(&mut self, id: &str) -> Result<Option<SoundMix>, StoreError> {
        let Some(index) = self.mixes.iter().position(|m| m.id == id) else {
            return Ok(None);
        };
        let removed = self.mixes.remove(index);
        if let Err(e) = self.persist() {
            self.mixes.insert(index, removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    /// Re-add a removed mix at the end of the collection
    pub fn restore(&mut self, mix: SoundMix) -> Result<(), StoreError> {
        self.append(mix)
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let json = to_json(&self.mixes)?;
        self.backend.set(Self::SLOT, &json)?;
        debug!("Persisted {} mixes", self.mixes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mix::{ActiveSounds, CategoryVolumes};
    use tempfile::tempdir;

    fn mix(id: &str, name: &str) -> SoundMix {
        let mut active_sound = ActiveSounds::new();
        active_sound.insert("Rain".to_string(), true);
        SoundMix {
            id: id.to_string(),
            name: name.to_string(),
            active_sound,
            volumes: CategoryVolumes::new(80, 0, 0),
            created_at: 1_700_000_000_123,
        }
    }

    struct ReadOnly;

    impl BlobStore for ReadOnly {
        fn get(&self, _key: &str) -> io::Result<Option<String>> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[test]
    fn test_json_round_trip() {
        let mixes = vec![mix("mix-1", "Focus"), mix("mix-2", "Sleep")];
        let json = to_json(&mixes).unwrap();
        assert_eq!(from_json(&json).unwrap(), mixes);
    }

    #[test]
    fn test_missing_slot_is_empty() {
        let store = MixStore::open(Box::new(MemoryBlobStore::new()));
        assert!(store.is_empty());
        assert!(store.load_error().is_none());
    }

    #[test]
    fn test_malformed_slot_is_empty_with_error() {
        let backend = MemoryBlobStore::new().with(MixStore::SLOT, "{not json");
        let store = MixStore::open(Box::new(backend));
        assert!(store.is_empty());
        assert!(matches!(store.load_error(), Some(StoreError::Serialize(_))));
    }

    #[test]
    fn test_remove_and_restore_goes_to_end() {
        let mut store = MixStore::open(Box::new(MemoryBlobStore::new()));
        store.append(mix("a", "A")).unwrap();
        store.append(mix("b", "B")).unwrap();
        store.append(mix("c", "C")).unwrap();

        let removed = store.remove("a").unwrap().unwrap();
        assert_eq!(store.len(), 2);
        store.restore(removed).unwrap();

        let ids: Vec<_> = store.mixes().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let mut store = MixStore::open(Box::new(MemoryBlobStore::new()));
        assert!(store.remove("nope").unwrap().is_none());
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let mut store = MixStore::open(Box::new(ReadOnly));
        assert!(matches!(store.append(mix("a", "A")), Err(StoreError::Io(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_next_id_avoids_collisions() {
        let mut store = MixStore::open(Box::new(MemoryBlobStore::new()));
        assert_eq!(store.next_id(42), "mix-42");
        store.append(mix("mix-42", "A")).unwrap();
        assert_eq!(store.next_id(42), "mix-42-1");
        store.append(mix("mix-42-1", "B")).unwrap();
        assert_eq!(store.next_id(42), "mix-42-2");
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempdir().unwrap();
        {
            let mut store = MixStore::open(Box::new(FileBlobStore::new(dir.path())));
            store.append(mix("mix-1", "Focus")).unwrap();
        }

        assert!(dir.path().join("soundMixes.json").exists());
        assert!(!dir.path().join("soundMixes.json.tmp").exists());

        let store = MixStore::open(Box::new(FileBlobStore::new(dir.path())));
        assert_eq!(store.mixes(), &[mix("mix-1", "Focus")]);
        assert_eq!(store.find_by_name("Focus").unwrap().id, "mix-1");
    }

    #[test]
    fn test_file_store_missing_dir_reads_empty() {
        let dir = tempdir().unwrap();
        let backend = FileBlobStore::new(dir.path().join("absent"));
        assert!(backend.get(MixStore::SLOT).unwrap().is_none());
    }
}
