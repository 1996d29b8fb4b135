//! Filesystem content repository.
//!
//! Content lives under `<root>/<first two hex digits>/<remaining hex>/content`.
//! Files are written to a temporary name in the target directory and renamed
//! into place, so a reader never sees a partially written item. Reads
//! re-hash the bytes and fail if they no longer match their digest.

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use keel_core::error::{ContentError, Result};
use keel_core::traits::{ContentHandle, ContentRepository};
use keel_core::types::{ContentHash, ReferenceToken};

const CONTENT_FILE: &str = "content";

/// Content repository backed by a directory tree.
///
/// The reference table is held in memory. Its mutex also serializes file
/// creation and removal, so reference changes and reclamation are
/// linearizable.
#[derive(Debug)]
pub struct FileSystemContentRepository {
    root: PathBuf,
    references: Mutex<HashMap<ContentHash, BTreeSet<ReferenceToken>>>,
}

impl FileSystemContentRepository {
    /// Open a repository rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        info!(path = %root.display(), "Opened content repository");

        Ok(Self {
            root,
            references: Mutex::new(HashMap::new()),
        })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the content for `hash`.
    fn content_dir(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        let (prefix, rest) = hex.split_at(2);
        self.root.join(prefix).join(rest)
    }

    /// Path of the file holding the content for `hash`.
    pub fn content_path(&self, hash: &ContentHash) -> PathBuf {
        self.content_dir(hash).join(CONTENT_FILE)
    }

    /// Every digest with a content file on disk.
    pub fn stored_hashes(&self) -> Result<Vec<ContentHash>> {
        let mut hashes = Vec::new();
        for prefix in fs::read_dir(&self.root)? {
            let prefix = prefix?;
            if !prefix.file_type()?.is_dir() {
                continue;
            }
            for rest in fs::read_dir(prefix.path())? {
                let rest = rest?;
                let hex = format!(
                    "{}{}",
                    prefix.file_name().to_string_lossy(),
                    rest.file_name().to_string_lossy()
                );
                match hex.parse::<ContentHash>() {
                    Ok(hash) if rest.path().join(CONTENT_FILE).is_file() => hashes.push(hash),
                    Ok(_) => {}
                    Err(_) => debug!(path = %rest.path().display(), "Skipping foreign entry"),
                }
            }
        }
        Ok(hashes)
    }

    fn write_atomically(&self, hash: &ContentHash, data: &[u8]) -> io::Result<()> {
        let dir = self.content_dir(hash);
        fs::create_dir_all(&dir)?;

        let temp = dir.join(format!(".{}.{}.tmp", CONTENT_FILE, Uuid::new_v4()));
        let written = File::create(&temp).and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        fs::rename(&temp, dir.join(CONTENT_FILE))
    }

    fn reclaim(&self, hash: &ContentHash) -> io::Result<()> {
        let dir = self.content_dir(hash);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        // drop the prefix directory once empty; failure just leaves it behind
        if let Some(prefix) = dir.parent() {
            let _ = fs::remove_dir(prefix);
        }
        debug!(hash = %hash, "Reclaimed content");
        Ok(())
    }
}

impl ContentRepository for FileSystemContentRepository {
    fn add_content(&self, stream: &mut dyn Read) -> Result<ContentHash> {
        let (hash, data) = ContentHash::of_reader(stream)
            .map_err(|e| ContentError::Unreadable(e.to_string()))?;

        let _guard = self.references.lock();
        if self.content_path(&hash).is_file() {
            debug!(hash = %hash, "Content already stored");
            return Ok(hash);
        }

        self.write_atomically(&hash, &data)?;
        info!(hash = %hash, size = data.len(), "Stored content");
        Ok(hash)
    }

    fn get_content(&self, hash: &ContentHash) -> Result<Option<ContentHandle>> {
        let path = self.content_path(hash);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ContentError::Unreadable(format!("{}: {}", path.display(), e)).into())
            }
        };

        let actual = ContentHash::of(&data);
        if actual != *hash {
            warn!(expected = %hash, actual = %actual, "Stored content failed integrity check");
            return Err(ContentError::IntegrityError {
                expected: *hash,
                actual,
            }
            .into());
        }

        Ok(Some(ContentHandle::new(*hash, Arc::new(data))))
    }

    fn has_content(&self, hash: &ContentHash) -> bool {
        self.content_path(hash).is_file()
    }

    fn sync_content(&self, hash: &ContentHash) -> bool {
        match File::open(self.content_path(hash)).and_then(|file| file.sync_all()) {
            Ok(()) => true,
            Err(e) => {
                debug!(hash = %hash, error = %e, "Content not available for sync");
                false
            }
        }
    }

    fn add_content_reference(&self, hash: &ContentHash, token: &ReferenceToken) -> Result<()> {
        let mut references = self.references.lock();
        if !self.content_path(hash).is_file() {
            return Err(ContentError::NotFound(*hash).into());
        }
        if references.entry(*hash).or_default().insert(token.clone()) {
            debug!(hash = %hash, token = %token, "Added content reference");
        }
        Ok(())
    }

    fn remove_content(&self, hash: &ContentHash, token: &ReferenceToken) -> Result<()> {
        let mut references = self.references.lock();
        let held = references
            .get_mut(hash)
            .map(|tokens| tokens.remove(token))
            .unwrap_or(false);
        if !held {
            return Err(ContentError::ReferenceUnderflow {
                hash: *hash,
                token: token.clone(),
            }
            .into());
        }
        debug!(hash = %hash, token = %token, "Removed content reference");

        if references.get(hash).is_some_and(BTreeSet::is_empty) {
            references.remove(hash);
            self.reclaim(hash)?;
        }
        Ok(())
    }

    fn clean_obsolete_content(&self) -> Result<Vec<ContentHash>> {
        let references = self.references.lock();
        let mut removed = Vec::new();
        for hash in self.stored_hashes()? {
            if references.contains_key(&hash) {
                continue;
            }
            self.reclaim(&hash)?;
            removed.push(hash);
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "Removed obsolete content");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::error::Error;
    use std::thread;
    use tempfile::TempDir;

    fn repository() -> (TempDir, FileSystemContentRepository) {
        let dir = TempDir::new().unwrap();
        let repository = FileSystemContentRepository::new(dir.path().join("content")).unwrap();
        (dir, repository)
    }

    #[test]
    fn test_layout_and_idempotent_add() {
        let (_dir, repository) = repository();
        let first = repository.add_content(&mut &b"hello"[..]).unwrap();
        let second = repository.add_content(&mut &b"hello"[..]).unwrap();
        assert_eq!(first, second);

        let hex = first.to_hex();
        let expected = repository
            .root()
            .join(&hex[..2])
            .join(&hex[2..])
            .join("content");
        assert_eq!(repository.content_path(&first), expected);
        assert_eq!(fs::read(expected).unwrap(), b"hello");

        let entries = fs::read_dir(repository.content_path(&first).parent().unwrap())
            .unwrap()
            .count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_get_content_detects_tampering() {
        let (_dir, repository) = repository();
        let hash = repository.add_content(&mut &b"original"[..]).unwrap();
        fs::write(repository.content_path(&hash), b"tampered").unwrap();

        let err = repository.get_content(&hash).unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::IntegrityError { expected, .. }) if expected == hash
        ));
    }

    #[test]
    fn test_sync_content() {
        let (_dir, repository) = repository();
        let hash = repository.add_content(&mut &b"durable"[..]).unwrap();
        assert!(repository.sync_content(&hash));
        assert!(!repository.sync_content(&ContentHash::of(b"absent")));
    }

    #[test]
    fn test_reference_lifecycle_reclaims_files() {
        let (_dir, repository) = repository();
        let hash = repository.add_content(&mut &b"app"[..]).unwrap();
        let token = ReferenceToken::new("deployment=app.war");

        repository.add_content_reference(&hash, &token).unwrap();
        assert!(repository.clean_obsolete_content().unwrap().is_empty());

        repository.remove_content(&hash, &token).unwrap();
        assert!(!repository.has_content(&hash));
        assert!(!repository.content_path(&hash).parent().unwrap().exists());

        let err = repository.remove_content(&hash, &token).unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::ReferenceUnderflow { .. })
        ));
    }

    #[test]
    fn test_clean_obsolete_content() {
        let (_dir, repository) = repository();
        let orphan = repository.add_content(&mut &b"orphan"[..]).unwrap();
        let used = repository.add_content(&mut &b"used"[..]).unwrap();
        repository
            .add_content_reference(&used, &ReferenceToken::new("deployment=used"))
            .unwrap();

        assert_eq!(repository.clean_obsolete_content().unwrap(), vec![orphan]);
        assert!(!repository.has_content(&orphan));
        assert!(repository.has_content(&used));
    }

    #[test]
    fn test_reopened_repository_sees_content() {
        let (dir, repository) = repository();
        let hash = repository.add_content(&mut &b"persisted"[..]).unwrap();
        drop(repository);

        let reopened = FileSystemContentRepository::new(dir.path().join("content")).unwrap();
        let handle = reopened.get_content(&hash).unwrap().unwrap();
        assert_eq!(handle.bytes(), b"persisted");
    }

    #[test]
    fn test_concurrent_adds_store_one_copy() {
        let (_dir, repository) = repository();
        let repository = Arc::new(repository);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repository = repository.clone();
                thread::spawn(move || repository.add_content(&mut &b"same bytes"[..]).unwrap())
            })
            .collect();
        let hashes: BTreeSet<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(hashes.len(), 1);
        assert_eq!(repository.stored_hashes().unwrap().len(), 1);
    }
}
