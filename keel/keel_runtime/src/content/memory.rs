//! In-memory content repository.

use std::collections::BTreeSet;
use std::io::Read;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use keel_core::error::{ContentError, Result};
use keel_core::traits::{ContentHandle, ContentRepository};
use keel_core::types::{ContentHash, ReferenceToken};

#[derive(Debug)]
struct StoredContent {
    data: Arc<Vec<u8>>,
    references: BTreeSet<ReferenceToken>,
}

/// Content repository that keeps every item in memory.
///
/// Each digest owns one map entry. Reference changes and reclamation for a
/// digest go through that entry's lock, so they are linearizable.
#[derive(Debug, Default)]
pub struct InMemoryContentRepository {
    entries: DashMap<ContentHash, StoredContent>,
}

impl InMemoryContentRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tokens currently referencing `hash`.
    pub fn references(&self, hash: &ContentHash) -> Vec<ReferenceToken> {
        self.entries
            .get(hash)
            .map(|entry| entry.references.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl ContentRepository for InMemoryContentRepository {
    fn add_content(&self, stream: &mut dyn Read) -> Result<ContentHash> {
        let (hash, data) = ContentHash::of_reader(stream)
            .map_err(|e| ContentError::Unreadable(e.to_string()))?;
        let size = data.len();
        match self.entries.entry(hash) {
            Entry::Occupied(_) => debug!(hash = %hash, "Content already stored"),
            Entry::Vacant(vacant) => {
                vacant.insert(StoredContent {
                    data: Arc::new(data),
                    references: BTreeSet::new(),
                });
                debug!(hash = %hash, size, "Stored content");
            }
        }
        Ok(hash)
    }

    fn get_content(&self, hash: &ContentHash) -> Result<Option<ContentHandle>> {
        Ok(self
            .entries
            .get(hash)
            .map(|entry| ContentHandle::new(*hash, entry.data.clone())))
    }

    fn has_content(&self, hash: &ContentHash) -> bool {
        self.entries.contains_key(hash)
    }

    fn sync_content(&self, hash: &ContentHash) -> bool {
        self.has_content(hash)
    }

    fn add_content_reference(&self, hash: &ContentHash, token: &ReferenceToken) -> Result<()> {
        let mut entry = self
            .entries
            .get_mut(hash)
            .ok_or(ContentError::NotFound(*hash))?;
        if entry.references.insert(token.clone()) {
            debug!(hash = %hash, token = %token, "Added content reference");
        }
        Ok(())
    }

    fn remove_content(&self, hash: &ContentHash, token: &ReferenceToken) -> Result<()> {
        let underflow = || ContentError::ReferenceUnderflow {
            hash: *hash,
            token: token.clone(),
        };
        match self.entries.entry(*hash) {
            Entry::Vacant(_) => Err(underflow().into()),
            Entry::Occupied(mut occupied) => {
                if !occupied.get_mut().references.remove(token) {
                    return Err(underflow().into());
                }
                debug!(hash = %hash, token = %token, "Removed content reference");
                if occupied.get().references.is_empty() {
                    occupied.remove();
                    debug!(hash = %hash, "Reclaimed unreferenced content");
                }
                Ok(())
            }
        }
    }

    fn clean_obsolete_content(&self) -> Result<Vec<ContentHash>> {
        let candidates: Vec<ContentHash> = self
            .entries
            .iter()
            .filter(|entry| entry.references.is_empty())
            .map(|entry| *entry.key())
            .collect();

        let mut removed = Vec::new();
        for hash in candidates {
            // a reference may have arrived since the scan
            if self
                .entries
                .remove_if(&hash, |_, stored| stored.references.is_empty())
                .is_some()
            {
                removed.push(hash);
            }
        }
        Ok(removed)
    }
}
