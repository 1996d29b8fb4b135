//! Content repository that stores nothing.

use std::io::Read;

use keel_core::error::{ContentError, Result};
use keel_core::traits::{ContentHandle, ContentRepository};
use keel_core::types::{ContentHash, ReferenceToken};

/// Repository for processes that never deploy content.
///
/// `add_content` consumes and hashes the stream but keeps nothing, and
/// every reference call succeeds without effect.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopContentRepository;

impl ContentRepository for NoopContentRepository {
    fn add_content(&self, stream: &mut dyn Read) -> Result<ContentHash> {
        let (hash, _) = ContentHash::of_reader(stream)
            .map_err(|e| ContentError::Unreadable(e.to_string()))?;
        Ok(hash)
    }

    fn get_content(&self, _hash: &ContentHash) -> Result<Option<ContentHandle>> {
        Ok(None)
    }

    fn has_content(&self, _hash: &ContentHash) -> bool {
        false
    }

    fn sync_content(&self, _hash: &ContentHash) -> bool {
        false
    }

    fn add_content_reference(&self, _hash: &ContentHash, _token: &ReferenceToken) -> Result<()> {
        Ok(())
    }

    fn remove_content(&self, _hash: &ContentHash, _token: &ReferenceToken) -> Result<()> {
        Ok(())
    }

    fn clean_obsolete_content(&self) -> Result<Vec<ContentHash>> {
        Ok(Vec::new())
    }
}
