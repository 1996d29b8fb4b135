//! Content repository trait definitions.
//!
//! A content repository stores deployment artifacts by the SHA-256 digest of
//! their bytes. Consumers hold named references on stored content; storage
//! for a digest is reclaimed once its last reference is removed.
//!
//! # Reference lifecycle
//!
//! - `add_content` stores bytes and returns their digest. Adding the same
//!   bytes twice stores them once.
//! - `add_content_reference` records that a consumer (for example
//!   `deployment=app.war`) uses the content.
//! - `remove_content` drops one reference. Removing the last reference
//!   reclaims the storage.
//! - Content that was added but never referenced stays until
//!   `clean_obsolete_content` runs.

use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::error::Result;
use crate::types::{ContentHash, ReferenceToken};

/// Bytes of one stored content item.
#[derive(Debug, Clone)]
pub struct ContentHandle {
    hash: ContentHash,
    data: Arc<Vec<u8>>,
}

impl ContentHandle {
    /// Wrap stored bytes.
    pub fn new(hash: ContentHash, data: Arc<Vec<u8>>) -> Self {
        Self { hash, data }
    }

    /// Digest the content is stored under.
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// The stored bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the content is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reader over the stored bytes.
    pub fn reader(&self) -> impl Read + '_ {
        Cursor::new(self.data.as_slice())
    }
}

/// Content-addressable artifact storage.
///
/// Implementations must be safe to share between threads. Reference count
/// changes and reclamation for one digest are linearizable: a concurrent
/// `add_content_reference` and `remove_content` on the same digest never
/// leave a referenced digest without storage.
///
/// # Examples
///
/// ```
/// use keel_core::traits::ContentRepository;
/// use keel_core::traits::content::ContentHandle;
/// use keel_core::types::{ContentHash, ReferenceToken};
/// use keel_core::error::Result;
/// use std::io::Read;
///
/// struct DiscardingRepository;
///
/// impl ContentRepository for DiscardingRepository {
///     fn add_content(&self, stream: &mut dyn Read) -> Result<ContentHash> {
///         let (hash, _) = ContentHash::of_reader(stream)?;
///         Ok(hash)
///     }
///
///     fn get_content(&self, _hash: &ContentHash) -> Result<Option<ContentHandle>> {
///         Ok(None)
///     }
///
///     fn has_content(&self, _hash: &ContentHash) -> bool {
///         false
///     }
///
///     fn sync_content(&self, _hash: &ContentHash) -> bool {
///         false
///     }
///
///     fn add_content_reference(&self, _hash: &ContentHash, _token: &ReferenceToken) -> Result<()> {
///         Ok(())
///     }
///
///     fn remove_content(&self, _hash: &ContentHash, _token: &ReferenceToken) -> Result<()> {
///         Ok(())
///     }
///
///     fn clean_obsolete_content(&self) -> Result<Vec<ContentHash>> {
///         Ok(Vec::new())
///     }
/// }
/// ```
pub trait ContentRepository: Send + Sync {
    /// Consume `stream` and store its bytes, returning their digest.
    ///
    /// Idempotent: storing bytes that are already present returns the same
    /// digest and leaves storage unchanged.
    fn add_content(&self, stream: &mut dyn Read) -> Result<ContentHash>;

    /// Get stored content, or `None` if nothing is stored under `hash`.
    ///
    /// Implementations that verify integrity fail with
    /// `ContentError::IntegrityError` when the stored bytes no longer hash
    /// to `hash`.
    fn get_content(&self, hash: &ContentHash) -> Result<Option<ContentHandle>>;

    /// Whether content is stored under `hash`.
    fn has_content(&self, hash: &ContentHash) -> bool;

    /// Ensure content is durably available locally.
    ///
    /// Returns `true` if the content is available after the call.
    fn sync_content(&self, hash: &ContentHash) -> bool;

    /// Record that `token` references the content stored under `hash`.
    ///
    /// Fails with `ContentError::NotFound` if no content is stored.
    /// Adding a token that is already held is a no-op.
    fn add_content_reference(&self, hash: &ContentHash, token: &ReferenceToken) -> Result<()>;

    /// Remove the reference `token` holds on `hash`.
    ///
    /// Fails with `ContentError::ReferenceUnderflow` if the token holds no
    /// reference. Storage is reclaimed when the last reference goes.
    fn remove_content(&self, hash: &ContentHash, token: &ReferenceToken) -> Result<()>;

    /// Reclaim every stored item that holds no reference, returning the
    /// digests removed.
    fn clean_obsolete_content(&self) -> Result<Vec<ContentHash>>;
}
