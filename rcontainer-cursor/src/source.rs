//! The abstract random-access byte source contract.

use crate::error::{ReadError, Result};
use std::sync::Arc;

/// A random-access byte source.
///
/// This is the single external dependency of the whole decoder: a local
/// memory-mapped file, a remote byte-range-readable endpoint, or anything
/// else, as long as it can answer "give me `length` bytes starting at
/// `offset`". Those concrete drivers are out of scope for this crate; only
/// the contract lives here.
///
/// Implementations must be safe for concurrent `read` calls made by distinct
/// [`Cursor`](crate::Cursor)s over the same source; a single `Cursor`
/// itself is never shared across threads.
pub trait ByteSource: Send + Sync {
    /// Reads exactly `length` bytes starting at absolute offset `offset`.
    /// A short read (source ends before `offset + length`) is always an
    /// error.
    fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>>;

    /// An identity string for this source, e.g. a file path or URL. Used
    /// only for diagnostics.
    fn path(&self) -> &str;

    /// A hint that the caller is done with this source for now. Typical
    /// implementations use this to close file handles or release caches;
    /// it is never load-bearing for correctness.
    fn dismiss(&self) {}
}

impl ByteSource for Arc<dyn ByteSource> {
    fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        (**self).read(offset, length)
    }

    fn path(&self) -> &str {
        (**self).path()
    }

    fn dismiss(&self) {
        (**self).dismiss()
    }
}

/// An in-memory [`ByteSource`] backed by an owned byte buffer.
///
/// This is the reference implementation used by this workspace's own tests.
/// It is a convenient stand-in wherever the caller already holds the whole
/// container in memory; it is not a substitute for a real memory-mapped or
/// remote driver, both of which are external collaborators of this crate.
pub struct SliceSource {
    path: String,
    data: Vec<u8>,
}

impl SliceSource {
    /// Wraps an owned buffer as a [`ByteSource`].
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// The number of bytes in the underlying buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the underlying buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ByteSource for SliceSource {
    fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let start = usize::try_from(offset).map_err(|_| ReadError::malformed("offset overflow"))?;
        let end = start
            .checked_add(length)
            .ok_or_else(|| ReadError::malformed("offset overflow"))?;
        self.data.get(start..end).map(<[u8]>::to_vec).ok_or_else(|| {
            ReadError::eof(format!(
                "read past end of source {:?}: wanted {}..{}, have {} bytes",
                self.path,
                start,
                end,
                self.data.len()
            ))
        })
    }

    fn path(&self) -> &str {
        &self.path
    }
}
