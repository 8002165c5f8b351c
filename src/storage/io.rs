//! Page I/O backend implementations.
//!
//! This module provides the `Storage` trait for page-based I/O operations,
//! along with MemoryStorage and FileStorage implementations.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use super::page::PageId;
use crate::storage::error::StorageError;

/// Page I/O backend trait for page-based storage.
///
/// This trait defines the interface for reading and writing 8KB pages using
/// caller-owned buffers. Implementations include:
/// - `MemoryStorage`: In-memory storage
/// - `FileStorage`: Disk-backed storage
///
/// # Design Decisions
///
/// 1. **Synchronous I/O**: the engine is single-threaded and cooperative;
///    no operation suspends, so the trait is plain blocking I/O.
///
/// 2. **Caller-owned buffers**: Storage is responsible for reading and
///    writing raw bytes only; memory management belongs to the caller.
///
/// 3. **Page-level operations**: All I/O is page-sized (8KB) for alignment
///    with OS page sizes.
///
/// 4. **Explicit allocation**: `allocate_page()` grows the storage, so the
///    backend can track total pages.
///
/// 5. **No caching**: this layer does not cache pages.
pub trait Storage: Send + Sync {
    /// Reads a page into a caller-provided buffer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` if the page has not been
    /// allocated, `StorageError::InvalidBufferSize` if
    /// `buf.len() != PAGE_SIZE`.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Writes a page from a caller-provided buffer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` if the page has not been
    /// allocated, `StorageError::InvalidBufferSize` if
    /// `buf.len() != PAGE_SIZE`.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError>;

    /// Allocates a new zero-initialized page and returns its PageId.
    ///
    /// The first call on an empty storage is guaranteed to return
    /// `PageId(0)`; subsequent allocations are consecutive.
    fn allocate_page(&self) -> Result<PageId, StorageError>;

    /// Returns the total number of allocated pages.
    fn page_count(&self) -> u32;

    /// Syncs all pending writes to physical disk (fsync).
    ///
    /// For `MemoryStorage`, this is a no-op. For `FileStorage`, this calls
    /// `sync_all()` to ensure durability.
    fn sync_all(&self) -> Result<(), StorageError>;
}
