//! Disk-backed page storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use super::Storage;
use crate::storage::error::StorageError;
use crate::storage::page::{PAGE_SIZE, PageId};

struct FileInner {
    file: File,
    page_count: u32,
}

/// Disk-backed page storage.
///
/// Pages are stored consecutively in a single file at
/// `page_id * PAGE_SIZE` offsets. The page count is derived from the file
/// length on open; a file whose length is not a multiple of PAGE_SIZE is
/// rejected as corrupted.
pub struct FileStorage {
    inner: Mutex<FileInner>,
}

impl FileStorage {
    /// Opens (or creates) a storage file at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` on file system failure and
    /// `StorageError::Corrupted` if the file length is not page-aligned.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "file length {} is not a multiple of page size",
                len
            )));
        }

        Ok(Self {
            inner: Mutex::new(FileInner {
                file,
                page_count: (len / PAGE_SIZE as u64) as u32,
            }),
        })
    }
}

impl Storage for FileStorage {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }

        let mut inner = self.inner.lock();
        if page_id.page_num() >= inner.page_count {
            return Err(StorageError::PageNotFound(page_id));
        }
        inner.file.seek(SeekFrom::Start(page_id.byte_offset()))?;
        inner.file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }

        let mut inner = self.inner.lock();
        if page_id.page_num() >= inner.page_count {
            return Err(StorageError::PageNotFound(page_id));
        }
        inner.file.seek(SeekFrom::Start(page_id.byte_offset()))?;
        inner.file.write_all(buf)?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut inner = self.inner.lock();
        let page_id = PageId::new(inner.page_count);
        inner.file.seek(SeekFrom::Start(page_id.byte_offset()))?;
        inner.file.write_all(&[0u8; PAGE_SIZE])?;
        inner.page_count += 1;
        Ok(page_id)
    }

    fn page_count(&self) -> u32 {
        self.inner.lock().page_count
    }

    fn sync_all(&self) -> Result<(), StorageError> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }
}
