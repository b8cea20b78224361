//! # Pager - File-Backed Page Cache
//!
//! The pager owns the database file and a fixed slot array of page buffers,
//! indexed by page number. It is the only component that performs I/O.
//!
//! ## Access Model
//!
//! ```text
//! page(n) / page_mut(n)
//!       │
//!       ├─ n >= TABLE_MAX_PAGES ──────────> error (hard ceiling)
//!       │
//!       ├─ slot empty ─> allocate zeroed buffer
//!       │                read page n from disk if the file has it
//!       │                extend num_pages to n+1 if n is past the end
//!       │
//!       └─> hand out the cached buffer
//! ```
//!
//! Handing out `&mut` into the cache is what makes the cache coherent: a
//! caller's mutation is the cache's content, and `flush` writes exactly
//! what every later read observes.
//!
//! ## Allocation
//!
//! Pages are allocated by taking `unused_page_num()` (= `num_pages`) and
//! touching it; the load path bumps `num_pages`. Pages are never freed or
//! recycled, so file growth is append-only.
//!
//! ## Failure Semantics
//!
//! Every failure here — a file whose length is not a whole number of
//! pages, a read or write error, a page number past the ceiling, a flush
//! of a slot that was never loaded — is fatal to the store. The pager
//! reports them as errors rather than aborting, and the driver decides to
//! exit.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{ensure, eyre, Result, WrapErr};

use crate::config::{PAGE_SIZE, TABLE_MAX_PAGES};

#[derive(Debug)]
pub struct Pager {
    file: File,
    /// Number of pages the file held at open time; reads past this range
    /// are skipped and the buffer stays zeroed.
    disk_pages: u32,
    /// High-water mark of allocated pages, on disk or in cache.
    num_pages: u32,
    slots: Vec<Option<Box<[u8; PAGE_SIZE]>>>,
}

impl Pager {
    /// Opens the database file, creating it if absent. A file length that
    /// is not a whole multiple of the page size means a torn write or
    /// foreign file; the store refuses to touch it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let file_length = file
            .metadata()
            .wrap_err_with(|| format!("failed to read metadata for '{}'", path.display()))?
            .len();

        ensure!(
            file_length % PAGE_SIZE as u64 == 0,
            "database file '{}' is not a whole number of pages ({} bytes): corrupt file",
            path.display(),
            file_length
        );

        let disk_pages = (file_length / PAGE_SIZE as u64) as u32;
        ensure!(
            disk_pages as usize <= TABLE_MAX_PAGES,
            "database file '{}' holds {} pages, limit is {}",
            path.display(),
            disk_pages,
            TABLE_MAX_PAGES
        );

        Ok(Self {
            file,
            disk_pages,
            num_pages: disk_pages,
            slots: vec![None; TABLE_MAX_PAGES],
        })
    }

    /// Shared view of a page. Loads the slot on first access.
    pub fn page(&mut self, page_num: u32) -> Result<&[u8; PAGE_SIZE]> {
        self.ensure_loaded(page_num)?;
        Ok(self.slots[page_num as usize]
            .as_deref()
            .unwrap()) // INVARIANT: slot filled by ensure_loaded above
    }

    /// Exclusive view of a page. The buffer aliases the cache, so the
    /// mutation is visible to every subsequent read and to `flush`.
    pub fn page_mut(&mut self, page_num: u32) -> Result<&mut [u8; PAGE_SIZE]> {
        self.ensure_loaded(page_num)?;
        Ok(self.slots[page_num as usize]
            .as_deref_mut()
            .unwrap()) // INVARIANT: slot filled by ensure_loaded above
    }

    /// Number of pages allocated so far.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Page number a new allocation will receive. Touching it through
    /// `page_mut` completes the allocation.
    pub fn unused_page_num(&self) -> u32 {
        self.num_pages
    }

    /// Writes one page back to disk. The slot must have been loaded.
    pub fn flush(&mut self, page_num: u32) -> Result<()> {
        ensure!(
            (page_num as usize) < TABLE_MAX_PAGES,
            "page number {} out of bounds (limit {})",
            page_num,
            TABLE_MAX_PAGES
        );

        let buffer = self.slots[page_num as usize]
            .as_deref()
            .ok_or_else(|| eyre!("tried to flush page {} before it was loaded", page_num))?;

        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))
            .wrap_err_with(|| format!("failed to seek to page {}", page_num))?;
        self.file
            .write_all(buffer)
            .wrap_err_with(|| format!("failed to write page {}", page_num))?;

        Ok(())
    }

    /// Flushes every loaded slot in `[0, num_pages)` and releases its
    /// buffer, in a single pass. The file handle closes on drop.
    pub fn close(&mut self) -> Result<()> {
        for page_num in 0..self.num_pages {
            if self.slots[page_num as usize].is_some() {
                self.flush(page_num)?;
                self.slots[page_num as usize] = None;
            }
        }
        Ok(())
    }

    fn ensure_loaded(&mut self, page_num: u32) -> Result<()> {
        ensure!(
            (page_num as usize) < TABLE_MAX_PAGES,
            "page number {} out of bounds (limit {})",
            page_num,
            TABLE_MAX_PAGES
        );

        if self.slots[page_num as usize].is_some() {
            return Ok(());
        }

        let mut buffer = Box::new([0u8; PAGE_SIZE]);

        if page_num < self.disk_pages {
            self.file
                .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))
                .wrap_err_with(|| format!("failed to seek to page {}", page_num))?;
            read_page(&mut self.file, &mut buffer[..])
                .wrap_err_with(|| format!("failed to read page {}", page_num))?;
        }

        self.slots[page_num as usize] = Some(buffer);

        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }

        Ok(())
    }
}

/// Reads up to one page, tolerating a short read at end of file; bytes
/// past the end stay zero.
fn read_page(file: &mut File, buffer: &mut [u8]) -> std::io::Result<()> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_in(dir: &tempfile::TempDir) -> Pager {
        Pager::open(dir.path().join("test.db")).unwrap()
    }

    #[test]
    fn open_creates_missing_file() {
        let dir = tempdir().unwrap();
        let pager = open_in(&dir);

        assert_eq!(pager.num_pages(), 0);
        assert!(dir.path().join("test.db").exists());
    }

    #[test]
    fn open_rejects_partial_page_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("torn.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 1]).unwrap();

        let result = Pager::open(&path);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("corrupt file"));
    }

    #[test]
    fn fresh_page_is_zeroed() {
        let dir = tempdir().unwrap();
        let mut pager = open_in(&dir);

        let page = pager.page(0).unwrap();

        assert!(page.iter().all(|&b| b == 0));
        assert_eq!(pager.num_pages(), 1);
    }

    #[test]
    fn page_mut_aliases_later_reads() {
        let dir = tempdir().unwrap();
        let mut pager = open_in(&dir);

        pager.page_mut(0).unwrap()[17] = 0xAB;

        assert_eq!(pager.page(0).unwrap()[17], 0xAB);
    }

    #[test]
    fn flush_and_reopen_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut pager = Pager::open(&path).unwrap();
            pager.page_mut(0).unwrap()[0] = 1;
            pager.page_mut(1).unwrap()[100] = 2;
            pager.close().unwrap();
        }

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.num_pages(), 2);
        assert_eq!(pager.page(0).unwrap()[0], 1);
        assert_eq!(pager.page(1).unwrap()[100], 2);
    }

    #[test]
    fn allocation_bumps_num_pages() {
        let dir = tempdir().unwrap();
        let mut pager = open_in(&dir);

        assert_eq!(pager.unused_page_num(), 0);
        pager.page_mut(0).unwrap();
        assert_eq!(pager.unused_page_num(), 1);
        pager.page_mut(1).unwrap();
        assert_eq!(pager.unused_page_num(), 2);
    }

    #[test]
    fn page_past_ceiling_is_rejected() {
        let dir = tempdir().unwrap();
        let mut pager = open_in(&dir);

        let result = pager.page(TABLE_MAX_PAGES as u32);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("out of bounds"));
    }

    #[test]
    fn flush_of_unloaded_slot_is_rejected() {
        let dir = tempdir().unwrap();
        let mut pager = open_in(&dir);

        let result = pager.flush(0);

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("before it was loaded"));
    }

    #[test]
    fn close_writes_every_loaded_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut pager = Pager::open(&path).unwrap();
            for i in 0..3 {
                pager.page_mut(i).unwrap()[0] = i as u8 + 1;
            }
            pager.close().unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 3 * PAGE_SIZE);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[PAGE_SIZE], 2);
        assert_eq!(bytes[2 * PAGE_SIZE], 3);
    }
}
