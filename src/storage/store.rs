//! Page Store
//!
//! Positioned reads and writes of fixed-size pages against the heap file.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{HeapError, Result};

use super::{Page, Record};

/// Owns the heap file and maps page numbers to byte offsets
///
/// ## File Layout
/// ```text
/// ┌──────────────┬──────────────┬──────────────┬─────
/// │   Page 0     │   Page 1     │   Page 2     │ ...
/// │ [0, P)       │ [P, 2P)      │ [2P, 3P)     │
/// └──────────────┴──────────────┴──────────────┴─────
/// ```
///
/// ## Concurrency:
/// - Every access is a positioned read/write (no shared cursor), so calls
///   for different pages never interfere
/// - Callers serialize access to the *same* page with its page lock
pub struct PageStore {
    file: File,
    path: PathBuf,
    page_size: usize,
}

impl PageStore {
    /// Open or create the heap file
    pub fn open(path: &Path, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_size,
        })
    }

    /// Write the whole page at `number * page_size`
    pub fn write(&self, page: &Page) -> Result<()> {
        if page.max_size() != self.page_size {
            return Err(HeapError::Corruption(format!(
                "page {} is {} bytes, store pages are {} bytes",
                page.number(),
                page.max_size(),
                self.page_size
            )));
        }

        let bytes = page.serialize();
        write_all_at(&self.file, &bytes, self.offset_of(page.number()))?;
        Ok(())
    }

    /// Read and decode page `number`
    pub fn read(&self, number: u32) -> Result<Page> {
        let buffer = self.read_raw(number)?;
        Page::deserialize(number, self.page_size, &buffer)
    }

    /// Lazily iterate pages from page 0 until the first page with no records
    pub fn iter(&self) -> PageIter<'_> {
        PageIter {
            store: self,
            next: 0,
            done: false,
        }
    }

    /// Flush file contents to disk
    pub fn sync(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn offset_of(&self, number: u32) -> u64 {
        number as u64 * self.page_size as u64
    }

    /// Raw page bytes; anything past end of file reads as zero
    fn read_raw(&self, number: u32) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; self.page_size];
        let base = self.offset_of(number);
        let mut filled = 0;

        while filled < buffer.len() {
            match read_at(&self.file, &mut buffer[filled..], base + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(buffer)
    }
}

/// Iterator over stored pages, see [`PageStore::iter`]
pub struct PageIter<'a> {
    store: &'a PageStore,
    next: u32,
    done: bool,
}

impl Iterator for PageIter<'_> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let number = self.next;
        let buffer = match self.store.read_raw(number) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        if !Record::exists(&buffer, 0) {
            self.done = true;
            return None;
        }

        self.next = match number.checked_add(1) {
            Some(next) => next,
            None => {
                self.done = true;
                number
            }
        };

        let page = Page::deserialize(number, self.store.page_size, &buffer);
        if page.is_err() {
            self.done = true;
        }
        Some(page)
    }
}

// =============================================================================
// Positioned I/O
// =============================================================================

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole page",
                ))
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
