use std::borrow::Cow;
use std::io::{self, ErrorKind, Read};

use crate::error::{Error, Result};

/// Forward-only byte source shared by the header parser and the page walker.
///
/// Before the first page is cached, reads go straight to the underlying
/// reader at absolute file offsets, which may only move forward. Once a page
/// is cached, reads are relative to that page buffer.
pub struct PageStream<R: Read> {
    reader: R,
    position: u64,
    page: Vec<u8>,
    pages_read: u64,
    eof: bool,
}

impl<R: Read> PageStream<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            page: Vec::new(),
            pages_read: 0,
            eof: false,
        }
    }

    /// Reads `len` bytes at `offset`.
    ///
    /// With no cached page `offset` is an absolute file position at or after
    /// the current one; otherwise it is relative to the cached page. Returns
    /// `None` when the bytes are not available.
    ///
    /// # Errors
    ///
    /// Returns an error when a direct read would need to move backwards, or
    /// on I/O failures other than end of stream.
    pub fn read_at(&mut self, offset: usize, len: usize) -> Result<Option<Cow<'_, [u8]>>> {
        if self.page.is_empty() {
            return Ok(self.read_direct(offset, len)?.map(Cow::Owned));
        }
        let end = offset.saturating_add(len);
        Ok(self.page.get(offset..end).map(Cow::Borrowed))
    }

    /// Direct read at an absolute offset, used before any page is cached.
    fn read_direct(&mut self, offset: usize, len: usize) -> Result<Option<Vec<u8>>> {
        if !self.skip_to(offset as u64)? {
            return Ok(None);
        }
        let mut buf = vec![0u8; len];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {
                self.position += len as u64;
                Ok(Some(buf))
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                self.eof = true;
                Ok(None)
            }
            Err(err) => Err(Error::Io(err)),
        }
    }

    /// Discards bytes until the absolute position `target`.
    ///
    /// Returns `false` and flags end of stream if the data runs out first.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` lies behind the current position.
    pub fn skip_to(&mut self, target: u64) -> Result<bool> {
        if target < self.position {
            return Err(Error::Unsupported {
                feature: Cow::from(format!(
                    "backward seek from {} to {target} on a forward-only stream",
                    self.position
                )),
            });
        }
        let wanted = target - self.position;
        if wanted == 0 {
            return Ok(true);
        }
        let skipped = io::copy(&mut self.reader.by_ref().take(wanted), &mut io::sink())?;
        self.position += skipped;
        if skipped < wanted {
            self.eof = true;
            return Ok(false);
        }
        Ok(true)
    }

    /// Reads the next page of `page_length` bytes into the cached buffer.
    ///
    /// Returns `false` at end of stream; a partial trailing page is dropped.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors other than end of stream.
    pub fn next_page(&mut self, page_length: usize) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        if self.page.len() != page_length {
            self.page.resize(page_length, 0);
        }
        match self.reader.read_exact(&mut self.page) {
            Ok(()) => {
                self.position += page_length as u64;
                self.pages_read += 1;
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                self.eof = true;
                Ok(false)
            }
            Err(err) => Err(Error::Io(err)),
        }
    }

    /// The cached page; empty until the first page has been read.
    #[must_use]
    pub fn page(&self) -> &[u8] {
        &self.page
    }

    /// Zero-based index of the cached page.
    #[must_use]
    pub const fn page_index(&self) -> u64 {
        self.pages_read.saturating_sub(1)
    }

    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
