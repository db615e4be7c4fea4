use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::header::FileHeader;
use super::{HEADER_PAGE_ID, MIN_PAGE_SIZE, PageId};

/// Fixed-size page I/O over a single database file.
///
/// Page 0 holds the [`FileHeader`]; every other page is `page_size` bytes of
/// table data. Reclaimed pages are kept on a free list that lives in the header
/// and is rewritten on every change. The file handle is owned by this value, so
/// dropping it on any path (including a failed [`StorageManager::open`]) releases it.
pub struct StorageManager {
    file: File,
    path: PathBuf,
    page_size: usize,
    /// Stack of reclaimed page ids, most recently freed last
    free_list: Vec<PageId>,
}

impl StorageManager {
    /// Open a database file, creating it if it is absent or empty.
    ///
    /// For an existing file the stored page size wins over `requested_page_size`.
    pub fn open<P: AsRef<Path>>(path: P, requested_page_size: usize) -> FileResult<Self> {
        let path = path.as_ref();

        let is_new = fs::metadata(path).map_or(true, |m| m.len() == 0);
        if is_new && !(MIN_PAGE_SIZE..=i32::MAX as usize).contains(&requested_page_size) {
            return Err(FileError::UnsupportedPageSize(requested_page_size));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();
        if file_len == 0 {
            let mut manager = Self {
                file,
                path: path.to_path_buf(),
                page_size: requested_page_size,
                free_list: Vec::new(),
            };
            manager.write_header()?;
            info!(
                "Created database {} with page size {}",
                path.display(),
                requested_page_size
            );
            return Ok(manager);
        }

        if file_len < FileHeader::FIXED_SIZE as u64 {
            return Err(FileError::CorruptDatabase(format!(
                "file is only {} bytes long",
                file_len
            )));
        }

        let mut prefix = [0u8; FileHeader::FIXED_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut prefix)?;
        let page_size = FileHeader::read_page_size(&prefix)?;

        if file_len < page_size as u64 {
            return Err(FileError::CorruptDatabase(format!(
                "file is {} bytes, shorter than its {}-byte header page",
                file_len, page_size
            )));
        }

        let mut header_page = vec![0u8; page_size];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header_page)?;
        let header = FileHeader::from_page(&header_page)?;

        let page_count = (file_len / page_size as u64) as usize;
        if let Some(&bad) = header.free_list.iter().find(|&&id| id >= page_count) {
            return Err(FileError::CorruptDatabase(format!(
                "free list entry {} is past the end of the file ({} pages)",
                bad, page_count
            )));
        }

        if page_size != requested_page_size {
            warn!(
                "Ignoring requested page size {}; {} was created with page size {}",
                requested_page_size,
                path.display(),
                page_size
            );
        }
        info!(
            "Opened database {} ({} pages, {} free)",
            path.display(),
            page_count,
            header.free_list.len()
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_size,
            free_list: header.free_list,
        })
    }

    /// Persist the header and release the file handle
    pub fn close(mut self) -> FileResult<()> {
        self.flush()?;
        debug!("Closed database {}", self.path.display());
        Ok(())
    }

    /// Persist the header and sync the file without closing it
    pub fn flush(&mut self) -> FileResult<()> {
        self.write_header()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Read one full page
    pub fn read_page_bytes(&mut self, page_id: PageId) -> FileResult<Vec<u8>> {
        let offset = self.page_offset(page_id)?;
        let file_len = self.file.metadata()?.len();

        let in_bounds = offset
            .checked_add(self.page_size as u64)
            .is_some_and(|end| end <= file_len);
        if !in_bounds {
            return Err(FileError::OutOfBounds {
                page_id,
                page_count: (file_len / self.page_size as u64) as usize,
            });
        }

        let mut buffer = vec![0u8; self.page_size];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Overwrite one allocated data page
    pub fn write_page_bytes(&mut self, page_id: PageId, data: &[u8]) -> FileResult<()> {
        if data.len() != self.page_size {
            return Err(FileError::InvalidPageSize {
                expected: self.page_size,
                actual: data.len(),
            });
        }

        if page_id == HEADER_PAGE_ID {
            return Err(FileError::ReservedPage(page_id));
        }

        let page_count = self.page_count()?;
        if page_id >= page_count {
            return Err(FileError::OutOfBounds {
                page_id,
                page_count,
            });
        }

        self.write_raw(page_id, data)
    }

    /// Hand out a page id, reusing the most recently freed page first.
    ///
    /// A reused page is zeroed on disk so it decodes as an empty page.
    pub fn allocate_page(&mut self) -> FileResult<PageId> {
        if let Some(page_id) = self.free_list.pop() {
            let zeroed = vec![0u8; self.page_size];
            self.write_raw(page_id, &zeroed)?;
            self.write_header()?;
            debug!("Reused free page {}", page_id);
            return Ok(page_id);
        }

        let file_len = self.file.metadata()?.len();
        let page_id = (file_len / self.page_size as u64) as PageId;
        self.file
            .set_len((page_id as u64 + 1) * self.page_size as u64)?;

        debug!("Allocated page {} by growing the file", page_id);
        Ok(page_id)
    }

    /// Return a page to the free list. Page 0 is ignored.
    pub fn free_page(&mut self, page_id: PageId) -> FileResult<()> {
        self.free_pages(&[page_id])
    }

    /// Return several pages to the free list with a single header write.
    ///
    /// Either every id is accepted or the free list is left untouched. Page 0
    /// and ids already on the list are skipped; ids that no longer fit in the
    /// header are leaked with a warning.
    pub fn free_pages(&mut self, page_ids: &[PageId]) -> FileResult<()> {
        let page_count = self.page_count()?;
        if let Some(&page_id) = page_ids.iter().find(|&&id| id >= page_count) {
            return Err(FileError::OutOfBounds {
                page_id,
                page_count,
            });
        }

        let previous_len = self.free_list.len();
        let capacity = FileHeader::free_list_capacity(self.page_size);
        for &page_id in page_ids {
            if page_id == HEADER_PAGE_ID {
                continue;
            }
            if self.free_list.contains(&page_id) {
                debug!("Page {} is already on the free list", page_id);
                continue;
            }
            if self.free_list.len() >= capacity {
                warn!(
                    "Free list is full ({} entries); page {} will not be reused",
                    self.free_list.len(),
                    page_id
                );
                continue;
            }
            self.free_list.push(page_id);
        }

        if self.free_list.len() == previous_len {
            return Ok(());
        }

        if let Err(e) = self.write_header() {
            self.free_list.truncate(previous_len);
            return Err(e);
        }
        debug!("Freed pages {:?}", &self.free_list[previous_len..]);
        Ok(())
    }

    /// Page size adopted for this file
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the file, header included
    pub fn page_count(&self) -> FileResult<usize> {
        let file_len = self.file.metadata()?.len();
        Ok((file_len / self.page_size as u64) as usize)
    }

    /// Reclaimed page ids, in the order they were freed
    pub fn free_list(&self) -> &[PageId] {
        &self.free_list
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn page_offset(&self, page_id: PageId) -> FileResult<u64> {
        (page_id as u64)
            .checked_mul(self.page_size as u64)
            .ok_or(FileError::OutOfBounds {
                page_id,
                page_count: 0,
            })
    }

    fn write_raw(&mut self, page_id: PageId, data: &[u8]) -> FileResult<()> {
        let offset = self.page_offset(page_id)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn write_header(&mut self) -> FileResult<()> {
        let header = FileHeader {
            page_size: self.page_size,
            free_list: self.free_list.clone(),
        };
        let page = header.to_page()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&page)?;
        Ok(())
    }
}
