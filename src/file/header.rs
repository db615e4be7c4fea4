use super::error::{FileError, FileResult};
use super::{HEADER_PAGE_ID, PageId};

/// Magic tag at the start of every database file.
pub const MAGIC: &[u8; 7] = b"SLOTDB1";

/// Current file format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header page contents (page 0).
///
/// Layout, big-endian, zero-padded to the page size:
/// ```text
/// [0..7]    magic: "SLOTDB1"
/// [7..11]   format version: u32
/// [11..15]  page size: i32 (must be positive)
/// [15..19]  free list entry count: u32
/// [19..]    free list entries: u32 page ids, oldest first
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub page_size: usize,
    pub free_list: Vec<PageId>,
}

impl FileHeader {
    /// Bytes before the first free list entry.
    pub const FIXED_SIZE: usize = 19;

    const VERSION_OFFSET: usize = 7;
    const PAGE_SIZE_OFFSET: usize = 11;
    const FREE_COUNT_OFFSET: usize = 15;

    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            free_list: Vec::new(),
        }
    }

    /// Number of free list entries that fit in a header page of `page_size` bytes.
    pub fn free_list_capacity(page_size: usize) -> usize {
        page_size.saturating_sub(Self::FIXED_SIZE) / 4
    }

    /// Validate magic and version and return the stored page size.
    /// Only needs the fixed prefix, so it can run before the page size is known.
    pub fn read_page_size(prefix: &[u8]) -> FileResult<usize> {
        if prefix.len() < Self::FIXED_SIZE {
            return Err(FileError::CorruptDatabase(format!(
                "header truncated: {} bytes",
                prefix.len()
            )));
        }

        if &prefix[..MAGIC.len()] != MAGIC {
            return Err(FileError::CorruptDatabase("bad magic tag".to_string()));
        }

        let version = read_u32(prefix, Self::VERSION_OFFSET);
        if version != FORMAT_VERSION {
            return Err(FileError::CorruptDatabase(format!(
                "unsupported format version {}",
                version
            )));
        }

        let page_size = read_u32(prefix, Self::PAGE_SIZE_OFFSET) as i32;
        if page_size <= 0 {
            return Err(FileError::CorruptDatabase(format!(
                "invalid page size {}",
                page_size
            )));
        }
        let page_size = page_size as usize;
        if page_size < Self::FIXED_SIZE {
            return Err(FileError::CorruptDatabase(format!(
                "page size {} cannot hold the header",
                page_size
            )));
        }

        Ok(page_size)
    }

    /// Parse a full header page.
    pub fn from_page(page: &[u8]) -> FileResult<Self> {
        let page_size = Self::read_page_size(page)?;
        if page.len() != page_size {
            return Err(FileError::CorruptDatabase(format!(
                "header page is {} bytes, expected {}",
                page.len(),
                page_size
            )));
        }

        let count = read_u32(page, Self::FREE_COUNT_OFFSET) as usize;
        if count > Self::free_list_capacity(page_size) {
            return Err(FileError::CorruptDatabase(format!(
                "free list count {} exceeds header capacity",
                count
            )));
        }

        let mut free_list = Vec::with_capacity(count);
        for i in 0..count {
            let page_id = read_u32(page, Self::FIXED_SIZE + i * 4) as PageId;
            if page_id == HEADER_PAGE_ID {
                return Err(FileError::CorruptDatabase(
                    "free list contains the header page".to_string(),
                ));
            }
            free_list.push(page_id);
        }

        Ok(Self {
            page_size,
            free_list,
        })
    }

    /// Encode into a zero-padded page of `page_size` bytes.
    pub fn to_page(&self) -> FileResult<Vec<u8>> {
        if self.free_list.len() > Self::free_list_capacity(self.page_size) {
            return Err(FileError::CorruptDatabase(format!(
                "free list of {} entries does not fit the header page",
                self.free_list.len()
            )));
        }

        let page_size = i32::try_from(self.page_size)
            .map_err(|_| FileError::UnsupportedPageSize(self.page_size))?;

        let mut page = vec![0u8; self.page_size];
        page[..MAGIC.len()].copy_from_slice(MAGIC);
        write_u32(&mut page, Self::VERSION_OFFSET, FORMAT_VERSION);
        write_u32(&mut page, Self::PAGE_SIZE_OFFSET, page_size as u32);
        write_u32(
            &mut page,
            Self::FREE_COUNT_OFFSET,
            self.free_list.len() as u32,
        );

        for (i, &page_id) in self.free_list.iter().enumerate() {
            let page_id = u32::try_from(page_id).map_err(|_| FileError::OutOfBounds {
                page_id,
                page_count: u32::MAX as usize,
            })?;
            write_u32(&mut page, Self::FIXED_SIZE + i * 4, page_id);
        }

        Ok(page)
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut header = FileHeader::new(512);
        header.free_list = vec![3, 7];
        let page = header.to_page().unwrap();

        assert_eq!(page.len(), 512);
        assert_eq!(&page[0..7], b"SLOTDB1");
        assert_eq!(&page[7..11], &1u32.to_be_bytes());
        assert_eq!(&page[11..15], &512u32.to_be_bytes());
        assert_eq!(&page[15..19], &2u32.to_be_bytes());
        assert_eq!(&page[19..23], &3u32.to_be_bytes());
        assert_eq!(&page[23..27], &7u32.to_be_bytes());
        assert!(page[27..].iter().all(|&b| b == 0));

        assert_eq!(FileHeader::from_page(&page).unwrap(), header);
    }

    #[test]
    fn test_bad_magic() {
        let mut page = FileHeader::new(128).to_page().unwrap();
        page[0] = b'X';
        let result = FileHeader::read_page_size(&page);
        assert!(matches!(result, Err(FileError::CorruptDatabase(_))));
    }

    #[test]
    fn test_unsupported_version() {
        let mut page = FileHeader::new(128).to_page().unwrap();
        page[7..11].copy_from_slice(&2u32.to_be_bytes());
        let result = FileHeader::from_page(&page);
        assert!(matches!(result, Err(FileError::CorruptDatabase(_))));
    }

    #[test]
    fn test_non_positive_page_size() {
        let mut page = FileHeader::new(128).to_page().unwrap();
        page[11..15].copy_from_slice(&0u32.to_be_bytes());
        assert!(FileHeader::read_page_size(&page).is_err());

        page[11..15].copy_from_slice(&(-4096i32).to_be_bytes());
        assert!(FileHeader::read_page_size(&page).is_err());
    }

    #[test]
    fn test_truncated_prefix() {
        let result = FileHeader::read_page_size(b"SLOTDB1\0\0");
        assert!(matches!(result, Err(FileError::CorruptDatabase(_))));
    }

    #[test]
    fn test_free_list_overflow_rejected() {
        let mut page = FileHeader::new(64).to_page().unwrap();
        // 64-byte page holds (64 - 19) / 4 = 11 entries
        page[15..19].copy_from_slice(&12u32.to_be_bytes());
        assert!(FileHeader::from_page(&page).is_err());

        let mut header = FileHeader::new(64);
        header.free_list = (1..=12).collect();
        assert!(header.to_page().is_err());
    }
}
