use super::error::CodecError;
use super::record::{Reader, Record, SlotId};
use crate::file::PageId;

/// Decoded slotted page.
///
/// On-disk layout (big-endian):
/// ```text
/// [0..4]          record count N
/// [4..4+4N]       slot offsets, one per record in insertion order
/// [ ... free ... ]
/// [..page_size]   record bodies, packed backward from the end of the page
/// ```
/// The first record occupies the highest addresses and each later record sits
/// immediately before the previous one. A record fits while the slot directory
/// and the bodies do not overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    id: PageId,
    page_size: usize,
    records: Vec<Record>,
    /// Total encoded length of all record bodies
    body_len: usize,
}

impl Page {
    const COUNT_SIZE: usize = 4;
    const SLOT_SIZE: usize = 4;

    /// Create an empty page
    pub fn new(id: PageId, page_size: usize) -> Self {
        Self {
            id,
            page_size,
            records: Vec::new(),
            body_len: 0,
        }
    }

    /// Largest encoded record an empty page of `page_size` bytes can hold
    pub fn max_record_len(page_size: usize) -> usize {
        page_size.saturating_sub(Self::COUNT_SIZE + Self::SLOT_SIZE)
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Records in slot order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, slot_id: SlotId) -> Option<&Record> {
        self.records.get(slot_id)
    }

    /// Get the number of records in this page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// End of the slot directory
    fn directory_end(&self) -> usize {
        Self::COUNT_SIZE + self.records.len() * Self::SLOT_SIZE
    }

    /// Bytes between the slot directory and the record bodies
    pub fn free_space(&self) -> usize {
        self.page_size
            .saturating_sub(self.directory_end() + self.body_len)
    }

    /// Whether a record of `encoded_len` bytes (plus its slot) fits
    pub fn can_fit(&self, encoded_len: usize) -> bool {
        self.directory_end() + Self::SLOT_SIZE + self.body_len + encoded_len <= self.page_size
    }

    /// Check if page is full (cannot take even an empty record)
    pub fn is_full(&self) -> bool {
        !self.can_fit(Self::COUNT_SIZE)
    }

    /// Append a record, returning its slot
    pub fn insert(&mut self, record: Record) -> Result<SlotId, CodecError> {
        let encoded_len = record.encoded_len();
        if !self.can_fit(encoded_len) {
            return Err(CodecError::PageFull {
                page_id: self.id,
                needed: encoded_len + Self::SLOT_SIZE,
                available: self.free_space(),
            });
        }

        self.records.push(record);
        self.body_len += encoded_len;
        Ok(self.records.len() - 1)
    }

    /// Serialize the page into exactly `page_size` bytes
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut data = vec![0u8; self.page_size];
        if self.directory_end() + self.body_len > self.page_size {
            return Err(CodecError::SlotDirectoryOverflow {
                count: self.records.len(),
                page_size: self.page_size,
            });
        }

        let count = self.records.len() as u32;
        data[..Self::COUNT_SIZE].copy_from_slice(&count.to_be_bytes());

        let mut body = Vec::new();
        let mut offset = self.page_size;
        for (slot, record) in self.records.iter().enumerate() {
            body.clear();
            record.encode_into(&mut body)?;
            offset -= body.len();
            data[offset..offset + body.len()].copy_from_slice(&body);

            let slot_pos = Self::COUNT_SIZE + slot * Self::SLOT_SIZE;
            data[slot_pos..slot_pos + Self::SLOT_SIZE]
                .copy_from_slice(&(offset as u32).to_be_bytes());
        }

        Ok(data)
    }

    /// Deserialize a page image; an all-zero image is an empty page
    pub fn decode(id: PageId, data: &[u8]) -> Result<Self, CodecError> {
        let page_size = data.len();
        let mut reader = Reader::new(data, 0);
        let count = reader.read_u32()? as usize;

        let directory_end = count
            .checked_mul(Self::SLOT_SIZE)
            .and_then(|n| n.checked_add(Self::COUNT_SIZE))
            .filter(|&end| end <= page_size)
            .ok_or(CodecError::SlotDirectoryOverflow { count, page_size })?;

        let mut page = Self::new(id, page_size);
        page.records.reserve(count);

        for slot in 0..count {
            let offset = reader.read_u32()? as usize;
            if offset < directory_end || offset >= page_size {
                return Err(CodecError::InvalidSlot { slot, offset });
            }

            let (record, consumed) = Record::decode(data, offset)?;
            page.records.push(record);
            page.body_len += consumed;
        }

        Ok(page)
    }
}
