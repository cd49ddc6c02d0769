//! Binary page format.
//!
//! # Layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("SPPG")
//! 4       1     Version major
//! 5       1     Version minor
//! 6       2     Reserved
//! 8       8     base_rowid
//! 16      8     Number of lines
//! 24      8     Number of entries
//! 32      4     CRC32 checksum of payload
//! 36      4     Reserved
//! 40      ...   Payload: (lines + 1) u64 offsets, then (u32 index, f32 value) entries
//! ```
//!
//! All integers are little-endian.

use std::io::{Read, Write};

use super::{Entry, SparsePage};
use crate::error::{DataError, FormatError, Result};
use crate::stream::truncated;

pub const PAGE_MAGIC: &[u8; 4] = b"SPPG";
pub const PAGE_HEADER_SIZE: usize = 40;

const VERSION_MAJOR: u8 = 1;
const VERSION_MINOR: u8 = 0;

const ENTRY_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageHeader {
    version_major: u8,
    version_minor: u8,
    base_rowid: u64,
    num_lines: u64,
    num_entries: u64,
    checksum: u32,
}

impl PageHeader {
    fn to_bytes(self) -> [u8; PAGE_HEADER_SIZE] {
        let mut buf = [0u8; PAGE_HEADER_SIZE];
        buf[0..4].copy_from_slice(PAGE_MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[8..16].copy_from_slice(&self.base_rowid.to_le_bytes());
        buf[16..24].copy_from_slice(&self.num_lines.to_le_bytes());
        buf[24..32].copy_from_slice(&self.num_entries.to_le_bytes());
        buf[32..36].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8; PAGE_HEADER_SIZE]) -> Result<Self> {
        if &buf[0..4] != PAGE_MAGIC {
            return Err(FormatError::BadMagic { what: "sparse page" }.into());
        }
        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > VERSION_MAJOR {
            return Err(FormatError::UnsupportedVersion {
                found: format!("{version_major}.{version_minor}"),
                current: format!("{VERSION_MAJOR}.{VERSION_MINOR}"),
            }
            .into());
        }
        let u64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(b)
        };
        Ok(Self {
            version_major,
            version_minor,
            base_rowid: u64_at(8),
            num_lines: u64_at(16),
            num_entries: u64_at(24),
            checksum: u32::from_le_bytes([buf[32], buf[33], buf[34], buf[35]]),
        })
    }
}

fn encode_payload(page: &SparsePage) -> Vec<u8> {
    let mut payload = Vec::with_capacity(page.offset.len() * 8 + page.data.len() * ENTRY_SIZE);
    for &o in &page.offset {
        payload.extend_from_slice(&o.to_le_bytes());
    }
    for e in &page.data {
        payload.extend_from_slice(&e.index.to_le_bytes());
        payload.extend_from_slice(&e.fvalue.to_le_bytes());
    }
    payload
}

/// Write `page`, returning the number of bytes written.
pub fn write_page<W: Write>(w: &mut W, page: &SparsePage) -> Result<u64> {
    let payload = encode_payload(page);
    let header = PageHeader {
        version_major: VERSION_MAJOR,
        version_minor: VERSION_MINOR,
        base_rowid: page.base_rowid,
        num_lines: page.size() as u64,
        num_entries: page.data.len() as u64,
        checksum: crc32fast::hash(&payload),
    };
    w.write_all(&header.to_bytes())?;
    w.write_all(&payload)?;
    Ok((PAGE_HEADER_SIZE + payload.len()) as u64)
}

/// Read a page written by [`write_page`].
pub fn read_page<R: Read>(r: &mut R) -> Result<SparsePage> {
    let mut head = [0u8; PAGE_HEADER_SIZE];
    r.read_exact(&mut head).map_err(truncated("page header"))?;
    let header = PageHeader::from_bytes(&head)?;

    let n_offsets = usize::try_from(header.num_lines)
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or(FormatError::Truncated("page offsets"))?;
    let n_entries =
        usize::try_from(header.num_entries).map_err(|_| FormatError::Truncated("page entries"))?;
    let payload_len = n_offsets
        .checked_mul(8)
        .zip(n_entries.checked_mul(ENTRY_SIZE))
        .and_then(|(a, b)| a.checked_add(b))
        .ok_or(FormatError::Truncated("page payload"))?;

    let mut payload = Vec::new();
    r.by_ref().take(payload_len as u64).read_to_end(&mut payload)?;
    if payload.len() != payload_len {
        return Err(FormatError::Truncated("page payload").into());
    }
    let actual = crc32fast::hash(&payload);
    if actual != header.checksum {
        return Err(FormatError::ChecksumMismatch {
            expected: header.checksum,
            actual,
        }
        .into());
    }

    let (offset_bytes, entry_bytes) = payload.split_at(n_offsets * 8);
    let offset: Vec<u64> = offset_bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect();
    let data: Vec<Entry> = entry_bytes
        .chunks_exact(ENTRY_SIZE)
        .map(|c| {
            Entry::new(
                u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
            )
        })
        .collect();

    let monotone = offset.first() == Some(&0) && offset.windows(2).all(|w| w[0] <= w[1]);
    if !monotone || offset.last().copied() != Some(n_entries as u64) {
        return Err(DataError::InvalidShape(
            "page offsets must start at 0, be non-decreasing and end at the entry count".into(),
        ));
    }

    Ok(SparsePage {
        offset,
        data,
        base_rowid: header.base_rowid,
    })
}
