use std::borrow::Cow;

use crate::error::{Error, Result, Section};
use crate::metadata::{Bitness, Compression};

use super::byteorder::{read_u16, read_u32, read_u64};
use super::header::Layout;

pub const SAS_PAGE_TYPE_META: u16 = 0x0000;
pub const SAS_PAGE_TYPE_DATA: u16 = 0x0100;
pub const SAS_PAGE_TYPE_MIX: u16 = 0x0200;
pub const SAS_PAGE_TYPE_AMD: u16 = 0x0400;
pub const SAS_PAGE_TYPE_META2: u16 = 0x4000;
pub const SAS_PAGE_TYPE_COMP: u16 = 0x9000;
pub const SAS_PAGE_TYPE_MASK: u16 = 0x0F00;

pub const SAS_COMPRESSION_NONE: u8 = 0x00;
pub const SAS_COMPRESSION_TRUNC: u8 = 0x01;
pub const SAS_COMPRESSION_ROW: u8 = 0x04;
pub const SAS_SUBHEADER_TYPE_ROW_DATA: u8 = 0x01;

const SAS_SUBHEADER_SIGNATURE_ROW_SIZE: u32 = 0xF7F7_F7F7;
const SAS_SUBHEADER_SIGNATURE_COLUMN_SIZE: u32 = 0xF6F6_F6F6;
const SAS_SUBHEADER_SIGNATURE_COUNTS: u32 = 0xFFFF_FC00;
const SAS_SUBHEADER_SIGNATURE_COLUMN_TEXT: u32 = 0xFFFF_FFFD;
const SAS_SUBHEADER_SIGNATURE_COLUMN_NAME: u32 = 0xFFFF_FFFF;
const SAS_SUBHEADER_SIGNATURE_COLUMN_ATTRS: u32 = 0xFFFF_FFFC;
const SAS_SUBHEADER_SIGNATURE_COLUMN_FORMAT: u32 = 0xFFFF_FBFE;
const SAS_SUBHEADER_SIGNATURE_COLUMN_LIST: u32 = 0xFFFF_FFFE;

/// Kind of record a subheader pointer refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubheaderKind {
    RowSize,
    ColumnSize,
    SubheaderCounts,
    ColumnText,
    ColumnName,
    ColumnAttributes,
    FormatAndLabel,
    ColumnList,
    RowData,
    Unknown,
}

const SIGNATURES_32: [(u32, SubheaderKind); 8] = [
    (SAS_SUBHEADER_SIGNATURE_ROW_SIZE, SubheaderKind::RowSize),
    (SAS_SUBHEADER_SIGNATURE_COLUMN_SIZE, SubheaderKind::ColumnSize),
    (SAS_SUBHEADER_SIGNATURE_COUNTS, SubheaderKind::SubheaderCounts),
    (SAS_SUBHEADER_SIGNATURE_COLUMN_TEXT, SubheaderKind::ColumnText),
    (SAS_SUBHEADER_SIGNATURE_COLUMN_NAME, SubheaderKind::ColumnName),
    (SAS_SUBHEADER_SIGNATURE_COLUMN_ATTRS, SubheaderKind::ColumnAttributes),
    (SAS_SUBHEADER_SIGNATURE_COLUMN_FORMAT, SubheaderKind::FormatAndLabel),
    (SAS_SUBHEADER_SIGNATURE_COLUMN_LIST, SubheaderKind::ColumnList),
];

const fn widen(signature: u32) -> u64 {
    0xFFFF_FFFF_0000_0000 | signature as u64
}

// Row-size and column-size keep their 32-bit pattern in either half of the
// 8-byte field depending on the producer's byte order.
const SIGNATURES_64: [(u64, SubheaderKind); 10] = [
    (SAS_SUBHEADER_SIGNATURE_ROW_SIZE as u64, SubheaderKind::RowSize),
    ((SAS_SUBHEADER_SIGNATURE_ROW_SIZE as u64) << 32, SubheaderKind::RowSize),
    (SAS_SUBHEADER_SIGNATURE_COLUMN_SIZE as u64, SubheaderKind::ColumnSize),
    ((SAS_SUBHEADER_SIGNATURE_COLUMN_SIZE as u64) << 32, SubheaderKind::ColumnSize),
    (widen(SAS_SUBHEADER_SIGNATURE_COUNTS), SubheaderKind::SubheaderCounts),
    (widen(SAS_SUBHEADER_SIGNATURE_COLUMN_TEXT), SubheaderKind::ColumnText),
    (widen(SAS_SUBHEADER_SIGNATURE_COLUMN_NAME), SubheaderKind::ColumnName),
    (widen(SAS_SUBHEADER_SIGNATURE_COLUMN_ATTRS), SubheaderKind::ColumnAttributes),
    (widen(SAS_SUBHEADER_SIGNATURE_COLUMN_FORMAT), SubheaderKind::FormatAndLabel),
    (widen(SAS_SUBHEADER_SIGNATURE_COLUMN_LIST), SubheaderKind::ColumnList),
];

/// Page categories relevant to row extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Metadata only (meta, meta2 and AMD pages).
    Meta,
    /// Rows only.
    Data,
    /// Metadata subheaders followed by rows.
    Mix,
    /// Anything else; read and skipped.
    Other,
}

#[must_use]
pub const fn classify_page(page_type: u16) -> PageKind {
    if page_type & SAS_PAGE_TYPE_COMP == SAS_PAGE_TYPE_COMP {
        return PageKind::Other;
    }
    if page_type & SAS_PAGE_TYPE_META2 != 0 {
        return PageKind::Meta;
    }
    match page_type & SAS_PAGE_TYPE_MASK {
        SAS_PAGE_TYPE_META | SAS_PAGE_TYPE_AMD => PageKind::Meta,
        SAS_PAGE_TYPE_DATA => PageKind::Data,
        SAS_PAGE_TYPE_MIX => PageKind::Mix,
        _ => PageKind::Other,
    }
}

impl PageKind {
    #[must_use]
    pub const fn has_subheaders(self) -> bool {
        matches!(self, Self::Meta | Self::Mix)
    }

    #[must_use]
    pub const fn has_rows(self) -> bool {
        matches!(self, Self::Data | Self::Mix)
    }
}

/// Fields read from the start of every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: u16,
    pub kind: PageKind,
    pub block_count: u16,
    pub subheader_count: u16,
}

impl PageHeader {
    #[must_use]
    pub fn parse(page: &[u8], layout: &Layout) -> Option<Self> {
        let base = layout.bit_offset();
        let endian = layout.endianness;
        let page_type = read_u16(endian, page, base)?;
        Some(Self {
            page_type,
            kind: classify_page(page_type),
            block_count: read_u16(endian, page, base + 2)?,
            subheader_count: read_u16(endian, page, base + 4)?,
        })
    }

    /// Offset just past the subheader pointer table.
    #[must_use]
    pub const fn pointer_table_end(&self, layout: &Layout) -> usize {
        layout.page_header_size() + self.subheader_count as usize * layout.pointer_size()
    }
}

/// Location and tags of one subheader within a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubheaderPointer {
    pub offset: usize,
    pub length: usize,
    pub compression: u8,
    pub subheader_type: u8,
}

impl SubheaderPointer {
    /// Parses the `index`-th pointer of the page's pointer table.
    ///
    /// Returns `Ok(None)` when the pointer lies outside the page.
    ///
    /// # Errors
    ///
    /// Returns an error when a 64-bit offset or length does not fit the
    /// platform's address width.
    pub fn parse(
        page: &[u8],
        index: usize,
        layout: &Layout,
        page_index: u64,
    ) -> Result<Option<Self>> {
        let int_len = layout.int_len();
        let start = layout.page_header_size() + index * layout.pointer_size();
        let (Some(offset), Some(length)) = (
            layout.read_int(page, start),
            layout.read_int(page, start + int_len),
        ) else {
            return Ok(None);
        };
        let (Some(&compression), Some(&subheader_type)) = (
            page.get(start + 2 * int_len),
            page.get(start + 2 * int_len + 1),
        ) else {
            return Ok(None);
        };
        let to_usize = |value: u64| {
            usize::try_from(value).map_err(|_| Error::Corrupted {
                section: Section::Subheader { page_index },
                details: Cow::from(format!(
                    "pointer field {value} exceeds platform pointer width"
                )),
            })
        };
        Ok(Some(Self {
            offset: to_usize(offset)?,
            length: to_usize(length)?,
            compression,
            subheader_type,
        }))
    }

    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.compression == SAS_COMPRESSION_TRUNC
    }

    /// Byte range of the subheader within the page, if it fits.
    #[must_use]
    pub fn range(&self, page_len: usize) -> Option<std::ops::Range<usize>> {
        let end = self.offset.checked_add(self.length)?;
        (self.length > 0 && end <= page_len).then_some(self.offset..end)
    }
}

/// Matches a signature against the table for the file's bitness.
#[must_use]
pub fn signature_kind(data: &[u8], layout: &Layout) -> SubheaderKind {
    let endian = layout.endianness;
    let found = match layout.bitness {
        Bitness::Bits32 => read_u32(endian, data, 0).and_then(|signature| {
            SIGNATURES_32
                .iter()
                .find(|(known, _)| *known == signature)
                .map(|(_, kind)| *kind)
        }),
        Bitness::Bits64 => read_u64(endian, data, 0).and_then(|signature| {
            SIGNATURES_64
                .iter()
                .find(|(known, _)| *known == signature)
                .map(|(_, kind)| *kind)
        }),
    };
    found.unwrap_or(SubheaderKind::Unknown)
}

/// Identifies a subheader from its signature and pointer tags.
///
/// An unrecognised signature on a pointer tagged as row data in a compressed
/// file is a compressed (or stored) row.
#[must_use]
pub fn classify_subheader(
    data: &[u8],
    pointer: &SubheaderPointer,
    layout: &Layout,
    compression: Compression,
) -> SubheaderKind {
    match signature_kind(data, layout) {
        SubheaderKind::Unknown
            if compression != Compression::None
                && pointer.subheader_type == SAS_SUBHEADER_TYPE_ROW_DATA
                && matches!(
                    pointer.compression,
                    SAS_COMPRESSION_ROW | SAS_COMPRESSION_NONE
                ) =>
        {
            SubheaderKind::RowData
        }
        kind => kind,
    }
}
