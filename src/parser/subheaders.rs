use tracing::{debug, warn};

use crate::metadata::ColumnKind;

use super::byteorder::{read_u16, read_u32};
use super::column::{ColumnAttributes, ColumnMetadataBuilder, TextRef};
use super::header::Layout;

const ROW_SIZE_LABEL_BACKSET: usize = 130;
const TEXT_REF_SIZE: usize = 6;
const NAME_ENTRY_SIZE: usize = 8;

/// Row geometry collected from the row-size and column-size subheaders.
///
/// Every field keeps the first value seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowInfo {
    pub row_length: Option<u64>,
    pub row_count: Option<u64>,
    pub mix_page_row_count: Option<u64>,
    /// Column count declared by the column-size subheader.
    pub column_count: Option<u64>,
    /// Column count split across the two row-size fields; used only when no
    /// column-size subheader is present.
    pub row_size_column_count: Option<u64>,
    pub label_ref: Option<TextRef>,
}

impl RowInfo {
    #[must_use]
    pub fn declared_column_count(&self) -> Option<u64> {
        self.column_count.or(self.row_size_column_count)
    }
}

fn read_text_ref(layout: &Layout, data: &[u8], at: usize) -> Option<TextRef> {
    let endian = layout.endianness;
    Some(TextRef {
        index: read_u16(endian, data, at)?,
        offset: read_u16(endian, data, at + 2)?,
        length: read_u16(endian, data, at + 4)?,
    })
}

/// Number of fixed-size entries in a subheader whose entries start at `L + 8`
/// and which ends with `L + 4` bytes of trailer.
fn entry_count(data: &[u8], layout: &Layout, entry_size: usize) -> usize {
    data.len().saturating_sub(2 * layout.int_len() + 12) / entry_size
}

pub fn parse_row_size_subheader(data: &[u8], layout: &Layout, info: &mut RowInfo) {
    let l = layout.int_len();
    let read = |at: usize| layout.read_int(data, at);

    info.row_length = info.row_length.or_else(|| read(5 * l));
    info.row_count = info.row_count.or_else(|| read(6 * l));
    info.mix_page_row_count = info.mix_page_row_count.or_else(|| read(15 * l));
    info.row_size_column_count = info
        .row_size_column_count
        .or_else(|| read(9 * l)?.checked_add(read(10 * l)?));

    if info.label_ref.is_none()
        && data
            .len()
            .checked_sub(ROW_SIZE_LABEL_BACKSET)
            .is_some_and(|at| at >= 16 * l)
    {
        info.label_ref = read_text_ref(layout, data, data.len() - ROW_SIZE_LABEL_BACKSET);
    }

    debug!(
        row_length = ?info.row_length,
        row_count = ?info.row_count,
        mix_page_row_count = ?info.mix_page_row_count,
        "row size subheader"
    );
}

pub fn parse_column_size_subheader(data: &[u8], layout: &Layout, info: &mut RowInfo) {
    if info.column_count.is_some() {
        return;
    }
    info.column_count = layout.read_int(data, layout.int_len());
    debug!(column_count = ?info.column_count, "column size subheader");
}

pub fn parse_column_text_subheader(
    data: &[u8],
    layout: &Layout,
    builder: &mut ColumnMetadataBuilder,
) {
    let Some(block) = data.get(layout.int_len()..) else {
        warn!(length = data.len(), "column text subheader shorter than its signature");
        return;
    };
    builder.push_text_block(block);
    debug!(
        block = builder.text_store().len() - 1,
        length = block.len(),
        compression = ?builder.compression(),
        "column text subheader"
    );
}

pub fn parse_column_name_subheader(
    data: &[u8],
    layout: &Layout,
    builder: &mut ColumnMetadataBuilder,
) {
    let base = layout.int_len() + 8;
    let count = entry_count(data, layout, NAME_ENTRY_SIZE);
    for entry in 0..count {
        let Some(name_ref) = read_text_ref(layout, data, base + entry * NAME_ENTRY_SIZE) else {
            break;
        };
        builder.push_name(name_ref);
    }
    debug!(count, "column name subheader");
}

pub fn parse_column_attrs_subheader(
    data: &[u8],
    layout: &Layout,
    builder: &mut ColumnMetadataBuilder,
) {
    let l = layout.int_len();
    let entry_size = l + 8;
    let base = l + 8;
    let count = entry_count(data, layout, entry_size);
    for entry in 0..count {
        let at = base + entry * entry_size;
        let (Some(offset), Some(length), Some(&type_code)) = (
            layout.read_int(data, at),
            read_u32(layout.endianness, data, at + l),
            data.get(at + l + 6),
        ) else {
            break;
        };
        builder.push_attributes(ColumnAttributes {
            offset,
            length,
            kind: ColumnKind::from_type_code(type_code),
        });
    }
    debug!(count, "column attributes subheader");
}

pub fn parse_format_and_label_subheader(
    data: &[u8],
    layout: &Layout,
    builder: &mut ColumnMetadataBuilder,
) {
    let base = 3 * layout.int_len();
    if data.len() < base + 28 + TEXT_REF_SIZE {
        warn!(length = data.len(), "format and label subheader too short");
        return;
    }
    let endian = layout.endianness;
    let width = read_u16(endian, data, base + 8).unwrap_or_default();
    let precision = read_u16(endian, data, base + 10).unwrap_or_default();
    let format_ref = read_text_ref(layout, data, base + 22).unwrap_or(TextRef::EMPTY);
    let label_ref = read_text_ref(layout, data, base + 28).unwrap_or(TextRef::EMPTY);
    if builder.finalize_column(format_ref, label_ref, width, precision) {
        debug!(
            column = builder.columns().len(),
            width, precision, "column finalized"
        );
    }
}
