use std::borrow::Cow;
use std::io::Read;

use encoding_rs::Encoding;

use crate::dates::{DateFormatter, TemporalKind, temporal_kind};
use crate::error::Result;
use crate::metadata::{Column, ColumnKind, Endianness};
use crate::reader::CharacterOutput;
use crate::value::{MissingValue, Value};

use super::byteorder::field;
use super::decompress::Decompressor;
use super::encoding::{decode_text, trim_trailing};
use super::header::Layout;
use super::meta::RowPointers;
use super::numeric::{Numeric, decode_numeric};
use super::page::{PageHeader, PageKind, SubheaderPointer};
use super::stream::PageStream;

/// Where the next row of the current page is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLocation {
    /// A row-data subheader, possibly compressed.
    Pointer(SubheaderPointer),
    /// A fixed-width row at this page offset.
    InPage(usize),
}

/// Page geometry needed to lay out in-page rows.
#[derive(Debug, Clone, Copy)]
pub struct RowGeometry {
    pub row_length: usize,
    pub mix_page_row_count: u64,
    pub page_length: usize,
}

/// Cursor over the rows of one page: queued subheader rows first, then
/// positional rows of data and mix pages.
#[derive(Debug, Default)]
pub struct RowSource {
    queued: RowPointers,
    next_queued: usize,
    in_page_start: usize,
    in_page_rows: usize,
    next_in_page: usize,
    row_length: usize,
}

impl RowSource {
    /// Builds the cursor for a freshly cached page.
    ///
    /// `rows_remaining` caps the number of rows taken from the page.
    #[must_use]
    pub fn for_page(
        header: &PageHeader,
        layout: &Layout,
        geometry: RowGeometry,
        queued: RowPointers,
        rows_remaining: u64,
    ) -> Self {
        let owed_in_page = rows_remaining.saturating_sub(queued.len() as u64);
        let table_end = header.pointer_table_end(layout);
        let (start, declared) = match header.kind {
            PageKind::Data => (table_end, u64::from(header.block_count)),
            PageKind::Mix => (
                table_end.next_multiple_of(8),
                geometry.mix_page_row_count,
            ),
            PageKind::Meta | PageKind::Other => (table_end, 0),
        };
        let fits = if geometry.row_length == 0 {
            0
        } else {
            geometry.page_length.saturating_sub(start) / geometry.row_length
        };
        let rows = declared.min(owed_in_page).min(fits as u64);
        Self {
            queued,
            next_queued: 0,
            in_page_start: start,
            in_page_rows: usize::try_from(rows).unwrap_or(usize::MAX),
            next_in_page: 0,
            row_length: geometry.row_length,
        }
    }

    #[must_use]
    pub const fn in_page_rows(&self) -> usize {
        self.in_page_rows
    }
}

impl Iterator for RowSource {
    type Item = RowLocation;

    fn next(&mut self) -> Option<RowLocation> {
        if let Some(pointer) = self.queued.get(self.next_queued) {
            self.next_queued += 1;
            return Some(RowLocation::Pointer(*pointer));
        }
        if self.next_in_page < self.in_page_rows {
            let offset = self.in_page_start + self.next_in_page * self.row_length;
            self.next_in_page += 1;
            return Some(RowLocation::InPage(offset));
        }
        None
    }
}

/// Copies the row at `location` of the cached page into `out`,
/// decompressing when needed.
///
/// `out` always ends up exactly `row_length` bytes long.
///
/// # Errors
///
/// Propagates errors from [`PageStream::read_at`].
pub fn fill_row<R: Read>(
    stream: &mut PageStream<R>,
    location: RowLocation,
    row_length: usize,
    decompressor: Option<&dyn Decompressor>,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.clear();
    let offset = match location {
        RowLocation::Pointer(pointer) => {
            if pointer.length < row_length
                && let Some(codec) = decompressor
            {
                let row = stream
                    .read_at(pointer.offset, pointer.length)?
                    .map(|window| codec.decompress(&window, 0, window.len(), row_length));
                // A window running past the page end is clamped by the codec.
                let row = row.unwrap_or_else(|| {
                    codec.decompress(stream.page(), pointer.offset, pointer.length, row_length)
                });
                out.extend_from_slice(&row);
                out.resize(row_length, 0);
                return Ok(());
            }
            pointer.offset
        }
        RowLocation::InPage(offset) => offset,
    };
    if let Some(bytes) = stream.read_at(offset, row_length)? {
        out.extend_from_slice(&bytes);
        return Ok(());
    }
    let page = stream.page();
    out.extend_from_slice(&page[offset.min(page.len())..]);
    out.resize(row_length, 0);
    Ok(())
}

/// Turns row bytes into typed cells following the column schema.
pub struct RowDecoder {
    columns: Vec<Column>,
    temporal: Vec<Option<TemporalKind>>,
    projection: Vec<usize>,
    stop: usize,
    endianness: Endianness,
    encoding: &'static Encoding,
    character_output: CharacterOutput,
    formatter: Option<Box<dyn DateFormatter>>,
}

impl RowDecoder {
    /// Creates a decoder emitting the columns at `projection`, in that order.
    #[must_use]
    pub fn new(
        columns: Vec<Column>,
        projection: Vec<usize>,
        endianness: Endianness,
        encoding: &'static Encoding,
        character_output: CharacterOutput,
    ) -> Self {
        let temporal = columns
            .iter()
            .map(|column| match column.kind {
                ColumnKind::Numeric => temporal_kind(&column.format.name),
                ColumnKind::Character => None,
            })
            .collect();
        // A zero-length column ends the meaningful part of the row.
        let stop = columns
            .iter()
            .position(|column| column.length == 0)
            .unwrap_or(columns.len());
        Self {
            columns,
            temporal,
            projection,
            stop,
            endianness,
            encoding,
            character_output,
            formatter: None,
        }
    }

    /// Installs the collaborator used for date, datetime and time columns.
    ///
    /// Without one, temporal columns decode as plain numbers.
    pub fn set_formatter(&mut self, formatter: Option<Box<dyn DateFormatter>>) {
        self.formatter = formatter;
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn decode<'r>(&self, row: &'r [u8]) -> Vec<Value<'r>> {
        self.projection
            .iter()
            .map(|&index| self.decode_cell(index, row))
            .collect()
    }

    fn decode_cell<'r>(&self, index: usize, row: &'r [u8]) -> Value<'r> {
        if index >= self.stop {
            return Value::Missing(MissingValue::System);
        }
        let column = &self.columns[index];
        let (Ok(offset), Ok(length)) = (
            usize::try_from(column.offset),
            usize::try_from(column.length),
        ) else {
            return Value::Missing(MissingValue::System);
        };
        let Some(slice) = field(row, offset, length) else {
            return Value::Missing(MissingValue::System);
        };
        match column.kind {
            ColumnKind::Numeric => self.decode_numeric_cell(index, slice),
            ColumnKind::Character => {
                let trimmed = trim_trailing(slice);
                match self.character_output {
                    CharacterOutput::Text => Value::Str(decode_text(trimmed, self.encoding)),
                    CharacterOutput::Bytes => Value::Bytes(Cow::Borrowed(trimmed)),
                }
            }
        }
    }

    fn decode_numeric_cell(&self, index: usize, slice: &[u8]) -> Value<'static> {
        let numeric = decode_numeric(slice, self.endianness);
        let raw = match numeric {
            Numeric::Missing(missing) => return Value::Missing(missing),
            Numeric::Short(value) => return Value::Int16(value),
            #[allow(clippy::cast_precision_loss)]
            Numeric::Integer(value) => value as f64,
            Numeric::Float(value) => value,
        };
        if let (Some(kind), Some(formatter)) = (self.temporal[index], self.formatter.as_deref())
            && let Some(value) = formatter.format(raw, &self.columns[index].format, kind)
        {
            return value;
        }
        match numeric {
            Numeric::Integer(value) => Value::Int64(value),
            _ => Value::Float(raw),
        }
    }
}
