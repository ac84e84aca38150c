use std::io::Read;

use encoding_rs::Encoding;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metadata::{Column, Compression, FileProperties};

use super::column::ColumnMetadataBuilder;
use super::encoding::resolve_encoding;
use super::header::{Layout, SAS_MAX_SIZE, parse_header};
use super::page::{PageHeader, SubheaderKind, SubheaderPointer, classify_subheader};
use super::stream::PageStream;
use super::subheaders::{
    RowInfo, parse_column_attrs_subheader, parse_column_name_subheader,
    parse_column_size_subheader, parse_column_text_subheader, parse_format_and_label_subheader,
    parse_row_size_subheader,
};

/// Row-data pointers queued from a single page.
pub type RowPointers = SmallVec<[SubheaderPointer; 8]>;

/// Everything the metadata pass learned, plus where it left the stream.
#[derive(Debug)]
pub struct ParsedMetadata {
    pub layout: Layout,
    pub properties: FileProperties,
    pub columns: Vec<Column>,
    pub encoding: &'static Encoding,
    /// Header of the cached page when the pass stopped on a row-bearing page;
    /// `None` when the stream ran out first.
    pub current_page: Option<PageHeader>,
    /// Row-data pointers found on the cached page.
    pub queued: RowPointers,
}

/// Reads the header and every metadata page up to the first rows.
///
/// The pass ends on the first data or mix page, or on the first page that
/// queued a row-data subheader. That page stays cached in `stream` so the
/// row reader can start on it.
///
/// # Errors
///
/// Returns an error if the header is malformed or the underlying reader fails.
pub fn parse_metadata<R: Read>(
    stream: &mut PageStream<R>,
    encoding_override: Option<&'static Encoding>,
) -> Result<ParsedMetadata> {
    let header = parse_header(stream)?;
    let layout = header.layout;
    let encoding = encoding_override
        .unwrap_or_else(|| resolve_encoding(header.properties.encoding.as_deref()));

    let mut builder = ColumnMetadataBuilder::new(encoding);
    let mut info = RowInfo::default();
    let mut queued = RowPointers::new();
    let mut current_page = None;

    while stream.next_page(layout.page_length)? {
        let page_index = stream.page_index();
        let page = stream.page();
        let Some(page_header) = PageHeader::parse(page, &layout) else {
            continue;
        };
        debug!(
            page_index,
            page_type = format_args!("0x{:04X}", page_header.page_type),
            kind = ?page_header.kind,
            subheaders = page_header.subheader_count,
            "metadata pass page"
        );

        if page_header.kind.has_subheaders() {
            for_each_subheader(page, &page_header, &layout, page_index, |pointer, data| {
                match classify_subheader(data, &pointer, &layout, builder.compression()) {
                    SubheaderKind::RowSize => parse_row_size_subheader(data, &layout, &mut info),
                    SubheaderKind::ColumnSize => {
                        parse_column_size_subheader(data, &layout, &mut info);
                    }
                    SubheaderKind::ColumnText => {
                        parse_column_text_subheader(data, &layout, &mut builder);
                    }
                    SubheaderKind::ColumnName => {
                        parse_column_name_subheader(data, &layout, &mut builder);
                    }
                    SubheaderKind::ColumnAttributes => {
                        parse_column_attrs_subheader(data, &layout, &mut builder);
                    }
                    SubheaderKind::FormatAndLabel => {
                        parse_format_and_label_subheader(data, &layout, &mut builder);
                    }
                    SubheaderKind::SubheaderCounts | SubheaderKind::ColumnList => {}
                    SubheaderKind::RowData => queued.push(pointer),
                    SubheaderKind::Unknown => debug!(
                        page_index,
                        offset = pointer.offset,
                        length = pointer.length,
                        "skipping subheader with unknown signature"
                    ),
                }
            })?;
        }

        if page_header.kind.has_rows() || !queued.is_empty() {
            current_page = Some(page_header);
            break;
        }
    }

    let expected = info.declared_column_count().map_or_else(
        || {
            warn!("no column count declared; using the columns that were described");
            builder.columns().len()
        },
        |count| usize::try_from(count).unwrap_or(usize::MAX),
    );
    builder.reconcile(expected);

    let mut properties = header.properties;
    properties.row_length = info.row_length.unwrap_or_default();
    properties.row_count = info.row_count.unwrap_or_default();
    properties.mix_page_row_count = info.mix_page_row_count.unwrap_or_default();
    properties.compression = builder.compression();
    properties.file_label = info
        .label_ref
        .and_then(|label| builder.text_store().resolve(label, encoding))
        .filter(|label| !label.is_empty());
    if info.row_length.is_none() {
        warn!("row size subheader missing; the file yields no rows");
    }
    if properties.row_length > u64::from(SAS_MAX_SIZE) {
        return Err(Error::InvalidMetadata {
            details: format!("row length {} exceeds the largest page size", properties.row_length)
                .into(),
        });
    }

    let columns = builder.finish();
    properties.column_count = columns.len() as u64;

    debug!(
        columns = columns.len(),
        row_length = properties.row_length,
        row_count = properties.row_count,
        compression = ?properties.compression,
        queued = queued.len(),
        "metadata pass complete"
    );

    Ok(ParsedMetadata {
        layout,
        properties,
        columns,
        encoding,
        current_page,
        queued,
    })
}

/// Collects the row-data pointers of a page read after the metadata pass.
///
/// The schema is complete at that point, so every other subheader is skipped.
///
/// # Errors
///
/// Returns an error if a pointer field cannot be represented on this platform.
pub fn collect_row_pointers(
    page: &[u8],
    page_header: &PageHeader,
    layout: &Layout,
    compression: Compression,
    page_index: u64,
) -> Result<RowPointers> {
    let mut queued = RowPointers::new();
    if page_header.kind.has_subheaders() {
        for_each_subheader(page, page_header, layout, page_index, |pointer, data| {
            if classify_subheader(data, &pointer, layout, compression) == SubheaderKind::RowData {
                queued.push(pointer);
            }
        })?;
    }
    Ok(queued)
}

/// Walks the pointer table, handing each usable subheader to `visit`.
///
/// Truncated, empty and out-of-page pointers are skipped.
fn for_each_subheader<F>(
    page: &[u8],
    page_header: &PageHeader,
    layout: &Layout,
    page_index: u64,
    mut visit: F,
) -> Result<()>
where
    F: FnMut(SubheaderPointer, &[u8]),
{
    for index in 0..usize::from(page_header.subheader_count) {
        let Some(pointer) = SubheaderPointer::parse(page, index, layout, page_index)? else {
            warn!(
                page_index,
                index, "subheader pointer table runs past the page end"
            );
            break;
        };
        if pointer.is_truncated() || pointer.length == 0 {
            continue;
        }
        let Some(range) = pointer.range(page.len()) else {
            warn!(
                page_index,
                offset = pointer.offset,
                length = pointer.length,
                "subheader lies outside the page"
            );
            continue;
        };
        visit(pointer, &page[range]);
    }
    Ok(())
}
