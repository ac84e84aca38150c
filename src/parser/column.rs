use encoding_rs::Encoding;
use tracing::warn;

use crate::metadata::{Column, ColumnFormat, ColumnKind, Compression};

use super::encoding::decode_text;

/// Reference into the column text blocks: block index, byte offset, length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRef {
    pub index: u16,
    pub offset: u16,
    pub length: u16,
}

impl TextRef {
    pub const EMPTY: Self = Self {
        index: 0,
        offset: 0,
        length: 0,
    };

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Raw text blocks collected from column-text subheaders, in file order.
#[derive(Debug, Default)]
pub struct TextStore {
    blobs: Vec<Vec<u8>>,
}

impl TextStore {
    #[must_use]
    pub const fn new() -> Self {
        Self { blobs: Vec::new() }
    }

    pub fn push_blob(&mut self, blob: &[u8]) {
        self.blobs.push(blob.to_vec());
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    #[must_use]
    pub fn blob(&self, index: usize) -> Option<&[u8]> {
        self.blobs.get(index).map(Vec::as_slice)
    }

    /// Resolves a reference, returning `None` if its block does not exist.
    ///
    /// Ranges running past the end of the block are cut at the block end.
    #[must_use]
    pub fn resolve(&self, text_ref: TextRef, encoding: &'static Encoding) -> Option<String> {
        if text_ref.is_empty() {
            return Some(String::new());
        }
        let blob = self.blob(usize::from(text_ref.index))?;
        let start = usize::from(text_ref.offset).min(blob.len());
        let end = (start + usize::from(text_ref.length)).min(blob.len());
        Some(decode_text(&blob[start..end], encoding).trim().to_owned())
    }

    /// Resolves a reference after pulling an out-of-range block index back
    /// to the last block.
    #[must_use]
    pub fn resolve_clamped(&self, text_ref: TextRef, encoding: &'static Encoding) -> String {
        if text_ref.is_empty() || self.is_empty() {
            return String::new();
        }
        let last = u16::try_from(self.len() - 1).unwrap_or(u16::MAX);
        let clamped = if text_ref.index > last {
            warn!(
                index = text_ref.index,
                clamped = last,
                "text reference points past the last text block"
            );
            TextRef {
                index: last,
                ..text_ref
            }
        } else {
            text_ref
        };
        self.resolve(clamped, encoding).unwrap_or_default()
    }
}

/// Per-column storage attributes from the column-attributes subheader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAttributes {
    pub offset: u64,
    pub length: u32,
    pub kind: ColumnKind,
}

/// Assembles the schema from subheaders arriving in file order.
///
/// Names and attributes accumulate in two index-aligned lists; each
/// format-and-label subheader zips the next index of both into a finished
/// [`Column`].
#[derive(Debug)]
pub struct ColumnMetadataBuilder {
    encoding: &'static Encoding,
    text_store: TextStore,
    compression: Compression,
    names: Vec<String>,
    attributes: Vec<ColumnAttributes>,
    columns: Vec<Column>,
}

impl ColumnMetadataBuilder {
    #[must_use]
    pub const fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            text_store: TextStore::new(),
            compression: Compression::None,
            names: Vec::new(),
            attributes: Vec::new(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub const fn text_store(&self) -> &TextStore {
        &self.text_store
    }

    #[must_use]
    pub const fn compression(&self) -> Compression {
        self.compression
    }

    /// Stores a text block; the first one decides the compression method.
    pub fn push_text_block(&mut self, block: &[u8]) {
        if self.text_store.is_empty() {
            self.compression = super::decompress::detect_compression(block);
        }
        self.text_store.push_blob(block);
    }

    /// Resolves and appends a column name.
    ///
    /// References to a missing block resolve to an empty name.
    pub fn push_name(&mut self, name_ref: TextRef) {
        let name = self
            .text_store
            .resolve(name_ref, self.encoding)
            .unwrap_or_else(|| {
                warn!(
                    index = name_ref.index,
                    blocks = self.text_store.len(),
                    "column name references a missing text block"
                );
                String::new()
            });
        self.names.push(name);
    }

    pub fn push_attributes(&mut self, attributes: ColumnAttributes) {
        self.attributes.push(attributes);
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn attributes(&self) -> &[ColumnAttributes] {
        &self.attributes
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Finalizes the next column with the resolved format and label.
    ///
    /// Returns `false` when no attributes exist yet for that column index.
    pub fn finalize_column(
        &mut self,
        format_ref: TextRef,
        label_ref: TextRef,
        width: u16,
        precision: u16,
    ) -> bool {
        let index = self.columns.len();
        let Some(attributes) = self.attributes.get(index).copied() else {
            warn!(
                index,
                attributes = self.attributes.len(),
                "format subheader without matching column attributes"
            );
            return false;
        };
        let format = ColumnFormat {
            name: self.text_store.resolve_clamped(format_ref, self.encoding),
            width,
            precision,
        };
        let label = self.text_store.resolve_clamped(label_ref, self.encoding);
        self.push_column(index, attributes, format, label);
        true
    }

    /// Brings the column list to `expected` entries.
    ///
    /// Columns whose format subheader never arrived are built from the name
    /// and attribute lists with an empty format and label; extra columns
    /// beyond the declared count are dropped.
    pub fn reconcile(&mut self, expected: usize) {
        if self.columns.len() > expected {
            warn!(
                finalized = self.columns.len(),
                expected, "dropping columns beyond the declared column count"
            );
            self.columns.truncate(expected);
            return;
        }
        if self.columns.len() < expected {
            warn!(
                finalized = self.columns.len(),
                expected, "completing columns that lack a format subheader"
            );
        }
        while self.columns.len() < expected {
            let index = self.columns.len();
            let Some(attributes) = self.attributes.get(index).copied() else {
                warn!(
                    index,
                    "column attributes missing; schema is shorter than declared"
                );
                break;
            };
            self.push_column(index, attributes, ColumnFormat::default(), String::new());
        }
    }

    fn push_column(
        &mut self,
        index: usize,
        attributes: ColumnAttributes,
        format: ColumnFormat,
        label: String,
    ) {
        let name = self.names.get(index).cloned().unwrap_or_default();
        self.columns.push(Column {
            id: u32::try_from(index + 1).unwrap_or(u32::MAX),
            name,
            label,
            format,
            kind: attributes.kind,
            offset: attributes.offset,
            length: attributes.length,
        });
    }

    #[must_use]
    pub fn finish(self) -> Vec<Column> {
        self.columns
    }
}
