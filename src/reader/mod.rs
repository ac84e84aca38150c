mod options;

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::dates::{DateFormatter, SasEpochFormatter};
use crate::error::{Error, Result};
use crate::metadata::{Column, FileProperties};
use crate::parser::decompress::{Decompressor, decompressor_for};
use crate::parser::{
    Layout, PageHeader, PageStream, RowDecoder, RowGeometry, RowSource, collect_row_pointers,
    fill_row, parse_metadata, resolve_label,
};
use crate::value::Value;

pub use options::{CharacterOutput, ReadOptions};

/// Pull-based reader over a forward-only sas7bdat byte stream.
///
/// Opening parses the header and all metadata pages; each call to
/// [`SasReader::read_next`] then materializes one row.
pub struct SasReader<R: Read> {
    stream: PageStream<R>,
    layout: Layout,
    properties: FileProperties,
    decoder: RowDecoder,
    output_columns: Vec<Column>,
    source: RowSource,
    decompressor: Option<&'static dyn Decompressor>,
    row_buffer: Vec<u8>,
    rows_read: u64,
    finished: bool,
}

impl SasReader<BufReader<File>> {
    /// Opens a sas7bdat file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its metadata cannot
    /// be parsed.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_path_with_options(path, &ReadOptions::default())
    }

    /// Opens a sas7bdat file from disk with explicit options.
    ///
    /// # Errors
    ///
    /// See [`SasReader::open_with_options`].
    pub fn open_path_with_options<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Self> {
        let file = File::open(path)?;
        Self::open_with_options(BufReader::new(file), options)
    }
}

impl<R: Read> SasReader<R> {
    /// Parses the header and metadata pages of `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed or the reader fails.
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with_options(reader, &ReadOptions::default())
    }

    /// Parses the header and metadata pages of `reader` using `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed, the encoding override is
    /// unknown, a projected column does not exist or is repeated, or the
    /// reader fails.
    pub fn open_with_options(reader: R, options: &ReadOptions) -> Result<Self> {
        let encoding_override = options
            .encoding()
            .map(|label| {
                resolve_label(label).ok_or_else(|| Error::Encoding {
                    encoding: label.to_owned().into(),
                    details: "unknown encoding label".into(),
                })
            })
            .transpose()?;

        let mut stream = PageStream::new(reader);
        let metadata = parse_metadata(&mut stream, encoding_override)?;
        let layout = metadata.layout;
        let properties = metadata.properties;

        let projection = resolve_projection(&metadata.columns, options.column_names())?;
        let output_columns = projection
            .iter()
            .map(|&index| metadata.columns[index].clone())
            .collect();
        let mut decoder = RowDecoder::new(
            metadata.columns,
            projection,
            layout.endianness,
            metadata.encoding,
            options.character_output(),
        );
        if options.convert_dates() {
            decoder.set_formatter(Some(Box::new(SasEpochFormatter)));
        }

        let row_geometry = geometry(&layout, &properties);
        let (source, finished) = match metadata.current_page {
            Some(header) => (
                RowSource::for_page(
                    &header,
                    &layout,
                    row_geometry,
                    metadata.queued,
                    properties.row_count,
                ),
                false,
            ),
            None => (RowSource::default(), true),
        };

        Ok(Self {
            stream,
            layout,
            decompressor: decompressor_for(properties.compression),
            row_buffer: Vec::with_capacity(row_geometry.row_length.min(layout.page_length)),
            properties,
            decoder,
            output_columns,
            source,
            rows_read: 0,
            finished,
        })
    }

    /// Replaces the collaborator that converts date, datetime and time cells.
    #[must_use]
    pub fn with_date_formatter<F>(mut self, formatter: F) -> Self
    where
        F: DateFormatter + 'static,
    {
        self.decoder.set_formatter(Some(Box::new(formatter)));
        self
    }

    #[must_use]
    pub const fn properties(&self) -> &FileProperties {
        &self.properties
    }

    /// Every column of the file, in schema order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        self.decoder.columns()
    }

    /// The columns each row contains, after projection.
    #[must_use]
    pub fn output_columns(&self) -> &[Column] {
        &self.output_columns
    }

    #[must_use]
    pub const fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Reads the next row.
    ///
    /// Returns `Ok(None)` once the declared row count is reached or the
    /// stream ends, whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reader fails.
    pub fn read_next(&mut self) -> Result<Option<Vec<Value<'_>>>> {
        if !self.fill_next_row()? {
            return Ok(None);
        }
        Ok(Some(self.decoder.decode(&self.row_buffer)))
    }

    fn fill_next_row(&mut self) -> Result<bool> {
        loop {
            if self.finished || self.rows_read >= self.properties.row_count {
                self.finished = true;
                return Ok(false);
            }
            if let Some(location) = self.source.next() {
                let row_length = self.row_length();
                fill_row(
                    &mut self.stream,
                    location,
                    row_length,
                    self.decompressor,
                    &mut self.row_buffer,
                )?;
                self.rows_read += 1;
                return Ok(true);
            }
            if !self.advance_page()? {
                debug!(
                    rows_read = self.rows_read,
                    declared = self.properties.row_count,
                    "stream ended before the declared row count"
                );
                self.finished = true;
                return Ok(false);
            }
        }
    }

    fn advance_page(&mut self) -> Result<bool> {
        loop {
            if !self.stream.next_page(self.layout.page_length)? {
                return Ok(false);
            }
            let page = self.stream.page();
            let Some(header) = PageHeader::parse(page, &self.layout) else {
                continue;
            };
            let page_index = self.stream.page_index();
            let queued = collect_row_pointers(
                page,
                &header,
                &self.layout,
                self.properties.compression,
                page_index,
            )?;
            let remaining = self.properties.row_count - self.rows_read;
            let row_geometry = geometry(&self.layout, &self.properties);
            self.source =
                RowSource::for_page(&header, &self.layout, row_geometry, queued, remaining);
            debug!(
                page_index,
                kind = ?header.kind,
                rows = self.source.in_page_rows(),
                "row page"
            );
            return Ok(true);
        }
    }

    fn row_length(&self) -> usize {
        geometry(&self.layout, &self.properties).row_length
    }

    /// Gives back the underlying reader, positioned after the last page read.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.stream.into_inner()
    }
}

impl<R: Read> Iterator for SasReader<R> {
    type Item = Result<Vec<Value<'static>>>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.read_next().map(|row| {
            row.map(|cells| cells.into_iter().map(Value::into_owned).collect::<Vec<_>>())
        });
        match result {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

fn geometry(layout: &Layout, properties: &FileProperties) -> RowGeometry {
    RowGeometry {
        row_length: usize::try_from(properties.row_length).unwrap_or(usize::MAX),
        mix_page_row_count: properties.mix_page_row_count,
        page_length: layout.page_length,
    }
}

/// Maps requested column names to schema indices, keeping the requested order.
fn resolve_projection(columns: &[Column], names: Option<&[String]>) -> Result<Vec<usize>> {
    let Some(names) = names else {
        return Ok((0..columns.len()).collect());
    };
    let mut seen = HashSet::with_capacity(names.len());
    names
        .iter()
        .map(|name| {
            let index = columns
                .iter()
                .position(|column| column.name == *name)
                .ok_or_else(|| Error::InvalidMetadata {
                    details: format!("unknown column '{name}' in projection").into(),
                })?;
            if !seen.insert(index) {
                return Err(Error::InvalidMetadata {
                    details: format!("duplicate column '{name}' in projection").into(),
                });
            }
            Ok(index)
        })
        .collect()
}
