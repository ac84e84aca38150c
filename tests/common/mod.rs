//! In-memory writer for small synthetic sas7bdat files.
#![allow(dead_code)]

pub const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

pub const HEADER_LENGTH: usize = 1024;
pub const PAGE_LENGTH: usize = 4096;

const PAGE_META: u16 = 0x0000;
const PAGE_DATA: u16 = 0x0100;
const PAGE_MIX: u16 = 0x0200;
const PAGE_COMP: u16 = 0x9000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Numeric,
    Character,
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: Kind,
    pub length: u32,
    pub format: String,
    pub label: String,
}

impl ColumnSpec {
    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: Kind::Numeric,
            length: 8,
            format: String::new(),
            label: String::new(),
        }
    }

    pub fn character(name: &str, length: u32) -> Self {
        Self {
            name: name.to_owned(),
            kind: Kind::Character,
            length,
            format: String::new(),
            label: String::new(),
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = format.to_owned();
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Num(f64),
    /// Raw bits for numeric cells, e.g. tagged missing values.
    Bits(u64),
    Text(String),
    /// Character cell bytes written as-is, blank padded.
    Raw(Vec<u8>),
}

pub fn num(value: f64) -> Cell {
    Cell::Num(value)
}

pub fn text(value: &str) -> Cell {
    Cell::Text(value.to_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Char,
    Bin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Rows on data pages following the metadata page.
    DataPages { rows_per_page: usize },
    /// Rows after the subheaders of a single mix page.
    MixPage,
    /// The first `mix_rows` rows on the mix page, the rest on data pages.
    MixThenData {
        mix_rows: usize,
        rows_per_page: usize,
    },
    /// Compressed row-data subheaders on the metadata page.
    Compressed(Codec),
}

#[derive(Debug, Clone)]
pub struct Fixture {
    pub bits64: bool,
    pub big_endian: bool,
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<Cell>>,
    pub storage: Storage,
    pub file_label: Option<String>,
    /// Row count written to the row-size subheader; defaults to the real count.
    pub declared_rows: Option<u64>,
    /// Follow every data page with a page of an unhandled type.
    pub other_pages: bool,
    /// Add a subheader with an unrecognised signature to the metadata page.
    pub unknown_subheader: bool,
}

impl Fixture {
    pub fn new(columns: Vec<ColumnSpec>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            bits64: false,
            big_endian: false,
            columns,
            rows,
            storage: Storage::DataPages { rows_per_page: 64 },
            file_label: None,
            declared_rows: None,
            other_pages: false,
            unknown_subheader: false,
        }
    }

    pub fn bits64(mut self, bits64: bool) -> Self {
        self.bits64 = bits64;
        self
    }

    pub fn big_endian(mut self, big: bool) -> Self {
        self.big_endian = big;
        self
    }

    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn file_label(mut self, label: &str) -> Self {
        self.file_label = Some(label.to_owned());
        self
    }

    pub fn declared_rows(mut self, rows: u64) -> Self {
        self.declared_rows = Some(rows);
        self
    }

    pub fn other_pages(mut self, enabled: bool) -> Self {
        self.other_pages = enabled;
        self
    }

    pub fn unknown_subheader(mut self, enabled: bool) -> Self {
        self.unknown_subheader = enabled;
        self
    }

    pub fn row_length(&self) -> usize {
        self.columns.iter().map(|c| c.length as usize).sum()
    }

    pub fn build(&self) -> Vec<u8> {
        Writer::new(self).build()
    }
}

struct Writer<'a> {
    fixture: &'a Fixture,
    int_len: usize,
}

struct Subheader {
    body: Vec<u8>,
    compression: u8,
    kind: u8,
}

impl<'a> Writer<'a> {
    fn new(fixture: &'a Fixture) -> Self {
        Self {
            fixture,
            int_len: if fixture.bits64 { 8 } else { 4 },
        }
    }

    fn bit_offset(&self) -> usize {
        if self.fixture.bits64 { 32 } else { 16 }
    }

    fn pointer_size(&self) -> usize {
        if self.fixture.bits64 { 24 } else { 12 }
    }

    fn put_u16(&self, buf: &mut [u8], at: usize, value: u16) {
        let raw = if self.fixture.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        buf[at..at + 2].copy_from_slice(&raw);
    }

    fn put_u32(&self, buf: &mut [u8], at: usize, value: u32) {
        let raw = if self.fixture.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        buf[at..at + 4].copy_from_slice(&raw);
    }

    fn put_u64(&self, buf: &mut [u8], at: usize, value: u64) {
        let raw = if self.fixture.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        buf[at..at + 8].copy_from_slice(&raw);
    }

    fn put_int(&self, buf: &mut [u8], at: usize, value: u64) {
        if self.fixture.bits64 {
            self.put_u64(buf, at, value);
        } else {
            self.put_u32(buf, at, u32::try_from(value).unwrap());
        }
    }

    fn put_ref(&self, buf: &mut [u8], at: usize, text_ref: (u16, u16, u16)) {
        self.put_u16(buf, at, text_ref.0);
        self.put_u16(buf, at + 2, text_ref.1);
        self.put_u16(buf, at + 4, text_ref.2);
    }

    fn put_signature(&self, buf: &mut [u8], signature: u32) {
        if self.fixture.bits64 {
            let wide = if signature >> 24 == 0xFF {
                0xFFFF_FFFF_0000_0000 | u64::from(signature)
            } else {
                u64::from(signature)
            };
            self.put_u64(buf, 0, wide);
        } else {
            self.put_u32(buf, 0, signature);
        }
    }

    fn build(&self) -> Vec<u8> {
        let mut file = self.header();
        let rows: Vec<Vec<u8>> = self.fixture.rows.iter().map(|r| self.encode_row(r)).collect();
        let mut subheaders = self.schema_subheaders();

        if self.fixture.unknown_subheader {
            let mut body = vec![0xABu8; 4 * self.int_len];
            self.put_signature(&mut body, 0x1234_5678);
            subheaders.insert(
                1,
                Subheader {
                    body,
                    compression: 0,
                    kind: 0,
                },
            );
        }

        match self.fixture.storage {
            Storage::DataPages { rows_per_page } => {
                file.extend(self.meta_page(PAGE_META, &subheaders, &[]));
                file.extend(self.data_pages(&rows, rows_per_page));
            }
            Storage::MixPage => {
                file.extend(self.meta_page(PAGE_MIX, &subheaders, &rows));
            }
            Storage::MixThenData {
                mix_rows,
                rows_per_page,
            } => {
                let (mix, rest) = rows.split_at(mix_rows.min(rows.len()));
                file.extend(self.meta_page(PAGE_MIX, &subheaders, mix));
                file.extend(self.data_pages(rest, rows_per_page));
            }
            Storage::Compressed(codec) => {
                for row in &rows {
                    let packed = match codec {
                        Codec::Char => compress_char(row),
                        Codec::Bin => compress_bin(row),
                    };
                    if packed.len() < row.len() {
                        subheaders.push(Subheader {
                            body: packed,
                            compression: 4,
                            kind: 1,
                        });
                    } else {
                        subheaders.push(Subheader {
                            body: row.clone(),
                            compression: 0,
                            kind: 1,
                        });
                    }
                }
                file.extend(self.meta_page(PAGE_META, &subheaders, &[]));
            }
        }
        file
    }

    fn header(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LENGTH];
        let align2 = if self.fixture.bits64 { 4 } else { 0 };
        bytes[..32].copy_from_slice(&MAGIC);
        bytes[32] = if self.fixture.bits64 { 0x33 } else { 0x22 };
        bytes[35] = 0x22;
        bytes[37] = u8::from(!self.fixture.big_endian);
        bytes[39] = b'1';
        bytes[70] = 20;
        bytes[92..99].copy_from_slice(b"FIXTURE");
        bytes[156..164].copy_from_slice(b"DATA    ");
        self.put_u32(&mut bytes, 196, u32::try_from(HEADER_LENGTH).unwrap());
        self.put_u32(&mut bytes, 200, u32::try_from(PAGE_LENGTH).unwrap());
        let pages = self.page_count();
        if self.fixture.bits64 {
            self.put_u64(&mut bytes, 204, pages);
        } else {
            self.put_u32(&mut bytes, 204, u32::try_from(pages).unwrap());
        }
        bytes[216 + align2..224 + align2].copy_from_slice(b"9.0401M6");
        bytes[272 + align2..277 + align2].copy_from_slice(b"Linux");
        bytes
    }

    fn page_count(&self) -> u64 {
        let rows = self.fixture.rows.len();
        let data = match self.fixture.storage {
            Storage::DataPages { rows_per_page } => rows.div_ceil(rows_per_page.max(1)),
            Storage::MixThenData {
                mix_rows,
                rows_per_page,
            } => rows.saturating_sub(mix_rows).div_ceil(rows_per_page.max(1)),
            _ => 0,
        };
        let other = if self.fixture.other_pages { data } else { 0 };
        1 + (data + other) as u64
    }

    fn encode_row(&self, cells: &[Cell]) -> Vec<u8> {
        let mut row = Vec::with_capacity(self.fixture.row_length());
        for (column, cell) in self.fixture.columns.iter().zip(cells) {
            let len = column.length as usize;
            let mut field = vec![0u8; len];
            match cell {
                Cell::Num(value) => self.put_numeric(&mut field, value.to_bits()),
                Cell::Bits(bits) => self.put_numeric(&mut field, *bits),
                Cell::Text(value) => put_text(&mut field, value.as_bytes()),
                Cell::Raw(value) => put_text(&mut field, value),
            }
            row.extend(field);
        }
        row
    }

    /// Writes the most significant `field.len()` bytes of a double.
    fn put_numeric(&self, field: &mut [u8], bits: u64) {
        let len = field.len();
        if self.fixture.big_endian {
            field.copy_from_slice(&bits.to_be_bytes()[..len]);
        } else {
            field.copy_from_slice(&bits.to_le_bytes()[8 - len..]);
        }
    }

    fn schema_subheaders(&self) -> Vec<Subheader> {
        let l = self.int_len;
        let fixture = self.fixture;
        let n = fixture.columns.len();

        // Text block: 8-byte prefix, optional codec literal, then strings.
        let mut block = vec![0u8; 8];
        match fixture.storage {
            Storage::Compressed(Codec::Char) => block.extend_from_slice(b"SASYZCRL"),
            Storage::Compressed(Codec::Bin) => block.extend_from_slice(b"SASYZCR2"),
            _ => {}
        }
        let mut add_text = |value: &str| -> (u16, u16, u16) {
            if value.is_empty() {
                return (0, 0, 0);
            }
            let offset = block.len();
            block.extend_from_slice(value.as_bytes());
            while block.len() % 4 != 0 {
                block.push(b' ');
            }
            (
                0,
                u16::try_from(offset).unwrap(),
                u16::try_from(value.len()).unwrap(),
            )
        };
        let name_refs: Vec<_> = fixture.columns.iter().map(|c| add_text(&c.name)).collect();
        let format_refs: Vec<_> = fixture.columns.iter().map(|c| add_text(&c.format)).collect();
        let label_refs: Vec<_> = fixture.columns.iter().map(|c| add_text(&c.label)).collect();
        let file_label_ref = fixture.file_label.as_deref().map(&mut add_text);
        let block_len = u16::try_from(block.len()).unwrap();
        self.put_u16(&mut block, 0, block_len);

        let mut out = Vec::new();

        let row_size_len = 16 * l + 136;
        let mut row_size = vec![0u8; row_size_len];
        self.put_signature(&mut row_size, 0xF7F7_F7F7);
        self.put_int(&mut row_size, 5 * l, fixture.row_length() as u64);
        let declared = fixture.declared_rows.unwrap_or(fixture.rows.len() as u64);
        self.put_int(&mut row_size, 6 * l, declared);
        self.put_int(&mut row_size, 9 * l, n as u64);
        let mix_rows = match fixture.storage {
            Storage::MixPage => fixture.rows.len() as u64,
            Storage::MixThenData { mix_rows, .. } => mix_rows as u64,
            _ => 0,
        };
        self.put_int(&mut row_size, 15 * l, mix_rows);
        if let Some(label_ref) = file_label_ref {
            self.put_ref(&mut row_size, row_size_len - 130, label_ref);
        }
        out.push(Subheader {
            body: row_size,
            compression: 0,
            kind: 0,
        });

        let mut column_size = vec![0u8; 3 * l];
        self.put_signature(&mut column_size, 0xF6F6_F6F6);
        self.put_int(&mut column_size, l, n as u64);
        out.push(Subheader {
            body: column_size,
            compression: 0,
            kind: 0,
        });

        let mut text_sub = vec![0u8; l];
        self.put_signature(&mut text_sub, 0xFFFF_FFFD);
        text_sub.extend_from_slice(&block);
        out.push(Subheader {
            body: text_sub,
            compression: 0,
            kind: 0,
        });

        let mut names = vec![0u8; 2 * l + 12 + 8 * n];
        self.put_signature(&mut names, 0xFFFF_FFFF);
        for (i, name_ref) in name_refs.iter().enumerate() {
            self.put_ref(&mut names, l + 8 + i * 8, *name_ref);
        }
        out.push(Subheader {
            body: names,
            compression: 0,
            kind: 0,
        });

        let mut attrs = vec![0u8; 2 * l + 12 + n * (l + 8)];
        self.put_signature(&mut attrs, 0xFFFF_FFFC);
        let mut offset = 0u64;
        for (i, column) in fixture.columns.iter().enumerate() {
            let at = l + 8 + i * (l + 8);
            self.put_int(&mut attrs, at, offset);
            self.put_u32(&mut attrs, at + l, column.length);
            attrs[at + l + 6] = match column.kind {
                Kind::Numeric => 1,
                Kind::Character => 2,
            };
            offset += u64::from(column.length);
        }
        out.push(Subheader {
            body: attrs,
            compression: 0,
            kind: 0,
        });

        for i in 0..n {
            let mut format = vec![0u8; 3 * l + 34];
            self.put_signature(&mut format, 0xFFFF_FBFE);
            self.put_u16(&mut format, 3 * l + 8, 9);
            self.put_u16(&mut format, 3 * l + 10, 0);
            self.put_ref(&mut format, 3 * l + 22, format_refs[i]);
            self.put_ref(&mut format, 3 * l + 28, label_refs[i]);
            out.push(Subheader {
                body: format,
                compression: 0,
                kind: 0,
            });
        }
        out
    }

    fn page_prefix(&self, page: &mut [u8], page_type: u16, block_count: u16, subheaders: u16) {
        let base = self.bit_offset();
        self.put_u16(page, base, page_type);
        self.put_u16(page, base + 2, block_count);
        self.put_u16(page, base + 4, subheaders);
    }

    /// Metadata page with subheader bodies packed against the page end.
    fn meta_page(&self, page_type: u16, subheaders: &[Subheader], rows: &[Vec<u8>]) -> Vec<u8> {
        let mut page = vec![0u8; PAGE_LENGTH];
        let count = u16::try_from(subheaders.len()).unwrap();
        let row_count = u16::try_from(rows.len()).unwrap();
        self.page_prefix(&mut page, page_type, count + row_count, count);

        let l = self.int_len;
        let mut end = PAGE_LENGTH;
        for (i, subheader) in subheaders.iter().enumerate() {
            let start = end - subheader.body.len();
            page[start..end].copy_from_slice(&subheader.body);
            let at = self.bit_offset() + 8 + i * self.pointer_size();
            self.put_int(&mut page, at, start as u64);
            self.put_int(&mut page, at + l, subheader.body.len() as u64);
            page[at + 2 * l] = subheader.compression;
            page[at + 2 * l + 1] = subheader.kind;
            end = start;
        }

        let table_end = self.bit_offset() + 8 + subheaders.len() * self.pointer_size();
        let mut row_at = table_end.next_multiple_of(8);
        for row in rows {
            page[row_at..row_at + row.len()].copy_from_slice(row);
            row_at += row.len();
        }
        assert!(row_at <= end, "fixture rows overlap subheaders");
        page
    }

    fn data_pages(&self, rows: &[Vec<u8>], rows_per_page: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in rows.chunks(rows_per_page.max(1)) {
            out.extend(self.data_page(chunk));
            if self.fixture.other_pages {
                out.extend(self.other_page());
            }
        }
        out
    }

    /// A page of a type the reader skips, with junk where rows would sit.
    fn other_page(&self) -> Vec<u8> {
        let mut page = vec![0x5Au8; PAGE_LENGTH];
        self.page_prefix(&mut page, PAGE_COMP, 3, 0);
        page
    }

    fn data_page(&self, rows: &[Vec<u8>]) -> Vec<u8> {
        let mut page = vec![0u8; PAGE_LENGTH];
        self.page_prefix(&mut page, PAGE_DATA, u16::try_from(rows.len()).unwrap(), 0);
        let mut at = self.bit_offset() + 8;
        for row in rows {
            page[at..at + row.len()].copy_from_slice(row);
            at += row.len();
        }
        page
    }
}

fn put_text(field: &mut [u8], value: &[u8]) {
    field.fill(b' ');
    let n = value.len().min(field.len());
    field[..n].copy_from_slice(&value[..n]);
}

/// CHAR codec encoder using literal copies and short byte runs.
pub fn compress_char(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut literal: Vec<u8> = Vec::new();
    let flush = |literal: &mut Vec<u8>, out: &mut Vec<u8>| {
        for chunk in literal.chunks(16) {
            out.push(0x80 | u8::try_from(chunk.len() - 1).unwrap());
            out.extend_from_slice(chunk);
        }
        literal.clear();
    };
    let mut i = 0;
    while i < row.len() {
        let byte = row[i];
        let run = row[i..].iter().take_while(|b| **b == byte).count().min(18);
        if run >= 3 {
            flush(&mut literal, &mut out);
            out.push(0xC0 | u8::try_from(run - 3).unwrap());
            out.push(byte);
            i += run;
        } else {
            literal.push(byte);
            i += 1;
        }
    }
    flush(&mut literal, &mut out);
    out
}

/// BIN codec encoder using literals and short-run tokens.
pub fn compress_bin(row: &[u8]) -> Vec<u8> {
    enum Item {
        Literal(u8),
        Run(u8, usize),
    }
    let mut items = Vec::new();
    let mut i = 0;
    while i < row.len() {
        let byte = row[i];
        let run = row[i..].iter().take_while(|b| **b == byte).count().min(8);
        if run >= 3 {
            items.push(Item::Run(byte, run));
            i += run;
        } else {
            items.push(Item::Literal(byte));
            i += 1;
        }
    }
    let mut out = Vec::new();
    for group in items.chunks(16) {
        let mut control = 0u16;
        let mut body = Vec::new();
        for (bit, item) in group.iter().enumerate() {
            match item {
                Item::Literal(byte) => body.push(*byte),
                Item::Run(byte, len) => {
                    control |= 0x8000 >> bit;
                    body.push(u8::try_from(*len - 3).unwrap());
                    body.push(*byte);
                }
            }
        }
        out.extend_from_slice(&control.to_be_bytes());
        out.extend(body);
    }
    out
}
