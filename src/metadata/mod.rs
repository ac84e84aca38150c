use serde::{Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// File-level properties resolved from the header and the row/column size
/// subheaders.
#[derive(Debug, Clone, Serialize)]
pub struct FileProperties {
    pub bitness: Bitness,
    pub endianness: Endianness,
    pub header_length: u32,
    pub page_length: u32,
    /// Page count declared by the header. Reading continues until EOF
    /// regardless of this value.
    pub page_count: u64,
    pub row_length: u64,
    pub row_count: u64,
    pub mix_page_row_count: u64,
    pub column_count: u64,
    pub compression: Compression,
    pub dataset_name: Option<String>,
    pub file_type: Option<String>,
    pub file_label: Option<String>,
    pub encoding: Option<String>,
    pub os_family: OsFamily,
    pub release: Option<String>,
    pub version: Option<SasVersion>,
    pub server_type: Option<String>,
    pub os_version: Option<String>,
    pub os_maker: Option<String>,
    pub os_name: Option<String>,
    pub timestamps: DatasetTimestamps,
}

impl FileProperties {
    #[must_use]
    pub const fn new(bitness: Bitness, endianness: Endianness) -> Self {
        Self {
            bitness,
            endianness,
            header_length: 0,
            page_length: 0,
            page_count: 0,
            row_length: 0,
            row_count: 0,
            mix_page_row_count: 0,
            column_count: 0,
            compression: Compression::None,
            dataset_name: None,
            file_type: None,
            file_label: None,
            encoding: None,
            os_family: OsFamily::Unknown,
            release: None,
            version: None,
            server_type: None,
            os_version: None,
            os_maker: None,
            os_name: None,
            timestamps: DatasetTimestamps {
                created: None,
                modified: None,
            },
        }
    }
}

/// Dataset creation and modification times.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetTimestamps {
    #[serde(serialize_with = "serialize_timestamp")]
    pub created: Option<OffsetDateTime>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub modified: Option<OffsetDateTime>,
}

#[allow(clippy::ref_option)]
fn serialize_timestamp<S: Serializer>(
    value: &Option<OffsetDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value.and_then(|dt| dt.format(&Rfc3339).ok()) {
        Some(text) => serializer.serialize_some(&text),
        None => serializer.serialize_none(),
    }
}

/// SAS version components extracted from the release string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SasVersion {
    pub major: u16,
    pub minor: u16,
    pub revision: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bitness {
    #[serde(rename = "32")]
    Bits32,
    #[serde(rename = "64")]
    Bits64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

/// Row compression announced by the first column-text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    /// `SASYZCRL` run-length codec.
    Char,
    /// `SASYZCR2` binary codec.
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Unix,
    Windows,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Character,
}

impl ColumnKind {
    #[must_use]
    pub const fn from_type_code(code: u8) -> Self {
        match code {
            0x01 => Self::Numeric,
            _ => Self::Character,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnFormat {
    pub name: String,
    pub width: u16,
    pub precision: u16,
}

/// A fully resolved column of the dataset schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// 1-based position in schema order.
    pub id: u32,
    pub name: String,
    pub label: String,
    pub format: ColumnFormat,
    pub kind: ColumnKind,
    /// Byte offset of the cell within a decompressed row.
    pub offset: u64,
    /// Byte length of the cell within a decompressed row.
    pub length: u32,
}
