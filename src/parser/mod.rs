//! Binary decoding engine for sas7bdat files.

mod byteorder;
mod column;
pub mod decompress;
mod encoding;
mod header;
mod meta;
mod numeric;
mod page;
mod rows;
mod stream;
mod subheaders;

pub use byteorder::{numeric_bits, read_f64, read_i16, read_u16, read_u32, read_u64};
pub use column::{ColumnAttributes, ColumnMetadataBuilder, TextRef, TextStore};
pub use encoding::{decode_text, resolve_encoding, resolve_label, trim_trailing};
pub use header::{Layout, SAS7BDAT_MAGIC_NUMBER, SasHeader, parse_header};
pub use meta::{ParsedMetadata, RowPointers, collect_row_pointers, parse_metadata};
pub use numeric::{EPSILON, NEAR_ZERO_MISSING, Numeric, classify, classify_bits, decode_numeric};
pub use page::{PageHeader, PageKind, SubheaderKind, SubheaderPointer, classify_page};
pub use rows::{RowDecoder, RowGeometry, RowLocation, RowSource, fill_row};
pub use stream::PageStream;
pub use subheaders::RowInfo;
