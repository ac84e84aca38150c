//! Streaming reader for SAS7BDAT datasets.
//!
//! ```no_run
//! use sas7bdat_reader::SasReader;
//!
//! let mut reader = SasReader::open_path("class.sas7bdat")?;
//! while let Some(row) = reader.read_next()? {
//!     println!("{row:?}");
//! }
//! # Ok::<(), sas7bdat_reader::Error>(())
//! ```

pub mod dates;
pub mod error;
pub mod metadata;
pub mod parser;
pub mod reader;
pub mod value;

pub use crate::error::{Error, Result};
pub use dates::{DateFormatter, SasEpochFormatter, TemporalKind};
pub use metadata::{Column, ColumnFormat, ColumnKind, Compression, FileProperties};
pub use reader::{CharacterOutput, ReadOptions, SasReader};
pub use value::{MissingValue, Value};
