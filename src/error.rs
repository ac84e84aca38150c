use std::borrow::Cow;
use std::fmt;
use std::io;

/// Result type used across the SAS reader implementation.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type surfaced by the SAS reader.
///
/// Only open-time failures and genuine I/O faults end up here. Damage found
/// while walking pages or decoding rows is logged and skipped instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure while reading from the underlying data source.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Failure to resolve or apply a character encoding.
    #[error("encoding conversion from {encoding} failed: {details}")]
    Encoding {
        encoding: Cow<'static, str>,
        details: Cow<'static, str>,
    },

    /// The file appears to be corrupt or inconsistent while processing a section.
    #[error("corrupted SAS file while processing {section}: {details}")]
    Corrupted {
        section: Section,
        details: Cow<'static, str>,
    },

    /// Access patterns or sizes the reader cannot honour.
    #[error("unsupported SAS feature: {feature}")]
    Unsupported { feature: Cow<'static, str> },

    /// Metadata or schema could not be interpreted according to expectations.
    #[error("invalid SAS metadata: {details}")]
    InvalidMetadata { details: Cow<'static, str> },
}

/// Logical section of the parser used for diagnostic reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Header,
    Subheader { page_index: u64 },
}

impl Error {
    pub(crate) fn header(details: impl Into<Cow<'static, str>>) -> Self {
        Self::Corrupted {
            section: Section::Header,
            details: details.into(),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "file header"),
            Self::Subheader { page_index } => write!(f, "subheader on page {page_index}"),
        }
    }
}
