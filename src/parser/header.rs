use std::borrow::Cow;
use std::io::Read;

use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metadata::{Bitness, DatasetTimestamps, Endianness, FileProperties, OsFamily, SasVersion};

use super::byteorder::{field, read_f64, read_u32, read_uint};
use super::encoding::lookup_encoding;
use super::stream::PageStream;

const SAS_ALIGNMENT_OFFSET_4: u8 = 0x33;
const SAS_ENDIAN_BIG: u8 = 0x00;
const SAS_ENDIAN_LITTLE: u8 = 0x01;

const SAS_HEADER_START_SIZE: usize = 164;
// Bytes after both alignment deltas that every header must contain.
const SAS_HEADER_FIXED_END: usize = 288;

const SAS_HEADER_MIN_SIZE: u32 = 1024;
const SAS_PAGE_MIN_SIZE: u32 = 1024;
pub const SAS_MAX_SIZE: u32 = 1 << 24;

const SAS_EPOCH_OFFSET_SECONDS: i64 = -3653 * 86_400;

pub const SAS7BDAT_MAGIC_NUMBER: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

/// Constants derived from the header flag bytes.
///
/// Every offset and width used after the header comes from here, so a file is
/// parsed with a single bitness throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub bitness: Bitness,
    pub endianness: Endianness,
    pub align1: usize,
    pub align2: usize,
    pub header_length: usize,
    pub page_length: usize,
}

impl Layout {
    #[must_use]
    pub const fn new(bitness: Bitness, endianness: Endianness) -> Self {
        Self {
            bitness,
            endianness,
            align1: 0,
            align2: match bitness {
                Bitness::Bits32 => 0,
                Bitness::Bits64 => 4,
            },
            header_length: SAS_HEADER_MIN_SIZE as usize,
            page_length: SAS_PAGE_MIN_SIZE as usize,
        }
    }

    /// Width of "int-or-long" fields.
    #[must_use]
    pub const fn int_len(&self) -> usize {
        match self.bitness {
            Bitness::Bits32 => 4,
            Bitness::Bits64 => 8,
        }
    }

    #[must_use]
    pub const fn pointer_size(&self) -> usize {
        match self.bitness {
            Bitness::Bits32 => 12,
            Bitness::Bits64 => 24,
        }
    }

    /// Offset of the page type field within a page.
    #[must_use]
    pub const fn bit_offset(&self) -> usize {
        match self.bitness {
            Bitness::Bits32 => 16,
            Bitness::Bits64 => 32,
        }
    }

    /// Offset of the subheader pointer table within a page.
    #[must_use]
    pub const fn page_header_size(&self) -> usize {
        self.bit_offset() + 8
    }

    /// Reads an "int-or-long" field at `offset`.
    #[must_use]
    pub fn read_int(&self, bytes: &[u8], offset: usize) -> Option<u64> {
        read_uint(self.endianness, bytes, offset, self.int_len())
    }
}

/// Result of header parsing: the layout plus the descriptive properties.
#[derive(Debug, Clone)]
pub struct SasHeader {
    pub layout: Layout,
    pub properties: FileProperties,
}

/// Parses the fixed header and skips forward to the first page.
///
/// The stream ending inside the fixed portion is fatal. Ending while skipping
/// the remaining padding is tolerated: the stream is flagged as exhausted and
/// the caller sees a file without pages.
///
/// # Errors
///
/// Returns an error if the magic number, byte-order flag or size fields are
/// invalid, or the stream ends before the fixed header is complete.
pub fn parse_header<R: Read>(stream: &mut PageStream<R>) -> Result<SasHeader> {
    let Some(start) = stream
        .read_at(0, SAS_HEADER_START_SIZE)?
        .map(Cow::into_owned)
    else {
        return Err(Error::header("file ends inside the fixed header"));
    };
    let header_start = HeaderStart::from_bytes(&start)?;

    let bitness = if header_start.a2 == SAS_ALIGNMENT_OFFSET_4 {
        Bitness::Bits64
    } else {
        Bitness::Bits32
    };
    let mut layout = Layout::new(bitness, header_start.endianness);
    if header_start.a1 == SAS_ALIGNMENT_OFFSET_4 {
        layout.align1 = 4;
    }
    let total_align = layout.align1 + layout.align2;

    let rest_len = SAS_HEADER_FIXED_END + total_align - SAS_HEADER_START_SIZE;
    let Some(rest) = stream
        .read_at(SAS_HEADER_START_SIZE, rest_len)?
        .map(Cow::into_owned)
    else {
        return Err(Error::header("file ends inside the fixed header"));
    };
    let mut bytes = start;
    bytes.extend_from_slice(&rest);

    let endian = layout.endianness;
    let a1 = layout.align1;
    let header_length = read_u32(endian, &bytes, 196 + a1).unwrap_or_default();
    let page_length = read_u32(endian, &bytes, 200 + a1).unwrap_or_default();
    if !(SAS_HEADER_MIN_SIZE..=SAS_MAX_SIZE).contains(&header_length) {
        return Err(Error::header(format!(
            "header size {header_length} outside expected range"
        )));
    }
    if !(SAS_PAGE_MIN_SIZE..=SAS_MAX_SIZE).contains(&page_length) {
        return Err(Error::header(format!(
            "page size {page_length} outside expected range"
        )));
    }
    layout.header_length = header_length as usize;
    layout.page_length = page_length as usize;

    let page_count = read_uint(endian, &bytes, 204 + a1, 4 + layout.align2).unwrap_or_default();

    let mut properties = FileProperties::new(bitness, endian);
    properties.header_length = header_length;
    properties.page_length = page_length;
    properties.page_count = page_count;
    properties.dataset_name = decode_padded_string(&header_start.dataset_name);
    properties.file_type = decode_padded_string(&header_start.file_type);
    properties.os_family = header_start.os_family;
    properties.encoding = lookup_encoding(header_start.encoding).map(str::to_owned);
    if properties.encoding.is_none() {
        warn!(code = header_start.encoding, "unknown character set code in header");
    }
    properties.timestamps = read_timestamps(&bytes, endian, a1);

    let text_at = |offset: usize, len: usize| {
        field(&bytes, offset + total_align, len).and_then(decode_padded_string)
    };
    properties.release = text_at(216, 8);
    properties.server_type = text_at(224, 16);
    properties.os_version = text_at(240, 16);
    properties.os_maker = text_at(256, 16);
    properties.os_name = text_at(272, 16);
    properties.version = properties.release.as_deref().and_then(parse_release);

    let header_end = SAS_HEADER_FIXED_END + total_align;
    if !stream.skip_to(layout.header_length.max(header_end) as u64)? {
        warn!(
            header_length,
            "stream ended before the declared header length; no pages follow"
        );
    }

    debug!(
        ?bitness,
        ?endian,
        align1 = layout.align1,
        align2 = layout.align2,
        header_length,
        page_length,
        page_count,
        "resolved file layout"
    );

    Ok(SasHeader { layout, properties })
}

struct HeaderStart {
    a2: u8,
    a1: u8,
    endianness: Endianness,
    os_family: OsFamily,
    encoding: u8,
    dataset_name: [u8; 64],
    file_type: [u8; 8],
}

impl HeaderStart {
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut idx = 0;
        let mut take = |len: usize| {
            let start = idx;
            idx += len;
            &bytes[start..start + len]
        };

        if take(32) != SAS7BDAT_MAGIC_NUMBER.as_slice() {
            return Err(Error::header("unrecognized SAS magic number"));
        }
        let a2 = take(1)[0];
        let _mystery1 = take(2);
        let a1 = take(1)[0];
        let _mystery2 = take(1);
        let endian = take(1)[0];
        let _mystery3 = take(1);
        let os_flag = take(1)[0];
        let _mystery4 = take(30);
        let encoding = take(1)[0];
        let _mystery5 = take(21);

        let mut dataset_name = [0u8; 64];
        dataset_name.copy_from_slice(take(64));
        let mut file_type = [0u8; 8];
        file_type.copy_from_slice(take(8));

        let endianness = match endian {
            SAS_ENDIAN_BIG => Endianness::Big,
            SAS_ENDIAN_LITTLE => Endianness::Little,
            other => {
                return Err(Error::header(format!(
                    "unsupported endian flag 0x{other:02X} in header"
                )));
            }
        };
        let os_family = match os_flag {
            b'1' => OsFamily::Unix,
            b'2' => OsFamily::Windows,
            _ => OsFamily::Unknown,
        };

        Ok(Self {
            a2,
            a1,
            endianness,
            os_family,
            encoding,
            dataset_name,
            file_type,
        })
    }
}

/// Parses release strings such as `9.0401M3`; anything else yields `None`.
fn parse_release(release: &str) -> Option<SasVersion> {
    let mut chars = release.trim().chars();
    let major = match chars.next()? {
        c @ '1'..='9' => u16::try_from(c.to_digit(10)?).ok()?,
        'V' => 9,
        _ => return None,
    };
    if chars.next()? != '.' {
        return None;
    }
    let minor_digits: String = chars.by_ref().take(4).collect();
    if minor_digits.len() != 4 || !minor_digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let minor = minor_digits.parse::<u16>().ok()?;
    if !matches!(chars.next()?, 'M' | 'J') {
        return None;
    }
    let revision = u16::try_from(chars.next()?.to_digit(10)?).ok()?;
    Some(SasVersion {
        major,
        minor,
        revision,
    })
}

fn read_timestamps(bytes: &[u8], endian: Endianness, a1: usize) -> DatasetTimestamps {
    let value = |offset: usize| read_f64(endian, bytes, offset + a1).unwrap_or(f64::NAN);
    DatasetTimestamps {
        created: convert_sas_time(value(164), value(180)),
        modified: convert_sas_time(value(172), value(188)),
    }
}

fn convert_sas_time(time: f64, diff: f64) -> Option<OffsetDateTime> {
    let delta = Duration::checked_seconds_f64(time - diff)?;
    let offset = Duration::seconds(SAS_EPOCH_OFFSET_SECONDS);
    let total = offset.checked_add(delta)?;
    OffsetDateTime::UNIX_EPOCH.checked_add(total)
}

fn decode_padded_string(bytes: &[u8]) -> Option<String> {
    let trimmed = bytes
        .iter()
        .rposition(|b| *b != 0 && *b != b' ')
        .map(|idx| &bytes[..=idx])?;
    let lossless = String::from_utf8_lossy(trimmed);
    let candidate = lossless.trim();
    if candidate.is_empty() {
        None
    } else {
        Some(candidate.to_owned())
    }
}
