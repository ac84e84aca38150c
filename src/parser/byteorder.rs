use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::metadata::Endianness;

/// Returns `len` bytes at `offset`, or `None` when the range leaves `bytes`.
#[inline]
#[must_use]
pub fn field(bytes: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    bytes.get(offset..offset.checked_add(len)?)
}

#[inline]
#[must_use]
pub fn read_u16(endian: Endianness, bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = field(bytes, offset, 2)?;
    Some(match endian {
        Endianness::Little => LittleEndian::read_u16(raw),
        Endianness::Big => BigEndian::read_u16(raw),
    })
}

#[inline]
#[must_use]
pub fn read_i16(endian: Endianness, bytes: &[u8], offset: usize) -> Option<i16> {
    let raw = field(bytes, offset, 2)?;
    Some(match endian {
        Endianness::Little => LittleEndian::read_i16(raw),
        Endianness::Big => BigEndian::read_i16(raw),
    })
}

#[inline]
#[must_use]
pub fn read_u32(endian: Endianness, bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = field(bytes, offset, 4)?;
    Some(match endian {
        Endianness::Little => LittleEndian::read_u32(raw),
        Endianness::Big => BigEndian::read_u32(raw),
    })
}

#[inline]
#[must_use]
pub fn read_u64(endian: Endianness, bytes: &[u8], offset: usize) -> Option<u64> {
    let raw = field(bytes, offset, 8)?;
    Some(match endian {
        Endianness::Little => LittleEndian::read_u64(raw),
        Endianness::Big => BigEndian::read_u64(raw),
    })
}

/// Reads an "int-or-long" field: four bytes in 32-bit files, eight in 64-bit ones.
#[inline]
#[must_use]
pub fn read_uint(endian: Endianness, bytes: &[u8], offset: usize, width: usize) -> Option<u64> {
    if width == 8 {
        read_u64(endian, bytes, offset)
    } else {
        read_u32(endian, bytes, offset).map(u64::from)
    }
}

#[inline]
#[must_use]
pub fn read_f64(endian: Endianness, bytes: &[u8], offset: usize) -> Option<f64> {
    let raw = field(bytes, offset, 8)?;
    Some(match endian {
        Endianness::Little => LittleEndian::read_f64(raw),
        Endianness::Big => BigEndian::read_f64(raw),
    })
}

/// Widens a numeric cell of up to eight bytes into the raw bits of a double.
///
/// SAS truncates doubles from the low-order end, so short cells are padded
/// with zeros on the side that holds the least significant bytes.
#[inline]
#[must_use]
pub fn numeric_bits(slice: &[u8], endian: Endianness) -> u64 {
    let len = slice.len().min(8);
    let mut buf = [0u8; 8];
    match endian {
        Endianness::Big => {
            buf[..len].copy_from_slice(&slice[..len]);
            BigEndian::read_u64(&buf)
        }
        Endianness::Little => {
            buf[8 - len..].copy_from_slice(&slice[slice.len() - len..]);
            LittleEndian::read_u64(&buf)
        }
    }
}
