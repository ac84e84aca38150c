use tracing::error;

use super::{Decompressor, source_window};

/// Decoder for `SASYZCRL` (control-byte run-length) compressed rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharDecompressor;

enum RleOp {
    Copy(usize),
    Fill { len: usize, byte: u8 },
}

fn take(input: &[u8], cursor: &mut usize) -> Result<usize, &'static str> {
    let byte = *input
        .get(*cursor)
        .ok_or("control byte operand missing from input")?;
    *cursor += 1;
    Ok(usize::from(byte))
}

fn decode_command(control: u8, input: &[u8], cursor: &mut usize) -> Result<RleOp, &'static str> {
    let nibble = usize::from(control & 0x0F);
    let op = match control & 0xF0 {
        0x00 => RleOp::Copy(take(input, cursor)? + 64 + nibble * 256),
        0x10 => RleOp::Copy(take(input, cursor)? + 64 + nibble * 256 + 4096),
        0x20 => RleOp::Copy(take(input, cursor)? + 96 + nibble * 256),
        0x30 => RleOp::Copy(take(input, cursor)? + 352 + nibble * 256),
        0x40 => {
            let count = take(input, cursor)?;
            let byte = take(input, cursor)?;
            RleOp::Fill {
                len: nibble * 256 + count + 18,
                #[allow(clippy::cast_possible_truncation)]
                byte: byte as u8,
            }
        }
        0x50 => RleOp::Fill {
            len: nibble * 256 + take(input, cursor)? + 17,
            byte: b'@',
        },
        0x60 => RleOp::Fill {
            len: nibble * 256 + take(input, cursor)? + 17,
            byte: b' ',
        },
        0x70 => RleOp::Fill {
            len: nibble * 256 + take(input, cursor)? + 17,
            byte: 0,
        },
        high @ 0x80..=0xB0 => RleOp::Copy(nibble + 1 + usize::from(high - 0x80)),
        0xC0 => {
            let byte = take(input, cursor)?;
            RleOp::Fill {
                len: nibble + 3,
                #[allow(clippy::cast_possible_truncation)]
                byte: byte as u8,
            }
        }
        0xD0 => RleOp::Fill {
            len: nibble + 2,
            byte: b'@',
        },
        0xE0 => RleOp::Fill {
            len: nibble + 2,
            byte: b' ',
        },
        _ => RleOp::Fill {
            len: nibble + 2,
            byte: 0,
        },
    };
    Ok(op)
}

/// Decodes `input` into `output`, stopping at the first malformed command.
///
/// Runs that would overflow the output or read past the input are clamped
/// and reported; the bytes written so far stay in place.
pub(crate) fn decompress_rle(input: &[u8], output: &mut [u8]) -> Result<(), &'static str> {
    let mut out_pos = 0usize;
    let mut i = 0usize;

    while i < input.len() && out_pos < output.len() {
        let control = input[i];
        i += 1;
        let op = decode_command(control, input, &mut i)?;
        let room = output.len() - out_pos;

        match op {
            RleOp::Copy(len) => {
                let available = input.len() - i;
                let n = len.min(room).min(available);
                output[out_pos..out_pos + n].copy_from_slice(&input[i..i + n]);
                i += n;
                out_pos += n;
                if n < len && n == available {
                    return Err("RLE copy exceeds input length");
                }
                if n < len {
                    return Err("RLE copy exceeds output length");
                }
            }
            RleOp::Fill { len, byte } => {
                let n = len.min(room);
                output[out_pos..out_pos + n].fill(byte);
                out_pos += n;
                if n < len {
                    return Err("RLE fill exceeds output length");
                }
            }
        }
    }

    Ok(())
}

impl Decompressor for CharDecompressor {
    fn decompress(
        &self,
        page: &[u8],
        offset: usize,
        source_len: usize,
        dest_len: usize,
    ) -> Vec<u8> {
        let input = source_window(page, offset, source_len);
        let mut output = vec![0u8; dest_len];
        if let Err(reason) = decompress_rle(input, &mut output) {
            error!(offset, source_len, dest_len, reason, "CHAR decompression stopped early");
        }
        output
    }
}
