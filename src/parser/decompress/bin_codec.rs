use tracing::error;

use super::{Decompressor, source_window};

/// Decoder for `SASYZCR2` (binary, bitmask-prefixed) compressed rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinDecompressor;

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Repeat { len: usize, byte: u8 },
    BackRef { len: usize, distance: usize },
}

/// Decodes one token starting at `input[0]`, returning it with its width.
fn decode_token(input: &[u8]) -> Option<(Token, usize)> {
    let marker = *input.first()?;
    let high = usize::from(marker >> 4);
    let low = usize::from(marker & 0x0F);

    if marker <= 0x05 {
        let byte = *input.get(1)?;
        return Some((
            Token::Repeat {
                len: usize::from(marker) + 3,
                byte,
            },
            2,
        ));
    }
    if matches!(marker, 0x06 | 0x08 | 0x0A) {
        // 0x06 carries no offset: its copy reads the bytes it writes and
        // leaves them zeroed.
        let distance = match marker {
            0x08 => 24,
            0x0A => 40,
            _ => 0,
        };
        return Some((
            Token::BackRef {
                len: usize::from(marker) + 14,
                distance,
            },
            1,
        ));
    }
    if high > 2 {
        let next = usize::from(*input.get(1)?);
        return Some((
            Token::BackRef {
                len: high,
                distance: 3 + low + next * 16,
            },
            2,
        ));
    }
    match high {
        1 => {
            let next = usize::from(*input.get(1)?);
            let byte = *input.get(2)?;
            Some((
                Token::Repeat {
                    len: 19 + low + next * 16,
                    byte,
                },
                3,
            ))
        }
        2 => {
            let next = usize::from(*input.get(1)?);
            let count = usize::from(*input.get(2)?);
            Some((
                Token::BackRef {
                    len: count + 16,
                    distance: 3 + low + next * 16,
                },
                3,
            ))
        }
        _ => None,
    }
}

/// Decodes `input` into `output`.
///
/// On an unrecognised token the undecoded remainder of the input is copied
/// verbatim into the remaining output space.
pub(crate) fn decompress_bin(input: &[u8], output: &mut [u8]) -> Result<(), &'static str> {
    let mut out_pos = 0usize;
    let mut i = 0usize;
    let mut control = 0u16;
    let mut bits_left = 0u32;

    while i < input.len() && out_pos < output.len() {
        if bits_left == 0 {
            if i + 2 > input.len() {
                break;
            }
            control = u16::from_be_bytes([input[i], input[i + 1]]);
            i += 2;
            bits_left = 16;
            continue;
        }
        let encoded = control & 0x8000 != 0;
        control <<= 1;
        bits_left -= 1;

        if !encoded {
            output[out_pos] = input[i];
            out_pos += 1;
            i += 1;
            continue;
        }

        let Some((token, width)) = decode_token(&input[i..]) else {
            let n = (input.len() - i).min(output.len() - out_pos);
            output[out_pos..out_pos + n].copy_from_slice(&input[i..i + n]);
            return Err("unrecognized BIN token");
        };
        match token {
            Token::Repeat { len, byte } => {
                let n = len.min(output.len() - out_pos);
                output[out_pos..out_pos + n].fill(byte);
                out_pos += n;
            }
            Token::BackRef { len, distance } => {
                if distance > out_pos {
                    let n = (input.len() - i).min(output.len() - out_pos);
                    output[out_pos..out_pos + n].copy_from_slice(&input[i..i + n]);
                    return Err("BIN back-reference before start of output");
                }
                let start = out_pos - distance;
                let n = len.min(output.len() - out_pos);
                // Overlapping references replicate bytes written by this copy.
                for j in 0..n {
                    output[out_pos + j] = output[start + j];
                }
                out_pos += n;
            }
        }
        i += width;
    }

    Ok(())
}

impl Decompressor for BinDecompressor {
    fn decompress(
        &self,
        page: &[u8],
        offset: usize,
        source_len: usize,
        dest_len: usize,
    ) -> Vec<u8> {
        let input = source_window(page, offset, source_len);
        let mut output = vec![0u8; dest_len];
        if let Err(reason) = decompress_bin(input, &mut output) {
            error!(offset, source_len, dest_len, reason, "BIN decompression stopped early");
        }
        output
    }
}
