//! Row decompression for the two SAS codecs.
//!
//! Both codecs decode a window of the current page into a buffer of exactly
//! the declared row length. Corrupt input never fails the read: the decoder
//! logs what it could not interpret and hands back what it produced.

mod bin_codec;
mod char_codec;

pub use bin_codec::BinDecompressor;
pub use char_codec::CharDecompressor;

use crate::metadata::Compression;

/// Literal announcing the CHAR (run-length) codec in the first text block.
pub const CHAR_LITERAL: &[u8] = b"SASYZCRL";
/// Literal announcing the BIN codec in the first text block.
pub const BIN_LITERAL: &[u8] = b"SASYZCR2";

const COMPRESSION_LITERALS: [(&[u8], Compression); 2] = [
    (CHAR_LITERAL, Compression::Char),
    (BIN_LITERAL, Compression::Binary),
];

/// Common interface of the row codecs.
pub trait Decompressor {
    /// Decodes `source_len` bytes of `page` starting at `offset`.
    ///
    /// The result is always exactly `dest_len` bytes long; positions the
    /// codec could not fill stay zero.
    fn decompress(&self, page: &[u8], offset: usize, source_len: usize, dest_len: usize)
    -> Vec<u8>;
}

/// Returns the codec matching the file's compression method.
#[must_use]
pub fn decompressor_for(compression: Compression) -> Option<&'static dyn Decompressor> {
    match compression {
        Compression::None => None,
        Compression::Char => Some(&CharDecompressor),
        Compression::Binary => Some(&BinDecompressor),
    }
}

/// Looks for a known compression literal anywhere in a text block.
#[must_use]
pub fn detect_compression(text_block: &[u8]) -> Compression {
    COMPRESSION_LITERALS
        .iter()
        .find(|(literal, _)| {
            text_block
                .windows(literal.len())
                .any(|window| window == *literal)
        })
        .map_or(Compression::None, |(_, compression)| *compression)
}

/// Clamps the requested source range to the page.
fn source_window(page: &[u8], offset: usize, source_len: usize) -> &[u8] {
    let start = offset.min(page.len());
    let end = offset.saturating_add(source_len).min(page.len());
    &page[start..end]
}
