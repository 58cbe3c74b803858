//! A virtual [`ByteSource`] that transparently decompresses a compressed
//! span made of one or more concatenated compression blocks.

use crate::error::{ReadError, Result};
use crate::source::ByteSource;

/// A codec able to expand one compression block's payload.
///
/// Concrete codecs (zlib, lz4, zstd, ...) are out of scope for this crate;
/// callers supply one when constructing a [`CompressedSubSource`].
pub trait Decompressor: Send + Sync {
    /// Decompresses exactly one block. `algo` is the 2-byte algorithm tag
    /// read from the block header; `compressed` is that block's payload;
    /// `uncompressed_len` is the length the header declared for the
    /// decompressed output, which the returned buffer must match exactly.
    fn decompress(&self, algo: [u8; 2], compressed: &[u8], uncompressed_len: usize) -> Result<Vec<u8>>;
}

/// Each compression block is prefixed by a 2-byte algorithm tag followed by
/// two 24-bit little-endian length fields.
const BLOCK_HEADER_LEN: usize = 9;

struct BlockHeader {
    algo: [u8; 2],
    compressed_len: usize,
    uncompressed_len: usize,
}

fn u24_le(b: &[u8]) -> usize {
    b[0] as usize | (b[1] as usize) << 8 | (b[2] as usize) << 16
}

fn read_block_header(bytes: &[u8]) -> Result<BlockHeader> {
    if bytes.len() < BLOCK_HEADER_LEN {
        return Err(ReadError::malformed(
            "compression block header truncated",
        ));
    }
    Ok(BlockHeader {
        algo: [bytes[0], bytes[1]],
        compressed_len: u24_le(&bytes[3..6]),
        uncompressed_len: u24_le(&bytes[6..9]),
    })
}

/// A [`ByteSource`] that decompresses a span made of one or more
/// concatenated compression blocks, eagerly, at construction time.
///
/// Each block carries its own 9-byte header (2-byte algorithm tag, 3-byte
/// little-endian compressed length, 3-byte little-endian uncompressed
/// length) immediately followed by that many compressed bytes. Blocks
/// repeat until `expected_uncompressed_len` bytes have been produced in
/// total.
pub struct CompressedSubSource {
    path: String,
    uncompressed: Vec<u8>,
}

impl CompressedSubSource {
    /// Reads `compressed_span` bytes starting at `start` from `underlying`,
    /// decodes its concatenated compression blocks with `codec`, and
    /// verifies the result is exactly `expected_uncompressed_len` bytes.
    pub fn new(
        underlying: &dyn ByteSource,
        start: u64,
        compressed_span: u64,
        expected_uncompressed_len: usize,
        codec: &dyn Decompressor,
    ) -> Result<Self> {
        let raw = underlying.read(start, compressed_span as usize)?;
        let mut uncompressed = Vec::with_capacity(expected_uncompressed_len);
        let mut cursor = 0usize;
        while uncompressed.len() < expected_uncompressed_len {
            let header = read_block_header(&raw[cursor..])?;
            let payload_start = cursor + BLOCK_HEADER_LEN;
            let payload_end = payload_start + header.compressed_len;
            let payload = raw.get(payload_start..payload_end).ok_or_else(|| {
                ReadError::malformed("compression block payload truncated")
            })?;
            let block = codec.decompress(header.algo, payload, header.uncompressed_len)?;
            if block.len() != header.uncompressed_len {
                return Err(ReadError::malformed(format!(
                    "compression block declared {} uncompressed bytes, decoder produced {}",
                    header.uncompressed_len,
                    block.len()
                )));
            }
            uncompressed.extend_from_slice(&block);
            cursor = payload_end;
        }
        if uncompressed.len() != expected_uncompressed_len {
            return Err(ReadError::malformed(format!(
                "compressed span declared {} total uncompressed bytes, blocks produced {}",
                expected_uncompressed_len,
                uncompressed.len()
            )));
        }
        Ok(Self {
            path: format!("{}#compressed@{}", underlying.path(), start),
            uncompressed,
        })
    }
}

impl ByteSource for CompressedSubSource {
    fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let start = usize::try_from(offset).map_err(|_| ReadError::malformed("offset overflow"))?;
        let end = start
            .checked_add(length)
            .ok_or_else(|| ReadError::malformed("offset overflow"))?;
        self.uncompressed
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                ReadError::eof(format!(
                    "read past end of decompressed source {:?}: wanted {}..{}, have {} bytes",
                    self.path,
                    start,
                    end,
                    self.uncompressed.len()
                ))
            })
    }

    fn path(&self) -> &str {
        &self.path
    }
}
