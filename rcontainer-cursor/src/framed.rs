//! Framed-record helpers: the byte-count/version bracket pattern and the
//! `TObject` header skip that precedes most concrete records.

use crate::cursor::Cursor;
use crate::error::{ReadError, Result};
use std::mem::size_of;
use zerocopy::byteorder::{BE, U16, U32};
use zerocopy::{FromBytes, Unaligned};

/// Set on the leading 32-bit count of a framed record to mark it as a byte
/// count rather than a plain length.
pub const K_BYTE_COUNT_MASK: u32 = 0x4000_0000;

/// Set on a `TObject`'s leading 16-bit version when 4 extra bytes follow it
/// before the unique id / bits pair.
pub const K_BYTE_COUNT_V_MASK: u16 = 0x4000;

bitflags::bitflags! {
    /// Bits carried by a decoded `TObject`'s `fBits` field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TObjectBits: u32 {
        /// Set unconditionally on every decoded `TObject`, regardless of
        /// what the source actually carried.
        const IS_ON_HEAP = 0x0100_0000;
        /// A trailing 16-bit pid index follows.
        const IS_REFERENCED = 0x0000_0010;
    }
}

/// The zero-copy view over a framed record's leading byte-count + version
/// pair, cast directly out of the six bytes read for it.
#[derive(FromBytes, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
struct FrameHeader {
    count: U32<BE>,
    version: U16<BE>,
}

static_assertions::const_assert_eq!(size_of::<FrameHeader>(), 6);

/// The result of [`start_check`]: where the record started and how many
/// bytes it is expected to span, to be confirmed by a matching
/// [`end_check`].
#[derive(Debug, Clone, Copy)]
pub struct FramedRecord {
    /// Absolute offset of the record's first byte (the byte-count field).
    pub start: u64,
    /// Total bytes the record is declared to span, including the
    /// byte-count field itself.
    pub expected_bytes: u32,
    /// The 16-bit version following the byte count.
    pub version: u16,
}

/// Reads a framed record's leading byte-count + version pair.
///
/// The leading 32-bit field must have [`K_BYTE_COUNT_MASK`] set; its low 30
/// bits are the number of bytes following the count field itself, so the
/// record (measured from `start`) spans `(count & !K_BYTE_COUNT_MASK) + 4`
/// bytes in total.
pub fn start_check<T: Clone>(cursor: &mut Cursor<T>) -> Result<FramedRecord> {
    let start = cursor.index();
    let bytes = cursor.bytes(size_of::<FrameHeader>())?;
    let header = FrameHeader::read_from(&bytes[..]).expect("exact length requested above");
    let count = header.count.get();
    if count & K_BYTE_COUNT_MASK == 0 {
        return Err(ReadError::malformed(format!(
            "framed record at offset {start}: byte-count mask not set (raw count {count:#010x})"
        )));
    }
    let expected_bytes = (count & !K_BYTE_COUNT_MASK) + 4;
    let version = header.version.get();
    Ok(FramedRecord {
        start,
        expected_bytes,
        version,
    })
}

/// Confirms a framed record opened with [`start_check`] consumed exactly
/// the number of bytes it declared.
pub fn end_check<T: Clone>(cursor: &Cursor<T>, record: FramedRecord) -> Result<()> {
    let consumed = cursor.index() - record.start;
    if consumed as u32 != record.expected_bytes {
        return Err(ReadError::malformed(format!(
            "framed record at offset {}: declared {} bytes, consumed {}",
            record.start, record.expected_bytes, consumed
        )));
    }
    Ok(())
}

/// Skips a `TObject` header, returning its decoded bits.
///
/// Reads a 16-bit version; if [`K_BYTE_COUNT_V_MASK`] is set, skips 4 more
/// bytes (a nested byte count belonging to a base `TObject` record), then
/// reads a 32-bit unique id (discarded) and a 32-bit bits field. The
/// returned bits always have [`TObjectBits::IS_ON_HEAP`] set, matching every
/// other concrete `TObject` decoded by this crate regardless of what the
/// source actually carried. If [`TObjectBits::IS_REFERENCED`] is set, a
/// trailing 16-bit pid index is skipped.
pub fn skip_tobject<T: Clone>(cursor: &mut Cursor<T>) -> Result<TObjectBits> {
    let version = cursor.u16()?;
    if version & K_BYTE_COUNT_V_MASK != 0 {
        cursor.skip(4)?;
    }
    cursor.skip(4)?; // unique id, unused
    let mut bits = TObjectBits::from_bits_retain(cursor.u32()?);
    bits.insert(TObjectBits::IS_ON_HEAP);
    if bits.contains(TObjectBits::IS_REFERENCED) {
        cursor.skip(2)?;
    }
    Ok(bits)
}

/// Skips a `TObject` header, then reads the `(name, title)` pair most
/// `TNamed`-derived records carry immediately after it.
pub fn name_title<T: Clone>(cursor: &mut Cursor<T>) -> Result<(Vec<u8>, Vec<u8>)> {
    skip_tobject(cursor)?;
    let name = cursor.string()?;
    let title = cursor.string()?;
    Ok((name, title))
}
