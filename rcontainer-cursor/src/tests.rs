use crate::compressed::{CompressedSubSource, Decompressor};
use crate::cursor::Cursor;
use crate::error::ReadError;
use crate::framed::{end_check, name_title, skip_tobject, start_check, TObjectBits};
use crate::source::{ByteSource, SliceSource};
use std::sync::Arc;

fn cursor_over(bytes: Vec<u8>) -> Cursor<()> {
    let source: Arc<dyn ByteSource> = Arc::new(SliceSource::new("test", bytes));
    Cursor::new(source, 0, 0)
}

#[test]
fn string_short_form() {
    let mut c = cursor_over(vec![3, b'f', b'o', b'o']);
    assert_eq!(c.string().unwrap(), b"foo");
    assert_eq!(c.index(), 4);
}

#[test]
fn string_escaped_long_form() {
    let mut bytes = vec![255, 0, 0, 0, 5];
    bytes.extend_from_slice(b"hello");
    let mut c = cursor_over(bytes);
    assert_eq!(c.string().unwrap(), b"hello");
    assert_eq!(c.index(), 9);
}

#[test]
fn cstring_stops_before_nul() {
    let mut c = cursor_over(b"abc\0trailing".to_vec());
    assert_eq!(c.cstring().unwrap(), b"abc");
    assert_eq!(c.index(), 4);
}

#[test]
fn slice_source_out_of_bounds() {
    let source = SliceSource::new("test", vec![1, 2, 3]);
    let err = source.read(1, 10).unwrap_err();
    assert!(matches!(err, ReadError::Io(_)));
}

#[test]
fn framed_record_round_trip() {
    let mut bytes = vec![0u8; 4];
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&[9, 9]);
    let total_len = (bytes.len() - 4) as u32;
    bytes[0..4].copy_from_slice(&(0x4000_0000u32 | total_len).to_be_bytes());

    let mut c = cursor_over(bytes);
    let record = start_check(&mut c).unwrap();
    assert_eq!(record.version, 1);
    c.skip(2).unwrap();
    end_check(&c, record).unwrap();
}

#[test]
fn framed_record_missing_mask_is_malformed() {
    let mut bytes = vec![0u8; 4];
    bytes[0..4].copy_from_slice(&10u32.to_be_bytes());
    let mut c = cursor_over(bytes);
    let err = start_check(&mut c).unwrap_err();
    assert!(matches!(err, ReadError::Malformed(_)));
}

#[test]
fn framed_record_byte_count_mismatch_is_malformed() {
    let mut bytes = vec![0u8; 4];
    bytes.extend_from_slice(&1u16.to_be_bytes());
    // Declare 20 bytes total, but only ever write 6.
    bytes[0..4].copy_from_slice(&(0x4000_0000u32 | 20u32).to_be_bytes());
    let mut c = cursor_over(bytes);
    let record = start_check(&mut c).unwrap();
    let err = end_check(&c, record).unwrap_err();
    assert!(matches!(err, ReadError::Malformed(_)));
}

#[test]
fn tobject_skip_sets_heap_bit() {
    let mut bytes = vec![0u8, 1]; // version, no byte-count-v bit
    bytes.extend_from_slice(&7u32.to_be_bytes()); // unique id, discarded
    bytes.extend_from_slice(&0u32.to_be_bytes()); // bits, nothing set
    let mut c = cursor_over(bytes);
    let bits = skip_tobject(&mut c).unwrap();
    assert_eq!(bits, TObjectBits::IS_ON_HEAP);
}

#[test]
fn name_title_reads_pair_after_tobject() {
    let mut bytes = vec![0u8, 1];
    bytes.extend_from_slice(&0u32.to_be_bytes());
    bytes.extend_from_slice(&0u32.to_be_bytes());
    bytes.push(4);
    bytes.extend_from_slice(b"name");
    bytes.push(5);
    bytes.extend_from_slice(b"title");
    let mut c = cursor_over(bytes);
    let (name, title) = name_title(&mut c).unwrap();
    assert_eq!(name, b"name");
    assert_eq!(title, b"title");
}

struct IdentityCodec;

impl Decompressor for IdentityCodec {
    fn decompress(&self, _algo: [u8; 2], compressed: &[u8], uncompressed_len: usize) -> crate::error::Result<Vec<u8>> {
        assert_eq!(compressed.len(), uncompressed_len);
        Ok(compressed.to_vec())
    }
}

fn block(algo: [u8; 2], payload: &[u8]) -> Vec<u8> {
    let mut out = vec![algo[0], algo[1], 0];
    let len = payload.len() as u32;
    out.extend_from_slice(&len.to_le_bytes()[0..3]);
    out.extend_from_slice(&len.to_le_bytes()[0..3]);
    out.extend_from_slice(payload);
    out
}

#[test]
fn compressed_sub_source_single_block() {
    let mut raw = Vec::new();
    raw.extend_from_slice(&block(*b"ZL", b"hello world"));
    let source = SliceSource::new("test", raw);
    let sub = CompressedSubSource::new(&source, 0, source.len() as u64, 11, &IdentityCodec).unwrap();
    assert_eq!(sub.read(0, 5).unwrap(), b"hello");
    assert_eq!(sub.read(6, 5).unwrap(), b"world");
}

#[test]
fn compressed_sub_source_multiple_blocks() {
    let mut raw = Vec::new();
    raw.extend_from_slice(&block(*b"ZL", b"abc"));
    raw.extend_from_slice(&block(*b"ZL", b"def"));
    let source = SliceSource::new("test", raw);
    let sub = CompressedSubSource::new(&source, 0, source.len() as u64, 6, &IdentityCodec).unwrap();
    assert_eq!(sub.read(0, 6).unwrap(), b"abcdef");
}

#[test]
fn compressed_sub_source_length_mismatch_is_malformed() {
    let raw = block(*b"ZL", b"abc");
    let source = SliceSource::new("test", raw);
    let err = CompressedSubSource::new(&source, 0, source.len() as u64, 10, &IdentityCodec).unwrap_err();
    assert!(matches!(err, ReadError::Malformed(_)));
}

#[test]
fn cursor_copied_shares_refs() {
    let c = cursor_over(vec![1, 2, 3, 4]);
    c.refs().insert(1, ());
    let forked = c.copied(Some(2), None);
    assert!(forked.refs().contains(1));
    assert_eq!(forked.index(), 2);
    assert_eq!(forked.origin(), c.origin());
}

#[test]
fn cursor_fork_new_scope_has_empty_refs() {
    let c = cursor_over(vec![1, 2, 3, 4]);
    c.refs().insert(1, ());
    let forked = c.fork_new_scope(2, 2);
    assert!(!forked.refs().contains(1));
    assert_eq!(forked.relative(), 0);
}
