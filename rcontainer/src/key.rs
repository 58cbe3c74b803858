//! `TKey`: an addressable directory entry carrying metadata and a seek to
//! its payload.

use crate::context::{Cursor, FileContext};
use crate::value::Value;
use rcontainer_cursor::{ByteSource, CompressedSubSource, Result};
use std::sync::Arc;

/// An addressable entry in a directory: fixed metadata plus a prepared
/// `(payload_source, payload_index, payload_origin)` triple that `get()`
/// builds a fresh read off of every time it is called.
#[derive(Clone)]
pub struct TKey {
    pub nbytes: i32,
    pub version: i16,
    pub objlen: i32,
    pub datime: u32,
    pub keylen: i16,
    pub cycle: i16,
    pub seek_key: i64,
    pub seek_pdir: i64,
    pub class_name: String,
    pub name: String,
    pub title: String,
    payload_source: Arc<dyn ByteSource>,
    payload_index: u64,
    payload_origin: i64,
}

fn read_name_string(cursor: &mut Cursor) -> Result<String> {
    Ok(String::from_utf8_lossy(&cursor.string()?).into_owned())
}

/// Reads one `TKey` header starting at the cursor's current position: the
/// fixed fields, the small/big seek pair chosen by `fVersion <= 1000`, then
/// the three trailing strings, then prepares the payload source.
pub fn read_tkey(cursor: &mut Cursor, ctx: &FileContext) -> Result<TKey> {
    let nbytes = cursor.i32()?;
    let version = cursor.i16()?;
    let objlen = cursor.i32()?;
    let datime = cursor.u32()?;
    let keylen = cursor.i16()?;
    let cycle = cursor.i16()?;
    let (seek_key, seek_pdir) = if version <= 1000 {
        (cursor.i32()? as i64, cursor.i32()? as i64)
    } else {
        (cursor.i64()?, cursor.i64()?)
    };
    let class_name = read_name_string(cursor)?;
    let name = read_name_string(cursor)?;
    let title = read_name_string(cursor)?;

    let compressed = objlen != nbytes - keylen as i32;
    let (payload_source, payload_index, payload_origin) = if compressed {
        let start = seek_key as u64 + keylen as u64;
        let span = (nbytes - keylen as i32) as u64;
        let sub = CompressedSubSource::new(
            cursor.source().as_ref(),
            start,
            span,
            objlen as usize,
            ctx.codec.as_ref(),
        )?;
        (Arc::new(sub) as Arc<dyn ByteSource>, 0u64, -(keylen as i64))
    } else {
        (
            Arc::clone(cursor.source()),
            seek_key as u64 + keylen as u64,
            seek_key,
        )
    };

    Ok(TKey {
        nbytes,
        version,
        objlen,
        datime,
        keylen,
        cycle,
        seek_key,
        seek_pdir,
        class_name,
        name,
        title,
        payload_source,
        payload_index,
        payload_origin,
    })
}

impl TKey {
    /// A fresh cursor positioned at this key's payload, its own empty
    /// reference table. Used both by [`TKey::get`] and by directory
    /// traversal when descending into a nested `TDirectory` payload.
    pub fn payload_cursor(&self) -> Cursor {
        rcontainer_cursor::Cursor::new(
            Arc::clone(&self.payload_source),
            self.payload_index,
            self.payload_origin,
        )
    }

    /// Decodes this key's payload using the class registered for
    /// `class_name`, starting a fresh decode scope (its own, empty
    /// reference table) each call.
    pub fn get(&self, ctx: &FileContext) -> Result<Value> {
        let mut cursor = self.payload_cursor();
        let reader = ctx.class(&self.class_name).ok_or_else(|| {
            rcontainer_cursor::ReadError::not_found(format!(
                "no class registered for {}",
                self.class_name
            ))
        })?;
        reader.read(&mut cursor, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionDescriptor;
    use crate::mixins::MethodMixins;
    use rcontainer_cursor::{Decompressor, SliceSource};
    use std::collections::{HashMap, HashSet};
    use std::rc::Rc;

    struct NoopCodec;
    impl Decompressor for NoopCodec {
        fn decompress(&self, _algo: [u8; 2], _compressed: &[u8], _uncompressed_len: usize) -> Result<Vec<u8>> {
            unreachable!("no compressed payload is exercised in these tests")
        }
    }

    fn test_ctx(classes: HashMap<String, crate::context::ClassReader>) -> FileContext {
        FileContext {
            source_path: Rc::from("test"),
            classes: Rc::new(classes),
            streamers: Rc::new(Vec::new()),
            compression: CompressionDescriptor::from_fcompress(0),
            uuid: uuid::Uuid::nil(),
            mixins: MethodMixins::new(),
            skip_rules: Rc::new(HashMap::new()),
            codec: Arc::new(NoopCodec),
        }
    }

    fn encode_string(s: &str) -> Vec<u8> {
        let mut out = vec![s.len() as u8];
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn uncompressed_key_round_trip() {
        // fSeekKey always points at the key's own header, so the header
        // must be built bottom-up to learn its own length first.
        let mut header_len: i16 = 4 + 2 + 4 + 4 + 2 + 2 + 4 + 4;
        header_len += 1 + 1 + encode_string("C").len() as i16 - 1;
        header_len += 1 + 1 + encode_string("N").len() as i16 - 1;
        header_len += 1;
        let keylen = header_len;
        let payload = vec![7u8, b'x'];
        let nbytes = keylen as i32 + payload.len() as i32;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&nbytes.to_be_bytes());
        bytes.extend_from_slice(&900i16.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&keylen.to_be_bytes());
        bytes.extend_from_slice(&1i16.to_be_bytes());
        bytes.extend_from_slice(&0i32.to_be_bytes()); // fSeekKey: this key starts at offset 0
        bytes.extend_from_slice(&0i32.to_be_bytes()); // fSeekPdir
        bytes.extend_from_slice(&encode_string("C"));
        bytes.extend_from_slice(&encode_string("N"));
        bytes.extend_from_slice(&encode_string(""));
        assert_eq!(bytes.len(), keylen as usize);
        bytes.extend_from_slice(&payload);

        let source: Arc<dyn ByteSource> = Arc::new(SliceSource::new("test", bytes));
        let mut cursor: Cursor = rcontainer_cursor::Cursor::new(source, 0, 0);
        let ctx = test_ctx(HashMap::new());
        let key = read_tkey(&mut cursor, &ctx).unwrap();
        assert_eq!(key.class_name, "C");
        assert_eq!(key.name, "N");
        assert_eq!(key.seek_key, 0);
        assert_eq!(key.payload_index, keylen as u64);
        assert_eq!(key.payload_origin, 0);
    }
}
