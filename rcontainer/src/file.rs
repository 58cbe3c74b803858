//! Top-level open sequence: file header, bootstrap context, schema catalog,
//! class synthesis, and the root directory.

use crate::builtin::bootstrap_classes;
use crate::compression::CompressionDescriptor;
use crate::context::{Cursor, FileContext};
use crate::dir::{read_directory, Directory};
use crate::key::read_tkey;
use crate::mixins::MethodMixins;
use crate::streamer::{catalog, topo};
use crate::synth;
use rcontainer_cursor::{ByteSource, Decompressor, ReadError, Result};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

const MAGIC: &[u8; 4] = b"root";
const BIG_FILE_THRESHOLD: i32 = 1_000_000;

struct FileHeader {
    begin: i64,
    nbytes_name: i64,
    seek_info: i64,
    compress: i32,
    uuid: Uuid,
}

fn read_header(cursor: &mut Cursor) -> Result<FileHeader> {
    let magic = cursor.bytes(4)?;
    if magic != MAGIC {
        return Err(ReadError::malformed(format!(
            "bad magic: expected \"root\", found {magic:02x?}"
        )));
    }
    let version = cursor.i32()?;
    let big = version >= BIG_FILE_THRESHOLD;

    let begin = cursor.i32()? as i64;
    let _end = if big { cursor.i64()? } else { cursor.i32()? as i64 };
    let _seek_free = if big { cursor.i64()? } else { cursor.i32()? as i64 };
    let _nbytes_free = cursor.i32()?;
    let _nfree = cursor.i32()?;
    let nbytes_name = cursor.i32()? as i64;
    let _units = cursor.u8()?;
    let compress = cursor.i32()?;
    let seek_info = if big { cursor.i64()? } else { cursor.i32()? as i64 };
    let _nbytes_info = cursor.i32()?;
    let uuid_bytes = cursor.bytes(18)?;
    let mut uuid16 = [0u8; 16];
    uuid16.copy_from_slice(&uuid_bytes[0..16]);
    let uuid = Uuid::from_bytes(uuid16);

    Ok(FileHeader {
        begin,
        nbytes_name,
        seek_info,
        compress,
        uuid,
    })
}

/// A decoded container: the root [`Directory`] plus the per-file context
/// every key's payload is decoded against.
pub struct RootFile {
    root: Directory,
    context: FileContext,
}

impl RootFile {
    /// Opens `source`, parsing its header, embedded schema catalog, and
    /// root directory. `codec` is handed to every `TKey` whose payload is
    /// compressed; `mixins` and `skip_rules` are woven into the synthesized
    /// classes exactly as an `OpenOptions` builder would configure them.
    ///
    /// `dismiss_after_open`, after the top-level decode that this call
    /// performs, invokes `source.dismiss()` -- win or lose, matching the
    /// propagation rule that a top-level decode always gets to hint its
    /// source before returning.
    pub fn open(
        source: Arc<dyn ByteSource>,
        codec: Arc<dyn Decompressor>,
        mixins: MethodMixins,
        skip_rules: HashMap<String, HashSet<String>>,
        dismiss_after_open: bool,
    ) -> anyhow::Result<Self> {
        let result = Self::open_inner(&source, codec, mixins, skip_rules);
        if dismiss_after_open {
            source.dismiss();
        }
        Ok(result?)
    }

    fn open_inner(
        source: &Arc<dyn ByteSource>,
        codec: Arc<dyn Decompressor>,
        mixins: MethodMixins,
        skip_rules: HashMap<String, HashSet<String>>,
    ) -> Result<Self> {
        let source_path: Rc<str> = Rc::from(source.path());
        let mut header_cursor: Cursor = rcontainer_cursor::Cursor::new(Arc::clone(source), 0, 0);
        let header = read_header(&mut header_cursor)?;

        let bootstrap = FileContext {
            source_path: Rc::clone(&source_path),
            classes: Rc::new(bootstrap_classes()),
            streamers: Rc::new(Vec::new()),
            compression: CompressionDescriptor::from_fcompress(header.compress),
            uuid: header.uuid,
            mixins: mixins.clone(),
            skip_rules: Rc::new(skip_rules),
            codec: Arc::clone(&codec),
        };

        let mut info_cursor = header_cursor.copied(Some(header.seek_info as u64), None);
        let info_key = read_tkey(&mut info_cursor, &bootstrap)?;
        let mut payload_cursor = info_key.payload_cursor();
        let catalog = catalog::load_catalog(&mut payload_cursor, &bootstrap)?;
        let ordered = topo::sort(catalog.streamers)?;
        let classes = synth::synthesize(&ordered, &bootstrap)?;

        let context = FileContext {
            source_path,
            classes: Rc::new(classes),
            streamers: Rc::new(ordered),
            compression: bootstrap.compression,
            uuid: bootstrap.uuid,
            mixins,
            skip_rules: bootstrap.skip_rules,
            codec,
        };

        let mut top_cursor = header_cursor.copied(Some(header.begin as u64), None);
        let top_key = read_tkey(&mut top_cursor, &context)?;
        let mut dir_cursor =
            header_cursor.fork_new_scope((header.begin + header.nbytes_name) as u64, header.begin);
        let root = read_directory(&mut dir_cursor, &context, &top_key.name)?;

        Ok(Self { root, context })
    }

    /// The root directory.
    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// The context every key's payload is decoded against.
    pub fn context(&self) -> &FileContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use rcontainer_cursor::{Decompressor, SliceSource};

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = vec![b'x', b'x', b'x', b'x'];
        bytes.extend_from_slice(&0i32.to_be_bytes());
        let source: Arc<dyn ByteSource> = Arc::new(SliceSource::new("t", bytes));
        let mut cursor: Cursor = rcontainer_cursor::Cursor::new(source, 0, 0);
        let err = read_header(&mut cursor).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    struct NoopCodec;
    impl Decompressor for NoopCodec {
        fn decompress(
            &self,
            _algo: [u8; 2],
            _compressed: &[u8],
            _uncompressed_len: usize,
        ) -> Result<Vec<u8>> {
            unreachable!("no compressed payload is exercised in these tests")
        }
    }

    fn encode_string(s: &str) -> Vec<u8> {
        let mut out = vec![s.len() as u8];
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn build_key_bytes(seek_key: i64, class_name: &str, name: &str, title: &str, payload: &[u8]) -> Vec<u8> {
        let cn = encode_string(class_name);
        let nm = encode_string(name);
        let ti = encode_string(title);
        let keylen = (4 + 2 + 4 + 4 + 2 + 2 + 4 + 4 + cn.len() + nm.len() + ti.len()) as i16;
        let nbytes = keylen as i32 + payload.len() as i32;
        let mut out = Vec::new();
        out.extend_from_slice(&nbytes.to_be_bytes());
        out.extend_from_slice(&900i16.to_be_bytes());
        out.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&keylen.to_be_bytes());
        out.extend_from_slice(&1i16.to_be_bytes());
        out.extend_from_slice(&(seek_key as i32).to_be_bytes());
        out.extend_from_slice(&0i32.to_be_bytes());
        out.extend_from_slice(&cn);
        out.extend_from_slice(&nm);
        out.extend_from_slice(&ti);
        assert_eq!(out.len() as i64, keylen as i64);
        out.extend_from_slice(payload);
        out
    }

    fn key_header_len(class_name: &str, name: &str, title: &str) -> i16 {
        build_key_bytes(0, class_name, name, title, &[]).len() as i16
    }

    fn framed_record(version: u16, body: &[u8]) -> Vec<u8> {
        let count = (2 + body.len() as u32) | 0x4000_0000;
        let mut out = Vec::new();
        out.extend_from_slice(&count.to_be_bytes());
        out.extend_from_slice(&version.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn build_dir_record(seek_keys: i64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1i16.to_be_bytes()); // fVersion, small layout
        out.extend_from_slice(&0u32.to_be_bytes()); // fDatimeC
        out.extend_from_slice(&0u32.to_be_bytes()); // fDatimeM
        out.extend_from_slice(&0i32.to_be_bytes()); // fNbytesKeys
        out.extend_from_slice(&0i32.to_be_bytes()); // fNbytesName
        out.extend_from_slice(&0i32.to_be_bytes()); // fSeekDir
        out.extend_from_slice(&0i32.to_be_bytes()); // fSeekParent
        out.extend_from_slice(&(seek_keys as i32).to_be_bytes()); // fSeekKeys
        out
    }

    /// Assembles a minimal, valid container: an empty streamer catalog, a
    /// root directory holding a single `TObjString` key, and opens it
    /// through the full `RootFile::open` sequence.
    #[test]
    fn opens_minimal_container_and_reads_a_key() {
        let tlist_body = {
            let mut body = Vec::new();
            body.extend_from_slice(&1u16.to_be_bytes()); // TObject version
            body.extend_from_slice(&0u32.to_be_bytes()); // unique id
            body.extend_from_slice(&0u32.to_be_bytes()); // bits
            body.push(0); // fName: empty
            body.extend_from_slice(&0i32.to_be_bytes()); // fSize = 0 elements
            body
        };
        let tlist_payload = framed_record(1, &tlist_body);

        const HEADER_LEN: i64 = 63;
        let info_seek = HEADER_LEN;
        let info_key = build_key_bytes(info_seek, "TList", "", "", &tlist_payload);

        let top_seek = info_seek + info_key.len() as i64;
        let top_keylen = key_header_len("TFile", "", "");
        let top_payload_start = top_seek + top_keylen as i64;
        let seek_keys = top_payload_start + 30;
        let dir_record = build_dir_record(seek_keys);
        assert_eq!(dir_record.len(), 30);
        let top_key = build_key_bytes(top_seek, "TFile", "", "", &dir_record);
        assert_eq!(top_seek + top_key.len() as i64, seek_keys);

        let header_key_seek = seek_keys;
        let header_key = build_key_bytes(header_key_seek, "TKeyList", "", "", &[]);
        let nkeys_seek = header_key_seek + header_key.len() as i64;

        let greeting_payload = {
            let mut body = Vec::new();
            body.extend_from_slice(&1u16.to_be_bytes());
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(&encode_string("hi"));
            framed_record(1, &body)
        };
        let greeting_seek = nkeys_seek + 4;
        let greeting_key = build_key_bytes(greeting_seek, "TObjString", "greeting", "", &greeting_payload);
        let end = greeting_seek + greeting_key.len() as i64;

        let mut buf = Vec::new();
        buf.extend_from_slice(b"root");
        buf.extend_from_slice(&0i32.to_be_bytes()); // fVersion: small layout
        buf.extend_from_slice(&(top_seek as i32).to_be_bytes()); // fBEGIN
        buf.extend_from_slice(&(end as i32).to_be_bytes()); // fEND
        buf.extend_from_slice(&0i32.to_be_bytes()); // fSeekFree
        buf.extend_from_slice(&0i32.to_be_bytes()); // fNbytesFree
        buf.extend_from_slice(&0i32.to_be_bytes()); // nfree
        buf.extend_from_slice(&(top_keylen as i32).to_be_bytes()); // fNbytesName
        buf.push(1); // fUnits
        buf.extend_from_slice(&0i32.to_be_bytes()); // fCompress: uncompressed
        buf.extend_from_slice(&(info_seek as i32).to_be_bytes()); // fSeekInfo
        buf.extend_from_slice(&0i32.to_be_bytes()); // fNbytesInfo
        buf.extend_from_slice(&[0u8; 18]); // fUUID
        assert_eq!(buf.len() as i64, HEADER_LEN);

        buf.extend_from_slice(&info_key);
        buf.extend_from_slice(&top_key);
        buf.extend_from_slice(&header_key);
        buf.extend_from_slice(&1i32.to_be_bytes()); // nkeys
        buf.extend_from_slice(&greeting_key);

        let source: Arc<dyn ByteSource> = Arc::new(SliceSource::new("test.root", buf));
        let file = RootFile::open(
            source,
            Arc::new(NoopCodec),
            MethodMixins::new(),
            HashMap::new(),
            false,
        )
        .unwrap();

        assert_eq!(file.root().keys().len(), 1);
        let value = file.root().get("greeting", None).unwrap();
        let text = value.as_object().and_then(|o| o.field("fString")).and_then(Value::as_str);
        assert_eq!(text, Some("hi"));
        assert!(file.root().get("missing", None).is_err());
    }
}
