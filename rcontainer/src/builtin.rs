//! Hand-written decoders for the fixed set of types needed before the
//! embedded schema catalog is available.

use crate::context::{ClassReader, Cursor, FileContext};
use crate::ftype;
use crate::refs::read_object_any;
use crate::value::{Object, Undefined, Value};
use bstr::BString;
use rcontainer_cursor::framed::{end_check, name_title, skip_tobject, start_check};
use rcontainer_cursor::Result;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

fn obj(class_name: &str, version: u16, fields: BTreeMap<String, Value>) -> Value {
    Value::Object(Rc::new(Object {
        class_name: class_name.to_string(),
        version,
        fields,
    }))
}

/// `TString`: a length-prefixed byte string with no framing of its own.
pub fn read_tstring(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
    let bytes = cursor.string()?;
    Ok(Value::Bytes(BString::from(bytes)))
}

/// `TObject`: the base `fUniqueID`/`fBits` pair, not independently framed.
pub fn read_tobject(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
    let bits = skip_tobject(cursor)?;
    let mut fields = BTreeMap::new();
    fields.insert("fBits".to_string(), Value::U32(bits.bits()));
    Ok(obj("TObject", 0, fields))
}

/// `TNamed`: framed, `TObject` inline, then `(fName, fTitle)`.
pub fn read_tnamed(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
    let record = start_check(cursor)?;
    let (name, title) = name_title(cursor)?;
    end_check(cursor, record)?;
    let mut fields = BTreeMap::new();
    fields.insert("fName".to_string(), Value::Bytes(BString::from(name)));
    fields.insert("fTitle".to_string(), Value::Bytes(BString::from(title)));
    Ok(obj("TNamed", record.version, fields))
}

/// `TObjArray`: framed, `TObject` inline, `name`, `(size, low)`, then `size`
/// polymorphic elements via `ReadObjectAny`.
pub fn read_tobjarray(cursor: &mut Cursor, ctx: &FileContext) -> Result<Value> {
    let record = start_check(cursor)?;
    skip_tobject(cursor)?;
    let name = cursor.string()?;
    let size = cursor.i32()?;
    let _low = cursor.i32()?;
    let mut elements = Vec::with_capacity(size.max(0) as usize);
    for _ in 0..size.max(0) {
        elements.push(read_object_any(cursor, ctx, false)?);
    }
    end_check(cursor, record)?;
    let mut fields = BTreeMap::new();
    fields.insert("fName".to_string(), Value::Bytes(BString::from(name)));
    fields.insert("fElements".to_string(), Value::Array(elements));
    Ok(obj("TObjArray", record.version, fields))
}

/// `TList`: framed, `TObject` inline, `name`, `size`, then `size` pairs of
/// (polymorphic element, skipped per-entry option bytes).
pub fn read_tlist(cursor: &mut Cursor, ctx: &FileContext) -> Result<Value> {
    let record = start_check(cursor)?;
    skip_tobject(cursor)?;
    let name = cursor.string()?;
    let size = cursor.i32()?;
    let mut elements = Vec::with_capacity(size.max(0) as usize);
    for _ in 0..size.max(0) {
        let element = read_object_any(cursor, ctx, false)?;
        let option_len = cursor.u8()? as u64;
        cursor.skip(option_len)?;
        elements.push(element);
    }
    end_check(cursor, record)?;
    let mut fields = BTreeMap::new();
    fields.insert("fName".to_string(), Value::Bytes(BString::from(name)));
    fields.insert("fElements".to_string(), Value::Array(elements));
    Ok(obj("TList", record.version, fields))
}

/// `TObjString`: framed, `TObject` inline, then a single string.
pub fn read_tobjstring(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
    let record = start_check(cursor)?;
    skip_tobject(cursor)?;
    let s = cursor.string()?;
    end_check(cursor, record)?;
    let mut fields = BTreeMap::new();
    fields.insert("fString".to_string(), Value::Bytes(BString::from(s)));
    Ok(obj("TObjString", record.version, fields))
}

macro_rules! tarray_reader {
    ($fn_name:ident, $class_name:expr, $read_one:ident, $wrap:expr) => {
        /// A numeric `TArrayX`: an `i32` length, then that many values.
        pub fn $fn_name(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
            let len = cursor.i32()?.max(0) as usize;
            let items = cursor
                .$read_one(len)?
                .into_iter()
                .map($wrap)
                .collect();
            let mut fields = BTreeMap::new();
            fields.insert("fArray".to_string(), Value::Array(items));
            Ok(obj($class_name, 0, fields))
        }
    };
}

tarray_reader!(read_tarrayc, "TArrayC", array_i8, Value::I8);
tarray_reader!(read_tarrays, "TArrayS", array_i16, Value::I16);
tarray_reader!(read_tarrayi, "TArrayI", array_i32, Value::I32);
// `TArrayL`'s element width is platform-dependent upstream; fixed at 4
// bytes here for portability (see DESIGN.md).
tarray_reader!(read_tarrayl, "TArrayL", array_i32, Value::I32);
tarray_reader!(read_tarrayl64, "TArrayL64", array_i64, Value::I64);
tarray_reader!(read_tarrayf, "TArrayF", array_f32, Value::F32);
tarray_reader!(read_tarrayd, "TArrayD", array_f64, Value::F64);

/// A placeholder used when a class is unknown or deliberately elided: skips
/// the remainder of the framed payload without interpreting it.
pub fn read_undefined(cursor: &mut Cursor, class_name: Option<String>) -> Result<Value> {
    let record = start_check(cursor)?;
    let skipped = record.expected_bytes - 6;
    cursor.skip(skipped as u64)?;
    end_check(cursor, record)?;
    Ok(Value::Undefined(Undefined {
        class_name,
        skipped_bytes: skipped,
    }))
}

/// The fields common to every `TStreamerElement` variant. Held as typed
/// locals, in addition to being mirrored into the decoded object's field
/// map, because the class synthesizer and the
/// `TStreamerBasicType`/`TStreamerSTL` variant logic need them as plain
/// Rust values rather than re-parsed [`Value`]s.
pub struct ElementCommon {
    /// The inner, common-fields frame's version -- not the outer,
    /// variant-specific frame's version. Each concrete variant reads its
    /// own outer frame, then delegates to this function for a second,
    /// nested frame; the nested frame's version is the one that ends up
    /// stamped on the decoded object.
    pub version: u16,
    pub name: Vec<u8>,
    pub title: Vec<u8>,
    pub ftype: i32,
    pub fsize: i32,
    pub farraylength: i32,
    pub farraydim: i32,
    pub fmaxindex: Vec<i32>,
    pub ftypename: Vec<u8>,
    pub fxmin: f64,
    pub fxmax: f64,
    pub ffactor: f64,
}

impl ElementCommon {
    fn into_fields(self) -> BTreeMap<String, Value> {
        let mut fields = BTreeMap::new();
        fields.insert("fName".to_string(), Value::Bytes(BString::from(self.name)));
        fields.insert("fTitle".to_string(), Value::Bytes(BString::from(self.title)));
        fields.insert("fType".to_string(), Value::I32(self.ftype));
        fields.insert("fSize".to_string(), Value::I32(self.fsize));
        fields.insert("fArrayLength".to_string(), Value::I32(self.farraylength));
        fields.insert("fArrayDim".to_string(), Value::I32(self.farraydim));
        fields.insert(
            "fMaxIndex".to_string(),
            Value::Array(self.fmaxindex.into_iter().map(Value::I32).collect()),
        );
        fields.insert(
            "fTypeName".to_string(),
            Value::Bytes(BString::from(self.ftypename)),
        );
        fields.insert("fXmin".to_string(), Value::F64(self.fxmin));
        fields.insert("fXmax".to_string(), Value::F64(self.fxmax));
        fields.insert("fFactor".to_string(), Value::F64(self.ffactor));
        fields
    }
}

/// Reads the common `TStreamerElement` fields: itself a fully framed
/// record, called from inside each concrete variant's own frame.
pub fn read_element_common(cursor: &mut Cursor) -> Result<ElementCommon> {
    let record = start_check(cursor)?;
    let (name, title) = name_title(cursor)?;
    let mut ftype = cursor.i32()?;
    let fsize = cursor.i32()?;
    let farraylength = cursor.i32()?;
    let farraydim = cursor.i32()?;
    let fmaxindex = if record.version == 1 {
        let n = cursor.i32()?.max(0) as usize;
        cursor.array_i32(n)?
    } else {
        cursor.array_i32(5)?
    };
    let ftypename = cursor.string()?;
    if ftype == ftype::K_UCHAR && (ftypename == b"Bool_t" || ftypename == b"bool") {
        ftype = ftype::K_BOOL;
    }
    // version <= 2 (fSize recomputation from the runtime type system) and
    // version > 3 (kHasRange bit) are left inert; both are open questions
    // (DESIGN.md).
    let (mut fxmin, mut fxmax, mut ffactor) = (0.0, 0.0, 0.0);
    if record.version == 3 {
        fxmin = cursor.f64()?;
        fxmax = cursor.f64()?;
        ffactor = cursor.f64()?;
    }
    end_check(cursor, record)?;
    Ok(ElementCommon {
        version: record.version,
        name,
        title,
        ftype,
        fsize,
        farraylength,
        farraydim,
        fmaxindex,
        ftypename,
        fxmin,
        fxmax,
        ffactor,
    })
}

/// `TStreamerBase`: element, plus `fBaseVersion` on version > 2.
pub fn read_tstreamer_base(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
    let outer = start_check(cursor)?;
    let common = read_element_common(cursor)?;
    let base_version = if outer.version > 2 {
        Some(cursor.i32()?)
    } else {
        None
    };
    end_check(cursor, outer)?;
    let version = common.version;
    let mut fields = common.into_fields();
    if let Some(v) = base_version {
        fields.insert("fBaseVersion".to_string(), Value::I32(v));
    }
    Ok(obj("TStreamerBase", version, fields))
}

fn read_count_fields(cursor: &mut Cursor) -> Result<(i32, Vec<u8>, Vec<u8>)> {
    let count_version = cursor.i32()?;
    let count_name = cursor.string()?;
    let count_class = cursor.string()?;
    Ok((count_version, count_name, count_class))
}

/// `TStreamerBasicPointer`: element, plus `(fCountVersion, fCountName,
/// fCountClass)`.
pub fn read_tstreamer_basic_pointer(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
    let outer = start_check(cursor)?;
    let common = read_element_common(cursor)?;
    let (count_version, count_name, count_class) = read_count_fields(cursor)?;
    end_check(cursor, outer)?;
    let version = common.version;
    let mut fields = common.into_fields();
    fields.insert("fCountVersion".to_string(), Value::I32(count_version));
    fields.insert(
        "fCountName".to_string(),
        Value::Bytes(BString::from(count_name)),
    );
    fields.insert(
        "fCountClass".to_string(),
        Value::Bytes(BString::from(count_class)),
    );
    Ok(obj("TStreamerBasicPointer", version, fields))
}

/// `TStreamerLoop`: identical wire shape to `TStreamerBasicPointer`.
pub fn read_tstreamer_loop(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
    let outer = start_check(cursor)?;
    let common = read_element_common(cursor)?;
    let (count_version, count_name, count_class) = read_count_fields(cursor)?;
    end_check(cursor, outer)?;
    let version = common.version;
    let mut fields = common.into_fields();
    fields.insert("fCountVersion".to_string(), Value::I32(count_version));
    fields.insert(
        "fCountName".to_string(),
        Value::Bytes(BString::from(count_name)),
    );
    fields.insert(
        "fCountClass".to_string(),
        Value::Bytes(BString::from(count_class)),
    );
    Ok(obj("TStreamerLoop", version, fields))
}

fn basic_type_size(ftype: i32) -> Option<i32> {
    use ftype::*;
    match ftype {
        K_BOOL | K_UCHAR | K_CHAR => Some(1),
        K_USHORT | K_SHORT => Some(2),
        K_BITS | K_UINT | K_INT | K_COUNTER => Some(4),
        K_ULONG | K_ULONG64 | K_LONG | K_LONG64 => Some(8),
        K_FLOAT | K_FLOAT16 => Some(4),
        K_DOUBLE | K_DOUBLE32 => Some(8),
        // Platform pointer size is unavailable at this layer; assumes a
        // 64-bit target (see DESIGN.md). Reading the value itself is left
        // unsupported.
        K_CHAR_STAR => Some(8),
        _ => None,
    }
}

/// `TStreamerBasicType`: element, then self-normalizes `fType`/`fSize` from
/// a lookup table keyed by the (possibly `kOffsetL`-shifted) type code.
pub fn read_tstreamer_basic_type(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
    let outer = start_check(cursor)?;
    let mut common = read_element_common(cursor)?;
    if crate::context::K_OFFSET_L < common.ftype && common.ftype < crate::context::K_OFFSET_P {
        common.ftype -= crate::context::K_OFFSET_L;
    }
    if let Some(mut size) = basic_type_size(common.ftype) {
        if common.farraylength > 0 {
            size *= common.farraylength;
        }
        common.fsize = size;
    }
    end_check(cursor, outer)?;
    let version = common.version;
    Ok(obj("TStreamerBasicType", version, common.into_fields()))
}

/// `TStreamerSTL`: element, then `(fSTLtype, fCtype)`, with a name-prefix
/// reclassification between `set`/`multiset` and `map`/`multimap`.
pub fn read_tstreamer_stl(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
    let outer = start_check(cursor)?;
    let common = read_element_common(cursor)?;
    let mut stl_type = cursor.i32()?;
    let ctype = cursor.i32()?;
    let typename = String::from_utf8_lossy(&common.ftypename).into_owned();
    if stl_type == ftype::K_STL_MULTIMAP || stl_type == ftype::K_STL_SET {
        if typename.starts_with("std::set") || typename.starts_with("set") {
            stl_type = ftype::K_STL_SET;
        } else if typename.starts_with("std::multimap") || typename.starts_with("multimap") {
            stl_type = ftype::K_STL_MULTIMAP;
        }
    }
    end_check(cursor, outer)?;
    let version = common.version;
    let mut fields = common.into_fields();
    fields.insert("fSTLtype".to_string(), Value::I32(stl_type));
    fields.insert("fCtype".to_string(), Value::I32(ctype));
    Ok(obj("TStreamerSTL", version, fields))
}

/// `TStreamerSTLstring`: identical wire shape to `TStreamerSTL`, no
/// additional fields.
pub fn read_tstreamer_stlstring(cursor: &mut Cursor, ctx: &FileContext) -> Result<Value> {
    let outer = start_check(cursor)?;
    let inner = read_tstreamer_stl(cursor, ctx)?;
    end_check(cursor, outer)?;
    match inner {
        Value::Object(o) => Ok(obj("TStreamerSTLstring", o.version, o.fields.clone())),
        other => Ok(other),
    }
}

macro_rules! plain_streamer_element {
    ($fn_name:ident, $class_name:expr) => {
        /// Element passthrough: no fields beyond the common ones.
        pub fn $fn_name(cursor: &mut Cursor, _ctx: &FileContext) -> Result<Value> {
            let outer = start_check(cursor)?;
            let common = read_element_common(cursor)?;
            end_check(cursor, outer)?;
            let version = common.version;
            Ok(obj($class_name, version, common.into_fields()))
        }
    };
}

plain_streamer_element!(read_tstreamer_object, "TStreamerObject");
plain_streamer_element!(read_tstreamer_object_any, "TStreamerObjectAny");
plain_streamer_element!(read_tstreamer_object_pointer, "TStreamerObjectPointer");
plain_streamer_element!(read_tstreamer_object_any_pointer, "TStreamerObjectAnyPointer");
plain_streamer_element!(read_tstreamer_string, "TStreamerString");
plain_streamer_element!(read_tstreamer_artificial, "TStreamerArtificial");

/// `TStreamerInfo`: framed, `name_title` (title discarded), `(fCheckSum,
/// fClassVersion)`, then a polymorphic list of elements via
/// `ReadObjectAny`.
pub fn read_tstreamerinfo(cursor: &mut Cursor, ctx: &FileContext) -> Result<Value> {
    let record = start_check(cursor)?;
    let (name, _title) = name_title(cursor)?;
    let check_sum = cursor.u32()?;
    let class_version = cursor.i32()?;
    let elements = read_object_any(cursor, ctx, false)?;
    end_check(cursor, record)?;
    let mut fields = BTreeMap::new();
    fields.insert("fName".to_string(), Value::Bytes(BString::from(name)));
    fields.insert("fCheckSum".to_string(), Value::U32(check_sum));
    fields.insert("fClassVersion".to_string(), Value::I32(class_version));
    fields.insert("fElements".to_string(), elements);
    Ok(obj("TStreamerInfo", record.version, fields))
}

/// Builds the bootstrap class registry: every hand-written reader needed
/// before the embedded schema catalog has been loaded.
pub fn bootstrap_classes() -> HashMap<String, ClassReader> {
    let mut classes = HashMap::new();
    macro_rules! register {
        ($name:expr, $reader:expr) => {
            classes.insert($name.to_string(), ClassReader::Builtin($reader));
        };
    }
    register!("TString", read_tstring);
    register!("TObject", read_tobject);
    register!("TNamed", read_tnamed);
    register!("TObjArray", read_tobjarray);
    register!("TList", read_tlist);
    register!("TObjString", read_tobjstring);
    register!("TArrayC", read_tarrayc);
    register!("TArrayS", read_tarrays);
    register!("TArrayI", read_tarrayi);
    register!("TArrayL", read_tarrayl);
    register!("TArrayL64", read_tarrayl64);
    register!("TArrayF", read_tarrayf);
    register!("TArrayD", read_tarrayd);
    register!("TStreamerInfo", read_tstreamerinfo);
    register!("TStreamerBase", read_tstreamer_base);
    register!("TStreamerBasicPointer", read_tstreamer_basic_pointer);
    register!("TStreamerLoop", read_tstreamer_loop);
    register!("TStreamerBasicType", read_tstreamer_basic_type);
    register!("TStreamerSTL", read_tstreamer_stl);
    register!("TStreamerSTLstring", read_tstreamer_stlstring);
    register!("TStreamerObject", read_tstreamer_object);
    register!("TStreamerObjectAny", read_tstreamer_object_any);
    register!("TStreamerObjectPointer", read_tstreamer_object_pointer);
    register!(
        "TStreamerObjectAnyPointer",
        read_tstreamer_object_any_pointer
    );
    register!("TStreamerString", read_tstreamer_string);
    register!("TStreamerArtificial", read_tstreamer_artificial);
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RefEntry;
    use rcontainer_cursor::{Decompressor, SliceSource};
    use std::sync::Arc;

    struct NoopCodec;
    impl Decompressor for NoopCodec {
        fn decompress(&self, _algo: [u8; 2], _compressed: &[u8], _uncompressed_len: usize) -> rcontainer_cursor::Result<Vec<u8>> {
            unreachable!("no compressed payload is exercised in these tests")
        }
    }

    fn cursor_over(bytes: Vec<u8>) -> Cursor {
        let source: Arc<dyn rcontainer_cursor::ByteSource> =
            Arc::new(SliceSource::new("test", bytes));
        Cursor::new(source, 0, 0)
    }

    #[test]
    fn tstring_round_trip() {
        let mut c = cursor_over(vec![3, b'f', b'o', b'o']);
        let ctx_classes: HashMap<String, ClassReader> = bootstrap_classes();
        let ctx = FileContext {
            source_path: Rc::from("test"),
            classes: Rc::new(ctx_classes),
            streamers: Rc::new(Vec::new()),
            compression: crate::compression::CompressionDescriptor::from_fcompress(0),
            uuid: uuid::Uuid::nil(),
            mixins: crate::mixins::MethodMixins::new(),
            skip_rules: Rc::new(HashMap::new()),
            codec: Arc::new(NoopCodec),
        };
        let v = read_tstring(&mut c, &ctx).unwrap();
        assert_eq!(v.as_str(), Some("foo"));
    }

    #[test]
    fn tobject_sets_heap_bit() {
        let mut bytes = vec![0u8, 1];
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let mut c = cursor_over(bytes);
        let ctx = FileContext {
            source_path: Rc::from("test"),
            classes: Rc::new(bootstrap_classes()),
            streamers: Rc::new(Vec::new()),
            compression: crate::compression::CompressionDescriptor::from_fcompress(0),
            uuid: uuid::Uuid::nil(),
            mixins: crate::mixins::MethodMixins::new(),
            skip_rules: Rc::new(HashMap::new()),
            codec: Arc::new(NoopCodec),
        };
        let v = read_tobject(&mut c, &ctx).unwrap();
        let bits = v.as_object().unwrap().field("fBits").unwrap().as_u32().unwrap();
        let bits = rcontainer_cursor::framed::TObjectBits::from_bits_retain(bits);
        assert!(bits.contains(rcontainer_cursor::framed::TObjectBits::IS_ON_HEAP));
    }

    #[test]
    fn bool_remap_from_uchar() {
        // version 2 (not 1, not 3): count=(6 bytes payload after count+vers: name_title + 4 ints + 5 maxindex ints + typename) -- build manually.
        let mut payload = Vec::new();
        payload.extend_from_slice(&2u16.to_be_bytes()); // version
        // TObject skip inside name_title: version u16 (no byte-count-v bit), unique id, bits
        payload.extend_from_slice(&0u16.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.push(4);
        payload.extend_from_slice(b"name");
        payload.push(5);
        payload.extend_from_slice(b"title");
        payload.extend_from_slice(&ftype::K_UCHAR.to_be_bytes());
        payload.extend_from_slice(&1i32.to_be_bytes());
        payload.extend_from_slice(&0i32.to_be_bytes());
        payload.extend_from_slice(&0i32.to_be_bytes());
        for _ in 0..5 {
            payload.extend_from_slice(&0i32.to_be_bytes());
        }
        payload.push(6);
        payload.extend_from_slice(b"Bool_t");

        let mut bytes = vec![0u8; 4];
        let total_len = payload.len() as u32;
        bytes[0..4].copy_from_slice(&(0x4000_0000u32 | total_len).to_be_bytes());
        bytes.extend_from_slice(&payload);

        let mut c = cursor_over(bytes);
        let common = read_element_common(&mut c).unwrap();
        assert_eq!(common.ftype, ftype::K_BOOL);
    }

    #[test]
    fn undefined_skips_declared_payload() {
        let mut bytes = vec![0u8; 4];
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&[9, 9, 9, 9]);
        let total_len = (bytes.len() - 4) as u32;
        bytes[0..4].copy_from_slice(&(0x4000_0000u32 | total_len).to_be_bytes());
        bytes.extend_from_slice(&[1, 2, 3]); // trailing bytes, untouched
        let mut c = cursor_over(bytes);
        let v = read_undefined(&mut c, Some("Foo".to_string())).unwrap();
        match v {
            Value::Undefined(u) => {
                assert_eq!(u.class_name.as_deref(), Some("Foo"));
                assert_eq!(u.skipped_bytes, 4);
            }
            _ => panic!("expected Undefined"),
        }
        assert_eq!(c.index(), 10);
    }

    #[test]
    fn refentry_class_roundtrip_through_registry() {
        let refs = rcontainer_cursor::RefTable::<RefEntry>::new();
        refs.insert(5, RefEntry::Class(Rc::from("TObject")));
        assert!(matches!(refs.get(5), Some(RefEntry::Class(_))));
    }
}
