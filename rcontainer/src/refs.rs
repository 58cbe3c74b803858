//! `ReadObjectAny`: the class-tag/object-reference decoder.

use crate::builtin::read_undefined;
use crate::context::{
    Cursor, FileContext, RefEntry, K_CLASS_MASK, K_MAP_OFFSET, K_NEW_CLASS_TAG,
};
use rcontainer_cursor::framed::K_BYTE_COUNT_MASK;
use rcontainer_cursor::{ReadError, Result};
use std::rc::Rc;
use tracing::trace;

use crate::value::Value;

/// Decodes one polymorphic object reference at the cursor's current
/// position: a null, a self-reference (unsupported), a back-reference to
/// an already-decoded object, a new class tag (registers the class and
/// decodes a new object), or a class-tag reference (decodes a new object
/// of an already-registered class).
///
/// `want_undefined`, when set, forces the object to be decoded as
/// [`Undefined`](crate::value::Undefined) regardless of whether its class
/// is known -- used by the class synthesizer for per-class skip-rules.
pub fn read_object_any(cursor: &mut Cursor, ctx: &FileContext, want_undefined: bool) -> Result<Value> {
    let beg = cursor.relative();
    let bcnt = cursor.u32()?;

    let (vers, start, tag) = if bcnt & K_BYTE_COUNT_MASK == 0 || bcnt == K_NEW_CLASS_TAG {
        (0u8, 0i64, bcnt)
    } else {
        let start = cursor.relative();
        let tag = cursor.u32()?;
        (1u8, start, tag)
    };
    // `bcnt` only carries a meaningful byte count in the `vers == 1` branch;
    // in the `vers == 0` branch the source always jumps past a record whose
    // declared length is zero, which is a no-op (the 4 count bytes were
    // already consumed).
    let record_bcnt = if vers == 1 { bcnt } else { 0 };

    if tag & K_CLASS_MASK == 0 {
        match tag {
            0 => {
                trace!(tag, "ReadObjectAny: null");
                Ok(Value::Null)
            }
            1 => Err(ReadError::unsupported(
                "ReadObjectAny: self-reference (tag == 1) is not supported",
            )),
            _ => match cursor.refs().get(tag as u64) {
                Some(RefEntry::Object(value)) => {
                    trace!(tag, "ReadObjectAny: resolved object back-reference");
                    Ok(value)
                }
                Some(RefEntry::Class(_)) => Err(ReadError::malformed(format!(
                    "ReadObjectAny: tag {tag} refers to a class, not an object"
                ))),
                None => {
                    let new_index = (cursor.origin() + beg + record_bcnt as i64 + 4) as u64;
                    trace!(tag, new_index, "ReadObjectAny: unresolved reference, skipping");
                    cursor.set_index(new_index);
                    Ok(Value::Null)
                }
            },
        }
    } else if tag == K_NEW_CLASS_TAG {
        let cname_bytes = cursor.cstring()?;
        let cname = String::from_utf8_lossy(&cname_bytes).into_owned();
        trace!(class = %cname, "ReadObjectAny: new class tag");

        let class_key = if vers > 0 {
            start as u64 + K_MAP_OFFSET
        } else {
            cursor.refs().len() as u64 + 1
        };
        cursor.refs().insert(class_key, RefEntry::Class(Rc::from(cname.as_str())));

        let reader = ctx.class(&cname).cloned();
        let obj = if want_undefined || reader.is_none() {
            read_undefined(cursor, Some(cname.clone()))?
        } else {
            reader.unwrap().read(cursor, ctx)?
        };

        let obj_key = if vers > 0 {
            beg as u64 + K_MAP_OFFSET
        } else {
            cursor.refs().len() as u64 + 1
        };
        cursor.refs().insert(obj_key, RefEntry::Object(obj.clone()));
        Ok(obj)
    } else {
        let ref_key = (tag & !K_CLASS_MASK) as u64;
        let cname = match cursor.refs().get(ref_key) {
            Some(RefEntry::Class(name)) => name,
            Some(RefEntry::Object(_)) => {
                return Err(ReadError::malformed(format!(
                    "ReadObjectAny: tag {tag} is a class-tag reference to an object, not a class"
                )))
            }
            None => {
                return Err(ReadError::malformed(format!(
                    "ReadObjectAny: invalid class-tag reference {ref_key}"
                )))
            }
        };
        trace!(class = %cname, "ReadObjectAny: class-tag reference");

        let obj = if want_undefined {
            read_undefined(cursor, Some(cname.to_string()))?
        } else {
            match ctx.class(&cname) {
                Some(reader) => reader.read(cursor, ctx)?,
                None => {
                    return Err(ReadError::malformed(format!(
                        "ReadObjectAny: class-tag reference to unrecognized class {cname}"
                    )))
                }
            }
        };

        let obj_key = if vers > 0 {
            beg as u64 + K_MAP_OFFSET
        } else {
            cursor.refs().len() as u64 + 1
        };
        cursor.refs().insert(obj_key, RefEntry::Object(obj.clone()));
        Ok(obj)
    }
}

