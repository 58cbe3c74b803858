//! The generic decoded-object representation.
//!
//! Nothing in this crate generates Rust types at runtime. Instead every
//! decoded record, whether produced by a hand-written builtin reader or by a
//! synthesized [`ClassDescriptor`](crate::synth::ClassDescriptor), ends up
//! as a [`Value`]. Downstream layers that know the shape of a particular
//! class (e.g. a columnar tree reader) pattern-match into it.

use bstr::BString;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A decoded value: either a primitive, an array of values, a fully
/// decoded object, or a placeholder for an unrecognized/deliberately
/// skipped class.
#[derive(Debug, Clone)]
pub enum Value {
    /// A null object reference (`tag == 0`).
    Null,
    /// A single byte, used for `Bool_t`/`bool` fields remapped from `fType == 11`.
    Bool(bool),
    /// Signed 8-bit integer.
    I8(i8),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// IEEE-754 single precision float.
    F32(f32),
    /// IEEE-754 double precision float.
    F64(f64),
    /// A length-prefixed or NUL-terminated byte string (`TString`/`cstring`).
    Bytes(BString),
    /// A homogeneous array of decoded values, e.g. a `TArrayX` or a fixed-
    /// length/counted streamer array field.
    Array(Vec<Value>),
    /// A fully decoded object: either a hand-written builtin or a record
    /// produced by a synthesized class reader.
    Object(Rc<Object>),
    /// A class the context does not recognize, or one deliberately elided
    /// by an `OpenOptions` skip-rule; the framed payload was consumed
    /// without being interpreted.
    Undefined(Undefined),
}

/// A decoded object: its sanitized class name, the streamer version that
/// produced it, and its field values in declaration order.
#[derive(Debug, Clone)]
pub struct Object {
    /// Sanitized class name (see [`crate::sanitize::sanitize_class_name`]).
    pub class_name: String,
    /// The framed record's version, stamped by the class reader that
    /// produced this object.
    pub version: u16,
    /// Field values, keyed by the streamer element's name. A `BTreeMap`
    /// keeps field iteration order deterministic for tests and diagnostics;
    /// insertion order itself is recoverable from the originating streamer.
    pub fields: BTreeMap<String, Value>,
}

impl Object {
    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl Value {
    /// Returns the wrapped `i32`, if this is a [`Value::I32`].
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the wrapped `u32`, if this is a [`Value::U32`].
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the wrapped byte string as UTF-8, if this is a
    /// [`Value::Bytes`] and valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => b.to_str().ok(),
            _ => None,
        }
    }

    /// Returns the wrapped array, if this is a [`Value::Array`].
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the wrapped object, if this is a [`Value::Object`].
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// A placeholder for a record whose class was unknown, or whose payload
/// was deliberately skipped by a configured skip-rule.
#[derive(Debug, Clone)]
pub struct Undefined {
    /// The class name recorded on the wire, if one was available.
    pub class_name: Option<String>,
    /// The number of payload bytes that were skipped.
    pub skipped_bytes: u32,
}
