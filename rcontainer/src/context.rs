//! Per-file decoding state and the `Cursor`/ref-table instantiation used
//! throughout this crate.

use crate::compression::CompressionDescriptor;
use crate::mixins::MethodMixins;
use crate::synth::ClassDescriptor;
use crate::value::Value;
use rcontainer_cursor::{Decompressor, Result};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

/// Marker used by [`ReadObjectAny`](crate::refs::read_object_any) for the
/// tag encoding.
pub const K_NEW_CLASS_TAG: u32 = 0xFFFF_FFFF;
/// High bit distinguishing a class-tag reference from an object reference.
pub const K_CLASS_MASK: u32 = 0x8000_0000;
/// Added to a record-relative offset to form a ref-table key.
pub const K_MAP_OFFSET: u64 = 2;

/// `fType` values below this threshold are fixed-length-array-offset
/// variants of the base scalar type.
pub const K_OFFSET_L: i32 = 20;
/// `fType` values below this threshold (and at/above [`K_OFFSET_L`]) are
/// counted-pointer-array variants of the base scalar type.
pub const K_OFFSET_P: i32 = 40;

/// `TStreamerElement::fType` for an inline nested object (`kObjectp`).
pub const K_OBJECTP: i32 = 63;
/// `TStreamerElement::fType` for a nested object reached via
/// `ReadObjectAny` (`"kObjectP"`).
pub const K_OBJECTP_PTR: i32 = 64;
/// A reader for a built-in (hand-written) class, invoked the same way a
/// synthesized class's reader would be.
pub type BuiltinReader = fn(&mut Cursor, &FileContext) -> Result<Value>;

/// The two kinds of class known to a [`FileContext`]: either hand-written
/// (the bootstrap set) or produced by the class synthesizer.
#[derive(Clone)]
pub enum ClassReader {
    /// A hand-written bootstrap reader.
    Builtin(BuiltinReader),
    /// A reader produced by [`crate::synth::synthesize`].
    Synthesized(Rc<ClassDescriptor>),
}

impl ClassReader {
    /// Invokes this class's reader.
    pub fn read(&self, cursor: &mut Cursor, ctx: &FileContext) -> Result<Value> {
        match self {
            ClassReader::Builtin(f) => f(cursor, ctx),
            ClassReader::Synthesized(class) => class.read(cursor, ctx),
        }
    }

    /// The streamer-declared version this reader expects, if it is a
    /// synthesized class (builtins have no streamer version to check
    /// against).
    pub fn declared_version(&self) -> Option<u16> {
        match self {
            ClassReader::Builtin(_) => None,
            ClassReader::Synthesized(class) => Some(class.version),
        }
    }
}

/// An entry in a [`Cursor`]'s reference table: either a class (registered
/// by [`crate::refs::read_object_any`] on first encountering a new-class
/// tag) or a previously decoded object.
#[derive(Clone)]
pub enum RefEntry {
    /// A class registered by name-tag, to be referenced later by class-tag.
    Class(Rc<str>),
    /// A previously decoded object, to be referenced later by object-tag.
    Object(Value),
}

/// This crate's instantiation of the generic cursor, carrying
/// [`RefEntry`] as its reference-table payload.
pub type Cursor = rcontainer_cursor::Cursor<RefEntry>;

/// Per-file decoding state: the class registry, the ordered streamer list,
/// the default compression descriptor, and the file UUID.
///
/// Shallow-copyable: cloning a [`FileContext`] shares the same underlying
/// registry `Rc`s rather than deep-copying them.
#[derive(Clone)]
pub struct FileContext {
    /// Identity string of the underlying byte source, for diagnostics.
    pub source_path: Rc<str>,
    /// Class registry: sanitized class name to reader.
    pub classes: Rc<HashMap<String, ClassReader>>,
    /// The ordered streamer catalog, once loaded (empty during bootstrap).
    pub streamers: Rc<Vec<crate::streamer::TStreamerInfo>>,
    /// The file's default compression descriptor.
    pub compression: CompressionDescriptor,
    /// The file UUID.
    pub uuid: Uuid,
    /// Process-wide method-mixin registry handle.
    pub mixins: MethodMixins,
    /// Per-class "skip these members" table, configured externally via
    /// `OpenOptions`.
    pub skip_rules: Rc<HashMap<String, HashSet<String>>>,
    /// The decompression facility a `TKey`'s compressed payload is handed
    /// to. Supplied externally via `OpenOptions`; this crate only parses
    /// the block framing.
    pub codec: Arc<dyn Decompressor>,
}

impl FileContext {
    /// Looks up a class reader by sanitized name.
    pub fn class(&self, name: &str) -> Option<&ClassReader> {
        self.classes.get(name)
    }

    /// True if `field` on `class_name` is configured to be skipped
    /// (decoded as [`Undefined`](crate::value::Undefined) and discarded).
    pub fn is_skipped(&self, class_name: &str, field: &str) -> bool {
        self.skip_rules
            .get(class_name)
            .map(|fields| fields.contains(field))
            .unwrap_or(false)
    }
}
