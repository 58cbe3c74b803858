//! A reader for a self-describing binary container format built around an
//! embedded schema catalog: a directory tree of named, cycle-versioned keys
//! whose payloads are framed records interpreted against streamer
//! descriptions carried in the file itself.
//!
//! Nothing here generates Rust types at runtime. Classes named by the
//! embedded catalog are synthesized into a single data-driven interpreter
//! ([`synth::ClassDescriptor`]) rather than compiled code; every decoded
//! record, synthesized or hand-written, becomes a [`value::Value`].
//!
//! Typical use: construct a [`rcontainer_cursor::ByteSource`] over the file,
//! configure an [`options::OpenOptions`] with a [`rcontainer_cursor::Decompressor`],
//! then call [`options::OpenOptions::open`] to get a [`file::RootFile`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtin;
pub mod compression;
pub mod context;
pub mod dir;
pub mod file;
pub mod ftype;
pub mod key;
pub mod mixins;
pub mod options;
pub mod refs;
pub mod sanitize;
pub mod streamer;
pub mod synth;
pub mod value;

pub use context::FileContext;
pub use dir::Directory;
pub use file::RootFile;
pub use key::TKey;
pub use options::OpenOptions;
pub use rcontainer_cursor::{ByteSource, Decompressor, ReadError, Result, SliceSource};
pub use value::{Object, Undefined, Value};
