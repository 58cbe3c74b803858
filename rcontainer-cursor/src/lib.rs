//! Generic byte-parsing toolkit used to decode self-describing binary
//! container formats.
//!
//! This crate has no notion of any particular file format. It provides:
//!
//! * [`ByteSource`] -- the abstract contract for random-access byte sources.
//! * [`Cursor`] -- a positional reader over a [`ByteSource`], with an
//!   `origin` for nested framings and a reference table for back-references.
//! * [`CompressedSubSource`] -- a virtual [`ByteSource`] over a compressed
//!   span that transparently decompresses on read.
//! * Framed-record helpers: [`start_check`], [`end_check`], [`skip_tobject`],
//!   [`name_title`].
//!
//! Most users should not depend on this crate directly; it is a building
//! block for `rcontainer`, which knows how to interpret the bytes this crate
//! merely shuttles around.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compressed;
pub mod cursor;
pub mod error;
pub mod framed;
pub mod refs;
pub mod source;

#[cfg(test)]
mod tests;

pub use compressed::{CompressedSubSource, Decompressor};
pub use cursor::Cursor;
pub use error::{ReadError, Result};
pub use framed::{end_check, name_title, skip_tobject, start_check, FramedRecord, TObjectBits};
pub use refs::{RefKey, RefTable};
pub use source::{ByteSource, SliceSource};
