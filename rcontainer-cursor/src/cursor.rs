//! A positional reader over a [`ByteSource`].

use crate::error::Result;
use crate::refs::RefTable;
use crate::source::ByteSource;
use std::sync::Arc;
use zerocopy::byteorder::BE;
use zerocopy::FromBytes;

/// A positional reader over a [`ByteSource`].
///
/// Holds the current absolute byte offset (`index`), a logical `origin`
/// that is subtracted to compute record-relative positions, and a
/// reference table (`refs`) shared among cursors that are forks of one
/// another. A `Cursor` is owned exclusively by its current reader frame
/// and is never shared between threads; distinct
/// cursors over the same source may be used from distinct threads.
///
/// `T` is the payload type stored in the reference table; this crate does
/// not care what it is.
#[derive(Clone)]
pub struct Cursor<T> {
    source: Arc<dyn ByteSource>,
    index: u64,
    origin: i64,
    refs: RefTable<T>,
}

macro_rules! be_reader {
    ($name:ident, $ty:ty, $wrapper:ty, $len:expr) => {
        #[doc = concat!("Reads a big-endian `", stringify!($ty), "` and advances.")]
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.bytes($len)?;
            let wrapped = <$wrapper>::read_from(&bytes[..]).expect("exact length requested above");
            Ok(wrapped.get())
        }
    };
}

macro_rules! be_float_reader {
    ($name:ident, $ty:ty, $len:expr) => {
        #[doc = concat!("Reads a big-endian `", stringify!($ty), "` and advances.")]
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.bytes($len)?;
            Ok(<$ty>::from_be_bytes(bytes.try_into().unwrap()))
        }
    };
}

macro_rules! be_array_reader {
    ($name:ident, $ty:ty, $wrapper:ty, $item_len:expr) => {
        #[doc = concat!("Reads `n` big-endian `", stringify!($ty), "` values and advances.")]
        pub fn $name(&mut self, n: usize) -> Result<Vec<$ty>> {
            let bytes = self.bytes(n * $item_len)?;
            Ok(bytes
                .chunks_exact($item_len)
                .map(|c| <$wrapper>::read_from(c).expect("exact chunk length above").get())
                .collect())
        }
    };
}

macro_rules! be_float_array_reader {
    ($name:ident, $ty:ty, $item_len:expr) => {
        #[doc = concat!("Reads `n` big-endian `", stringify!($ty), "` values and advances.")]
        pub fn $name(&mut self, n: usize) -> Result<Vec<$ty>> {
            let bytes = self.bytes(n * $item_len)?;
            Ok(bytes
                .chunks_exact($item_len)
                .map(|c| <$ty>::from_be_bytes(c.try_into().unwrap()))
                .collect())
        }
    };
}

impl<T: Clone> Cursor<T> {
    /// Starts a new cursor at `index`, with a fresh (empty) reference table.
    pub fn new(source: Arc<dyn ByteSource>, index: u64, origin: i64) -> Self {
        Self {
            source,
            index,
            origin,
            refs: RefTable::new(),
        }
    }

    /// The current absolute byte offset.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The logical zero used to compute record-relative positions.
    pub fn origin(&self) -> i64 {
        self.origin
    }

    /// `index - origin`: the position relative to the current framing.
    pub fn relative(&self) -> i64 {
        self.index as i64 - self.origin
    }

    /// The reference table shared by this cursor and its forks.
    pub fn refs(&self) -> &RefTable<T> {
        &self.refs
    }

    /// The byte source this cursor reads from.
    pub fn source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }

    /// Directly repositions the cursor, without reading.
    pub fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    /// Reads `n` raw bytes and advances.
    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let data = self.source.read(self.index, n)?;
        self.index += n as u64;
        Ok(data)
    }

    /// Skips `n` bytes without reading them.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.index += n;
        Ok(())
    }

    /// Reads one byte and advances.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    /// Reads one signed byte and advances.
    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.bytes(1)?[0] as i8)
    }

    be_reader!(u16, u16, zerocopy::byteorder::U16<BE>, 2);
    be_reader!(i16, i16, zerocopy::byteorder::I16<BE>, 2);
    be_reader!(u32, u32, zerocopy::byteorder::U32<BE>, 4);
    be_reader!(i32, i32, zerocopy::byteorder::I32<BE>, 4);
    be_reader!(u64, u64, zerocopy::byteorder::U64<BE>, 8);
    be_reader!(i64, i64, zerocopy::byteorder::I64<BE>, 8);
    be_float_reader!(f32, f32, 4);
    be_float_reader!(f64, f64, 8);

    be_array_reader!(array_i16, i16, zerocopy::byteorder::I16<BE>, 2);
    be_array_reader!(array_u16, u16, zerocopy::byteorder::U16<BE>, 2);
    be_array_reader!(array_i32, i32, zerocopy::byteorder::I32<BE>, 4);
    be_array_reader!(array_u32, u32, zerocopy::byteorder::U32<BE>, 4);
    be_array_reader!(array_i64, i64, zerocopy::byteorder::I64<BE>, 8);
    be_array_reader!(array_u64, u64, zerocopy::byteorder::U64<BE>, 8);
    be_float_array_reader!(array_f32, f32, 4);
    be_float_array_reader!(array_f64, f64, 8);

    /// Reads `n` raw (unsigned 8-bit) bytes as an array.
    pub fn array_u8(&mut self, n: usize) -> Result<Vec<u8>> {
        self.bytes(n)
    }

    /// Reads `n` raw bytes reinterpreted as signed 8-bit values.
    pub fn array_i8(&mut self, n: usize) -> Result<Vec<i8>> {
        Ok(self.bytes(n)?.into_iter().map(|b| b as i8).collect())
    }

    /// Length-prefixed byte string.
    ///
    /// The length is the first byte; if that byte equals 255, the next four
    /// bytes carry the true length (big-endian u32). Then that many bytes
    /// are the content.
    pub fn string(&mut self) -> Result<Vec<u8>> {
        let first = self.u8()?;
        let len = if first == 255 {
            self.u32()? as usize
        } else {
            first as usize
        };
        self.bytes(len)
    }

    /// NUL-terminated byte string; returns content without the terminator.
    pub fn cstring(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let b = self.u8()?;
            if b == 0 {
                break;
            }
            out.push(b);
        }
        Ok(out)
    }

    /// Forks this cursor: same source, same reference table (same logical
    /// decode scope), independent position. `None` keeps the current value.
    pub fn copied(&self, new_index: Option<u64>, new_origin: Option<i64>) -> Self {
        Self {
            source: self.source.clone(),
            index: new_index.unwrap_or(self.index),
            origin: new_origin.unwrap_or(self.origin),
            refs: self.refs.clone(),
        }
    }

    /// Forks this cursor into an independent decode scope: same source, but
    /// a fresh (empty) reference table. Used when starting a brand-new
    /// top-level decode over a source that an existing cursor already
    /// touched (e.g. a TKey's lazily-prepared payload cursor).
    pub fn fork_new_scope(&self, new_index: u64, new_origin: i64) -> Self {
        Self {
            source: self.source.clone(),
            index: new_index,
            origin: new_origin,
            refs: RefTable::new(),
        }
    }
}
