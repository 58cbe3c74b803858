//! `TStreamerElement::fType`/`fSTLtype` codes for primitive and STL
//! categories.

#![allow(missing_docs)]

pub const K_CHAR: i32 = 1;
pub const K_SHORT: i32 = 2;
pub const K_INT: i32 = 3;
pub const K_LONG: i32 = 4;
pub const K_FLOAT: i32 = 5;
pub const K_COUNTER: i32 = 6;
pub const K_CHAR_STAR: i32 = 7;
pub const K_DOUBLE: i32 = 8;
pub const K_DOUBLE32: i32 = 9;
pub const K_UCHAR: i32 = 11;
pub const K_USHORT: i32 = 12;
pub const K_UINT: i32 = 13;
pub const K_ULONG: i32 = 14;
pub const K_BITS: i32 = 15;
pub const K_LONG64: i32 = 16;
pub const K_ULONG64: i32 = 17;
pub const K_BOOL: i32 = 18;
pub const K_FLOAT16: i32 = 19;

/// STL container kind codes (`fSTLtype`).
pub const K_STL_VECTOR: i32 = 1;
pub const K_STL_LIST: i32 = 2;
pub const K_STL_DEQUE: i32 = 3;
pub const K_STL_MAP: i32 = 4;
pub const K_STL_MULTIMAP: i32 = 5;
pub const K_STL_SET: i32 = 6;
pub const K_STL_MULTISET: i32 = 7;
