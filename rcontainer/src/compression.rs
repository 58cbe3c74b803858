//! Decoding of the file-level compression descriptor.

/// Algorithm + level pair decoded from a container's `fCompress` field.
///
/// `fCompress = algorithm * 100 + level`. This arithmetic is format-
/// intrinsic -- it does not perform any actual (de)compression, which
/// stays an external concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionDescriptor {
    /// The compression algorithm code (1 = zlib, 2 = LZMA, 4 = LZ4, 5 = zstd
    /// in the upstream format; this crate does not interpret the code
    /// itself, it only extracts it).
    pub algorithm: i32,
    /// The compression level, 0-9.
    pub level: i32,
}

impl CompressionDescriptor {
    /// Decodes a descriptor from a raw `fCompress` value.
    pub fn from_fcompress(fcompress: i32) -> Self {
        Self {
            algorithm: fcompress / 100,
            level: fcompress % 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_algorithm_and_level() {
        let d = CompressionDescriptor::from_fcompress(101);
        assert_eq!(d.algorithm, 1);
        assert_eq!(d.level, 1);
    }

    #[test]
    fn zero_is_uncompressed() {
        let d = CompressionDescriptor::from_fcompress(0);
        assert_eq!(d.algorithm, 0);
        assert_eq!(d.level, 0);
    }
}
