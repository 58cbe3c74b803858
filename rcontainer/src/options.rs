//! Caller-configurable knobs for [`crate::file::RootFile::open`].

use crate::file::RootFile;
use crate::mixins::MethodMixins;
use rcontainer_cursor::{ByteSource, Decompressor};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Options governing how a container is opened: the decompression facility
/// compressed payloads are handed to, the process-wide method-mixin
/// registry, a per-class set of fields to elide rather than decode, and
/// whether the source is dismissed once the top-level decode completes.
///
/// A path or URI carrying a scheme prefix (e.g. `s3://...`, `xrd://...`)
/// is a [`ByteSource`] construction concern, resolved by the caller before
/// ever reaching `open`; this type only configures the decode itself.
#[derive(Clone)]
pub struct OpenOptions {
    codec: Arc<dyn Decompressor>,
    mixins: MethodMixins,
    skip_rules: HashMap<String, HashSet<String>>,
    dismiss_after_open: bool,
}

impl OpenOptions {
    /// Starts from `codec` (mandatory: there is no default decompressor)
    /// with no registered mixins, no skip rules, and `dismiss()` not
    /// invoked after opening.
    pub fn new(codec: Arc<dyn Decompressor>) -> Self {
        Self {
            codec,
            mixins: MethodMixins::new(),
            skip_rules: HashMap::new(),
            dismiss_after_open: false,
        }
    }

    /// Attaches a process-wide method-mixin registry, replacing the
    /// default empty one.
    pub fn with_mixins(mut self, mixins: MethodMixins) -> Self {
        self.mixins = mixins;
        self
    }

    /// Marks `field` on `class_name` to be read as `Undefined` and
    /// discarded rather than decoded. May be called more than once for the
    /// same class to add further fields.
    pub fn skip_field(mut self, class_name: impl Into<String>, field: impl Into<String>) -> Self {
        self.skip_rules
            .entry(class_name.into())
            .or_default()
            .insert(field.into());
        self
    }

    /// Requests that `source.dismiss()` be invoked once the top-level
    /// decode this `open` call performs has finished, win or lose.
    pub fn dismiss_after_open(mut self, dismiss: bool) -> Self {
        self.dismiss_after_open = dismiss;
        self
    }

    /// Opens `source` with these options.
    pub fn open(self, source: Arc<dyn ByteSource>) -> anyhow::Result<RootFile> {
        RootFile::open(
            source,
            self.codec,
            self.mixins,
            self.skip_rules,
            self.dismiss_after_open,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopCodec;
    impl Decompressor for NoopCodec {
        fn decompress(
            &self,
            _algo: [u8; 2],
            _compressed: &[u8],
            _uncompressed_len: usize,
        ) -> Result<Vec<u8>> {
            unreachable!("not exercised")
        }
    }

    #[test]
    fn skip_field_accumulates_per_class() {
        let opts = OpenOptions::new(Arc::new(NoopCodec))
            .skip_field("TBranch", "fBaskets")
            .skip_field("TBranch", "fEntryOffset")
            .skip_field("TTree", "fFriends");
        assert_eq!(opts.skip_rules["TBranch"].len(), 2);
        assert_eq!(opts.skip_rules["TTree"].len(), 1);
    }
}
