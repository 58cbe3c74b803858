//! `TDirectory`: an ordered, named set of keys, possibly nesting further
//! directories.

use crate::context::{Cursor, FileContext};
use crate::key::{read_tkey, TKey};
use crate::value::Value;
use rcontainer_cursor::{ReadError, Result};

/// Sanitized class name a key must carry to be descended into as a nested
/// directory.
const DIRECTORY_CLASS: &str = "TDirectory";

/// A named container of keys, each identified within it by `(fName,
/// fCycle)`. A key of class `TDirectory` is itself the root of a nested
/// directory.
#[derive(Clone)]
pub struct Directory {
    name: String,
    context: FileContext,
    keys: Vec<TKey>,
}

/// Reads a directory record starting at the cursor's current position: the
/// fixed fields, the small/big seek triple chosen by `fVersion <= 1000`,
/// then the key list at `fSeekKeys` (a header key, an i32 key count, then
/// that many keys).
pub fn read_directory(cursor: &mut Cursor, ctx: &FileContext, name: &str) -> Result<Directory> {
    let version = cursor.i16()?;
    let _datime_c = cursor.u32()?;
    let _datime_m = cursor.u32()?;
    let _nbytes_keys = cursor.i32()?;
    let _nbytes_name = cursor.i32()?;
    let (_seek_dir, _seek_parent, seek_keys) = if version <= 1000 {
        (
            cursor.i32()? as i64,
            cursor.i32()? as i64,
            cursor.i32()? as i64,
        )
    } else {
        (cursor.i64()?, cursor.i64()?, cursor.i64()?)
    };

    let mut keylist = cursor.copied(Some(seek_keys as u64), None);
    let _header_key = read_tkey(&mut keylist, ctx)?;
    let nkeys = keylist.i32()?;
    if nkeys < 0 {
        return Err(ReadError::malformed(format!(
            "directory {name}: negative key count {nkeys}"
        )));
    }
    let mut keys = Vec::with_capacity(nkeys as usize);
    for _ in 0..nkeys {
        keys.push(read_tkey(&mut keylist, ctx)?);
    }

    Ok(Directory {
        name: name.to_string(),
        context: ctx.clone(),
        keys,
    })
}

fn open_subdirectory(key: &TKey, ctx: &FileContext) -> Result<Directory> {
    let mut cursor = key.payload_cursor();
    read_directory(&mut cursor, ctx, &key.name)
}

fn matches(key: &TKey, filtername: Option<&str>, filterclass: Option<&str>) -> bool {
    filtername.map_or(true, |f| key.name == f) && filterclass.map_or(true, |c| key.class_name == c)
}

/// Splits `path` on `/` into directory components and a leaf.
fn split_dir_components(path: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = path.split('/').collect();
    let leaf = parts.pop().unwrap_or(path);
    (parts, leaf)
}

/// Pulls a trailing `;cycle` suffix off `leaf`, if it parses as one.
fn parse_embedded_cycle(leaf: &str) -> (&str, Option<i16>) {
    match leaf.rsplit_once(';') {
        Some((name, suffix)) => match suffix.parse::<i16>() {
            Ok(c) => (name, Some(c)),
            Err(_) => (leaf, None),
        },
        None => (leaf, None),
    }
}

impl Directory {
    /// This directory's own name (empty for the file's root directory).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All keys directly in this directory, in insertion order.
    pub fn keys(&self) -> &[TKey] {
        &self.keys
    }

    fn find_key(&self, name: &str, cycle: Option<i16>) -> Result<&TKey> {
        self.keys
            .iter()
            .find(|k| k.name == name && cycle.map_or(true, |c| k.cycle == c))
            .ok_or_else(|| {
                ReadError::not_found(format!("{name} not found in directory {}", self.name))
            })
    }

    fn navigate(&self, components: &[&str]) -> Result<Directory> {
        match components.split_first() {
            None => Ok(self.clone()),
            Some((first, rest)) => {
                let key = self.find_key(first, None)?;
                let sub = open_subdirectory(key, &self.context)?;
                sub.navigate(rest)
            }
        }
    }

    /// Looks up `name` (`/`-separated directory components, optionally
    /// `;cycle`-suffixed on the leaf) and decodes the matching key's
    /// payload.
    ///
    /// `cycle`, when given, selects that cycle explicitly and is used
    /// verbatim against the leaf component -- any `;` in `name` is then
    /// part of the literal key name rather than an embedded cycle suffix,
    /// so a key legitimately named e.g. `"a;b"` can still be looked up by
    /// pairing it with an explicit cycle. When `cycle` is `None`, a
    /// trailing `;cycle` suffix on the leaf is parsed as an embedded
    /// cycle; with neither form present, no explicit cycle selects the
    /// first key encountered with a matching name.
    pub fn get(&self, name: &str, cycle: Option<i16>) -> anyhow::Result<Value> {
        let (dir_components, leaf) = split_dir_components(name);
        let (leaf, cycle) = match cycle {
            Some(c) => (leaf, Some(c)),
            None => parse_embedded_cycle(leaf),
        };
        let dir = self.navigate(&dir_components)?;
        let key = dir.find_key(leaf, cycle)?;
        Ok(key.get(&dir.context)?)
    }

    fn walk(
        &self,
        recursive: bool,
        filtername: Option<&str>,
        filterclass: Option<&str>,
        out: &mut Vec<(String, TKey)>,
    ) -> Result<()> {
        for key in &self.keys {
            if matches(key, filtername, filterclass) {
                out.push((key.name.clone(), key.clone()));
            }
            if recursive && key.class_name == DIRECTORY_CLASS {
                let sub = open_subdirectory(key, &self.context)?;
                sub.walk(recursive, filtername, filterclass, out)?;
            }
        }
        Ok(())
    }

    /// Names of keys matching the filters, optionally descending into
    /// nested directories. A directory is always descended into when
    /// `recursive` is set, even if it does not itself match the filters.
    pub fn key_names(
        &self,
        recursive: bool,
        filtername: Option<&str>,
        filterclass: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.walk(recursive, filtername, filterclass, &mut out)?;
        Ok(out.into_iter().map(|(name, _)| name).collect())
    }

    /// Decoded payload for every key matching the filters.
    pub fn values(
        &self,
        recursive: bool,
        filtername: Option<&str>,
        filterclass: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut matched = Vec::new();
        self.walk(recursive, filtername, filterclass, &mut matched)?;
        matched
            .into_iter()
            .map(|(_, key)| key.get(&self.context))
            .collect()
    }

    /// `(name, decoded payload)` for every key matching the filters.
    pub fn items(
        &self,
        recursive: bool,
        filtername: Option<&str>,
        filterclass: Option<&str>,
    ) -> Result<Vec<(String, Value)>> {
        let mut matched = Vec::new();
        self.walk(recursive, filtername, filterclass, &mut matched)?;
        matched
            .into_iter()
            .map(|(name, key)| Ok((name, key.get(&self.context)?)))
            .collect()
    }

    /// `(name, class name)` for every key matching the filters, without
    /// decoding any payload.
    pub fn classes(
        &self,
        recursive: bool,
        filtername: Option<&str>,
        filterclass: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        let mut matched = Vec::new();
        self.walk(recursive, filtername, filterclass, &mut matched)?;
        Ok(matched
            .into_iter()
            .map(|(name, key)| (name, key.class_name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_dir_components_and_leaf() {
        assert_eq!(split_dir_components("a/b/h1;2"), (vec!["a", "b"], "h1;2"));
        assert_eq!(split_dir_components("h1"), (vec![], "h1"));
    }

    #[test]
    fn parses_embedded_cycle() {
        assert_eq!(parse_embedded_cycle("h1;2"), ("h1", Some(2)));
        assert_eq!(parse_embedded_cycle("h1"), ("h1", None));
        assert_eq!(parse_embedded_cycle("h1;3"), ("h1", Some(3)));
    }

    #[test]
    fn leaves_non_numeric_suffix_alone() {
        assert_eq!(parse_embedded_cycle("a;b"), ("a;b", None));
    }

    #[test]
    fn explicit_cycle_bypasses_embedded_parsing() {
        // With an explicit cycle, the leaf is used verbatim: a literal name
        // containing ';' is not mistaken for an embedded-cycle suffix.
        let (dir_components, leaf) = split_dir_components("a;b");
        let (leaf, cycle) = match Some(2i16) {
            Some(c) => (leaf, Some(c)),
            None => parse_embedded_cycle(leaf),
        };
        assert!(dir_components.is_empty());
        assert_eq!(leaf, "a;b");
        assert_eq!(cycle, Some(2));
    }
}
