//! Dependency sort of streamers by base-class/member-class dependencies.

use super::types::TStreamerInfo;
use rcontainer_cursor::{ReadError, Result};
use std::collections::HashSet;

/// The built-in classes always assumed available before any streamer is
/// sorted.
pub const SEED_PROVIDED: &[&str] = &[
    "TObject",
    "TNamed",
    "TString",
    "TList",
    "TObjArray",
    "TObjString",
    "TArrayC",
    "TArrayS",
    "TArrayI",
    "TArrayL",
    "TArrayL64",
    "TArrayF",
    "TArrayD",
];

/// Topologically sorts `streamers` so that every streamer appears after
/// the streamers it depends on. Fails with [`ReadError::Malformed`] if a
/// full pass over the remaining streamers emits nothing, listing each
/// remaining streamer with its unmet dependencies.
pub fn sort(streamers: Vec<TStreamerInfo>) -> Result<Vec<TStreamerInfo>> {
    let mut provided: HashSet<String> = SEED_PROVIDED.iter().map(|s| s.to_string()).collect();
    let mut remaining = streamers;
    let mut ordered = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let mut next_remaining = Vec::new();
        let mut emitted_this_pass = false;

        for streamer in remaining {
            let deps: Vec<String> = streamer
                .elements
                .iter()
                .filter_map(|e| e.dependency())
                .collect();
            if deps.iter().all(|d| provided.contains(d)) {
                provided.insert(streamer.name.clone());
                ordered.push(streamer);
                emitted_this_pass = true;
            } else {
                next_remaining.push(streamer);
            }
        }

        if !emitted_this_pass {
            let mut diagnostics = Vec::new();
            for streamer in &next_remaining {
                let unmet: Vec<String> = streamer
                    .elements
                    .iter()
                    .filter_map(|e| e.dependency())
                    .filter(|d| !provided.contains(d))
                    .collect();
                diagnostics.push(format!("{} (unmet: {})", streamer.name, unmet.join(", ")));
            }
            return Err(ReadError::malformed(format!(
                "streamer dependency sort did not converge: {}",
                diagnostics.join("; ")
            )));
        }

        remaining = next_remaining;
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamer::types::ElementCommon;

    fn base_element(name: &str) -> crate::streamer::types::TStreamerElement {
        crate::streamer::types::TStreamerElement::Base {
            common: ElementCommon {
                name: name.to_string(),
                title: String::new(),
                ftype: 0,
                fsize: 0,
                farraylength: 0,
                farraydim: 0,
                fmaxindex: Vec::new(),
                ftypename: String::new(),
            },
            base_version: None,
        }
    }

    fn streamer(name: &str, deps: &[&str]) -> TStreamerInfo {
        TStreamerInfo {
            name: name.to_string(),
            class_version: 1,
            check_sum: 0,
            elements: deps.iter().map(|d| base_element(d)).collect(),
        }
    }

    #[test]
    fn sorts_simple_dependency_chain() {
        let a = streamer("A", &[]);
        let b = streamer("B", &["A"]);
        let sorted = sort(vec![b, a]).unwrap();
        let names: Vec<_> = sorted.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn cyclic_dependency_fails() {
        let a = streamer("A", &["B"]);
        let b = streamer("B", &["A"]);
        let err = sort(vec![a, b]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("A"));
        assert!(msg.contains("B"));
    }

    #[test]
    fn seed_classes_need_no_definition() {
        let derived = streamer("MyHist", &["TNamed"]);
        let sorted = sort(vec![derived]).unwrap();
        assert_eq!(sorted.len(), 1);
    }
}
