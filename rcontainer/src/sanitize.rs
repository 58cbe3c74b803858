//! Class-name sanitization used as the key into the class registry.

/// Sanitizes a raw streamer/class name into a form usable as a registry key
/// (and, by a caller wiring this crate into a wider binding layer, a valid
/// identifier): strips template/pointer punctuation rather than trying to
/// preserve a round-trippable C++ type name.
///
/// `:`, `<`, `>`, `,`, ` ` and `*` are stripped or replaced with `_`.
pub fn sanitize_class_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            ':' | '<' | '>' | ',' | ' ' => out.push('_'),
            '*' => {}
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_pointer_star() {
        assert_eq!(sanitize_class_name("TObject*"), "TObject");
    }

    #[test]
    fn replaces_template_punctuation() {
        assert_eq!(
            sanitize_class_name("vector<pair<int,float> >"),
            "vector_pair_int_float___"
        );
    }

    #[test]
    fn replaces_namespace_colons() {
        assert_eq!(sanitize_class_name("std::string"), "std__string");
    }
}
