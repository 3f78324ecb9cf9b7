// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Attribute references: a parsed path into a context's attributes.
//!
//! Grounded on `launchdarkly/attribute_reference.hpp` from the original
//! implementation. Two constructors exist because the wire format lets
//! callers write either a bare attribute name (`"email"`, which may
//! itself contain slashes) or an explicit slash-delimited reference
//! (`"/address/city"`) for reaching into nested custom attributes.

use std::fmt;

/// A single path component, with RFC 6901-style escaping undone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Component(String);

impl Component {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A parsed attribute path.
///
/// `kind`, `key`, and the top-level `_meta` can never be marked
/// private -- callers should check [`AttributeRef::is_redactable`]
/// before treating a reference as eligible for privacy filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    components: Vec<Component>,
    /// The original string, preserved verbatim for error messages even
    /// when the reference turned out to be invalid.
    raw: String,
    valid: bool,
}

const NEVER_REDACTABLE: &[&str] = &["kind", "key", "_meta"];

impl AttributeRef {
    /// Build a reference where the *entire* input string is a single
    /// attribute name, even if it contains `/` or `~`. Used whenever a
    /// plain top-level attribute name is all that's needed.
    pub fn parse_literal(name: impl Into<String>) -> Self {
        let name = name.into();
        let valid = !name.is_empty();
        Self {
            components: if valid {
                vec![Component(name.clone())]
            } else {
                vec![]
            },
            raw: name,
            valid,
        }
    }

    /// Build a reference from a slash-delimited path
    /// (`"/address/city"`), unescaping `~1` -> `/` and `~0` -> `~` in
    /// each component. A bare name with no leading slash is treated as
    /// a single-component reference (equivalent to a literal).
    pub fn parse(path: impl Into<String>) -> Self {
        let raw = path.into();
        if raw.is_empty() {
            return Self {
                components: vec![],
                raw,
                valid: false,
            };
        }
        if !raw.starts_with('/') {
            return Self::parse_literal(raw);
        }
        let mut components = Vec::new();
        for part in raw[1..].split('/') {
            if part.is_empty() {
                return Self {
                    components: vec![],
                    raw,
                    valid: false,
                };
            }
            components.push(Component(unescape(part)));
        }
        let valid = !components.is_empty();
        Self {
            components,
            raw,
            valid,
        }
    }

    /// Build a reference directly from already-unescaped path
    /// components -- used by the context filter (§4.4) to address a
    /// nested path it is walking without round-tripping through a
    /// slash-escaped string first.
    pub fn from_components(components: Vec<String>) -> Self {
        if components.is_empty() {
            return Self {
                components: vec![],
                raw: String::new(),
                valid: false,
            };
        }
        let raw = components
            .iter()
            .map(|c| escape(c))
            .fold(String::new(), |mut acc, c| {
                acc.push('/');
                acc.push_str(&c);
                acc
            });
        Self {
            components: components.into_iter().map(Component).collect(),
            raw,
            valid: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// `true` for the built-ins that can never be privatized
    /// (specification §3.2 and §4.4).
    pub fn is_redactable(&self) -> bool {
        self.valid
            && !(self.components.len() == 1
                && NEVER_REDACTABLE.contains(&self.components[0].as_str()))
    }

    /// The attribute-reference string form, suitable for re-parsing
    /// with [`AttributeRef::parse`]. Used when building redaction
    /// lists and matches the round-trip property in specification §8.1.
    pub fn redaction_name(&self) -> String {
        if self.components.len() == 1 && !self.raw.starts_with('/') {
            // Literal form; re-escape defensively in case the bare name
            // itself contains '/' or '~', which would otherwise change
            // meaning if ever reparsed as a reference.
            let comp = escape(self.components[0].as_str());
            if comp == self.components[0].as_str() {
                return comp;
            }
            return format!("/{comp}");
        }
        let mut out = String::new();
        for c in &self.components {
            out.push('/');
            out.push_str(&escape(c.as_str()));
        }
        out
    }
}

impl PartialOrd for AttributeRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AttributeRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.components.cmp(&other.components)
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn unescape(s: &str) -> String {
    s.replace("~1", "/").replace("~0", "~")
}

fn escape(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_with_slash_is_one_component() {
        let r = AttributeRef::parse_literal("a/b");
        assert!(r.is_valid());
        assert_eq!(r.components().len(), 1);
        assert_eq!(r.components()[0].as_str(), "a/b");
    }

    #[test]
    fn reference_splits_and_unescapes() {
        let r = AttributeRef::parse("/address/~1city~0");
        assert!(r.is_valid());
        assert_eq!(r.components()[0].as_str(), "address");
        assert_eq!(r.components()[1].as_str(), "/city~");
    }

    #[test]
    fn empty_reference_is_invalid_but_preserved() {
        let r = AttributeRef::parse("/");
        assert!(!r.is_valid());
        assert_eq!(r.raw(), "/");
    }

    #[test]
    fn built_ins_are_never_redactable() {
        assert!(!AttributeRef::parse_literal("kind").is_redactable());
        assert!(!AttributeRef::parse_literal("key").is_redactable());
        assert!(!AttributeRef::parse_literal("_meta").is_redactable());
        assert!(AttributeRef::parse_literal("email").is_redactable());
    }

    #[test]
    fn redaction_round_trip() {
        // specification §8.1: for any literal string s, reparsing
        // redaction_name() yields a reference with equal components.
        for s in ["plain", "a/b", "a~b", "weird~0name"] {
            let literal = AttributeRef::parse_literal(s);
            let name = literal.redaction_name();
            let reparsed = AttributeRef::parse(&name);
            assert_eq!(reparsed.components(), literal.components(), "failed for {s}");
        }
    }

    #[test]
    fn ordering_is_lexicographic_over_components() {
        let a = AttributeRef::parse("/a/b");
        let b = AttributeRef::parse("/a/c");
        assert!(a < b);
    }
}
