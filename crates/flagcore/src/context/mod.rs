// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The evaluation context: a multi-kind set of attributes describing
//! the subject of a flag evaluation (specification §3.3).

pub mod attribute_ref;

pub use attribute_ref::AttributeRef;

use crate::value::Value;
use std::collections::BTreeMap;

/// The attribute bag for a single context kind.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    pub key: String,
    pub name: Option<String>,
    pub anonymous: bool,
    pub custom: BTreeMap<String, Value>,
    pub private_attributes: Vec<AttributeRef>,
}

impl Attributes {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Resolve a value at the given reference path, walking into
    /// nested objects for multi-component references. Built-ins
    /// (`key`, `kind`, `name`, `anonymous`) are resolved directly;
    /// everything else is looked up in `custom`.
    pub fn get(&self, ref_: &AttributeRef) -> Option<Value> {
        if !ref_.is_valid() {
            return None;
        }
        let first = ref_.components()[0].as_str();
        let root = match first {
            "key" => Value::String(self.key.clone()),
            "name" => self.name.clone().map(Value::String).unwrap_or(Value::Null),
            "anonymous" => Value::Bool(self.anonymous),
            _ => self.custom.get(first).cloned()?,
        };
        if ref_.depth() == 1 {
            return Some(root);
        }
        let mut cur = root;
        for comp in &ref_.components()[1..] {
            let obj = cur.as_object()?;
            cur = obj.get(comp.as_str())?.clone();
        }
        Some(cur)
    }
}

fn valid_kind(kind: &str) -> bool {
    !kind.is_empty()
        && kind != "multi"
        && kind != "kind"
        && kind
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// The subject of an evaluation: either a single kind with one
/// attribute set, or multiple kinds each with their own.
#[derive(Debug, Clone)]
pub enum Context {
    Single { kind: String, attributes: Attributes },
    Multi(BTreeMap<String, Attributes>),
    /// An invalid context, carrying the accumulated error description.
    /// Evaluating against this must always produce `error(userNotSpecified)`.
    Invalid(String),
}

impl Context {
    /// Build a single-kind context, validating as it goes.
    pub fn single(kind: impl Into<String>, attributes: Attributes) -> Self {
        let kind = kind.into();
        let mut errors = Vec::new();
        if !valid_kind(&kind) {
            errors.push(format!("invalid kind: {kind}"));
        }
        if attributes.key.is_empty() {
            errors.push("key must not be empty".to_string());
        }
        if !errors.is_empty() {
            return Context::Invalid(errors.join("; "));
        }
        Context::Single { kind, attributes }
    }

    /// Build a multi-kind context from `(kind, attributes)` pairs.
    pub fn multi(kinds: impl IntoIterator<Item = (String, Attributes)>) -> Self {
        let mut map = BTreeMap::new();
        let mut errors = Vec::new();
        for (kind, attrs) in kinds {
            if !valid_kind(&kind) {
                errors.push(format!("invalid kind: {kind}"));
                continue;
            }
            if attrs.key.is_empty() {
                errors.push(format!("key must not be empty for kind {kind}"));
                continue;
            }
            map.insert(kind, attrs);
        }
        if map.is_empty() {
            errors.push("context must have at least one kind".to_string());
        }
        if !errors.is_empty() {
            return Context::Invalid(errors.join("; "));
        }
        Context::Multi(map)
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Context::Invalid(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Context::Invalid(e) => Some(e.as_str()),
            _ => None,
        }
    }

    /// All kinds present in this context, in no particular order for
    /// single-kind contexts and sorted order for multi-kind ones.
    pub fn kinds(&self) -> Vec<&str> {
        match self {
            Context::Single { kind, .. } => vec![kind.as_str()],
            Context::Multi(m) => m.keys().map(String::as_str).collect(),
            Context::Invalid(_) => vec![],
        }
    }

    /// The attribute set for a given kind, if present.
    pub fn attributes_for(&self, kind: &str) -> Option<&Attributes> {
        match self {
            Context::Single { kind: k, attributes } if k == kind => Some(attributes),
            Context::Multi(m) => m.get(kind),
            _ => None,
        }
    }

    /// Resolve `kind`'s attribute at `ref_`, defaulting to the `user`
    /// kind when `contextKind` is unset on a clause (specification
    /// §4.3.2).
    pub fn get(&self, kind: &str, ref_: &AttributeRef) -> Option<Value> {
        self.attributes_for(kind)?.get(ref_)
    }

    /// Percent-encode `:` and `%` for the canonical-key algorithm.
    fn encode_key_component(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                ':' => out.push_str("%3A"),
                '%' => out.push_str("%25"),
                other => out.push(other),
            }
        }
        out
    }

    /// The canonical key, per specification §3.3: bare `key` for a
    /// single `user` context, `{kind}:{key}` (percent-encoded) for any
    /// other single kind, and the sorted `kind:key` pairs joined by
    /// `:` for multi-kind contexts.
    pub fn canonical_key(&self) -> Option<String> {
        match self {
            Context::Single { kind, attributes } => {
                if kind == "user" {
                    Some(attributes.key.clone())
                } else {
                    Some(format!(
                        "{}:{}",
                        Self::encode_key_component(kind),
                        Self::encode_key_component(&attributes.key)
                    ))
                }
            }
            Context::Multi(m) => Some(
                m.iter()
                    .map(|(k, a)| {
                        format!(
                            "{}:{}",
                            Self::encode_key_component(k),
                            Self::encode_key_component(&a.key)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(":"),
            ),
            Context::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_user_canonical_key_is_bare() {
        let ctx = Context::single("user", Attributes::new("user-key"));
        assert_eq!(ctx.canonical_key().as_deref(), Some("user-key"));
    }

    #[test]
    fn single_non_user_canonical_key_is_prefixed() {
        let ctx = Context::single("org", Attributes::new("org-1"));
        assert_eq!(ctx.canonical_key().as_deref(), Some("org:org-1"));
    }

    #[test]
    fn canonical_key_percent_encodes_colon_and_percent() {
        let ctx = Context::single("org", Attributes::new("a:b%c"));
        assert_eq!(ctx.canonical_key().as_deref(), Some("org:a%3Ab%25c"));
    }

    #[test]
    fn multi_canonical_key_sorted_by_kind() {
        let ctx = Context::multi([
            ("org".to_string(), Attributes::new("org-1")),
            ("user".to_string(), Attributes::new("user-1")),
        ]);
        assert_eq!(ctx.canonical_key().as_deref(), Some("org:org-1:user:user-1"));
    }

    #[test]
    fn canonical_key_is_order_independent_of_input() {
        let a = Context::multi([
            ("org".to_string(), Attributes::new("o")),
            ("user".to_string(), Attributes::new("u")),
        ]);
        let b = Context::multi([
            ("user".to_string(), Attributes::new("u")),
            ("org".to_string(), Attributes::new("o")),
        ]);
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn invalid_kind_rejected() {
        let ctx = Context::single("multi", Attributes::new("x"));
        assert!(!ctx.is_valid());
        let ctx = Context::single("has space", Attributes::new("x"));
        assert!(!ctx.is_valid());
        let ctx = Context::single("kind", Attributes::new("x"));
        assert!(!ctx.is_valid());
    }

    #[test]
    fn empty_key_rejected() {
        let ctx = Context::single("user", Attributes::new(""));
        assert!(!ctx.is_valid());
    }

    #[test]
    fn nested_custom_attribute_lookup() {
        let mut attrs = Attributes::new("u1");
        let mut address = BTreeMap::new();
        address.insert("city".to_string(), Value::from("NYC"));
        attrs.custom.insert("address".to_string(), Value::Object(address));
        let ctx = Context::single("user", attrs);
        let v = ctx.get("user", &AttributeRef::parse("/address/city"));
        assert_eq!(v, Some(Value::from("NYC")));
    }
}
