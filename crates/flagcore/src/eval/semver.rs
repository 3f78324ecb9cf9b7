// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tolerant SemVer 2.0 parsing and comparison for the `semVer*` clause
//! operators, grounded on
//! `original_source/libs/server-sdk/src/evaluation/detail/semver_operations.cpp`:
//! missing minor/patch default to 0, and precedence follows the
//! official SemVer 2.0 rules (numeric identifiers have lower
//! precedence than alphanumeric ones; a version without a prerelease
//! outranks one with the same major.minor.patch but a prerelease).

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Token {
    Numeric(u64),
    Alnum(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: Option<Vec<Token>>,
}

static SEMVER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<major>0|[1-9]\d*)(\.(?P<minor>0|[1-9]\d*))?(\.(?P<patch>0|[1-9]\d*))?(?:-(?P<prerelease>(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .expect("semver regex is a compile-time constant")
});

pub fn parse(value: &str) -> Option<SemVer> {
    if value.is_empty() {
        return None;
    }
    let caps = SEMVER_REGEX.captures(value)?;
    let major: u64 = caps.name("major")?.as_str().parse().ok()?;
    let minor: u64 = caps
        .name("minor")
        .map(|m| m.as_str().parse().ok())
        .unwrap_or(Some(0))?;
    let patch: u64 = caps
        .name("patch")
        .map(|m| m.as_str().parse().ok())
        .unwrap_or(Some(0))?;
    let prerelease = caps.name("prerelease").map(|m| {
        m.as_str()
            .split('.')
            .map(|tok| match tok.parse::<u64>() {
                Ok(n) => Token::Numeric(n),
                Err(_) => Token::Alnum(tok.to_string()),
            })
            .collect::<Vec<_>>()
    });
    Some(SemVer {
        major,
        minor,
        patch,
        prerelease,
    })
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}
