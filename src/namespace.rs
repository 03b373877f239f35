// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Logical → physical key mapping.
//!
//! A non-empty tag is wrapped in hash-tag braces so a partitioned store
//! hashes only the tag, and every key of one namespace lands on the same
//! slot:
//!
//! ```
//! use keyspace_router::KeyNamespacer;
//!
//! let ns = KeyNamespacer::new("tenant-a");
//! assert_eq!(ns.physical_key("user.alice"), "{tenant-a}:user.alice");
//!
//! let plain = KeyNamespacer::disabled();
//! assert_eq!(plain.physical_key("user.alice"), "user.alice");
//! ```

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNamespacer {
    tag: String,
    /// Cached `"{tag}:"`, empty when namespacing is disabled.
    prefix: String,
}

impl KeyNamespacer {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let prefix = Self::build_prefix(&tag);
        Self { tag, prefix }
    }

    /// A namespacer that leaves every key unchanged.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    fn build_prefix(tag: &str) -> String {
        if tag.is_empty() {
            String::new()
        } else {
            format!("{{{}}}:", tag)
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_enabled(&self) -> bool {
        !self.tag.is_empty()
    }

    /// Replace the tag for all future calls.
    ///
    /// Keys already written under the old tag are not migrated and become
    /// unreachable through this namespacer.
    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
        self.prefix = Self::build_prefix(&self.tag);
    }

    #[inline]
    pub fn physical_key(&self, logical: &str) -> String {
        if self.prefix.is_empty() {
            logical.to_string()
        } else {
            format!("{}{}", self.prefix, logical)
        }
    }

    /// Strip the namespace prefix, returning the key as callers know it.
    /// Keys outside this namespace are returned as-is.
    #[inline]
    pub fn logical_key<'a>(&self, physical: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            physical
        } else {
            physical.strip_prefix(&self.prefix).unwrap_or(physical)
        }
    }

    /// Glob for `KEYS` scoped to this namespace. Glob metacharacters in the
    /// tag are escaped so they match literally; `logical_pattern` is
    /// appended unchanged.
    pub fn pattern(&self, logical_pattern: &str) -> String {
        let mut out = String::with_capacity(self.prefix.len() + logical_pattern.len() + 4);
        for c in self.prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out.push_str(logical_pattern);
        out
    }

    /// Glob matching every key of this namespace.
    pub fn namespace_pattern(&self) -> String {
        self.pattern("*")
    }
}
