//! Deterministic cache keys for assembled listings.
//!
//! Every cache entry belonging to one listing shape shares a base prefix
//! derived from the resolved filter tree and sort rules. The response
//! layer and the row/total hints append their own suffixes, so related
//! entries age out together by construction rather than by invalidation.

use sha2::{Digest, Sha256};

use crate::domain::clock;
use crate::domain::filter::{FilterNode, FilterValue, SortRule};

/// Base prefix of one listing shape: `contents#{digest}:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingKey {
    base: String,
}

impl ListingKey {
    /// Derives the key from a resolved filter and its sort rules. Free
    /// text queries are relevance-bound and never cacheable, so a
    /// non-blank query yields no key at all.
    pub fn derive(filter: &FilterNode, sort: &[SortRule], query: Option<&str>) -> Option<Self> {
        if query.is_some_and(|q| !q.trim().is_empty()) {
            return None;
        }
        let mut canonical = String::new();
        write_node(&mut canonical, filter);
        canonical.push('#');
        for (index, rule) in sort.iter().enumerate() {
            if index > 0 {
                canonical.push(',');
            }
            write_field(&mut canonical, &rule.attribute.to_ascii_lowercase());
            canonical.push('|');
            canonical.push_str(rule.direction.as_str());
        }

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Some(Self {
            base: format!("contents#{digest}:"),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Assembled JSON response of one page.
    pub fn response(&self, page_number: u32) -> String {
        format!("{}{page_number}:json", self.base)
    }

    /// Row-page hint handed to the content store.
    pub fn rows(&self, page_number: u32) -> String {
        format!("{}{page_number}", self.base)
    }

    /// Total-count hint handed to the content store.
    pub fn total(&self) -> String {
        format!("{}total", self.base)
    }
}

/// Canonical textual form of a resolved tree. Attribute names are
/// lowercased so client casing does not split the cache. Attributes and
/// text values carry a length prefix; delimiter bytes inside them stay
/// inert and the form parses back to exactly one tree.
fn write_node(out: &mut String, node: &FilterNode) {
    match node {
        FilterNode::Leaf {
            attribute,
            operator,
            value,
        } => {
            write_field(out, &attribute.to_ascii_lowercase());
            out.push('|');
            out.push_str(operator.as_str());
            out.push('|');
            match value {
                None => out.push('_'),
                Some(FilterValue::Text(text)) => {
                    out.push_str("t:");
                    write_field(out, text);
                }
                Some(FilterValue::Time(timestamp)) => {
                    out.push_str("d:");
                    out.push_str(&clock::rfc3339(*timestamp));
                }
                Some(FilterValue::Placeholder(placeholder)) => {
                    out.push_str("p:");
                    out.push_str(placeholder.token());
                }
            }
        }
        FilterNode::Group { operator, children } => {
            out.push_str(operator.as_str());
            out.push('(');
            for (index, child) in children.iter().enumerate() {
                if index > 0 {
                    out.push(';');
                }
                write_node(out, child);
            }
            out.push(')');
        }
    }
}

/// Client-supplied field: `{byte length}:{bytes}`.
fn write_field(out: &mut String, text: &str) {
    out.push_str(&text.len().to_string());
    out.push(':');
    out.push_str(text);
}
