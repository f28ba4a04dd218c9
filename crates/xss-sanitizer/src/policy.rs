//! Tag allowlist consulted by the [`MarkupFilter`](crate::markup::MarkupFilter).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

/// Mapping from tag name to the attribute names permitted on it.
///
/// Tag and attribute names are stored lowercased, so every lookup is
/// case-insensitive.  An empty attribute set allows the tag without any
/// attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct TagPolicy {
    tags: BTreeMap<String, BTreeSet<String>>,
}

/// Tags and attributes allowed by [`TagPolicy::default`].
const DEFAULT_TAGS: &[(&str, &[&str])] = &[
    ("a", &["href", "title", "target", "rel"]),
    ("p", &["class"]),
    ("br", &[]),
    ("em", &[]),
    ("strong", &[]),
    ("ul", &["class"]),
    ("ol", &["class"]),
    ("li", &["class"]),
    ("h1", &["class"]),
    ("h2", &["class"]),
    ("h3", &["class"]),
    ("h4", &["class"]),
    ("h5", &["class"]),
    ("h6", &["class"]),
    ("blockquote", &["cite"]),
    ("code", &[]),
    ("pre", &[]),
    ("div", &["class", "id"]),
    ("span", &["class"]),
    ("img", &["src", "alt", "title", "width", "height", "class"]),
    ("table", &["class", "width"]),
    ("tr", &["class"]),
    ("td", &["class", "colspan", "rowspan"]),
    ("th", &["class", "colspan", "rowspan", "scope"]),
    ("thead", &[]),
    ("tbody", &[]),
    ("tfoot", &[]),
];

static SHARED_DEFAULT: LazyLock<Arc<TagPolicy>> = LazyLock::new(|| Arc::new(TagPolicy::default()));

impl TagPolicy {
    /// A policy that allows no tags at all.
    pub fn empty() -> Self {
        Self {
            tags: BTreeMap::new(),
        }
    }

    /// The process-wide default policy, built once and shared.
    pub fn shared_default() -> Arc<Self> {
        Arc::clone(&SHARED_DEFAULT)
    }

    /// Builder-style helper: allow `tag` with exactly `attributes`.
    pub fn allow<I, S>(mut self, tag: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.insert(
            tag.to_ascii_lowercase(),
            attributes
                .into_iter()
                .map(|a| a.as_ref().to_ascii_lowercase())
                .collect(),
        );
        self
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(&tag.to_ascii_lowercase())
    }

    pub fn allows_attribute(&self, tag: &str, attribute: &str) -> bool {
        self.tags
            .get(&tag.to_ascii_lowercase())
            .is_some_and(|attrs| attrs.contains(&attribute.to_ascii_lowercase()))
    }

    /// Permitted attributes for `tag`, or `None` when the tag is not allowed.
    pub fn attributes(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.tags.get(&tag.to_ascii_lowercase())
    }

    /// Iterate over `(tag, attributes)` pairs in tag-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.tags.iter().map(|(tag, attrs)| (tag.as_str(), attrs))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for TagPolicy {
    fn default() -> Self {
        DEFAULT_TAGS
            .iter()
            .fold(Self::empty(), |policy, (tag, attrs)| policy.allow(tag, attrs.iter()))
    }
}

impl From<BTreeMap<String, Vec<String>>> for TagPolicy {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        map.into_iter()
            .fold(Self::empty(), |policy, (tag, attrs)| policy.allow(&tag, attrs))
    }
}

impl From<TagPolicy> for BTreeMap<String, Vec<String>> {
    fn from(policy: TagPolicy) -> Self {
        policy
            .tags
            .into_iter()
            .map(|(tag, attrs)| (tag, attrs.into_iter().collect()))
            .collect()
    }
}
