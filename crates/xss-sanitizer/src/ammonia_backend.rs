//! [`MarkupBackend`] backed by the `ammonia` HTML sanitizer.
//!
//! ammonia parses the markup with html5ever, so it repairs unbalanced tags
//! and filters URL schemes properly.  The active [`TagPolicy`] is translated
//! into an `ammonia::Builder` on every call.

use std::collections::{HashMap, HashSet};

use ammonia::Builder;

use crate::markup::MarkupBackend;
use crate::policy::TagPolicy;

/// Elements whose text content is dropped together with the tag.
const CONTENT_TAGS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AmmoniaBackend;

impl MarkupBackend for AmmoniaBackend {
    fn name(&self) -> &'static str {
        "ammonia"
    }

    fn clean(&self, html: &str, policy: &TagPolicy) -> String {
        let tags: HashSet<&str> = policy.iter().map(|(tag, _)| tag).collect();
        let tag_attributes: HashMap<&str, HashSet<&str>> = policy
            .iter()
            .filter(|(_, attrs)| !attrs.is_empty())
            .map(|(tag, attrs)| (tag, attrs.iter().map(String::as_str).collect()))
            .collect();
        // ammonia refuses a tag that is both allowed and content-cleaned.
        let content_tags: HashSet<&str> = CONTENT_TAGS
            .iter()
            .copied()
            .filter(|tag| !tags.contains(tag))
            .collect();

        let mut builder = Builder::default();
        builder
            .tags(tags)
            .tag_attributes(tag_attributes)
            .generic_attributes(HashSet::new())
            .clean_content_tags(content_tags)
            // `rel` may be allowlisted explicitly; ammonia rejects that while
            // it manages `rel` itself.
            .link_rel(None);

        builder.clean(html).to_string()
    }
}
