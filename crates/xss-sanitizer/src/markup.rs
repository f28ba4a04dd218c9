//! Allowlist-based markup filter.
//!
//! Rich-text fields keep the tags and attributes named by a [`TagPolicy`];
//! every other tag is stripped and the result goes through the
//! [`StringSanitizer`] so that permitted attributes cannot smuggle handlers
//! or script schemes.  When a full HTML sanitizer is plugged in as a
//! [`MarkupBackend`], the filter hands the whole job to it instead.

use std::collections::HashSet;
use std::sync::Arc;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::library::PatternError;
use crate::policy::TagPolicy;
use crate::sanitizer::{into_string, Sanitize, StringSanitizer, MAX_PASSES};

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// A full-featured markup sanitizer that replaces the fallback filter.
pub trait MarkupBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Clean `html` so that only what `policy` allows survives.
    fn clean(&self, html: &str, policy: &TagPolicy) -> String;
}

// ---------------------------------------------------------------------------
// Tag grammar
// ---------------------------------------------------------------------------

struct MarkupGrammar {
    comment: Regex,
    declaration: Regex,
    script_content: Regex,
    style_content: Regex,
    tag: Regex,
    attribute: Regex,
}

impl MarkupGrammar {
    fn compile() -> Result<Self, PatternError> {
        Ok(Self {
            comment: Regex::new(r"(?s)<!--.*?(?:-->|$)")?,
            declaration: Regex::new(r"<[!?][^>]*>?")?,
            script_content: Regex::new(r"(?is)<script\b[^>]*>.*?(?:</script\s*>|$)")?,
            style_content: Regex::new(r"(?is)<style\b[^>]*>.*?(?:</style\s*>|$)")?,
            tag: Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9:-]*)([^<>]*)>?")?,
            attribute: Regex::new(
                r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'<>`]+)))?"#,
            )?,
        })
    }
}

// ---------------------------------------------------------------------------
// MarkupFilter
// ---------------------------------------------------------------------------

/// Keeps the tags and attributes a [`TagPolicy`] allows and neutralizes the
/// rest.
///
/// # Example
///
/// ```rust
/// use xss_sanitizer::MarkupFilter;
///
/// let filter = MarkupFilter::default();
/// assert_eq!(filter.sanitize("<img src=x onerror=alert(1)>"), r#"<img src="x">"#);
/// ```
pub struct MarkupFilter {
    sanitizer: StringSanitizer,
    policy: Arc<TagPolicy>,
    backend: Option<Arc<dyn MarkupBackend>>,
    grammar: MarkupGrammar,
}

impl MarkupFilter {
    pub fn new(sanitizer: StringSanitizer, policy: Arc<TagPolicy>) -> Result<Self, PatternError> {
        Ok(Self {
            sanitizer,
            policy,
            backend: None,
            grammar: MarkupGrammar::compile()?,
        })
    }

    /// Try `backend` before the fallback filter on every call.
    pub fn with_backend(mut self, backend: Arc<dyn MarkupBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn policy(&self) -> &TagPolicy {
        &self.policy
    }

    /// Replace the policy wholesale.
    pub fn set_policy(&mut self, policy: Arc<TagPolicy>) -> &mut Self {
        self.policy = policy;
        self
    }

    pub fn sanitizer(&self) -> &StringSanitizer {
        &self.sanitizer
    }

    pub fn set_quote_escaping(&mut self, quote_escaping: bool) -> &mut Self {
        self.sanitizer.set_quote_escaping(quote_escaping);
        self
    }

    /// Sanitize `html` against the instance policy.
    pub fn sanitize(&self, html: &str) -> String {
        self.sanitize_with(html, &self.policy)
    }

    /// Sanitize `html` against an explicit policy.
    pub fn sanitize_with(&self, html: &str, policy: &TagPolicy) -> String {
        if let Some(backend) = &self.backend {
            debug!(backend = backend.name(), "delegating markup to backend");
            return backend.clean(html, policy);
        }
        self.fallback(html, policy)
    }

    /// Filter tags and neutralize until nothing changes.  Stripping a tag can
    /// join the text around it into a new tag, and so can the string rules,
    /// so both steps repeat together.
    fn fallback(&self, html: &str, policy: &TagPolicy) -> String {
        let mut current = html.to_owned();
        let mut converged = false;

        for _ in 0..MAX_PASSES {
            let filtered = self.filter_tags(&current, policy);
            let next = self.sanitizer.neutralize(&filtered);
            if next == current {
                converged = true;
                break;
            }
            current = next;
        }

        if !converged {
            warn!(
                passes = MAX_PASSES,
                "markup did not stabilize; encoding remaining angle brackets"
            );
            current = current.replace('<', "&lt;").replace('>', "&gt;");
        }

        let config = self.sanitizer.config();
        into_string(self.sanitizer.finish(current.into_bytes(), config))
    }

    /// One allowlist pass: drop comments, declarations, the content of
    /// script/style elements the policy does not allow, and every tag or
    /// attribute outside the policy.
    fn filter_tags(&self, html: &str, policy: &TagPolicy) -> String {
        let g = &self.grammar;

        let mut text = g.comment.replace_all(html, "").into_owned();
        text = g.declaration.replace_all(&text, "").into_owned();
        if !policy.allows_tag("script") {
            text = g.script_content.replace_all(&text, "").into_owned();
        }
        if !policy.allows_tag("style") {
            text = g.style_content.replace_all(&text, "").into_owned();
        }

        g.tag
            .replace_all(&text, |caps: &Captures<'_>| self.rewrite_tag(caps, policy))
            .into_owned()
    }

    /// Rebuild a single tag from its permitted parts, or drop it.
    fn rewrite_tag(&self, caps: &Captures<'_>, policy: &TagPolicy) -> String {
        let name = caps[2].to_ascii_lowercase();
        let Some(allowed) = policy.attributes(&name) else {
            return String::new();
        };

        if !caps[1].is_empty() {
            return format!("</{name}>");
        }

        let raw = &caps[3];
        let mut out = format!("<{name}");
        let mut seen = HashSet::new();

        for attr in self.grammar.attribute.captures_iter(raw) {
            let attr_name = attr[1].to_ascii_lowercase();
            if !allowed.contains(&attr_name) || !seen.insert(attr_name.clone()) {
                continue;
            }
            let value = attr.get(2).or_else(|| attr.get(3)).or_else(|| attr.get(4));
            match value {
                Some(v) => {
                    out.push_str(&format!(" {attr_name}=\"{}\"", v.as_str().replace('"', "&quot;")))
                }
                None => out.push_str(&format!(" {attr_name}")),
            }
        }

        if raw.trim_end().ends_with('/') {
            out.push_str(" /");
        }
        out.push('>');
        out
    }
}

impl Default for MarkupFilter {
    /// Built-in rule library, shared default policy, no backend.
    ///
    /// # Panics
    ///
    /// Panics if the built-in patterns fail to compile.
    fn default() -> Self {
        Self::new(StringSanitizer::default(), TagPolicy::shared_default())
            .expect("built-in patterns must compile")
    }
}

impl Sanitize for MarkupFilter {
    type Input = str;
    type Output = String;

    fn sanitize(&self, input: &str) -> String {
        MarkupFilter::sanitize(self, input)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
