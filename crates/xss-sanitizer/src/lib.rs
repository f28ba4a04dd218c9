//! # xss-sanitizer
//!
//! Neutralizes script-injection (XSS) and SQL-injection vectors in untrusted
//! text before it is stored, rendered, or interpolated into a query.
//!
//! The crate is organised around these layers:
//!
//! 1. **[`patterns`]** -- static, ordered catalogue of byte-regex rules,
//!    grouped by [`RuleCategory`](patterns::RuleCategory).
//! 2. **[`library`]** -- compiles the rules (plus a [`RegexSet`](regex::bytes::RegexSet)
//!    fast path) and applies one ordered pass, or reports
//!    [`Finding`](library::Finding)s.
//! 3. **[`sanitizer`]** -- repeats passes until the string stops changing,
//!    then optionally backslash-escapes quotes.
//! 4. **[`markup`]** -- allowlist filter for rich text, driven by a
//!    [`TagPolicy`](policy::TagPolicy), with a pluggable
//!    [`MarkupBackend`](markup::MarkupBackend).
//! 5. **[`structural`]** -- maps the string sanitizer over JSON trees.
//!
//! ## Quick start
//!
//! ```rust
//! use xss_sanitizer::{sanitize_markup, sanitize_string, TagPolicy};
//!
//! assert_eq!(sanitize_string("<script>alert(1)</script>", false), "");
//! assert_eq!(sanitize_string("O'Reilly", true), r"O\'Reilly");
//! assert_eq!(
//!     sanitize_markup("<img src=x onerror=alert(1)>", &TagPolicy::default()),
//!     r#"<img src="x">"#
//! );
//! ```

#[cfg(feature = "ammonia")]
pub mod ammonia_backend;
pub mod library;
pub mod loader;
pub mod markup;
pub mod patterns;
pub mod policy;
pub mod sanitizer;
pub mod structural;

use std::sync::LazyLock;

use serde_json::Value;

// Re-export the most commonly used types at the crate root for ergonomic
// imports (`use xss_sanitizer::StringSanitizer`).
#[cfg(feature = "ammonia")]
pub use ammonia_backend::AmmoniaBackend;
pub use library::{Finding, PatternError, PatternLibrary};
pub use markup::{MarkupBackend, MarkupFilter};
pub use patterns::{InjectionRule, Replacement, RuleCategory, RuleScope, RULES};
pub use policy::TagPolicy;
pub use sanitizer::{escape_quotes, Sanitize, SanitizerConfig, StringSanitizer, MAX_PASSES};
pub use structural::{StructuralMapper, StructureError};

static MARKUP: LazyLock<MarkupFilter> = LazyLock::new(MarkupFilter::default);

/// Sanitize one string with the built-in rules.
pub fn sanitize_string(input: &str, escape_quotes: bool) -> String {
    StringSanitizer::default()
        .sanitize_with(input, SanitizerConfig::with_quote_escaping(escape_quotes))
}

/// Sanitize every leaf of `input`, keeping its shape.
pub fn sanitize_container(input: &Value, escape_quotes: bool) -> Result<Value, StructureError> {
    StructuralMapper::default()
        .sanitize_with(input, SanitizerConfig::with_quote_escaping(escape_quotes))
}

/// Filter `input` against `policy` with the fallback allowlist filter.
pub fn sanitize_markup(input: &str, policy: &TagPolicy) -> String {
    MARKUP.sanitize_with(input, policy)
}
