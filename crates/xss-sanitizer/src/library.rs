//! Compiled form of the rule catalogue.
//!
//! [`PatternLibrary`] compiles every [`InjectionRule`] into a byte regex and
//! keeps a [`RegexSet`] alongside, which answers "does any rule match at all"
//! in a single scan.  A string no rule matches is already a fixed point, so
//! the sanitizer can stop without running the individual rules.

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use regex::bytes::{Captures, Regex, RegexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::patterns::{InjectionRule, Replacement, RuleCategory, RuleScope, RULES, TAG_TOKEN};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while compiling a [`PatternLibrary`].
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("failed to compile regex pattern: {0}")]
    RegexCompile(#[from] regex::Error),
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

/// A single match produced by [`PatternLibrary::scan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// The `name` field of the [`InjectionRule`] that matched.
    pub rule_name: String,
    /// The family of injection vector the rule belongs to.
    pub category: RuleCategory,
    /// The matched bytes, lossily decoded for display.
    pub matched_text: String,
    /// Byte offset of the match within the scanned text.
    pub offset: usize,
}

// ---------------------------------------------------------------------------
// PatternLibrary
// ---------------------------------------------------------------------------

struct CompiledRule {
    rule: &'static InjectionRule,
    regex: Regex,
}

impl CompiledRule {
    fn replace<'t>(&self, text: &'t [u8]) -> Cow<'t, [u8]> {
        match self.rule.replacement {
            Replacement::Text(with) => self.regex.replace_all(text, with.as_bytes()),
            Replacement::DecodedReference => self
                .regex
                .replace_all(text, |caps: &Captures<'_>| decode_reference(&caps[0])),
        }
    }
}

/// Decode one numeric character reference if it names a character that can
/// spell a URI scheme.  References without the trailing `;` are decoded the
/// way browsers decode them.
fn decode_reference(raw: &[u8]) -> Vec<u8> {
    let Ok(reference) = std::str::from_utf8(raw) else {
        return raw.to_vec();
    };
    let mut reference = reference.to_ascii_lowercase();
    if !reference.ends_with(';') {
        reference.push(';');
    }

    match html_escape::decode_html_entities(&reference).as_bytes() {
        [byte] if byte.is_ascii_alphanumeric() || byte.is_ascii_whitespace() || *byte == b':' => {
            vec![*byte]
        }
        _ => raw.to_vec(),
    }
}

/// The rule catalogue compiled and ready to apply.
///
/// Immutable after construction; share it between sanitizers with an
/// [`Arc`].
pub struct PatternLibrary {
    any_rule: RegexSet,
    rules: Vec<CompiledRule>,
    tag_token: Regex,
}

static BUILTIN: LazyLock<Arc<PatternLibrary>> = LazyLock::new(|| {
    Arc::new(PatternLibrary::compile(RULES).expect("built-in patterns must compile"))
});

impl PatternLibrary {
    /// Compile `rules`, preserving their order.
    pub fn compile(rules: &'static [InjectionRule]) -> Result<Self, PatternError> {
        let any_rule = RegexSet::new(rules.iter().map(|r| r.pattern))?;

        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    rule,
                    regex: Regex::new(rule.pattern)?,
                })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        Ok(Self {
            any_rule,
            rules,
            tag_token: Regex::new(TAG_TOKEN)?,
        })
    }

    /// The process-wide library compiled from [`RULES`].
    ///
    /// # Panics
    ///
    /// Panics on first use if the built-in catalogue fails to compile, which
    /// the catalogue's own tests rule out.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Returns the number of compiled rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` when at least one rule matches somewhere in `text`.
    pub fn is_match(&self, text: &[u8]) -> bool {
        self.any_rule.is_match(text)
    }

    /// Run every rule once, in declaration order, each on the output of the
    /// previous one.
    pub fn apply_pass(&self, text: &[u8]) -> Vec<u8> {
        let mut current = text.to_vec();

        for compiled in &self.rules {
            let rewritten = match compiled.rule.scope {
                RuleScope::Anywhere => compiled.replace(&current),
                RuleScope::InsideTags => self.replace_inside_tags(&current, compiled),
            };

            if let Cow::Owned(next) = rewritten {
                if next != current {
                    debug!(
                        rule = compiled.rule.name,
                        category = %compiled.rule.category,
                        removed = current.len().saturating_sub(next.len()),
                        "injection rule rewrote input"
                    );
                    current = next;
                }
            }
        }

        current
    }

    /// Apply `compiled` to the inside of every tag-like token, leaving the
    /// text between tokens untouched.
    fn replace_inside_tags<'t>(&self, text: &'t [u8], compiled: &CompiledRule) -> Cow<'t, [u8]> {
        self.tag_token
            .replace_all(text, |caps: &Captures<'_>| compiled.replace(&caps[0]).into_owned())
    }

    /// Report every rule match in `text` without rewriting anything.
    ///
    /// The returned [`Vec`] is sorted by byte offset.  Tag-scoped rules only
    /// report matches inside tag-like tokens.
    pub fn scan(&self, text: &[u8]) -> Vec<Finding> {
        let mut findings = Vec::new();

        for idx in self.any_rule.matches(text).into_iter() {
            let compiled = &self.rules[idx];
            match compiled.rule.scope {
                RuleScope::Anywhere => {
                    for m in compiled.regex.find_iter(text) {
                        findings.push(Self::finding(compiled.rule, m.as_bytes(), m.start()));
                    }
                }
                RuleScope::InsideTags => {
                    for tag in self.tag_token.find_iter(text) {
                        for m in compiled.regex.find_iter(tag.as_bytes()) {
                            findings.push(Self::finding(
                                compiled.rule,
                                m.as_bytes(),
                                tag.start() + m.start(),
                            ));
                        }
                    }
                }
            }
        }

        findings.sort_by_key(|f| f.offset);
        findings
    }

    fn finding(rule: &InjectionRule, matched: &[u8], offset: usize) -> Finding {
        Finding {
            rule_name: rule.name.to_string(),
            category: rule.category,
            matched_text: String::from_utf8_lossy(matched).into_owned(),
            offset,
        }
    }
}

impl std::fmt::Debug for PatternLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternLibrary")
            .field("rules", &self.rules.iter().map(|c| c.rule.name).collect::<Vec<_>>())
            .finish()
    }
}
