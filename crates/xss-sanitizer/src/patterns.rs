//! Injection rule library.
//!
//! Contains the static, ordered catalogue of detection/replacement rules used
//! to neutralize script-injection and SQL-injection vectors.  Each entry
//! carries a short name, a [`RuleCategory`] for grouping/reporting, a
//! [`RuleScope`] restricting where it applies, a regex string compiled at
//! library-construction time, and the [`Replacement`] for every match.
//!
//! Rules run in declaration order within a pass, so a later rule sees the
//! text as already rewritten by the earlier ones.  The normalization rules
//! therefore come first.
//!
//! All patterns are byte-oriented (`(?-u)`): case folding, `\s`, `\w` and
//! `\b` are ASCII-only, and classes such as `[^>]` match arbitrary bytes, so
//! the engine works on input that is not valid UTF-8.  Every pattern starts
//! and ends on an ASCII byte or a greedy run, which keeps rewrites of valid
//! UTF-8 valid.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Broad classification of the injection vector a rule targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    /// `<script>` elements, opening and closing tags.
    ScriptTag,
    /// `on<event>=` attributes inside tags.
    EventHandler,
    /// Script-capable URI schemes (`javascript:`, `vbscript:`, `data:text/html`).
    UriScheme,
    /// SQL statements and keyword sequences (`UNION SELECT`, `; DROP ...`).
    SqlKeyword,
    /// SQL punctuation used to break out of literals or comment out the rest
    /// of a query.
    SqlMetacharacter,
    /// Normalization and other active content (embeds, styles, expressions).
    Other,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScriptTag => write!(f, "ScriptTag"),
            Self::EventHandler => write!(f, "EventHandler"),
            Self::UriScheme => write!(f, "UriScheme"),
            Self::SqlKeyword => write!(f, "SqlKeyword"),
            Self::SqlMetacharacter => write!(f, "SqlMetacharacter"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Where in the text a rule is allowed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleScope {
    /// The whole string.
    Anywhere,
    /// Only inside tag-like tokens (`<` up to the next `>` or `<`).  Content
    /// outside tags is never touched by these rules.
    InsideTags,
}

// ---------------------------------------------------------------------------
// Rule definition
// ---------------------------------------------------------------------------

/// A single detection/replacement rule.
pub struct InjectionRule {
    /// Short, snake_case identifier used in logs and findings.
    pub name: &'static str,
    /// The family of injection vector this rule belongs to.
    pub category: RuleCategory,
    /// Where the rule applies.
    pub scope: RuleScope,
    /// A byte-regex string (compiled by [`crate::library::PatternLibrary`]).
    pub pattern: &'static str,
    /// What every match is rewritten to.
    pub replacement: Replacement,
}

/// How a rule rewrites a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// Fixed text; `${n}` refers to capture groups.
    Text(&'static str),
    /// The character a numeric character reference names, when that is an
    /// ASCII letter, digit, whitespace or colon.  Any other reference is
    /// left as written.
    DecodedReference,
}

/// The tag-like token that [`RuleScope::InsideTags`] rules are confined to.
pub const TAG_TOKEN: &str = r"(?-u)<[^<>]*>?";

// ---------------------------------------------------------------------------
// Rule catalogue
// ---------------------------------------------------------------------------

/// The built-in rule library, in application order.
pub static RULES: &[InjectionRule] = &[
    // ---- Normalization -------------------------------------------------
    InjectionRule {
        name: "numeric_char_reference",
        category: RuleCategory::Other,
        scope: RuleScope::InsideTags,
        pattern: r"(?i-u)&#(?:x0*[0-9a-f]{1,6}|0*[0-9]{1,7});?",
        replacement: Replacement::DecodedReference,
    },
    InjectionRule {
        name: "tab_reference",
        category: RuleCategory::Other,
        scope: RuleScope::InsideTags,
        pattern: r"(?-u)&Tab;",
        replacement: Replacement::Text("\t"),
    },
    InjectionRule {
        name: "newline_reference",
        category: RuleCategory::Other,
        scope: RuleScope::InsideTags,
        pattern: r"(?-u)&NewLine;",
        replacement: Replacement::Text("\n"),
    },
    InjectionRule {
        name: "tag_control_chars",
        category: RuleCategory::Other,
        scope: RuleScope::InsideTags,
        pattern: r"(?-u)[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "split_script_tag_name",
        category: RuleCategory::Other,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)<[\x00-\x20]*(/?)[\x00-\x20]*s[\x00-\x20]*c[\x00-\x20]*r[\x00-\x20]*i[\x00-\x20]*p[\x00-\x20]*t\b",
        replacement: Replacement::Text("<${1}script"),
    },
    // ---- Script tags ---------------------------------------------------
    InjectionRule {
        name: "script_element",
        category: RuleCategory::ScriptTag,
        scope: RuleScope::Anywhere,
        pattern: r"(?is-u)<script\b[^>]*>.*?</script[\x00-\x20]*>",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "script_open_tag",
        category: RuleCategory::ScriptTag,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)<script\b[^>]*>?",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "script_close_tag",
        category: RuleCategory::ScriptTag,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)</script\b[^>]*>?",
        replacement: Replacement::Text(""),
    },
    // ---- Other active content ------------------------------------------
    InjectionRule {
        name: "style_element",
        category: RuleCategory::Other,
        scope: RuleScope::Anywhere,
        pattern: r"(?is-u)<style\b[^>]*>.*?</style[\x00-\x20]*>",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "embedding_tag",
        category: RuleCategory::Other,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)</?(?:iframe|frameset|frame|object|embed|applet|meta|base|link|style)\b[^>]*>?",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "css_expression",
        category: RuleCategory::Other,
        scope: RuleScope::InsideTags,
        pattern: r"(?i-u)expression[\x00-\x20]*\(",
        replacement: Replacement::Text("("),
    },
    // ---- Event handlers ------------------------------------------------
    InjectionRule {
        name: "event_handler_attribute",
        category: RuleCategory::EventHandler,
        scope: RuleScope::InsideTags,
        pattern: r#"(?i-u)[\x00-\x20/]*\bon[a-z]+[\x00-\x20]*=[\x00-\x20]*(?:"[^"]*"?|'[^']*'?|[^\x00-\x20>"']*)"#,
        replacement: Replacement::Text(""),
    },
    // ---- URI schemes ---------------------------------------------------
    InjectionRule {
        name: "script_uri_scheme",
        category: RuleCategory::UriScheme,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)(?:j[\x00-\x20]*a[\x00-\x20]*v[\x00-\x20]*a|v[\x00-\x20]*b|l[\x00-\x20]*i[\x00-\x20]*v[\x00-\x20]*e)[\x00-\x20]*s[\x00-\x20]*c[\x00-\x20]*r[\x00-\x20]*i[\x00-\x20]*p[\x00-\x20]*t[\x00-\x20]*(?::|&colon;|&#0*58;?|&#x0*3a;?)",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "html_data_uri",
        category: RuleCategory::UriScheme,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)d[\x00-\x20]*a[\x00-\x20]*t[\x00-\x20]*a[\x00-\x20]*(?::|&colon;|&#0*58;?|&#x0*3a;?)[\x00-\x20]*text/html",
        replacement: Replacement::Text(""),
    },
    // ---- SQL literal breakout ------------------------------------------
    InjectionRule {
        name: "quoted_tautology",
        category: RuleCategory::SqlMetacharacter,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)(^|[^\\])'[\x00-\x20]*(?:or|and)[\x00-\x20]+(?:'[^']*'|\d+)[\x00-\x20]*=[\x00-\x20]*(?:'[^']*'?|\d+)",
        replacement: Replacement::Text("${1}"),
    },
    InjectionRule {
        name: "quote_then_comment",
        category: RuleCategory::SqlMetacharacter,
        scope: RuleScope::Anywhere,
        pattern: r"(?-u)(^|[^\\])'[\x00-\x20]*(?:--|/\*)",
        replacement: Replacement::Text("${1}"),
    },
    InjectionRule {
        name: "quote_then_terminator",
        category: RuleCategory::SqlMetacharacter,
        scope: RuleScope::Anywhere,
        pattern: r"(?-u)(^|[^\\])'[\x00-\x20]*;",
        replacement: Replacement::Text("${1};"),
    },
    // ---- SQL keywords --------------------------------------------------
    InjectionRule {
        name: "union_select",
        category: RuleCategory::SqlKeyword,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)\bunion(?:[\x00-\x20]|/\*.*?\*/)+(?:(?:all|distinct)(?:[\x00-\x20]|/\*.*?\*/)+)?select\b",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "stacked_statement",
        category: RuleCategory::SqlKeyword,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u);[\x00-\x20]*(?:drop|truncate|delete|insert|update|alter|create|exec|execute|shutdown|grant|revoke|declare)\b[^;]*",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "schema_statement",
        category: RuleCategory::SqlKeyword,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)\b(?:drop|truncate|alter)[\x00-\x20]+(?:table|database|schema|view|index|procedure|function|user)\b",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "stored_procedure_call",
        category: RuleCategory::SqlKeyword,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)\bexec(?:ute)?[\x00-\x20]+(?:xp|sp)_\w+",
        replacement: Replacement::Text(""),
    },
    InjectionRule {
        name: "time_delay",
        category: RuleCategory::SqlKeyword,
        scope: RuleScope::Anywhere,
        pattern: r"(?i-u)\b(?:pg_sleep|sleep|benchmark)[\x00-\x20]*\([\x00-\x20]*\d+|\bwaitfor[\x00-\x20]+delay\b",
        replacement: Replacement::Text(""),
    },
    // ---- SQL comments --------------------------------------------------
    InjectionRule {
        name: "line_comment",
        category: RuleCategory::SqlMetacharacter,
        scope: RuleScope::Anywhere,
        pattern: r"(?-u)-{2,}",
        replacement: Replacement::Text(""),
    },
];
