//! Fixed-point string sanitizer that wraps the
//! [`PatternLibrary`](crate::library::PatternLibrary) and optionally escapes
//! quotes once the input has stabilized.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::library::{Finding, PatternError, PatternLibrary};
use crate::patterns::RULES;

/// Upper bound on rule passes per call.
pub const MAX_PASSES: usize = 10;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// The single capability shared by every sanitizer in this crate.
pub trait Sanitize {
    type Input: ?Sized;
    type Output;

    fn sanitize(&self, input: &Self::Input) -> Self::Output;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-call sanitizer options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// Backslash-escape `'`, `"`, `\` and NUL after the rule passes.
    #[serde(default)]
    pub quote_escaping: bool,
}

impl SanitizerConfig {
    pub fn with_quote_escaping(quote_escaping: bool) -> Self {
        Self { quote_escaping }
    }
}

/// What the rule loop did with one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neutralized {
    pub bytes: Vec<u8>,
    /// Number of passes that ran.
    pub passes: usize,
    /// `false` when [`MAX_PASSES`] was hit before the text stopped changing.
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// StringSanitizer
// ---------------------------------------------------------------------------

/// Neutralizes injection vectors inside a single string.
///
/// # Example
///
/// ```rust
/// use xss_sanitizer::{SanitizerConfig, StringSanitizer};
///
/// let sanitizer = StringSanitizer::new(SanitizerConfig::default()).unwrap();
/// assert_eq!(sanitizer.sanitize("<script>alert(1)</script>hi"), "hi");
/// ```
#[derive(Debug, Clone)]
pub struct StringSanitizer {
    library: Arc<PatternLibrary>,
    config: SanitizerConfig,
}

impl StringSanitizer {
    /// Create a sanitizer backed by the built-in rule catalogue.
    pub fn new(config: SanitizerConfig) -> Result<Self, PatternError> {
        let library = Arc::new(PatternLibrary::compile(RULES)?);
        Ok(Self::with_library(library, config))
    }

    /// Create a sanitizer that shares an already compiled library.
    pub fn with_library(library: Arc<PatternLibrary>, config: SanitizerConfig) -> Self {
        Self { library, config }
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }

    /// Returns the instance's default configuration.
    pub fn config(&self) -> SanitizerConfig {
        self.config
    }

    /// Change the default used by [`sanitize`](Self::sanitize).  Affects only
    /// later calls.
    pub fn set_quote_escaping(&mut self, quote_escaping: bool) -> &mut Self {
        self.config.quote_escaping = quote_escaping;
        self
    }

    /// Sanitize `input` with the instance configuration.
    pub fn sanitize(&self, input: &str) -> String {
        self.sanitize_with(input, self.config)
    }

    /// Sanitize `input` with an explicit configuration for this call only.
    pub fn sanitize_with(&self, input: &str, config: SanitizerConfig) -> String {
        into_string(self.sanitize_bytes_with(input.as_bytes(), config))
    }

    /// Sanitize arbitrary bytes with the instance configuration.
    pub fn sanitize_bytes(&self, input: &[u8]) -> Vec<u8> {
        self.sanitize_bytes_with(input, self.config)
    }

    /// Sanitize arbitrary bytes, which need not be valid UTF-8.
    pub fn sanitize_bytes_with(&self, input: &[u8], config: SanitizerConfig) -> Vec<u8> {
        let neutralized = self.neutralize_bytes(input);
        self.finish(neutralized.bytes, config)
    }

    /// Run the rule passes only, without quote escaping.
    pub fn neutralize(&self, input: &str) -> String {
        into_string(self.neutralize_bytes(input.as_bytes()).bytes)
    }

    /// Apply the rule library until the text stops changing or
    /// [`MAX_PASSES`] passes have run.
    pub fn neutralize_bytes(&self, input: &[u8]) -> Neutralized {
        let mut current = input.to_vec();

        for pass in 0..MAX_PASSES {
            if !self.library.is_match(&current) {
                return Neutralized {
                    bytes: current,
                    passes: pass,
                    converged: true,
                };
            }

            let next = self.library.apply_pass(&current);
            if next == current {
                return Neutralized {
                    bytes: current,
                    passes: pass + 1,
                    converged: true,
                };
            }
            current = next;
        }

        warn!(
            passes = MAX_PASSES,
            len = current.len(),
            "pass ceiling reached before input stabilized"
        );
        Neutralized {
            bytes: current,
            passes: MAX_PASSES,
            converged: false,
        }
    }

    /// The post-loop step: quote escaping, exactly once, when enabled.
    pub fn finish(&self, bytes: Vec<u8>, config: SanitizerConfig) -> Vec<u8> {
        if config.quote_escaping {
            escape_quotes(&bytes)
        } else {
            bytes
        }
    }

    /// Report every rule match in `input` without rewriting it.
    pub fn scan(&self, input: &str) -> Vec<Finding> {
        self.library.scan(input.as_bytes())
    }
}

impl Default for StringSanitizer {
    /// Shares the built-in library, quote escaping off.
    ///
    /// # Panics
    ///
    /// Panics if the built-in rule catalogue fails to compile (should never
    /// happen with the static patterns).
    fn default() -> Self {
        Self::with_library(PatternLibrary::builtin(), SanitizerConfig::default())
    }
}

impl Sanitize for StringSanitizer {
    type Input = str;
    type Output = String;

    fn sanitize(&self, input: &str) -> String {
        StringSanitizer::sanitize(self, input)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Prefix every `'`, `"` and `\` with a backslash and write NUL as `\0`.
pub fn escape_quotes(input: &[u8]) -> Vec<u8> {
    let extra = input
        .iter()
        .filter(|b| matches!(b, b'\'' | b'"' | b'\\' | 0))
        .count();
    let mut out = Vec::with_capacity(input.len() + extra);

    for &byte in input {
        match byte {
            b'\'' | b'"' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            0 => out.extend_from_slice(b"\\0"),
            _ => out.push(byte),
        }
    }
    out
}

/// Rule rewrites only ever cut at ASCII boundaries, so text that went in as
/// UTF-8 comes out as UTF-8.  The lossy branch is unreachable for `&str`
/// input but keeps the conversion total.
pub(crate) fn into_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- helpers ----------------------------------------------------------

    fn plain() -> StringSanitizer {
        StringSanitizer::default()
    }

    fn escaping() -> StringSanitizer {
        let mut s = StringSanitizer::default();
        s.set_quote_escaping(true);
        s
    }

    const PAYLOADS: &[&str] = &[
        "<script>alert(1)</script>",
        "<SCRIPT SRC=//evil.example/x.js></SCRIPT>",
        "<scr<script>ipt>alert(1)</scr</script>ipt>",
        "<script>alert(1)",
        "< s c r i p t >alert(1)</ script >",
        "<scr\u{0}ipt>alert(1)</scr\u{0}ipt>",
        "<img src=x onerror=alert(1)>",
        "<img src=x ononerror=error=alert(1)>",
        "<body onload=\"steal()\">",
        "<svg/onload=alert(1)>",
        "<a href=\"javascript:alert(1)\">x</a>",
        "<a href=\"jav\tascript:alert(1)\">x</a>",
        "<a href=\"javajavascript:script:alert(1)\">x</a>",
        "<a href=\"javascript&colon;alert(1)\">x</a>",
        "<a href=\"&#106;avascript:alert(1)\">x</a>",
        "<a href=\"&#x6A;avascript:alert(1)\">x</a>",
        "<a href=\"&#106avascript:alert(1)\">x</a>",
        "<a href=\"java&Tab;script:alert(1)\">x</a>",
        "<a href=\"java&#x09;script:alert(1)\">x</a>",
        "<a href=\"java&#1&#48;;script:alert(1)\">x</a>",
        "<img src=\"data&#58;text/html;base64,PHNjcmlwdD4=\">",
        "<a href='vbscript:msgbox(1)'>x</a>",
        "<iframe src=\"data:text/html,<script>alert(1)</script>\"></iframe>",
        "<div style=\"width: expression(alert(1))\">",
        "1; DROP TABLE users;--",
        "admin'--",
        "x' OR '1'='1",
        "1 UNION SELECT password FROM users",
        "1 UNION/**/ALL/**/SELECT 1",
        "'; EXEC xp_cmdshell 'dir';--",
        "1 AND SLEEP(5)",
    ];

    // -- script tags ------------------------------------------------------

    #[test]
    fn removes_script_element() {
        assert_eq!(plain().sanitize("<script>alert(1)</script>"), "");
        assert_eq!(
            plain().sanitize("before<script type=\"text/javascript\">x()</script>after"),
            "beforeafter"
        );
    }

    #[test]
    fn removes_unclosed_script_tag() {
        assert_eq!(plain().sanitize("hi <script src=//e.example/a.js"), "hi ");
        assert_eq!(plain().sanitize("<script>alert(1)"), "alert(1)");
    }

    #[test]
    fn removes_nested_script_obfuscation() {
        let out = plain().sanitize("<scr<script>ipt>alert(1)</scr</script>ipt>");
        assert!(!out.to_lowercase().contains("<script"), "got: {out}");
        assert_eq!(out, "");
    }

    #[test]
    fn removes_whitespace_and_nul_split_script_tags() {
        assert_eq!(plain().sanitize("< s c r i p t >alert(1)</ script >"), "");
        assert_eq!(plain().sanitize("<scr\u{0}ipt>alert(1)</scr\u{0}ipt>"), "");
    }

    // -- event handlers ---------------------------------------------------

    #[test]
    fn removes_event_handlers_but_keeps_tag() {
        assert_eq!(plain().sanitize("<img src=x onerror=alert(1)>"), "<img src=x>");
        assert_eq!(
            plain().sanitize("<b onclick=\"go()\" class='c'>bold</b>"),
            "<b class='c'>bold</b>"
        );
        assert_eq!(plain().sanitize("<svg/onload=alert(1)>"), "<svg>");
    }

    #[test]
    fn handler_text_inside_a_quoted_value_keeps_later_attributes() {
        assert_eq!(
            plain().sanitize(r#"<a title="x onclick=y" href="/z">t</a>"#),
            r#"<a title="x" href="/z">t</a>"#
        );
        assert_eq!(
            plain().sanitize("<a title='see onmouseover=go' href='/z'>t</a>"),
            "<a title='see' href='/z'>t</a>"
        );
    }

    #[test]
    fn removes_nested_event_handlers() {
        let out = plain().sanitize("<img src=x ononerror=error=alert(1)>");
        assert!(!out.to_lowercase().contains("onerror"), "got: {out}");
    }

    // -- uri schemes ------------------------------------------------------

    #[test]
    fn strips_script_schemes() {
        assert_eq!(
            plain().sanitize("<a href=\"javascript:alert(1)\">x</a>"),
            "<a href=\"alert(1)\">x</a>"
        );
        assert_eq!(
            plain().sanitize("<a href=\"JaVa\tScRiPt:alert(1)\">x</a>"),
            "<a href=\"alert(1)\">x</a>"
        );
        assert_eq!(
            plain().sanitize("<a href=\"javascript&colon;alert(1)\">x</a>"),
            "<a href=\"alert(1)\">x</a>"
        );
        assert_eq!(plain().sanitize("<a href='vbscript:x'>y</a>"), "<a href='x'>y</a>");
    }

    #[test]
    fn strips_schemes_spelled_with_character_references() {
        for href in [
            "&#106;avascript:alert(1)",
            "&#x6A;avascript:alert(1)",
            "&#X6a;avascript:alert(1)",
            "&#106avascript:alert(1)",
            "java&Tab;script:alert(1)",
            "java&#x09;script:alert(1)",
            "java&#10;script:alert(1)",
            "&#118;bscript&#x3A;alert(1)",
        ] {
            assert_eq!(
                plain().sanitize(&format!("<a href=\"{href}\">x</a>")),
                "<a href=\"alert(1)\">x</a>",
                "href: {href}"
            );
        }
    }

    #[test]
    fn character_references_outside_tags_are_left_alone() {
        let text = "&#106;avascript: is how the scheme looks when encoded";
        assert_eq!(plain().sanitize(text), text);
    }

    #[test]
    fn strips_nested_scheme() {
        assert_eq!(plain().sanitize("javajavascript:script:alert(1)"), "alert(1)");
    }

    #[test]
    fn strips_html_data_uri() {
        let out = plain().sanitize("<img src=\"data:text/html;base64,PHNjcmlwdD4=\">");
        assert!(!out.contains("data:text/html"), "got: {out}");
    }

    #[test]
    fn keeps_benign_schemes() {
        for text in [
            "<a href=\"https://example.com\">x</a>",
            "<a href=\"mailto:someone@example.com\">mail</a>",
            "<a href=\"/relative/path\">rel</a>",
            "<img src=\"data:image/png;base64,iVBORw0KGgo=\">",
        ] {
            assert_eq!(plain().sanitize(text), text);
        }
    }

    // -- sql --------------------------------------------------------------

    #[test]
    fn neutralizes_drop_table_payload() {
        let out = plain().sanitize("1; DROP TABLE users;--");
        assert_eq!(out, "1;");
        assert!(!out.to_uppercase().contains("DROP TABLE"));
        assert!(!out.contains("--"));
    }

    #[test]
    fn neutralizes_quote_breakouts() {
        assert_eq!(plain().sanitize("admin'--"), "admin");
        assert_eq!(plain().sanitize("x' OR '1'='1"), "x");
        assert_eq!(plain().sanitize("x' or 1=1"), "x");
    }

    #[test]
    fn neutralizes_union_select() {
        let out = plain().sanitize("1 UNION SELECT password FROM users");
        assert!(!out.to_uppercase().contains("UNION"), "got: {out}");
        let out = plain().sanitize("1 UNION/**/ALL/**/SELECT 1");
        assert!(!out.to_uppercase().contains("SELECT"), "got: {out}");
    }

    #[test]
    fn neutralizes_stored_procedures_and_delays() {
        let out = plain().sanitize("'; EXEC xp_cmdshell 'dir';--");
        assert!(!out.to_lowercase().contains("xp_cmdshell"), "got: {out}");
        let out = plain().sanitize("1 AND SLEEP(5)");
        assert!(!out.to_uppercase().contains("SLEEP("), "got: {out}");
    }

    // -- quote escaping ---------------------------------------------------

    #[test]
    fn escapes_quotes_when_enabled() {
        assert_eq!(escaping().sanitize(r#"O'Reilly "quoted" \path"#), r#"O\'Reilly \"quoted\" \\path"#);
        assert_eq!(escaping().sanitize("a\u{0}b"), "a\\0b");
    }

    #[test]
    fn escaping_applies_once_after_the_loop() {
        // A surviving quote next to a payload is escaped exactly once.
        let out = escaping().sanitize("it's <script>x</script>fine");
        assert_eq!(out, r"it\'s fine");
    }

    #[test]
    fn per_call_config_overrides_instance_default() {
        let s = plain();
        assert_eq!(s.sanitize_with("it's", SanitizerConfig::with_quote_escaping(true)), r"it\'s");
        assert_eq!(s.sanitize("it's"), "it's");
    }

    #[test]
    fn escaping_flag_toggles_between_calls() {
        let mut s = plain();
        assert_eq!(s.sanitize("\"x\""), "\"x\"");
        s.set_quote_escaping(true);
        assert_eq!(s.sanitize("\"x\""), "\\\"x\\\"");
        s.set_quote_escaping(false);
        assert_eq!(s.sanitize("\"x\""), "\"x\"");
    }

    #[test]
    fn every_special_byte_gets_exactly_one_backslash() {
        let input = br#"'"\ plain"#;
        let escaped = escape_quotes(input);
        assert_eq!(escaped, br#"\'\"\\ plain"#.to_vec());
    }

    // -- properties -------------------------------------------------------

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(plain().sanitize(""), "");
        assert_eq!(escaping().sanitize(""), "");
    }

    #[test]
    fn benign_text_is_unchanged() {
        for text in [
            "Hello, world!",
            "It's 5 o'clock; time for tea.",
            "Prices: 3 < 5 and 7 > 2",
            "Ünïcödé text — with dashes – and emoji 🎉",
            "<p class=\"lead\">Some <em>rich</em> text</p>",
            "email me at someone@example.com",
        ] {
            assert_eq!(plain().sanitize(text), text, "benign input changed");
        }
    }

    #[test]
    fn sanitize_is_idempotent_on_payloads() {
        let s = plain();
        for payload in PAYLOADS {
            let once = s.sanitize(payload);
            let twice = s.sanitize(&once);
            assert_eq!(once, twice, "not idempotent for: {payload}");
        }
    }

    #[test]
    fn no_payload_leaves_executable_remnants() {
        let s = plain();
        for payload in PAYLOADS {
            let out = s.sanitize(payload).to_lowercase();
            assert!(!out.contains("<script"), "script survived: {payload} -> {out}");
            assert!(!out.contains("javascript:"), "scheme survived: {payload} -> {out}");
            assert!(!out.contains("onerror="), "handler survived: {payload} -> {out}");
            assert!(!out.contains("onload="), "handler survived: {payload} -> {out}");

            let read: String = html_escape::decode_html_entities(&out)
                .chars()
                .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
                .collect();
            assert!(!read.contains("javascript:"), "encoded scheme survived: {payload} -> {out}");
            assert!(!read.contains("data:text/html"), "data uri survived: {payload} -> {out}");
        }
    }

    #[test]
    fn invalid_utf8_is_treated_as_opaque_bytes() {
        let input = b"\xff\xfe<script>x</script>\xc3";
        assert_eq!(plain().sanitize_bytes(input), b"\xff\xfe\xc3".to_vec());
    }

    #[test]
    fn deep_nesting_stops_at_the_ceiling() {
        let mut payload = String::from("alert(1)");
        for _ in 0..(MAX_PASSES + 5) {
            payload = format!("<scr{payload}ipt>");
        }
        let result = plain().neutralize_bytes(payload.as_bytes());
        assert!(result.passes <= MAX_PASSES);
    }

    #[test]
    fn benign_input_takes_no_passes() {
        let result = plain().neutralize_bytes(b"nothing to see here");
        assert_eq!(result.passes, 0);
        assert!(result.converged);
    }

    #[test]
    fn scan_reports_without_rewriting() {
        let findings = plain().scan("<img src=x onerror=alert(1)>");
        assert!(findings.iter().any(|f| f.rule_name == "event_handler_attribute"));
    }
}
