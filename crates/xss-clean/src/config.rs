use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sanitizer: SanitizerSection,
    /// Tag policy for markup mode; the built-in default when absent.
    #[serde(default)]
    pub policy_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Default, Deserialize)]
pub struct SanitizerSection {
    #[serde(default)]
    pub escape_quotes: bool,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub markup_backend: MarkupEngine,
}

/// Which engine cleans markup mode input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MarkupEngine {
    /// The regex allowlist filter.
    #[default]
    Builtin,
    /// The ammonia HTML sanitizer (needs the `ammonia` feature).
    Ammonia,
}

/// How the input is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Plain text; every rule applies.
    #[default]
    String,
    /// A JSON document; every leaf value is sanitized.
    Json,
    /// Rich text; allowlisted tags survive.
    Markup,
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// Returns `None` when the file does not exist, so the tool works without
/// any config file.  The caller logs that once tracing is up.
pub fn load(path: &Path) -> anyhow::Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    from_str(&contents)
        .map(Some)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))
}

pub fn from_str(yaml: &str) -> anyhow::Result<Config> {
    Ok(serde_yml::from_str(yaml)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        assert!(load(Path::new("/does/not/exist.yaml")).unwrap().is_none());
        let cfg = Config::default();
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.logging.format, LogFormat::Text);
        assert_eq!(cfg.sanitizer.mode, Mode::String);
        assert!(!cfg.sanitizer.escape_quotes);
        assert_eq!(cfg.sanitizer.markup_backend, MarkupEngine::Builtin);
        assert!(cfg.policy_file.is_none());
    }

    #[test]
    fn empty_sections_use_defaults() {
        let cfg = from_str("sanitizer: {}\n").unwrap();
        assert_eq!(cfg.sanitizer.mode, Mode::String);
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn parses_full_config() {
        let yaml = r#"
logging:
  level: debug
  format: json
sanitizer:
  escape_quotes: true
  mode: markup
  markup_backend: ammonia
policy_file: tags.yaml
"#;
        let cfg = from_str(yaml).unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert!(cfg.sanitizer.escape_quotes);
        assert_eq!(cfg.sanitizer.mode, Mode::Markup);
        assert_eq!(cfg.sanitizer.markup_backend, MarkupEngine::Ammonia);
        assert_eq!(cfg.policy_file, Some(PathBuf::from("tags.yaml")));
    }

    #[test]
    fn existing_file_is_loaded() {
        let path = std::env::temp_dir().join(format!("xss-clean-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "sanitizer:\n  mode: json\n").unwrap();
        let cfg = load(&path).unwrap().expect("file exists");
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.sanitizer.mode, Mode::Json);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(from_str("sanitizer:\n  mode: xml\n").is_err());
    }
}
