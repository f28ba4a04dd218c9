//! Applies the [`StringSanitizer`] to every leaf of a JSON-like tree.

use serde_json::{Map, Value};

use crate::sanitizer::{Sanitize, SanitizerConfig, StringSanitizer};

/// Nesting depth accepted by [`StructuralMapper::default`].
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Errors returned by [`StructuralMapper::sanitize`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("container nesting exceeds the limit of {limit} levels")]
    TooDeep { limit: usize },
}

/// Sanitizes every leaf of a [`Value`] while preserving its shape.
///
/// Objects keep their keys (verbatim) and order, arrays keep their order.
/// Every non-container leaf becomes a string: numbers use their JSON text,
/// booleans are `true`/`false`, and `null` is the empty string.
///
/// A `Value` owns its children, so it cannot contain cycles; the depth limit
/// stands in for cycle detection and fails the whole call rather than
/// returning a partially sanitized tree.
#[derive(Debug, Clone)]
pub struct StructuralMapper {
    sanitizer: StringSanitizer,
    max_depth: usize,
}

impl StructuralMapper {
    pub fn new(sanitizer: StringSanitizer) -> Self {
        Self {
            sanitizer,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn sanitizer(&self) -> &StringSanitizer {
        &self.sanitizer
    }

    pub fn set_quote_escaping(&mut self, quote_escaping: bool) -> &mut Self {
        self.sanitizer.set_quote_escaping(quote_escaping);
        self
    }

    pub fn sanitize(&self, value: &Value) -> Result<Value, StructureError> {
        self.sanitize_with(value, self.sanitizer.config())
    }

    pub fn sanitize_with(
        &self,
        value: &Value,
        config: SanitizerConfig,
    ) -> Result<Value, StructureError> {
        self.walk(value, config, 0)
    }

    fn walk(
        &self,
        value: &Value,
        config: SanitizerConfig,
        depth: usize,
    ) -> Result<Value, StructureError> {
        match value {
            Value::Array(items) => {
                self.check_depth(depth)?;
                items
                    .iter()
                    .map(|item| self.walk(item, config, depth + 1))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Value::Object(entries) => {
                self.check_depth(depth)?;
                let mut out = Map::with_capacity(entries.len());
                for (key, item) in entries {
                    out.insert(key.clone(), self.walk(item, config, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
            leaf => Ok(Value::String(
                self.sanitizer.sanitize_with(&leaf_text(leaf), config),
            )),
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), StructureError> {
        if depth >= self.max_depth {
            return Err(StructureError::TooDeep {
                limit: self.max_depth,
            });
        }
        Ok(())
    }
}

impl Default for StructuralMapper {
    fn default() -> Self {
        Self::new(StringSanitizer::default())
    }
}

impl Sanitize for StructuralMapper {
    type Input = Value;
    type Output = Result<Value, StructureError>;

    fn sanitize(&self, input: &Value) -> Self::Output {
        StructuralMapper::sanitize(self, input)
    }
}

fn leaf_text(leaf: &Value) -> String {
    match leaf {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Containers are handled by the caller.
        other => other.to_string(),
    }
}
