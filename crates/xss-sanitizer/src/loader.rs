use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::policy::TagPolicy;

/// On-disk shape of a tag policy file.
///
/// ```yaml
/// tags:
///   a: [href, title]
///   br: []
/// ```
#[derive(Debug, Deserialize)]
struct PolicyFile {
    tags: BTreeMap<String, Vec<String>>,
}

/// Load a [`TagPolicy`] from a YAML file on disk.
///
/// Validates the policy after deserialization (well-formed tag and attribute
/// names, at least one tag).
pub fn load_policy(path: impl AsRef<Path>) -> Result<TagPolicy> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tag policy file: {}", path.display()))?;
    load_policy_from_str(&contents)
        .with_context(|| format!("failed to parse tag policy file: {}", path.display()))
}

/// Parse and validate a [`TagPolicy`] from a YAML string.
pub fn load_policy_from_str(yaml: &str) -> Result<TagPolicy> {
    let file: PolicyFile = serde_yml::from_str(yaml).context("YAML deserialization failed")?;
    validate(&file)?;
    Ok(TagPolicy::from(file.tags))
}

fn validate(file: &PolicyFile) -> Result<()> {
    if file.tags.is_empty() {
        bail!("tag policy must allow at least one tag");
    }

    for (tag, attributes) in &file.tags {
        if !is_tag_name(tag) {
            bail!("invalid tag name: '{tag}'");
        }
        for attribute in attributes {
            if !is_attribute_name(attribute) {
                bail!("invalid attribute name '{attribute}' on tag '{tag}'");
            }
        }
    }

    Ok(())
}

fn is_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':')
}

fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}
