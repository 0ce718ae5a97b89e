// src/rules/builtin.rs
use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;

/// Declarative patterns behind a built-in rule. A path matches when any
/// listed pattern does.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PathPatterns {
    /// Root-level names: the path equals the name or lies beneath it.
    #[serde(default)]
    pub top_level: Vec<String>,
    #[serde(default)]
    pub suffixes: Vec<String>,
    /// Matched case-insensitively against the end of the path.
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
}

impl PathPatterns {
    pub fn matches(&self, path: &str) -> bool {
        let top_level = self.top_level.iter().any(|name| {
            path == name
                || path
                    .strip_prefix(name.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        if top_level {
            return true;
        }
        if self.suffixes.iter().any(|suffix| path.ends_with(suffix.as_str())) {
            return true;
        }
        if !self.extensions.is_empty() {
            let lower = path.to_lowercase();
            if self
                .extensions
                .iter()
                .any(|ext| lower.ends_with(&format!(".{}", ext.to_lowercase())))
            {
                return true;
            }
        }
        self.contains.iter().any(|needle| path.contains(needle.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuiltinRuleDef {
    pub name: String,
    #[serde(flatten)]
    pub patterns: PathPatterns,
}

static BUILTIN_RULES: Lazy<std::result::Result<Vec<BuiltinRuleDef>, String>> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../data/builtin_rules.yaml"
    ));
    serde_yml::from_str(yaml_content).map_err(|e| e.to_string())
});

pub fn builtin_rule_defs() -> Result<&'static [BuiltinRuleDef]> {
    BUILTIN_RULES
        .as_ref()
        .map(Vec::as_slice)
        .map_err(|e| {
            AppError::RuleLoading(format!(
                "Failed to parse embedded data/builtin_rules.yaml: {}",
                e
            ))
        })
}
