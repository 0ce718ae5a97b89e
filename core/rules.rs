use crate::error::{AppError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub mod builtin;

pub use builtin::PathPatterns;

pub const GITIGNORE_RULE_NAME: &str = "Gitignore";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrigin {
    Builtin,
    Custom,
    Gitignore,
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOrigin::Builtin => write!(f, "built-in"),
            RuleOrigin::Custom => write!(f, "custom"),
            RuleOrigin::Gitignore => write!(f, "gitignore"),
        }
    }
}

pub type PathPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

pub enum RuleMatcher {
    Patterns(PathPatterns),
    Globs { patterns: Vec<String>, set: GlobSet },
    Gitignore(Gitignore),
    Predicate(PathPredicate),
}

impl fmt::Debug for RuleMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleMatcher::Patterns(p) => f.debug_tuple("Patterns").field(p).finish(),
            RuleMatcher::Globs { patterns, .. } => f.debug_tuple("Globs").field(patterns).finish(),
            RuleMatcher::Gitignore(g) => f
                .debug_tuple("Gitignore")
                .field(&g.path().display())
                .finish(),
            RuleMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A named predicate over relative paths. Rules are pure: no filesystem
/// access happens at match time.
#[derive(Debug)]
pub struct ExclusionRule {
    name: String,
    origin: RuleOrigin,
    matcher: RuleMatcher,
}

impl ExclusionRule {
    pub fn from_patterns(name: impl Into<String>, patterns: PathPatterns) -> Self {
        Self {
            name: name.into(),
            origin: RuleOrigin::Builtin,
            matcher: RuleMatcher::Patterns(patterns),
        }
    }

    pub fn from_globs(name: impl Into<String>, patterns: &[String]) -> Result<Self> {
        let name = name.into();
        let set = build_glob_set_from_vec(patterns)?;
        log::debug!("Built custom rule '{}' from {} glob(s)", name, patterns.len());
        Ok(Self {
            name,
            origin: RuleOrigin::Custom,
            matcher: RuleMatcher::Globs {
                patterns: patterns.to_vec(),
                set,
            },
        })
    }

    pub fn from_predicate(
        name: impl Into<String>,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            origin: RuleOrigin::Custom,
            matcher: RuleMatcher::Predicate(Arc::new(predicate)),
        }
    }

    /// Rule built from `<root>/.gitignore`. `Ok(None)` when the file is absent.
    pub fn gitignore(root: &Path) -> Result<Option<Self>> {
        let gitignore_path = root.join(".gitignore");
        if !gitignore_path.is_file() {
            log::debug!("No .gitignore found at {}", gitignore_path.display());
            return Ok(None);
        }
        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(&gitignore_path) {
            log::warn!(
                "Problem reading {}: {}",
                gitignore_path.display(),
                err
            );
        }
        let matcher = builder.build()?;
        log::debug!(
            "Loaded {} gitignore pattern(s) from {}",
            matcher.num_ignores(),
            gitignore_path.display()
        );
        Ok(Some(Self {
            name: GITIGNORE_RULE_NAME.to_string(),
            origin: RuleOrigin::Gitignore,
            matcher: RuleMatcher::Gitignore(matcher),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> RuleOrigin {
        self.origin
    }

    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    pub fn matches(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        match &self.matcher {
            RuleMatcher::Patterns(patterns) => patterns.matches(path),
            RuleMatcher::Globs { set, .. } => {
                // Directory patterns ("dist/**") also need to catch the
                // directory itself.
                set.is_match(path) || set.is_match(format!("{}/dummy_file_for_dir_match", path))
            }
            RuleMatcher::Gitignore(gitignore) => {
                gitignore.matched_path_or_any_parents(path, false).is_ignore()
                    || gitignore.matched_path_or_any_parents(path, true).is_ignore()
            }
            RuleMatcher::Predicate(predicate) => predicate(path),
        }
    }
}

fn build_glob_set_from_vec(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern_str in patterns {
        let mut processed_pattern = pattern_str.trim().to_string();
        if processed_pattern.ends_with('/') && processed_pattern.len() > 1 {
            processed_pattern.push_str("**");
        }
        match Glob::new(&processed_pattern) {
            Ok(glob) => {
                log::trace!(
                    "Adding glob pattern: {} (processed as {})",
                    pattern_str,
                    processed_pattern
                );
                builder.add(glob);
            }
            Err(e) => {
                log::error!("Invalid glob pattern \"{}\": {}", pattern_str, e);
                return Err(AppError::Glob(format!(
                    "Invalid glob pattern \"{}\" (processed as \"{}\"): {}",
                    pattern_str, processed_pattern, e
                )));
            }
        }
    }
    Ok(builder.build()?)
}

/// Every rule the user can toggle, in display order.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: IndexMap<String, Arc<ExclusionRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the embedded built-in rules.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        for def in builtin::builtin_rule_defs()? {
            registry.register(ExclusionRule::from_patterns(
                def.name.clone(),
                def.patterns.clone(),
            ));
        }
        log::debug!("Registered {} built-in rule(s)", registry.len());
        Ok(registry)
    }

    /// Adds a rule, replacing any rule with the same name in place.
    pub fn register(&mut self, rule: ExclusionRule) {
        if self.rules.contains_key(rule.name()) {
            log::debug!("Replacing rule '{}'", rule.name());
        }
        self.rules.insert(rule.name().to_string(), Arc::new(rule));
    }

    pub fn with_custom_rules(mut self, custom: &IndexMap<String, Vec<String>>) -> Result<Self> {
        for (name, globs) in custom {
            self.register(ExclusionRule::from_globs(name.clone(), globs)?);
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ExclusionRule>> {
        self.rules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<ExclusionRule>> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Resolves rule names into the active set, kept in registry order.
    pub fn activate<'a, I>(&self, names: I) -> Result<ActiveRules>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut wanted = std::collections::BTreeSet::new();
        for name in names {
            if !self.rules.contains_key(name) {
                return Err(AppError::UnknownRule(name.to_string()));
            }
            wanted.insert(name);
        }
        Ok(ActiveRules {
            rules: self
                .rules
                .iter()
                .filter(|(name, _)| wanted.contains(name.as_str()))
                .map(|(_, rule)| Arc::clone(rule))
                .collect(),
        })
    }

    pub fn activate_all(&self) -> ActiveRules {
        ActiveRules {
            rules: self.rules.values().cloned().collect(),
        }
    }
}

/// The rules currently applied. A path is filtered when any of them match.
#[derive(Debug, Clone, Default)]
pub struct ActiveRules {
    rules: Vec<Arc<ExclusionRule>>,
}

impl ActiveRules {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name())
    }

    pub fn is_filtered(&self, path: &str) -> bool {
        self.matching_rule(path).is_some()
    }

    /// First active rule matching `path`.
    pub fn matching_rule(&self, path: &str) -> Option<&ExclusionRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(Arc::as_ref)
    }
}
