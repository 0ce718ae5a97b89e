use crate::error::{AppError, Result};
use crate::file_types::FileClassifier;
use crate::rules::{ExclusionRule, RuleRegistry};
use byte_unit::Byte;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_DIR: &str = ".xtools/xbundle";
pub const DEFAULT_CONFIG_FILENAME: &str = "xbundle.toml";
pub const DEFAULT_OUTPUT_DIR: &str = ".xtools/xbundle/output";
pub const DEFAULT_MAX_FILE_SIZE: &str = "5MB";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default)]
    pub project_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    /// Names of the rules active when a session starts.
    #[serde(default)]
    pub active: Vec<String>,
    /// Offer a "Gitignore" rule built from the root's `.gitignore`.
    #[serde(default = "default_true")]
    pub enable_gitignore: bool,
    /// Extra rules: name to glob patterns.
    #[serde(default)]
    pub custom: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Size limit per file, e.g. "5MB". "none" disables it.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
    #[serde(default)]
    pub extra_code_extensions: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub filename: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_max_file_size() -> String {
    DEFAULT_MAX_FILE_SIZE.to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            active: Vec::new(),
            enable_gitignore: default_true(),
            custom: IndexMap::new(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            max_file_size: default_max_file_size(),
            extra_code_extensions: Vec::new(),
            output_dir: default_output_dir(),
            filename: None,
        }
    }
}

impl Config {
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_project_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => PathBuf::from(shellexpand::tilde(&p_str).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        path_to_resolve.canonicalize().map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to canonicalize project root '{}': {}",
                    path_to_resolve.display(),
                    e
                ),
            ))
        })
    }

    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        let Some(p_str) = cli_config_file else {
            let default_path = Self::default_path(project_root);
            if default_path.exists() {
                log::debug!("Using default config file path: {}", default_path.display());
                return Ok(Some(default_path));
            }
            log::debug!(
                "No config file specified and default not found at: {}",
                default_path.display()
            );
            return Ok(None);
        };

        let expanded_path_cow = shellexpand::tilde(p_str);
        let mut path = PathBuf::from(expanded_path_cow.as_ref());
        let looks_like_path =
            path.is_absolute() || path.components().count() > 1 || p_str.contains(['/', '\\']);

        if looks_like_path {
            if !path.exists() && path.extension().is_none() {
                path.set_extension("toml");
            }
            if !path.exists() {
                return Err(AppError::Config(format!(
                    "Specified config file not found at path: {}",
                    path.display()
                )));
            }
            log::debug!("Using specified config file path: {}", path.display());
            return Ok(Some(path));
        }

        let filename = if path.extension().is_none_or(|e| e != "toml") {
            format!("{}.toml", path.to_string_lossy())
        } else {
            path.to_string_lossy().to_string()
        };
        let full_path = project_root.join(DEFAULT_CONFIG_DIR).join(filename);
        if !full_path.exists() {
            return Err(AppError::Config(format!(
                "Specified config file '{}' not found in default directory: {}",
                path.display(),
                project_root.join(DEFAULT_CONFIG_DIR).display()
            )));
        }
        log::debug!(
            "Using specified config filename in default directory: {}",
            full_path.display()
        );
        Ok(Some(full_path))
    }

    pub fn default_path(project_root: &Path) -> PathBuf {
        project_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILENAME)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        toml::from_str::<Config>(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| AppError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content).map_err(|e| AppError::FileWrite {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        log::info!("Saved configuration to: {}", config_path.display());
        Ok(())
    }

    pub fn get_effective_project_name(&self, project_root: &Path) -> String {
        self.general.project_name.clone().unwrap_or_else(|| {
            project_root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "UnknownProject".to_string())
        })
    }

    /// Per-file export limit in bytes, `None` when disabled.
    pub fn max_file_size_bytes(&self) -> Result<Option<u64>> {
        let raw = self.export.max_file_size.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        let byte_value = Byte::from_str(raw).map_err(|e| {
            AppError::SizeParse(format!(
                "Invalid max_file_size '{}': {}. Use KB, MB, etc.",
                raw, e
            ))
        })?;
        Ok(Some(byte_value.as_u64()))
    }

    pub fn file_classifier(&self) -> FileClassifier {
        FileClassifier::new().with_extra_code_extensions(&self.export.extra_code_extensions)
    }

    /// Directories the tool writes into: the config directory and the
    /// export output directory, both resolved against `project_root`.
    pub fn tool_paths(&self, project_root: &Path) -> Vec<PathBuf> {
        let mut paths = vec![project_root.join(DEFAULT_CONFIG_DIR)];
        let output_dir = if self.export.output_dir.is_absolute() {
            self.export.output_dir.clone()
        } else {
            project_root.join(&self.export.output_dir)
        };
        if !output_dir.starts_with(&paths[0]) && output_dir != project_root {
            paths.push(output_dir);
        }
        paths
    }

    /// Built-in rules, then custom rules, then the gitignore rule when
    /// enabled and present in `project_root`.
    pub fn build_rule_registry(&self, project_root: &Path) -> Result<RuleRegistry> {
        let mut registry = RuleRegistry::builtin()?.with_custom_rules(&self.rules.custom)?;
        if self.rules.enable_gitignore {
            if let Some(rule) = ExclusionRule::gitignore(project_root)? {
                registry.register(rule);
            }
        }
        log::debug!("Rule registry holds {} rule(s)", registry.len());
        Ok(registry)
    }

    /// Adds or removes `name` from the persisted active set. Returns whether
    /// the list changed.
    pub fn set_rule_active(&mut self, name: &str, active: bool) -> bool {
        let present = self.rules.active.iter().any(|n| n == name);
        match (present, active) {
            (false, true) => {
                self.rules.active.push(name.to_string());
                true
            }
            (true, false) => {
                self.rules.active.retain(|n| n != name);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_paths() {
        let root = Path::new("/work/app");
        let mut config = Config::default();
        assert_eq!(
            config.tool_paths(root),
            vec![PathBuf::from("/work/app/.xtools/xbundle")]
        );

        config.export.output_dir = PathBuf::from("bundles");
        assert_eq!(
            config.tool_paths(root),
            vec![
                PathBuf::from("/work/app/.xtools/xbundle"),
                PathBuf::from("/work/app/bundles"),
            ]
        );

        config.export.output_dir = PathBuf::from(".");
        assert_eq!(config.tool_paths(root).len(), 1);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.rules.enable_gitignore);
        assert!(config.rules.active.is_empty());
        assert_eq!(config.max_file_size_bytes().unwrap(), Some(5_000_000));
        assert_eq!(config.export.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn test_parse_full_file() {
        let toml_str = r#"
[general]
project_name = "demo"

[rules]
active = ["Node Modules", "Lock Files"]
enable_gitignore = false

[rules.custom]
Fixtures = ["fixtures/", "**/*.snap"]

[export]
prefix = "Review this code."
max_file_size = "none"
extra_code_extensions = ["go"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.project_name.as_deref(), Some("demo"));
        assert_eq!(config.rules.active, vec!["Node Modules", "Lock Files"]);
        assert!(!config.rules.enable_gitignore);
        assert_eq!(config.rules.custom["Fixtures"].len(), 2);
        assert_eq!(config.max_file_size_bytes().unwrap(), None);
        assert!(config.file_classifier().is_code("main.go"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[export]\nformat = \"xml\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_size_is_reported() {
        let mut config = Config::default();
        config.export.max_file_size = "lots".into();
        assert!(matches!(
            config.max_file_size_bytes(),
            Err(AppError::SizeParse(_))
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = Config::default_path(dir.path());
        let mut config = Config::default();
        assert!(config.set_rule_active("Markdown", true));
        assert!(!config.set_rule_active("Markdown", true));
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            Config::resolve_config_path(dir.path(), None, false).unwrap(),
            Some(path)
        );
        assert_eq!(
            Config::resolve_config_path(dir.path(), None, true).unwrap(),
            None
        );
    }

    #[test]
    fn test_named_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let name = "other".to_string();
        assert!(matches!(
            Config::resolve_config_path(dir.path(), Some(&name), false),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_registry_includes_custom_and_gitignore_rules() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
        let mut config = Config::default();
        config
            .rules
            .custom
            .insert("Fixtures".into(), vec!["fixtures/".into()]);
        let registry = config.build_rule_registry(dir.path()).unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(&names[names.len() - 2..], &["Fixtures", "Gitignore"]);

        config.rules.enable_gitignore = false;
        let registry = config.build_rule_registry(dir.path()).unwrap();
        assert!(!registry.contains("Gitignore"));
    }
}
