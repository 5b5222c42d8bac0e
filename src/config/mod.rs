//! Layered configuration.
//!
//! Precedence, lowest to highest: built-in defaults, user config
//! (`~/.config/jx/config.yaml`), project config (`./jx.yaml` or `--config`),
//! `JX_*` environment variables, command-line flags.

use crate::anonymize::IdentityColumns;
use crate::error::{ExtractError, Result};
use crate::fetch::DEFAULT_BLOCK_SIZE;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project config file looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "jx.yaml";

const ENV_PREFIX: &str = "JX_";

pub const DEFAULT_ISSUE_FILE: &str = "issues.csv";
pub const DEFAULT_CHANGELOG_FILE: &str = "changelog.csv";

/// Flat key/value configuration. Nested YAML keys are joined with `.`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Build a layer from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        let mut flat = HashMap::new();
        flatten_yaml(&value, "", &mut flat);

        let mut layer = Self::default();
        for (key, value) in flat {
            layer.set(&key, value);
        }
        Ok(layer)
    }

    /// Build a layer from `JX_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Build a layer from `(name, value)` pairs, keeping `JX_*` names.
    ///
    /// `JX_BLOCK_SIZE` sets `block-size`; `JX_ANONYMIZE_ISSUES` sets
    /// `anonymize.issues`.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut layer = Self::default();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                for variant in env_key_variants(stripped) {
                    layer.set(&variant, value.clone());
                }
            }
        }
        layer
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub block_size: Option<usize>,
    pub issue_file: Option<String>,
    pub changelog_file: Option<String>,
    pub out_dir: Option<PathBuf>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(server) = &self.server {
            layer.set("server", server.clone());
        }
        if let Some(username) = &self.username {
            layer.set("username", username.clone());
        }
        if let Some(password) = &self.password {
            layer.set("password", password.clone());
        }
        if let Some(block_size) = self.block_size {
            layer.set("block-size", block_size.to_string());
        }
        if let Some(file) = &self.issue_file {
            layer.set("issue-file", file.clone());
        }
        if let Some(file) = &self.changelog_file {
            layer.set("changelog-file", file.clone());
        }
        if let Some(dir) = &self.out_dir {
            layer.set("out-dir", dir.to_string_lossy().to_string());
        }

        layer
    }
}

/// Load user config (~/.config/jx/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    let Ok(home) = env::var("HOME") else {
        return Ok(ConfigLayer::default());
    };
    let path = Path::new(&home)
        .join(".config")
        .join("jx")
        .join("config.yaml");
    ConfigLayer::from_yaml(&path)
}

/// Load the project config: `explicit` if given, else `./jx.yaml`.
///
/// # Errors
///
/// Returns an error if an explicit file is missing, or a file cannot be read
/// or parsed.
pub fn load_project_config(explicit: Option<&Path>) -> Result<ConfigLayer> {
    match explicit {
        Some(path) if !path.is_file() => Err(ExtractError::Config(format!(
            "config file not found: {}",
            path.display()
        ))),
        Some(path) => ConfigLayer::from_yaml(path),
        None => ConfigLayer::from_yaml(Path::new(PROJECT_CONFIG_FILE)),
    }
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer.set("block-size", DEFAULT_BLOCK_SIZE.to_string());
    layer.set("issue-file", DEFAULT_ISSUE_FILE);
    layer.set("changelog-file", DEFAULT_CHANGELOG_FILE);
    layer
}

/// Load configuration with the full precedence order.
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed.
pub fn load_config(config_path: Option<&Path>, cli: &CliOverrides) -> Result<ConfigLayer> {
    let layer = ConfigLayer::merge_layers(&[
        default_config_layer(),
        load_user_config()?,
        load_project_config(config_path)?,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]);
    debug!(keys = layer.values.len(), "Configuration loaded");
    Ok(layer)
}

/// Resolved settings for the extract and parse commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub block_size: usize,
    pub issue_file: String,
    pub changelog_file: String,
    pub identity: IdentityColumns,
    pub out_dir: PathBuf,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            server: None,
            username: None,
            password: None,
            block_size: DEFAULT_BLOCK_SIZE,
            issue_file: DEFAULT_ISSUE_FILE.to_string(),
            changelog_file: DEFAULT_CHANGELOG_FILE.to_string(),
            identity: IdentityColumns::default(),
            out_dir: PathBuf::from("."),
        }
    }
}

impl ExtractSettings {
    /// Resolve settings from a merged layer.
    ///
    /// # Errors
    ///
    /// Returns a config error if `block-size` is not a positive integer.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let defaults = Self::default();

        let block_size = match non_empty(layer, "block-size") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| {
                    ExtractError::Config(format!(
                        "block-size must be a positive integer, got '{raw}'"
                    ))
                })?,
            None => defaults.block_size,
        };

        let mut identity = defaults.identity;
        if let Some(list) = non_empty(layer, "anonymize.issues") {
            identity.issues = split_list(list);
        }
        if let Some(list) = non_empty(layer, "anonymize.changelog") {
            identity.changelog = split_list(list);
        }

        Ok(Self {
            server: non_empty(layer, "server").map(str::to_string),
            username: non_empty(layer, "username").map(str::to_string),
            password: layer.get("password").map(str::to_string),
            block_size,
            issue_file: non_empty(layer, "issue-file")
                .map_or(defaults.issue_file, str::to_string),
            changelog_file: non_empty(layer, "changelog-file")
                .map_or(defaults.changelog_file, str::to_string),
            identity,
            out_dir: non_empty(layer, "out-dir").map_or(defaults.out_dir, PathBuf::from),
        })
    }

    /// The server URL, which extraction cannot do without.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no server is configured.
    pub fn require_server(&self) -> Result<&str> {
        self.server.as_deref().ok_or_else(|| {
            ExtractError::validation("server", "no server given (use --server or JX_SERVER)")
        })
    }
}

fn non_empty<'a>(layer: &'a ConfigLayer, key: &str) -> Option<&'a str> {
    layer.get(key).map(str::trim).filter(|value| !value.is_empty())
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

fn env_key_variants(raw: &str) -> Vec<String> {
    let lower = raw.to_lowercase();
    vec![lower.clone(), lower.replace('_', ".")]
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}
