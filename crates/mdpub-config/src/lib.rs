//! Configuration management for mdpub.
//!
//! Parses `mdpub.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `confluence.base_url`
//! - `confluence.username`
//! - `confluence.password`
//! - `confluence.token`
//! - `diagrams.kroki_url`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    /// Space for documents that do not declare one.
    pub space: Option<String>,
    /// Parents prepended to each document's own.
    pub parents: Option<Vec<String>>,
    pub title_from_h1: Option<bool>,
    pub drop_h1: Option<bool>,
    pub strip_linebreaks: Option<bool>,
    pub changes_only: Option<bool>,
    pub minor_edit: Option<bool>,
    pub version_message: Option<String>,
    pub edit_lock: Option<bool>,
    pub image_align: Option<String>,
    pub continue_on_error: Option<bool>,
    pub kroki_url: Option<String>,
    pub diagram_scale: Option<f64>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "mdpub.toml";

/// Accepted `publish.image_align` values.
const IMAGE_ALIGNMENTS: &[&str] = &["left", "center", "right"];

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub confluence: ConfluenceConfig,
    pub publish: PublishConfig,
    pub diagrams: DiagramsConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Confluence connection settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    /// Confluence server base URL.
    pub base_url: String,
    /// Username for basic authentication.
    pub username: Option<String>,
    /// Password or API token for basic authentication.
    pub password: Option<String>,
    /// Personal access token for bearer authentication.
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Retries for idempotent requests.
    pub retries: u32,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: None,
            password: None,
            token: None,
            timeout_secs: 30,
            retries: 2,
        }
    }
}

/// How requests authenticate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
    Anonymous,
}

impl ConfluenceConfig {
    /// Validate that the connection settings are usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the URL is missing or malformed,
    /// or the credentials are ambiguous.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.base_url, "confluence.base_url")?;
        require_http_url(&self.base_url, "confluence.base_url")?;
        if self.token.is_some() && self.username.is_some() {
            return Err(ConfigError::Validation(
                "confluence.token and confluence.username are mutually exclusive".to_owned(),
            ));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::Validation(
                "confluence.password requires confluence.username".to_owned(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "confluence.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn credentials(&self) -> Credentials {
        match (&self.token, &self.username) {
            (Some(token), _) => Credentials::Bearer(token.clone()),
            (None, Some(username)) => Credentials::Basic {
                username: username.clone(),
                password: self.password.clone().unwrap_or_default(),
            },
            (None, None) => Credentials::Anonymous,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Publishing behavior.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Space for documents that do not declare one.
    pub space: Option<String>,
    /// Parents prepended to each document's own.
    pub parents: Vec<String>,
    pub title_from_h1: bool,
    pub drop_h1: bool,
    pub strip_linebreaks: bool,
    /// Skip updates whose rendered body is unchanged.
    pub changes_only: bool,
    pub minor_edit: bool,
    pub version_message: String,
    /// Restrict editing of published pages to the publishing user.
    pub edit_lock: bool,
    pub image_align: Option<String>,
    /// Delay between creating a page and updating it.
    pub create_grace_ms: u64,
    pub continue_on_error: bool,
    /// Template search path after the document directory (relative to the
    /// config file).
    pub include_dirs: Vec<PathBuf>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            space: None,
            parents: Vec::new(),
            title_from_h1: false,
            drop_h1: false,
            strip_linebreaks: false,
            changes_only: false,
            minor_edit: false,
            version_message: String::new(),
            edit_lock: false,
            image_align: None,
            create_grace_ms: 1000,
            continue_on_error: false,
            include_dirs: Vec::new(),
        }
    }
}

impl PublishConfig {
    #[must_use]
    pub fn create_grace(&self) -> Duration {
        Duration::from_millis(self.create_grace_ms)
    }
}

/// Diagram rendering configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiagramsConfig {
    /// Kroki server URL. Diagrams are rendered only when set.
    pub kroki_url: Option<String>,
    /// Width multiplier for rendered diagrams.
    pub scale: f64,
    pub timeout_secs: u64,
    /// Fence languages to render. Empty renders every supported language.
    pub enabled: Vec<String>,
}

impl Default for DiagramsConfig {
    fn default() -> Self {
        Self {
            kroki_url: None,
            scale: 1.0,
            timeout_secs: 30,
            enabled: Vec::new(),
        }
    }
}

impl DiagramsConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`confluence.token`").
        field: String,
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `mdpub.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading, so CLI arguments take
    /// precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        fn set<T: Clone>(target: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }

        let confluence = &mut self.confluence;
        set(&mut confluence.base_url, settings.base_url.as_ref());
        if settings.username.is_some() {
            confluence.username.clone_from(&settings.username);
            confluence.token = None;
        }
        if settings.password.is_some() {
            confluence.password.clone_from(&settings.password);
        }
        if settings.token.is_some() {
            confluence.token.clone_from(&settings.token);
            confluence.username = None;
            confluence.password = None;
        }

        let publish = &mut self.publish;
        if settings.space.is_some() {
            publish.space.clone_from(&settings.space);
        }
        set(&mut publish.parents, settings.parents.as_ref());
        set(&mut publish.title_from_h1, settings.title_from_h1.as_ref());
        set(&mut publish.drop_h1, settings.drop_h1.as_ref());
        set(&mut publish.strip_linebreaks, settings.strip_linebreaks.as_ref());
        set(&mut publish.changes_only, settings.changes_only.as_ref());
        set(&mut publish.minor_edit, settings.minor_edit.as_ref());
        set(&mut publish.version_message, settings.version_message.as_ref());
        set(&mut publish.edit_lock, settings.edit_lock.as_ref());
        set(&mut publish.continue_on_error, settings.continue_on_error.as_ref());
        if settings.image_align.is_some() {
            publish.image_align.clone_from(&settings.image_align);
        }

        if settings.kroki_url.is_some() {
            self.diagrams.kroki_url.clone_from(&settings.kroki_url);
        }
        set(&mut self.diagrams.scale, settings.diagram_scale.as_ref());
    }

    /// Get validated Confluence configuration.
    ///
    /// Use this instead of accessing the `confluence` field directly when
    /// the command talks to Confluence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the section is missing or invalid.
    pub fn require_confluence(&self) -> Result<&ConfluenceConfig, ConfigError> {
        if self.confluence.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "confluence.base_url is required (set it in [confluence] or pass --base-url)"
                    .to_owned(),
            ));
        }
        self.confluence.validate()?;
        Ok(&self.confluence)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// The `[confluence]` section is validated separately by
    /// [`Config::require_confluence`] since compile-only runs do not need it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_publish()?;
        self.validate_diagrams()?;
        Ok(())
    }

    fn validate_publish(&self) -> Result<(), ConfigError> {
        if let Some(align) = &self.publish.image_align
            && !IMAGE_ALIGNMENTS.contains(&align.as_str())
        {
            return Err(ConfigError::Validation(format!(
                "publish.image_align must be one of {}, got \"{align}\"",
                IMAGE_ALIGNMENTS.join(", ")
            )));
        }
        if let Some(space) = &self.publish.space {
            require_non_empty(space, "publish.space")?;
        }
        Ok(())
    }

    fn validate_diagrams(&self) -> Result<(), ConfigError> {
        if let Some(kroki_url) = &self.diagrams.kroki_url {
            require_non_empty(kroki_url, "diagrams.kroki_url")?;
            require_http_url(kroki_url, "diagrams.kroki_url")?;
        }
        let scale = self.diagrams.scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::Validation(
                "diagrams.scale must be greater than 0".to_owned(),
            ));
        }
        if self.diagrams.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "diagrams.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        let confluence = &mut self.confluence;
        confluence.base_url = expand::expand_env(&confluence.base_url, "confluence.base_url")?;
        expand::expand_opt(&mut confluence.username, "confluence.username")?;
        expand::expand_opt(&mut confluence.password, "confluence.password")?;
        expand::expand_opt(&mut confluence.token, "confluence.token")?;
        expand::expand_opt(&mut self.diagrams.kroki_url, "diagrams.kroki_url")?;
        Ok(())
    }

    /// Resolve relative include directories against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        for dir in &mut self.publish.include_dirs {
            if dir.is_relative() {
                *dir = config_dir.join(&*dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.confluence.base_url.is_empty());
        assert_eq!(config.confluence.timeout_secs, 30);
        assert_eq!(config.publish.create_grace(), Duration::from_secs(1));
        assert!((config.diagrams.scale - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.diagrams.timeout(), Duration::from_secs(30));
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.publish.parents.is_empty());
        assert!(config.diagrams.kroki_url.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[confluence]
base_url = "https://wiki.example.com"
username = "bot"
password = "secret"

[publish]
space = "DOC"
parents = ["Team", "Guides"]
title_from_h1 = true
drop_h1 = true
changes_only = true
version_message = "sync"
image_align = "center"
create_grace_ms = 250

[diagrams]
kroki_url = "https://kroki.io"
scale = 1.5
enabled = ["mermaid", "plantuml"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(
            config.require_confluence().unwrap().credentials(),
            Credentials::Basic {
                username: "bot".to_owned(),
                password: "secret".to_owned(),
            }
        );
        assert_eq!(config.publish.space.as_deref(), Some("DOC"));
        assert_eq!(config.publish.parents, vec!["Team", "Guides"]);
        assert!(config.publish.title_from_h1);
        assert_eq!(config.publish.create_grace(), Duration::from_millis(250));
        assert_eq!(config.diagrams.enabled, vec!["mermaid", "plantuml"]);
    }

    #[test]
    fn test_token_credentials() {
        let config: Config = toml::from_str(
            r#"
[confluence]
base_url = "https://wiki.example.com"
token = "pat"
"#,
        )
        .unwrap();
        assert_eq!(
            config.confluence.credentials(),
            Credentials::Bearer("pat".to_owned())
        );
    }

    #[test]
    fn test_require_confluence_missing_url() {
        let err = Config::default().require_confluence().unwrap_err();
        assert!(err.to_string().contains("confluence.base_url"));
    }

    #[test]
    fn test_require_confluence_invalid_url() {
        let mut config = Config::default();
        config.confluence.base_url = "wiki.example.com".to_owned();
        let err = config.require_confluence().unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn test_token_and_username_conflict() {
        let mut config = Config::default();
        config.confluence.base_url = "https://wiki".to_owned();
        config.confluence.username = Some("u".to_owned());
        config.confluence.token = Some("t".to_owned());
        assert!(matches!(
            config.require_confluence(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_scale() {
        let mut config = Config::default();
        config.diagrams.scale = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("diagrams.scale"));
    }

    #[test]
    fn test_invalid_image_align() {
        let mut config = Config::default();
        config.publish.image_align = Some("middle".to_owned());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_kroki_url() {
        let mut config = Config::default();
        config.diagrams.kroki_url = Some("kroki:8000".to_owned());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_resolves_include_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            "[publish]\ninclude_dirs = [\"templates\", \"/abs/shared\"]\n",
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.publish.include_dirs,
            vec![dir.path().join("templates"), PathBuf::from("/abs/shared")]
        );
    }

    #[test]
    fn test_load_expands_env_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
[confluence]
base_url = "${MDPUB_TEST_SURELY_UNSET_URL:-https://wiki.example.com}"
token = "${MDPUB_TEST_SURELY_UNSET_TOKEN:-dev-token}"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.confluence.base_url, "https://wiki.example.com");
        assert_eq!(config.confluence.token.as_deref(), Some("dev-token"));
    }

    #[test]
    fn test_load_unset_env_var() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "[confluence]\ntoken = \"${MDPUB_TEST_SURELY_UNSET}\"\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { ref field, .. } if field == "confluence.token"));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/mdpub.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_cli_settings_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
[confluence]
base_url = "https://wiki.example.com"
username = "bot"
password = "pw"

[publish]
space = "DOC"
minor_edit = true
"#,
        )
        .unwrap();

        let settings = CliSettings {
            token: Some("pat".to_owned()),
            space: Some("OPS".to_owned()),
            changes_only: Some(true),
            diagram_scale: Some(2.0),
            ..CliSettings::default()
        };
        let config = Config::load(Some(&path), Some(&settings)).unwrap();

        assert_eq!(
            config.confluence.credentials(),
            Credentials::Bearer("pat".to_owned())
        );
        assert_eq!(config.confluence.password, None);
        assert_eq!(config.publish.space.as_deref(), Some("OPS"));
        assert!(config.publish.changes_only);
        assert!(config.publish.minor_edit);
        assert!((config.diagrams.scale - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cli_settings_are_validated() {
        let settings = CliSettings {
            diagram_scale: Some(-1.0),
            ..CliSettings::default()
        };
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "").unwrap();

        assert!(Config::load(Some(&path), Some(&settings)).is_err());
    }
}
