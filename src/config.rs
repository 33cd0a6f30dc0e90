//! Configuration file support for panflow
//!
//! Config files are merged in order (later overrides earlier):
//! 1. Built-in defaults
//! 2. `~/.config/panflow/config.yaml` (user defaults)
//! 3. `.panflow.yaml` in project root (project overrides)
//! 4. Caller overrides (e.g. the CLI `--config` file)
//!
//! Mappings merge key by key; scalars and lists replace.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Base pandoc options applied to every conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PandocOptions {
    /// `--wrap` mode: auto, none or preserve
    pub wrap: String,
    /// Emit `--standalone`
    pub standalone: bool,
    /// `--markdown-headings` style: atx or setext
    pub markdown_headings: String,
    /// Emit `--reference-links`
    pub reference_links: bool,
    /// One `--resource-path=` per entry
    pub resource_path: Vec<String>,
}

impl Default for PandocOptions {
    fn default() -> Self {
        Self {
            wrap: "none".to_string(),
            standalone: true,
            markdown_headings: "atx".to_string(),
            reference_links: false,
            resource_path: Vec::new(),
        }
    }
}

/// Output validation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum output size in bytes (0 disables)
    pub min_file_size: u64,
    /// Minimum output/input size ratio
    pub conversion_ratio_threshold: f64,
    /// Run structural checks on HTML input and converted output
    pub verify_structure: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_file_size: 0,
            conversion_ratio_threshold: PandocConfig::DEFAULT_RATIO_THRESHOLD,
            verify_structure: true,
        }
    }
}

/// Fixed-count, fixed-delay retry policy for output validation failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total pandoc invocations allowed per file
    pub max_conversion_retries: u32,
    /// Seconds to sleep between invocations
    pub conversion_retry_delay: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_conversion_retries: 3,
            conversion_retry_delay: 1.0,
        }
    }
}

/// Metrics toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub track_conversion_time: bool,
    pub track_file_sizes: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            track_conversion_time: true,
            track_file_sizes: true,
        }
    }
}

/// Validated conversion settings
///
/// # Example
///
/// ```yaml
/// # ~/.config/panflow/config.yaml or .panflow.yaml
/// output_dir: build/docs
/// pandoc_options:
///   wrap: none
///   standalone: true
///   markdown_headings: atx
///   resource_path: [assets]
/// html_to_md_extra_args: ["--strip-comments"]
/// validation:
///   min_file_size: 16
///   conversion_ratio_threshold: 0.05
/// retry_mechanism:
///   max_conversion_retries: 2
///   conversion_retry_delay: 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PandocConfig {
    pub output_dir: PathBuf,
    /// Explicit pandoc binary. Falls back to `PANDOC_PATH`, then `PATH`.
    pub pandoc_path: Option<PathBuf>,
    pub pandoc_options: PandocOptions,
    pub html_to_md_extra_args: Vec<String>,
    pub md_to_docx_extra_args: Vec<String>,
    pub validation: ValidationConfig,
    pub retry_mechanism: RetryConfig,
    pub metrics: MetricsConfig,
}

impl Default for PandocConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("converted"),
            pandoc_path: None,
            pandoc_options: PandocOptions::default(),
            html_to_md_extra_args: Vec::new(),
            md_to_docx_extra_args: Vec::new(),
            validation: ValidationConfig::default(),
            retry_mechanism: RetryConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl PandocConfig {
    /// Ratio threshold used when none is configured
    pub const DEFAULT_RATIO_THRESHOLD: f64 = 0.1;

    const WRAP_MODES: &'static [&'static str] = &["auto", "none", "preserve"];
    const HEADING_STYLES: &'static [&'static str] = &["atx", "setext"];

    /// Per-user config file, `~/.config/panflow/config.yaml` on Linux.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("panflow/config.yaml"))
    }

    /// Load user and project config files, apply `overrides`, and validate.
    pub fn load(project_root: &Path, overrides: Option<&Value>) -> Result<Self, ConfigError> {
        Self::load_with_user(
            Self::user_config_path().as_deref(),
            project_root,
            overrides,
        )
    }

    /// Like [`PandocConfig::load`], reading the user layer from `user_config`
    /// instead of the per-user location. `None` skips the user layer.
    pub fn load_with_user(
        user_config: Option<&Path>,
        project_root: &Path,
        overrides: Option<&Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();

        if let Some(user) = user_config.map(Self::load_file).transpose()?.flatten() {
            layers.push(user);
        }

        if let Some(project) = Self::load_file(&project_root.join(".panflow.yaml"))? {
            layers.push(project);
        }

        if let Some(o) = overrides {
            layers.push(o.clone());
        }

        let config = Self::from_layers(&layers)?;
        tracing::debug!(
            output_dir = %config.output_dir.display(),
            pandoc_path = ?config.pandoc_path,
            max_retries = config.retry_mechanism.max_conversion_retries,
            ratio_threshold = config.validation.conversion_ratio_threshold,
            verify_structure = config.validation.verify_structure,
            "Effective config after merge"
        );
        Ok(config)
    }

    /// Read one YAML layer. A missing file is not an error.
    pub fn load_file(path: &Path) -> Result<Option<Value>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        // An empty file parses to Null, which merges as "no overrides"
        let value: Value = serde_yaml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded config layer");
        Ok(Some(value))
    }

    /// Merge layers over the defaults, deserialize, and validate.
    pub fn from_layers(layers: &[Value]) -> Result<Self, ConfigError> {
        let mut merged = serde_yaml::to_value(Self::default())?;
        for layer in layers {
            merge_values(&mut merged, layer);
        }
        let config: Self = serde_yaml::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a single YAML document over the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_layers(&[value])
    }

    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_dir must not be empty".into()));
        }
        if !Self::WRAP_MODES.contains(&self.pandoc_options.wrap.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "pandoc_options.wrap must be one of {:?}, got '{}'",
                Self::WRAP_MODES,
                self.pandoc_options.wrap
            )));
        }
        if !Self::HEADING_STYLES.contains(&self.pandoc_options.markdown_headings.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "pandoc_options.markdown_headings must be one of {:?}, got '{}'",
                Self::HEADING_STYLES,
                self.pandoc_options.markdown_headings
            )));
        }
        let threshold = self.validation.conversion_ratio_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "validation.conversion_ratio_threshold must be a non-negative number, got {}",
                threshold
            )));
        }
        if self.retry_mechanism.max_conversion_retries == 0 {
            return Err(ConfigError::Invalid(
                "retry_mechanism.max_conversion_retries must be at least 1".into(),
            ));
        }
        let delay = self.retry_mechanism.conversion_retry_delay;
        if !delay.is_finite() || delay < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "retry_mechanism.conversion_retry_delay must be a non-negative number, got {}",
                delay
            )));
        }
        Ok(())
    }
}

/// Layer `overlay` onto `base` (overlay wins where present).
pub fn merge_values(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Build an override layer from dotted `key=value` pairs
/// (`validation.min_file_size=10`). Values are parsed as YAML scalars.
pub fn overrides_from_pairs<'a>(
    pairs: impl IntoIterator<Item = &'a str>,
) -> Result<Value, ConfigError> {
    let mut root = Value::Mapping(Mapping::new());
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| ConfigError::Invalid(format!("expected key=value, got '{}'", pair)))?;
        let value: Value = serde_yaml::from_str(raw)?;
        let mut layer = value;
        for part in key.trim().rsplit('.') {
            let mut map = Mapping::new();
            map.insert(Value::String(part.to_string()), layer);
            layer = Value::Mapping(map);
        }
        merge_values(&mut root, &layer);
    }
    Ok(root)
}
