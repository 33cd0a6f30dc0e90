//! Integration façade over the conversion pipeline.
//!
//! [`PandocIntegration`] is the outward-facing entry point: it loads
//! configuration, verifies pandoc, resolves paths against the project root,
//! and reports every outcome as an [`IntegrationResult`]. No error escapes
//! as a `Result::Err`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::PandocConfig;
use crate::convert::{
    default_output_path, get_file_info, mirrored_output_path, DocumentConverter,
};
use crate::fs;
use crate::metrics::MetricsSummary;
use crate::models::{BatchResult, ConversionResult, ConversionTask, Format};
use crate::pandoc::{verify_pandoc, Pandoc, PandocCli, PandocError};
use crate::project::resolve_project_path;

/// Builds the engine once configuration is known.
pub type EngineFactory = Box<dyn Fn(&PandocConfig) -> Result<Box<dyn Pandoc>, PandocError>>;

const NOT_INITIALIZED: &str = "Pandoc integration not initialized; call initialize() first";

/// Uniform result of every façade operation.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationResult<T> {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T> IntegrationResult<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            data: Some(data),
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: error.clone(),
            error: Some(error),
            data: None,
        }
    }

    /// Failure that still carries the detailed payload.
    pub fn err_with(error: impl Into<String>, data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::err(error)
        }
    }

    pub fn not_initialized() -> Self {
        Self::err(NOT_INITIALIZED)
    }
}

/// Snapshot reported by [`PandocIntegration::status`].
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationStatus {
    pub initialized: bool,
    pub pandoc_version: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub metrics: Option<MetricsSummary>,
}

/// Façade over [`DocumentConverter`].
pub struct PandocIntegration {
    project_root: PathBuf,
    user_config: Option<PathBuf>,
    overrides: Option<serde_yaml::Value>,
    engine_factory: EngineFactory,
    converter: Option<DocumentConverter>,
    initialized: bool,
    pandoc_version: Option<String>,
}

impl PandocIntegration {
    /// Integration over the real pandoc binary.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self::with_engine_factory(
            project_root,
            Box::new(|config: &PandocConfig| {
                PandocCli::locate(config.pandoc_path.as_deref())
                    .map(|cli| Box::new(cli) as Box<dyn Pandoc>)
            }),
        )
    }

    /// Integration over a custom engine.
    pub fn with_engine_factory(project_root: impl Into<PathBuf>, engine_factory: EngineFactory) -> Self {
        Self {
            project_root: project_root.into(),
            user_config: PandocConfig::user_config_path(),
            overrides: None,
            engine_factory,
            converter: None,
            initialized: false,
            pandoc_version: None,
        }
    }

    /// Read the user config layer from `path` instead of the per-user location.
    pub fn with_user_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_config = Some(path.into());
        self
    }

    /// Ignore the user config layer; only the project file and overrides apply.
    pub fn without_user_config(mut self) -> Self {
        self.user_config = None;
        self
    }

    /// Configuration layer applied over the config files at initialization.
    pub fn with_overrides(mut self, overrides: serde_yaml::Value) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn converter(&self) -> Option<&DocumentConverter> {
        self.converter.as_ref()
    }

    /// Load config, verify pandoc, prepare the output directory, and build the
    /// converter. Returns the pandoc version on success.
    pub fn initialize(&mut self) -> IntegrationResult<String> {
        let _span =
            tracing::info_span!("initialize", root = %self.project_root.display()).entered();

        let loaded = PandocConfig::load_with_user(
            self.user_config.as_deref(),
            &self.project_root,
            self.overrides.as_ref(),
        );
        let mut config = match loaded {
            Ok(c) => c,
            Err(e) => return IntegrationResult::err(format!("Failed to load configuration: {}", e)),
        };
        config.output_dir = resolve_project_path(&self.project_root, &config.output_dir);

        let engine = match (self.engine_factory)(&config) {
            Ok(engine) => engine,
            Err(e) => return IntegrationResult::err(format!("Pandoc not available: {}", e)),
        };
        let version = match verify_pandoc(engine.as_ref()) {
            Ok(v) => v,
            Err(e) => return IntegrationResult::err(format!("Pandoc not available: {}", e)),
        };

        if let Err(e) = fs::create_directory(&config.output_dir) {
            return IntegrationResult::err(format!(
                "Failed to create output directory {}: {}",
                config.output_dir.display(),
                e
            ));
        }

        let converter = match DocumentConverter::with_engine(config, engine) {
            Ok(c) => c,
            Err(e) => return IntegrationResult::err(format!("Pandoc not available: {}", e)),
        };

        self.converter = Some(converter);
        self.pandoc_version = Some(version.clone());
        self.initialized = true;
        tracing::info!(version = %version, "Pandoc integration initialized");
        IntegrationResult::ok(format!("Pandoc {} ready", version), version)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        resolve_project_path(&self.project_root, path)
    }

    fn converter_mut(&mut self) -> Option<&mut DocumentConverter> {
        if self.initialized {
            self.converter.as_mut()
        } else {
            None
        }
    }

    /// Convert one HTML file to Markdown. Output defaults to
    /// `{output_dir}/{stem}.md`.
    pub fn html_to_markdown(
        &mut self,
        input: &Path,
        output: Option<&Path>,
    ) -> IntegrationResult<ConversionResult> {
        self.convert_single(input, output, Format::Markdown)
    }

    /// Convert one Markdown file to DOCX. Output defaults to
    /// `{output_dir}/{stem}.docx`.
    pub fn markdown_to_docx(
        &mut self,
        input: &Path,
        output: Option<&Path>,
    ) -> IntegrationResult<ConversionResult> {
        self.convert_single(input, output, Format::Docx)
    }

    fn convert_single(
        &mut self,
        input: &Path,
        output: Option<&Path>,
        target: Format,
    ) -> IntegrationResult<ConversionResult> {
        let input = self.resolve(input);
        let output = output.map(|o| self.resolve(o));
        let Some(converter) = self.converter_mut() else {
            return IntegrationResult::not_initialized();
        };

        let output = output.unwrap_or_else(|| {
            default_output_path(&converter.config().output_dir, &input, &target)
        });
        let result = converter.convert_file(&input, &output, &target);
        if result.success {
            IntegrationResult::ok(result.message.clone(), result)
        } else {
            let error = result.error.clone().unwrap_or_else(|| result.message.clone());
            IntegrationResult::err_with(error, result)
        }
    }

    /// Convert every matching file in `input_dir` to `target`.
    ///
    /// `pattern` defaults to `*.{html,htm}` for Markdown targets and
    /// `*.{md,markdown}` for DOCX targets, matched case-insensitively. Outputs
    /// mirror the input's subdirectory under the output directory.
    pub fn convert_directory(
        &mut self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        target: Format,
        pattern: Option<&str>,
        recursive: bool,
    ) -> IntegrationResult<BatchResult> {
        let input_dir = self.resolve(input_dir);
        let output_dir = output_dir.map(|o| self.resolve(o));
        let _span =
            tracing::info_span!("convert_directory", dir = %input_dir.display()).entered();

        let Some(converter) = self.converter_mut() else {
            return IntegrationResult::not_initialized();
        };

        match fs::stat(&input_dir) {
            Ok(s) if s.exists && s.is_dir => {}
            Ok(s) if s.exists => {
                return IntegrationResult::err(format!(
                    "Not a directory: {}",
                    input_dir.display()
                ))
            }
            Ok(_) => {
                return IntegrationResult::err(format!(
                    "Directory not found: {}",
                    input_dir.display()
                ))
            }
            Err(e) => {
                return IntegrationResult::err(format!(
                    "Failed to read {}: {}",
                    input_dir.display(),
                    e
                ))
            }
        }

        let pattern = pattern.unwrap_or(match target {
            Format::Docx => "*.{md,markdown}",
            _ => "*.{html,htm}",
        });
        let files = match fs::find_files(&input_dir, pattern, recursive) {
            Ok(f) => f,
            Err(e) => return IntegrationResult::err(e.to_string()),
        };

        let out_dir = output_dir
            .clone()
            .unwrap_or_else(|| converter.config().output_dir.clone());
        let mut tasks = Vec::with_capacity(files.len());
        for file in files {
            match get_file_info(&file, None) {
                Ok(info) => {
                    let output = mirrored_output_path(&input_dir, &out_dir, &file, &target);
                    tasks.push(ConversionTask::new(info, target.clone()).with_output(output));
                }
                Err(e) => tracing::warn!(path = %file.display(), error = %e, "Skipping file"),
            }
        }
        tracing::info!(files = tasks.len(), pattern = pattern, "Collected conversion tasks");

        let batch = converter.convert_batch(tasks, output_dir.as_deref());
        if batch.success {
            IntegrationResult::ok(batch.message.clone(), batch)
        } else {
            IntegrationResult::err_with(batch.message.clone(), batch)
        }
    }

    /// Report initialization state, pandoc version and metrics.
    pub fn status(&self) -> IntegrationStatus {
        let converter = self.converter.as_ref().filter(|_| self.initialized);
        IntegrationStatus {
            initialized: self.initialized,
            pandoc_version: self.pandoc_version.clone(),
            output_dir: converter.map(|c| c.config().output_dir.clone()),
            metrics: converter.map(|c| c.metrics().summary()),
        }
    }
}
