//! Document conversion pipeline.
//!
//! Converts between document formats by driving pandoc, with validation gates
//! on both sides of each invocation.
//!
//! ## Supported Pairs
//!
//! | Source | Target | Module |
//! |--------|--------|--------|
//! | HTML | Markdown | [`html_to_md`] |
//! | Markdown | DOCX | [`md_to_docx`] |
//!
//! ## Pipeline
//!
//! 1. Validate input (exists, non-empty, HTML structure)
//! 2. Invoke pandoc
//! 3. Write output and validate it (size, ratio, structure)
//! 4. On output validation failure, re-run 2-3 up to `max_conversion_retries`
//!    invocations in total
//! 5. Record metrics and return a [`ConversionResult`]

pub mod cleaning;
pub mod html_to_md;
pub mod md_to_docx;
pub mod validate;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::PandocConfig;
use crate::fs;
use crate::metrics::{track_metrics, ConversionMetrics};
use crate::models::{
    BatchResult, ConversionDetails, ConversionResult, ConversionTask, FileInfo, Format,
};
use crate::pandoc::{verify_pandoc, Pandoc, PandocCli, PandocError};

pub use cleaning::post_process_markdown;
pub use validate::{
    check_conversion_ratio, check_file_size, validate_docx_structure, validate_html_structure,
};

/// Errors that fail a single conversion without retry
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Input file is empty: {}", .0.display())]
    EmptyInput(PathBuf),
    #[error("Invalid input structure in {}: {}", .path.display(), .errors.join("; "))]
    InvalidStructure { path: PathBuf, errors: Vec<String> },
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to create output directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Pandoc(#[from] PandocError),
}

/// Stat `path` and describe it for conversion.
///
/// The format comes from `format_hint` when given, otherwise from the
/// extension.
pub fn get_file_info(path: &Path, format_hint: Option<Format>) -> Result<FileInfo, ConvertError> {
    let stat = fs::stat(path).map_err(|e| ConvertError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !stat.exists {
        return Err(ConvertError::NotFound(path.to_path_buf()));
    }
    Ok(FileInfo {
        path: path.to_path_buf(),
        format: format_hint.unwrap_or_else(|| Format::from_path(path)),
        size: stat.size,
        modified: stat.modified,
        extra_args: Vec::new(),
    })
}

/// Direction operation: (input, output, extra args, config, engine, metrics).
type DirectionFn = fn(
    &Path,
    &Path,
    &[String],
    &PandocConfig,
    &dyn Pandoc,
    &mut ConversionMetrics,
) -> ConversionResult;

/// Static descriptor for a supported (source, target) pair.
struct ConversionPair {
    source: Format,
    target: Format,
    convert: DirectionFn,
}

/// All supported conversion pairs. One row per pair.
///
/// To add a pair, write the direction module and register it here.
static CONVERSION_TABLE: &[ConversionPair] = &[
    ConversionPair {
        source: Format::Html,
        target: Format::Markdown,
        convert: html_to_md::convert_html_to_markdown,
    },
    ConversionPair {
        source: Format::Markdown,
        target: Format::Docx,
        convert: md_to_docx::convert_markdown_to_docx,
    },
];

fn lookup_pair(source: &Format, target: &Format) -> Option<DirectionFn> {
    CONVERSION_TABLE
        .iter()
        .find(|p| p.source == *source && p.target == *target)
        .map(|p| p.convert)
}

/// Iterate over the supported (source, target) pairs.
pub fn supported_pairs() -> impl Iterator<Item = (&'static Format, &'static Format)> {
    CONVERSION_TABLE.iter().map(|p| (&p.source, &p.target))
}

/// Default output location for a batch task: `{output_dir}/{stem}.{ext}`.
pub fn default_output_path(output_dir: &Path, source: &Path, target: &Format) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.{}", stem, target.output_extension()))
}

/// Output location for a file found under `input_dir`: its subdirectory is
/// kept under `output_dir`, so equal stems in different folders never share
/// an output. Files outside `input_dir` fall back to [`default_output_path`].
pub fn mirrored_output_path(
    input_dir: &Path,
    output_dir: &Path,
    source: &Path,
    target: &Format,
) -> PathBuf {
    let subdir = source
        .strip_prefix(input_dir)
        .ok()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new(""));
    default_output_path(&output_dir.join(subdir), source, target)
}

// ============ Retry driver ============

/// What one attempt-and-validate cycle produced.
pub(crate) struct AttemptOutput {
    pub started: DateTime<Utc>,
    pub conversion_time: f64,
    pub output_size: u64,
    pub validation_errors: Vec<String>,
}

pub(crate) enum RetryOutcome {
    Passed { output: AttemptOutput, attempts: u32 },
    Exhausted { output: AttemptOutput, attempts: u32 },
}

/// Run `attempt` until its output validates or the invocation budget is spent.
///
/// Errors from `attempt` abort immediately; only validation errors retry.
pub(crate) fn run_with_retries(
    config: &PandocConfig,
    input: &Path,
    mut attempt: impl FnMut(u32) -> Result<AttemptOutput, ConvertError>,
) -> Result<RetryOutcome, ConvertError> {
    let max_attempts = config.retry_mechanism.max_conversion_retries.max(1);
    let delay = config.retry_mechanism.conversion_retry_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let output = attempt(attempts)?;
        if output.validation_errors.is_empty() {
            return Ok(RetryOutcome::Passed { output, attempts });
        }
        if attempts >= max_attempts {
            return Ok(RetryOutcome::Exhausted { output, attempts });
        }

        tracing::warn!(
            path = %input.display(),
            attempt = attempts,
            max_attempts = max_attempts,
            errors = %output.validation_errors.join("; "),
            "Output validation failed, retrying"
        );
        if delay.is_finite() && delay > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(delay));
        }
    }
}

/// Seconds elapsed since `start`.
pub(crate) fn elapsed_since(start: DateTime<Utc>) -> f64 {
    (Utc::now() - start)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Turn a direction's outcome into a [`ConversionResult`] and update metrics.
///
/// `outcome` carries the input size alongside the retry outcome.
pub(crate) fn settle(
    input: &Path,
    output_path: &Path,
    source: Format,
    target: Format,
    outcome: Result<(u64, RetryOutcome), ConvertError>,
    config: &PandocConfig,
    metrics: &mut ConversionMetrics,
) -> ConversionResult {
    let input_key = input.display().to_string();
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| input_key.clone());
    let mut details = ConversionDetails {
        source_format: Some(source.clone()),
        target_format: Some(target.clone()),
        ..Default::default()
    };

    match outcome {
        Ok((input_size, RetryOutcome::Passed { output, attempts })) => {
            track_metrics(
                &filename,
                output.started,
                input_size,
                output.output_size,
                metrics,
                config,
            );
            metrics.record_success(&input_key);
            details.conversion_time = Some(output.conversion_time);
            details.output_size = Some(output.output_size);
            details.input_size = Some(input_size);
            tracing::info!(
                input = %input.display(),
                output = %output_path.display(),
                attempts = attempts,
                bytes = output.output_size,
                "Converted document"
            );
            ConversionResult::success(
                input,
                output_path,
                format!(
                    "Converted {} from {} to {} in {:.2}s",
                    filename, source, target, output.conversion_time
                ),
                details,
            )
        }
        Ok((input_size, RetryOutcome::Exhausted { output, attempts })) => {
            let error = format!(
                "Conversion of {} failed validation after maximum retries ({} attempts): {}",
                input.display(),
                attempts,
                output.validation_errors.join("; ")
            );
            tracing::warn!(path = %input.display(), attempts = attempts, "Giving up after maximum retries");
            metrics.record_failure(&input_key, &error);
            details.conversion_time = Some(output.conversion_time);
            details.output_size = Some(output.output_size);
            details.input_size = Some(input_size);
            details.validation_errors = output.validation_errors;
            ConversionResult::failure(input, error, details)
        }
        Err(e) => {
            let error = e.to_string();
            tracing::warn!(path = %input.display(), error = %error, "Conversion failed");
            metrics.record_failure(&input_key, &error);
            ConversionResult::failure(input, error, details)
        }
    }
}

// ============ Standalone validation ============

/// Loose post-hoc check of a finished conversion.
///
/// Both files must exist. Markdown output must have content, DOCX output must
/// pass [`validate_docx_structure`], anything else must be non-empty. Errors
/// count as invalid; nothing is raised.
pub fn validate_output(output: &Path, input: &Path) -> bool {
    let _span = tracing::info_span!("validate_output", output = %output.display()).entered();

    let check = || -> anyhow::Result<bool> {
        let out = fs::stat(output)?;
        let inp = fs::stat(input)?;
        if !out.exists || !inp.exists {
            return Ok(false);
        }
        Ok(match Format::from_path(output) {
            Format::Markdown => !fs::read_text(output)?.trim().is_empty(),
            Format::Docx => validate_docx_structure(output, false).0,
            _ => out.size > 0,
        })
    };

    check().unwrap_or_else(|e| {
        tracing::warn!(path = %output.display(), error = %e, "Validation errored, treating as invalid");
        false
    })
}

// ============ DocumentConverter ============

/// Orchestrates single-file and batch conversions over one pandoc engine.
///
/// Owns the process-lifetime [`ConversionMetrics`].
pub struct DocumentConverter {
    config: PandocConfig,
    metrics: ConversionMetrics,
    pandoc: Box<dyn Pandoc>,
    pandoc_version: String,
}

impl DocumentConverter {
    /// Build a converter over the pandoc binary named by the config (or found
    /// on `PATH`). Fails if pandoc cannot be verified.
    pub fn new(config: PandocConfig) -> Result<Self, PandocError> {
        let cli = PandocCli::locate(config.pandoc_path.as_deref())?;
        Self::with_engine(config, Box::new(cli))
    }

    /// Build a converter over an arbitrary engine.
    pub fn with_engine(config: PandocConfig, pandoc: Box<dyn Pandoc>) -> Result<Self, PandocError> {
        let pandoc_version = verify_pandoc(pandoc.as_ref())?;
        Ok(Self {
            config,
            metrics: ConversionMetrics::new(),
            pandoc,
            pandoc_version,
        })
    }

    pub fn config(&self) -> &PandocConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ConversionMetrics {
        &self.metrics
    }

    /// Discard accumulated metrics and restart the clock.
    pub fn reset_metrics(&mut self) {
        self.metrics = ConversionMetrics::new();
    }

    pub fn pandoc_version(&self) -> &str {
        &self.pandoc_version
    }

    pub fn supports(&self, source: &Format, target: &Format) -> bool {
        lookup_pair(source, target).is_some()
    }

    /// Convert one file to `target_format`, writing `output_path`.
    pub fn convert_file(
        &mut self,
        input_path: &Path,
        output_path: &Path,
        target_format: &Format,
    ) -> ConversionResult {
        let _span = tracing::info_span!("convert_file", path = %input_path.display()).entered();
        self.try_convert_file(input_path, output_path, target_format, &[])
            .unwrap_or_else(|e| {
                tracing::warn!(path = %input_path.display(), error = %e, "Conversion aborted");
                ConversionResult::failure(
                    input_path,
                    e.to_string(),
                    ConversionDetails {
                        target_format: Some(target_format.clone()),
                        ..Default::default()
                    },
                )
            })
    }

    /// Expected failures (missing input, unsupported pair, anything the
    /// direction reports) come back as `Ok` failure results. `Err` is reserved
    /// for faults outside the direction protocol.
    fn try_convert_file(
        &mut self,
        input_path: &Path,
        output_path: &Path,
        target_format: &Format,
        extra_args: &[String],
    ) -> Result<ConversionResult, ConvertError> {
        let info = match get_file_info(input_path, None) {
            Ok(info) => info,
            Err(e) => {
                return Ok(ConversionResult::failure(
                    input_path,
                    e.to_string(),
                    ConversionDetails {
                        target_format: Some(target_format.clone()),
                        ..Default::default()
                    },
                ))
            }
        };

        let Some(convert) = lookup_pair(&info.format, target_format) else {
            tracing::warn!(
                path = %input_path.display(),
                source = %info.format,
                target = %target_format,
                "Unsupported conversion pair"
            );
            return Ok(ConversionResult::failure(
                input_path,
                format!(
                    "Unsupported conversion: {} -> {} ({})",
                    info.format,
                    target_format,
                    input_path.display()
                ),
                ConversionDetails {
                    source_format: Some(info.format.clone()),
                    target_format: Some(target_format.clone()),
                    input_size: Some(info.size),
                    ..Default::default()
                },
            ));
        };

        if let Some(parent) = output_path.parent() {
            fs::create_directory(parent).map_err(|e| ConvertError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        Ok(convert(
            input_path,
            output_path,
            extra_args,
            &self.config,
            self.pandoc.as_ref(),
            &mut self.metrics,
        ))
    }

    /// Convert many files sequentially, one at a time.
    ///
    /// Tasks without an explicit output path go to
    /// `{output_dir}/{stem}.{ext}`, where `output_dir` defaults to the config's.
    /// A failing task never stops the rest of the batch.
    pub fn convert_batch(
        &mut self,
        tasks: Vec<ConversionTask>,
        output_dir: Option<&Path>,
    ) -> BatchResult {
        let output_dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.output_dir.clone());
        let _span = tracing::info_span!(
            "convert_batch",
            tasks = tasks.len(),
            output_dir = %output_dir.display()
        )
        .entered();

        if let Err(e) = fs::create_directory(&output_dir) {
            let error = ConvertError::CreateDir {
                path: output_dir.clone(),
                source: e,
            };
            tracing::warn!(error = %error, "Batch aborted before any conversion");
            return BatchResult {
                success: false,
                message: format!("Batch conversion failed to convert any files: {}", error),
                successful_files: Vec::new(),
                failed_files: Vec::new(),
            };
        }

        let mut successful_files = Vec::new();
        let mut failed_files = Vec::new();

        for task in tasks {
            let source = &task.source.path;
            let output = task
                .output_path
                .clone()
                .unwrap_or_else(|| default_output_path(&output_dir, source, &task.target_format));

            match self.try_convert_file(source, &output, &task.target_format, &task.source.extra_args)
            {
                Ok(result) if result.success => successful_files.push(result),
                Ok(result) => failed_files.push(result),
                Err(e) => {
                    let error = e.to_string();
                    tracing::warn!(path = %source.display(), error = %error, "Unexpected batch failure");
                    self.metrics.total_attempts += 1;
                    self.metrics
                        .record_failure(&source.display().to_string(), &error);
                    failed_files.push(ConversionResult::failure(
                        source,
                        error,
                        ConversionDetails {
                            source_format: Some(task.source.format.clone()),
                            target_format: Some(task.target_format.clone()),
                            ..Default::default()
                        },
                    ));
                }
            }
        }

        let (ok, failed) = (successful_files.len(), failed_files.len());
        let (success, message) = match (ok, failed) {
            (0, 0) => (
                false,
                "Batch conversion failed to convert any files: no tasks given".to_string(),
            ),
            (0, _) => (
                false,
                format!(
                    "Batch conversion failed to convert any files ({} failed)",
                    failed
                ),
            ),
            (_, 0) => (true, format!("Converted {} file(s)", ok)),
            _ => (
                true,
                format!(
                    "Batch conversion partially successful: {} succeeded, {} failed",
                    ok, failed
                ),
            ),
        };

        tracing::info!(succeeded = ok, failed = failed, "Batch conversion complete");
        BatchResult {
            success,
            message,
            successful_files,
            failed_files,
        }
    }

    /// Best-effort standalone check of a finished conversion.
    ///
    /// Looser than the in-pipeline output validation; see [`validate_output`].
    pub fn validate_conversion(&self, output_path: &Path, input_path: &Path) -> bool {
        validate_output(output_path, input_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_conversion_table_pairs() {
        let pairs: Vec<_> = supported_pairs().collect();
        assert_eq!(
            pairs,
            vec![
                (&Format::Html, &Format::Markdown),
                (&Format::Markdown, &Format::Docx)
            ]
        );
        assert!(lookup_pair(&Format::Html, &Format::Docx).is_none());
        assert!(lookup_pair(&Format::Markdown, &Format::Html).is_none());
    }

    #[test]
    fn test_get_file_info_infers_format() {
        let dir = TempDir::new().unwrap();
        let cases = [
            ("a.md", "markdown"),
            ("b.markdown", "markdown"),
            ("c.html", "html"),
            ("d.htm", "html"),
            ("e.docx", "docx"),
            ("f.doc", "docx"),
            ("g.pdf", "pdf"),
            ("h.txt", "plain"),
            ("i.rst", "rst"),
        ];
        for (name, expected) in cases {
            let path = dir.path().join(name);
            std::fs::write(&path, "12345").unwrap();
            let info = get_file_info(&path, None).unwrap();
            assert_eq!(info.format.as_str(), expected, "for {}", name);
            assert_eq!(info.size, 5);
        }
    }

    #[test]
    fn test_get_file_info_hint_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.txt");
        std::fs::write(&path, "<body></body>").unwrap();
        let info = get_file_info(&path, Some(Format::Html)).unwrap();
        assert_eq!(info.format, Format::Html);
    }

    #[test]
    fn test_get_file_info_missing() {
        let err = get_file_info(Path::new("/no/such/file.html"), None).unwrap_err();
        assert!(matches!(err, ConvertError::NotFound(_)));
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("out"), Path::new("docs/guide.html"), &Format::Markdown),
            PathBuf::from("out/guide.md")
        );
        assert_eq!(
            default_output_path(Path::new("out"), Path::new("notes.md"), &Format::Docx),
            PathBuf::from("out/notes.docx")
        );
    }

    #[test]
    fn test_mirrored_output_path_keeps_subdirectories() {
        let input_dir = Path::new("site");
        assert_eq!(
            mirrored_output_path(input_dir, Path::new("md"), Path::new("site/a.html"), &Format::Markdown),
            PathBuf::from("md/a.md")
        );
        assert_eq!(
            mirrored_output_path(
                input_dir,
                Path::new("md"),
                Path::new("site/nested/deep/a.html"),
                &Format::Markdown
            ),
            PathBuf::from("md/nested/deep/a.md")
        );
        assert_eq!(
            mirrored_output_path(input_dir, Path::new("md"), Path::new("other/a.html"), &Format::Markdown),
            PathBuf::from("md/a.md")
        );
    }

    #[test]
    fn test_retry_driver_counts_attempts() {
        let mut config = PandocConfig::default();
        config.retry_mechanism.max_conversion_retries = 4;
        config.retry_mechanism.conversion_retry_delay = 0.0;
        let mut calls = 0;
        let outcome = run_with_retries(&config, Path::new("x.html"), |_| {
            calls += 1;
            Ok(AttemptOutput {
                started: Utc::now(),
                conversion_time: 0.0,
                output_size: 0,
                validation_errors: vec!["bad".into()],
            })
        })
        .unwrap();
        assert_eq!(calls, 4);
        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 4, .. }));
    }

    #[test]
    fn test_retry_driver_stops_on_error() {
        let mut config = PandocConfig::default();
        config.retry_mechanism.conversion_retry_delay = 0.0;
        let mut calls = 0;
        let outcome = run_with_retries(&config, Path::new("x.html"), |_| {
            calls += 1;
            Err(ConvertError::EmptyInput(PathBuf::from("x.html")))
        });
        assert!(outcome.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_retry_driver_passes_after_failure() {
        let mut config = PandocConfig::default();
        config.retry_mechanism.conversion_retry_delay = 0.0;
        let outcome = run_with_retries(&config, Path::new("x.html"), |attempt| {
            Ok(AttemptOutput {
                started: Utc::now(),
                conversion_time: 0.0,
                output_size: 10,
                validation_errors: if attempt < 2 { vec!["bad".into()] } else { vec![] },
            })
        })
        .unwrap();
        assert!(matches!(outcome, RetryOutcome::Passed { attempts: 2, .. }));
    }

    #[test]
    fn test_validate_output_rules() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.html");
        std::fs::write(&input, "<body>x</body>").unwrap();

        let md = dir.path().join("out.md");
        std::fs::write(&md, "   \n").unwrap();
        assert!(!validate_output(&md, &input));
        std::fs::write(&md, "# Hi\n").unwrap();
        assert!(validate_output(&md, &input));

        let txt = dir.path().join("out.txt");
        std::fs::write(&txt, "").unwrap();
        assert!(!validate_output(&txt, &input));
        std::fs::write(&txt, "x").unwrap();
        assert!(validate_output(&txt, &input));

        // Missing input or output
        assert!(!validate_output(&dir.path().join("nope.md"), &input));
        assert!(!validate_output(&md, &dir.path().join("nope.html")));
    }

    #[cfg(feature = "docx-structure")]
    #[test]
    fn test_validate_output_bad_docx() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.md");
        std::fs::write(&input, "# x").unwrap();
        let docx = dir.path().join("out.docx");
        std::fs::write(&docx, "not a zip").unwrap();
        assert!(!validate_output(&docx, &input));
    }
}
