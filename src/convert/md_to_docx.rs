//! Markdown to DOCX conversion.
//!
//! DOCX is binary, so pandoc writes the output file itself; each attempt then
//! stats and validates what it left behind.

use std::path::Path;

use chrono::{DateTime, Utc};

use super::validate::{check_conversion_ratio, check_file_size, validate_docx_structure};
use super::{elapsed_since, run_with_retries, settle};
use super::{AttemptOutput, ConvertError};
use crate::config::PandocConfig;
use crate::fs;
use crate::metrics::ConversionMetrics;
use crate::models::{ConversionResult, Format};
use crate::pandoc::{prepare_pandoc_args, Pandoc};

/// Check the Markdown input and return its size in bytes.
pub fn validate_input(path: &Path, _config: &PandocConfig) -> Result<u64, ConvertError> {
    let stat = fs::stat(path).map_err(|e| ConvertError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !stat.exists {
        return Err(ConvertError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_text(path).map_err(|e| ConvertError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.is_empty() {
        return Err(ConvertError::EmptyInput(path.to_path_buf()));
    }

    Ok(stat.size)
}

/// Run pandoc once, writing the DOCX straight to `output_path`. Any existing
/// file at `output_path` is removed first.
pub fn convert_markdown_to_docx_once(
    input_path: &Path,
    output_path: &Path,
    extra_args: &[String],
    config: &PandocConfig,
    pandoc: &dyn Pandoc,
) -> Result<(), ConvertError> {
    if let Some(parent) = output_path.parent() {
        fs::create_directory(parent).map_err(|e| ConvertError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    // A leftover file from an earlier run must not pass as this run's output
    match std::fs::remove_file(output_path) {
        Ok(()) => tracing::debug!(path = %output_path.display(), "Removed stale output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(ConvertError::Write {
                path: output_path.to_path_buf(),
                source: e,
            })
        }
    }

    let args = prepare_pandoc_args(config, &Format::Markdown, &Format::Docx, extra_args);
    pandoc.convert_to_file(
        input_path,
        &Format::Markdown,
        &Format::Docx,
        output_path,
        &args,
    )?;
    Ok(())
}

/// Elapsed seconds and output size. A missing output reads as size 0, which
/// output validation then reports.
pub fn get_conversion_output(output_path: &Path, start_time: DateTime<Utc>) -> (f64, u64, bool) {
    let stat = fs::stat(output_path).unwrap_or_default();
    (elapsed_since(start_time), stat.size, stat.exists)
}

/// Existence, size, ratio and (with `verify_structure`) DOCX structure checks.
pub fn validate_conversion(
    output_path: &Path,
    exists: bool,
    output_size: u64,
    original_size: u64,
    config: &PandocConfig,
) -> Vec<String> {
    if !exists {
        return vec![format!(
            "pandoc did not produce {}",
            output_path.display()
        )];
    }

    let mut errors = check_file_size(output_size, config.validation.min_file_size).1;
    errors.extend(
        check_conversion_ratio(
            output_size,
            original_size,
            Some(config.validation.conversion_ratio_threshold),
        )
        .1,
    );
    if config.validation.verify_structure {
        errors.extend(validate_docx_structure(output_path, false).1);
    }
    errors
}

/// Convert a Markdown file to DOCX with validation and bounded retries.
pub fn convert_markdown_to_docx(
    input_path: &Path,
    output_path: &Path,
    extra_args: &[String],
    config: &PandocConfig,
    pandoc: &dyn Pandoc,
    metrics: &mut ConversionMetrics,
) -> ConversionResult {
    let _span = tracing::info_span!(
        "convert_markdown_to_docx",
        input = %input_path.display(),
        output = %output_path.display()
    )
    .entered();

    metrics.total_attempts += 1;

    let outcome = validate_input(input_path, config).and_then(|original_size| {
        run_with_retries(config, input_path, |_attempt| {
            let start_time = Utc::now();
            convert_markdown_to_docx_once(input_path, output_path, extra_args, config, pandoc)?;
            let (conversion_time, output_size, exists) =
                get_conversion_output(output_path, start_time);
            Ok(AttemptOutput {
                started: start_time,
                conversion_time,
                output_size,
                validation_errors: validate_conversion(
                    output_path,
                    exists,
                    output_size,
                    original_size,
                    config,
                ),
            })
        })
        .map(|retry| (original_size, retry))
    });

    settle(
        input_path,
        output_path,
        Format::Markdown,
        Format::Docx,
        outcome,
        config,
        metrics,
    )
}
