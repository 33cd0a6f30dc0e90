//! HTML to Markdown conversion.
//!
//! pandoc returns the Markdown on stdout; it is cleaned with
//! [`post_process_markdown`], written to the output path, then validated.

use std::path::Path;

use chrono::{DateTime, Utc};

use super::validate::{check_conversion_ratio, check_file_size, validate_html_structure};
use super::{elapsed_since, post_process_markdown, run_with_retries, settle};
use super::{AttemptOutput, ConvertError};
use crate::config::PandocConfig;
use crate::fs;
use crate::metrics::ConversionMetrics;
use crate::models::{ConversionResult, Format};
use crate::pandoc::{prepare_pandoc_args, Pandoc};

/// Check the HTML input and return its size in bytes.
///
/// Fails if the file is missing or empty, or (with `verify_structure`) if the
/// HTML has structural errors.
pub fn validate_input(path: &Path, config: &PandocConfig) -> Result<u64, ConvertError> {
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

    if config.validation.verify_structure {
        let (valid, errors) = validate_html_structure(&content, false);
        if !valid {
            return Err(ConvertError::InvalidStructure {
                path: path.to_path_buf(),
                errors,
            });
        }
    }

    Ok(stat.size)
}

/// Run pandoc once and return cleaned Markdown.
pub fn attempt_conversion(
    path: &Path,
    extra_args: &[String],
    config: &PandocConfig,
    pandoc: &dyn Pandoc,
) -> Result<String, ConvertError> {
    let args = prepare_pandoc_args(config, &Format::Html, &Format::Markdown, extra_args);
    let raw = pandoc.convert_to_string(path, &Format::Html, &Format::Markdown, &args)?;
    Ok(post_process_markdown(&raw))
}

/// Size, ratio and (with `verify_structure`) non-blank checks on the output.
pub fn validate_conversion(
    content: &str,
    output_size: u64,
    original_size: u64,
    config: &PandocConfig,
) -> Vec<String> {
    let mut errors = check_file_size(output_size, config.validation.min_file_size).1;
    errors.extend(
        check_conversion_ratio(
            output_size,
            original_size,
            Some(config.validation.conversion_ratio_threshold),
        )
        .1,
    );
    if config.validation.verify_structure && content.trim().is_empty() {
        errors.push("Converted Markdown has no content".to_string());
    }
    errors
}

/// Write `content` to `output_path` and validate the result.
///
/// Directory creation and write failures are errors; validation problems are
/// returned in the error list.
pub fn write_and_validate_output(
    content: &str,
    output_path: &Path,
    input_path: &Path,
    original_size: u64,
    config: &PandocConfig,
    start_time: DateTime<Utc>,
) -> Result<AttemptOutput, ConvertError> {
    if let Some(parent) = output_path.parent() {
        fs::create_directory(parent).map_err(|e| ConvertError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write_text(output_path, content).map_err(|e| ConvertError::Write {
        path: output_path.to_path_buf(),
        source: e,
    })?;

    let output_size = fs::stat(output_path)
        .map(|s| s.size)
        .map_err(|e| ConvertError::Read {
            path: output_path.to_path_buf(),
            source: e,
        })?;
    let conversion_time = elapsed_since(start_time);

    let validation_errors = validate_conversion(content, output_size, original_size, config);
    if !validation_errors.is_empty() {
        tracing::debug!(
            input = %input_path.display(),
            output = %output_path.display(),
            errors = validation_errors.len(),
            "Markdown output failed validation"
        );
    }

    Ok(AttemptOutput {
        started: start_time,
        conversion_time,
        output_size,
        validation_errors,
    })
}

/// Convert an HTML file to Markdown with validation and bounded retries.
pub fn convert_html_to_markdown(
    input_path: &Path,
    output_path: &Path,
    extra_args: &[String],
    config: &PandocConfig,
    pandoc: &dyn Pandoc,
    metrics: &mut ConversionMetrics,
) -> ConversionResult {
    let _span = tracing::info_span!(
        "convert_html_to_markdown",
        input = %input_path.display(),
        output = %output_path.display()
    )
    .entered();

    metrics.total_attempts += 1;

    let outcome = validate_input(input_path, config).and_then(|original_size| {
        run_with_retries(config, input_path, |_attempt| {
            let start_time = Utc::now();
            let content = attempt_conversion(input_path, extra_args, config, pandoc)?;
            write_and_validate_output(
                &content,
                output_path,
                input_path,
                original_size,
                config,
                start_time,
            )
        })
        .map(|retry| (original_size, retry))
    });

    settle(
        input_path,
        output_path,
        Format::Html,
        Format::Markdown,
        outcome,
        config,
        metrics,
    )
}
