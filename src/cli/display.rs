//! Output and display functions for CLI results

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use panflow::{BatchResult, ConversionResult, IntegrationResult, IntegrationStatus};

/// Pretty-print any serializable result to stdout.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn mark(ok: bool) -> colored::ColoredString {
    if ok {
        "[✓]".green()
    } else {
        "[✗]".red()
    }
}

fn print_conversion_line(result: &ConversionResult) {
    match &result.output_path {
        Some(out) if result.success => println!(
            "  {} {} -> {}",
            mark(true),
            result.input_path.display(),
            out.display()
        ),
        _ => println!(
            "  {} {}: {}",
            mark(false),
            result.input_path.display(),
            result.error.as_deref().unwrap_or(&result.message)
        ),
    }
    for err in &result.details.validation_errors {
        println!("      {}", err.dimmed());
    }
}

/// Single-file conversion outcome.
pub fn print_conversion(result: &IntegrationResult<ConversionResult>) {
    match &result.data {
        Some(conversion) => {
            print_conversion_line(conversion);
            if let (Some(secs), Some(size)) = (
                conversion.details.conversion_time,
                conversion.details.output_size,
            ) {
                println!("      {:.2}s, {} bytes", secs, size);
            }
        }
        None => println!("{} {}", mark(false), result.message),
    }
}

/// Batch outcome: one line per file, then the summary message.
pub fn print_batch(result: &IntegrationResult<BatchResult>) {
    if let Some(batch) = &result.data {
        for r in batch.successful_files.iter().chain(&batch.failed_files) {
            print_conversion_line(r);
        }
        println!();
    }
    let message = if result.success {
        result.message.bold()
    } else {
        result.message.red().bold()
    };
    println!("{}", message);
}

pub fn print_status(status: &IntegrationStatus) {
    println!("Runtime:");
    match &status.pandoc_version {
        Some(v) => println!("  {} pandoc: {}", mark(true), v),
        None => println!("  {} pandoc: not available", mark(false)),
    }
    if let Some(dir) = &status.output_dir {
        println!("  {} Output: {}", mark(true), dir.display());
    }

    println!();
    println!("Validators:");
    println!(
        "  {} HTML structure: {}",
        mark(cfg!(feature = "html-structure")),
        if cfg!(feature = "html-structure") { "enabled" } else { "disabled" }
    );
    println!(
        "  {} DOCX structure: {}",
        mark(cfg!(feature = "docx-structure")),
        if cfg!(feature = "docx-structure") { "enabled" } else { "disabled" }
    );
}

pub fn print_validation(output: &Path, valid: bool) {
    if valid {
        println!("{} {} is valid", mark(true), output.display());
    } else {
        println!("{} {} failed validation", mark(false), output.display());
    }
}
