//! Value types shared by the conversion pipeline.
//!
//! Everything here is plain data: a snapshot of a file to convert, a unit of
//! batch work, and the per-file and per-batch outcomes handed back to callers.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Document format, as named by pandoc.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    Markdown,
    Html,
    Docx,
    Pdf,
    Plain,
    /// Unmapped extension, carried through verbatim.
    Other(String),
}

/// Extension → format table. One row per format.
static EXTENSION_TABLE: &[(&[&str], Format)] = &[
    (&["md", "markdown"], Format::Markdown),
    (&["html", "htm"], Format::Html),
    (&["docx", "doc"], Format::Docx),
    (&["pdf"], Format::Pdf),
    (&["txt"], Format::Plain),
];

impl Format {
    /// Infer a format from a bare extension (no leading dot).
    ///
    /// Lookup is case-insensitive. Extensions missing from the table come back
    /// as [`Format::Other`] holding the extension unchanged.
    pub fn from_extension(ext: &str) -> Self {
        let lower = ext.to_ascii_lowercase();
        EXTENSION_TABLE
            .iter()
            .find(|(exts, _)| exts.contains(&lower.as_str()))
            .map(|(_, format)| format.clone())
            .unwrap_or_else(|| Format::Other(ext.to_string()))
    }

    /// Infer a format from a path's extension. A path with no extension maps to
    /// `Other("")`.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_extension(&ext)
    }

    /// Parse a user-supplied format name ("markdown", "md", "docx", ...).
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Format::Markdown,
            "html" | "htm" => Format::Html,
            "docx" | "doc" => Format::Docx,
            "pdf" => Format::Pdf,
            "plain" | "txt" | "text" => Format::Plain,
            _ => Format::Other(name.to_string()),
        }
    }

    /// Format name understood by `pandoc --from/--to`.
    pub fn as_str(&self) -> &str {
        match self {
            Format::Markdown => "markdown",
            Format::Html => "html",
            Format::Docx => "docx",
            Format::Pdf => "pdf",
            Format::Plain => "plain",
            Format::Other(ext) => ext,
        }
    }

    /// File extension used for generated output of this format.
    pub fn output_extension(&self) -> &str {
        match self {
            Format::Markdown => "md",
            Format::Html => "html",
            Format::Docx => "docx",
            Format::Pdf => "pdf",
            Format::Plain => "txt",
            Format::Other(ext) => ext,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Snapshot of a file about to be converted. Taken once per task.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub format: Format,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Caller-supplied pandoc arguments, appended after config arguments.
    pub extra_args: Vec<String>,
}

/// One unit of batch work. Consumed exactly once by the converter.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub source: FileInfo,
    pub target_format: Format,
    /// Explicit output path; `None` means `{output_dir}/{stem}.{ext}`.
    pub output_path: Option<PathBuf>,
}

impl ConversionTask {
    pub fn new(source: FileInfo, target_format: Format) -> Self {
        Self {
            source,
            target_format,
            output_path: None,
        }
    }

    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }
}

/// Per-result diagnostic snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionDetails {
    pub source_format: Option<Format>,
    pub target_format: Option<Format>,
    /// Seconds from start of the successful attempt cycle to output stat.
    pub conversion_time: Option<f64>,
    pub output_size: Option<u64>,
    pub input_size: Option<u64>,
    pub validation_errors: Vec<String>,
}

/// Outcome of converting one file. Built through [`ConversionResult::success`]
/// or [`ConversionResult::failure`] and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub success: bool,
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub message: String,
    pub error: Option<String>,
    pub details: ConversionDetails,
}

impl ConversionResult {
    pub fn success(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        message: impl Into<String>,
        details: ConversionDetails,
    ) -> Self {
        Self {
            success: true,
            input_path: input_path.into(),
            output_path: Some(output_path.into()),
            message: message.into(),
            error: None,
            details,
        }
    }

    pub fn failure(
        input_path: impl Into<PathBuf>,
        error: impl Into<String>,
        details: ConversionDetails,
    ) -> Self {
        let error = error.into();
        Self {
            success: false,
            input_path: input_path.into(),
            output_path: None,
            message: error.clone(),
            error: Some(error),
            details,
        }
    }

    pub fn source_format(&self) -> Option<&Format> {
        self.details.source_format.as_ref()
    }

    pub fn target_format(&self) -> Option<&Format> {
        self.details.target_format.as_ref()
    }
}

/// Aggregate outcome of [`crate::convert::DocumentConverter::convert_batch`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub success: bool,
    pub message: String,
    pub successful_files: Vec<ConversionResult>,
    pub failed_files: Vec<ConversionResult>,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.successful_files.len() + self.failed_files.len()
    }
}
