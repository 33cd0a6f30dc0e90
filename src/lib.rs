//! # panflow - Validated document conversion over pandoc
//!
//! Converts HTML to Markdown and Markdown to DOCX by driving the pandoc
//! binary, with validation on both sides of every invocation, bounded
//! retries, and per-file metrics.
//!
//! ## Features
//!
//! - **Validated pipeline**: input checks, output size and ratio checks,
//!   HTML and DOCX structure checks
//! - **Retries**: output that fails validation is regenerated up to a
//!   configured number of invocations
//! - **Markdown cleanup**: pandoc attribute blocks, div fences, raw `<div>`
//!   tags and comments are stripped
//! - **Batch and directory conversion** with partial-success reporting
//! - **Layered YAML config**: user file, project `.panflow.yaml`, overrides
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use panflow::PandocIntegration;
//!
//! let mut panflow = PandocIntegration::new(".");
//! let init = panflow.initialize();
//! assert!(init.success, "{}", init.message);
//!
//! let result = panflow.html_to_markdown(Path::new("docs/guide.html"), None);
//! println!("{}", result.message);
//! ```
//!
//! ## Custom engines
//!
//! Anything implementing [`Pandoc`] can stand in for the binary:
//!
//! ```no_run
//! # use panflow::{config::PandocConfig, DocumentConverter, PandocCli};
//! # fn main() -> anyhow::Result<()> {
//! let engine = PandocCli::new("/opt/pandoc/bin/pandoc");
//! let converter = DocumentConverter::with_engine(PandocConfig::default(), Box::new(engine))?;
//! println!("pandoc {}", converter.pandoc_version());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod convert;
pub mod fs;
pub mod metrics;
pub mod models;
pub mod pandoc;
pub mod project;
pub mod service;

pub use config::{ConfigError, PandocConfig};
pub use convert::{ConvertError, DocumentConverter};
pub use metrics::{ConversionMetrics, MetricsSummary};
pub use models::{BatchResult, ConversionResult, ConversionTask, FileInfo, Format};
pub use pandoc::{Pandoc, PandocCli, PandocError};
pub use service::{IntegrationResult, IntegrationStatus, PandocIntegration};
