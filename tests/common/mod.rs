//! Common test fixtures and helpers
//!
//! Usage in test files:
//! ```ignore
//! mod common;
//! use common::FakePandoc;
//! ```

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use panflow::config::PandocConfig;
use panflow::{Format, Pandoc, PandocError};
use tempfile::TempDir;

/// Scripted stand-in for the pandoc binary.
///
/// Clones share their call counter and script, so a test can keep one handle
/// after boxing another into a converter.
#[derive(Clone, Default)]
pub struct FakePandoc {
    calls: Arc<AtomicUsize>,
    /// Text outputs, consumed front to back; the last one repeats.
    outputs: Arc<Mutex<VecDeque<String>>>,
    /// Bytes written by `convert_to_file`. `None` writes nothing.
    file_bytes: Arc<Mutex<Option<Vec<u8>>>>,
    /// Input file names that make any conversion fail.
    fail_for: Arc<Mutex<Vec<String>>>,
    unavailable: bool,
}

impl FakePandoc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always return `output` from text conversions.
    pub fn returning(output: impl Into<String>) -> Self {
        Self::default().then_return(output)
    }

    /// Queue another text output.
    pub fn then_return(self, output: impl Into<String>) -> Self {
        self.outputs
            .lock()
            .expect("outputs lock")
            .push_back(output.into());
        self
    }

    /// Write `bytes` as the output file of binary conversions.
    pub fn writing(self, bytes: impl Into<Vec<u8>>) -> Self {
        *self.file_bytes.lock().expect("file_bytes lock") = Some(bytes.into());
        self
    }

    /// Fail conversions of inputs with this file name.
    pub fn failing_for(self, file_name: &str) -> Self {
        self.fail_for
            .lock()
            .expect("fail_for lock")
            .push(file_name.to_string());
        self
    }

    /// Engine whose version probe fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Number of conversion invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn boxed(&self) -> Box<dyn Pandoc> {
        Box::new(self.clone())
    }

    fn invoke(&self, input: &Path) -> Result<(), PandocError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.fail_for.lock().expect("fail_for lock").contains(&name) {
            return Err(PandocError::ConversionFailed {
                path: input.to_path_buf(),
                reason: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

impl Pandoc for FakePandoc {
    fn version(&self) -> Result<String, PandocError> {
        if self.unavailable {
            return Err(PandocError::ProbeFailed("scripted".into()));
        }
        Ok("3.1.11".to_string())
    }

    fn convert_to_string(
        &self,
        input: &Path,
        _from: &Format,
        _to: &Format,
        _args: &[String],
    ) -> Result<String, PandocError> {
        self.invoke(input)?;
        let mut outputs = self.outputs.lock().expect("outputs lock");
        let out = if outputs.len() > 1 {
            outputs.pop_front().unwrap_or_default()
        } else {
            outputs.front().cloned().unwrap_or_default()
        };
        Ok(out)
    }

    fn convert_to_file(
        &self,
        input: &Path,
        _from: &Format,
        _to: &Format,
        output: &Path,
        _args: &[String],
    ) -> Result<(), PandocError> {
        self.invoke(input)?;
        if let Some(bytes) = self.file_bytes.lock().expect("file_bytes lock").as_ref() {
            std::fs::write(output, bytes).expect("Failed to write fake output");
        }
        Ok(())
    }
}

/// Config with no retry delay so retry tests run instantly.
pub fn fast_config() -> PandocConfig {
    let mut config = PandocConfig::default();
    config.retry_mechanism.conversion_retry_delay = 0.0;
    config
}

/// HTML document of exactly `size` bytes with a `<body>` element.
pub fn html_of_size(size: usize) -> String {
    let shell = "<html><body></body></html>";
    assert!(size >= shell.len(), "size too small for HTML shell");
    format!(
        "<html><body>{}</body></html>",
        "a".repeat(size - shell.len())
    )
}

/// Write `content` to `dir/name` and return the path.
pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Minimal DOCX with one paragraph.
#[cfg(feature = "docx-structure")]
pub fn minimal_docx() -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("[Content_Types].xml", SimpleFileOptions::default())
            .expect("start content types");
        zip.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
            .expect("write content types");
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .expect("start document");
        zip.write_all(
            br#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>"#,
        )
        .expect("write document");
        zip.finish().expect("finish zip");
    }
    buf.into_inner()
}
