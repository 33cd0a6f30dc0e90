//! Pandoc engine: binary discovery, version probe, argument construction,
//! and blocking subprocess invocation.
//!
//! The pipeline talks to pandoc only through the [`Pandoc`] trait, so tests and
//! embedders can substitute their own engine.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::config::PandocConfig;
use crate::models::Format;

/// Environment variable naming an explicit pandoc binary
pub const PANDOC_PATH_ENV: &str = "PANDOC_PATH";

/// Tool-unavailable and invocation failures
#[derive(Error, Debug)]
pub enum PandocError {
    /// Binary could not be located (configured path, env var, or PATH)
    #[error("pandoc binary not found: {0}")]
    NotFound(String),
    /// Binary ran but the version probe did not succeed
    #[error("pandoc version probe failed: {0}")]
    ProbeFailed(String),
    /// Unexpected I/O error while probing
    #[error("unexpected error probing pandoc: {0}")]
    Probe(#[source] std::io::Error),
    /// A conversion invocation failed
    #[error("pandoc conversion failed for {}: {reason}", .path.display())]
    ConversionFailed { path: PathBuf, reason: String },
}

/// A document conversion engine with pandoc's interface.
///
/// Calls are blocking; no timeout is applied by the pipeline.
pub trait Pandoc {
    /// Version string, e.g. `3.1.11`
    fn version(&self) -> Result<String, PandocError>;

    /// Convert `input` and return the converted text.
    fn convert_to_string(
        &self,
        input: &Path,
        from: &Format,
        to: &Format,
        args: &[String],
    ) -> Result<String, PandocError>;

    /// Convert `input` and write the result to `output` (binary formats).
    fn convert_to_file(
        &self,
        input: &Path,
        from: &Format,
        to: &Format,
        output: &Path,
        args: &[String],
    ) -> Result<(), PandocError>;
}

/// Engine that shells out to the pandoc binary.
#[derive(Debug, Clone)]
pub struct PandocCli {
    binary: PathBuf,
}

impl PandocCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locate the pandoc binary.
    ///
    /// Search order:
    /// 1. `explicit` (the config's `pandoc_path`)
    /// 2. `PANDOC_PATH` environment variable
    /// 3. `pandoc` on `PATH`
    pub fn locate(explicit: Option<&Path>) -> Result<Self, PandocError> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Self::new(path));
            }
            return Err(PandocError::NotFound(format!(
                "configured pandoc_path {} does not exist",
                path.display()
            )));
        }

        if let Ok(env_path) = std::env::var(PANDOC_PATH_ENV) {
            let p = PathBuf::from(&env_path);
            if p.exists() {
                return Ok(Self::new(p));
            }
            tracing::warn!(path = %env_path, "PANDOC_PATH set but file not found");
        }

        which::which("pandoc").map(Self::new).map_err(|e| {
            PandocError::NotFound(format!("{} (install pandoc or set {})", e, PANDOC_PATH_ENV))
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, input: &Path, from: &Format, to: &Format, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(format!("--from={}", from.as_str()))
            .arg(format!("--to={}", to.as_str()))
            .args(args)
            .arg(input)
            .stdin(Stdio::null());
        cmd
    }

    fn run(&self, mut cmd: Command, input: &Path) -> Result<Vec<u8>, PandocError> {
        let output = cmd.output().map_err(|e| PandocError::ConversionFailed {
            path: input.to_path_buf(),
            reason: format!("failed to run {}: {}", self.binary.display(), e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(path = %input.display(), stderr = %stderr.trim(), "pandoc exited with failure");
            return Err(PandocError::ConversionFailed {
                path: input.to_path_buf(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(output.stdout)
    }
}

impl Pandoc for PandocCli {
    fn version(&self) -> Result<String, PandocError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    PandocError::NotFound(self.binary.display().to_string())
                }
                _ => PandocError::Probe(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PandocError::ProbeFailed(format!(
                "{} --version exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version(&stdout).ok_or_else(|| {
            PandocError::ProbeFailed(format!(
                "unrecognized version output: {}",
                stdout.lines().next().unwrap_or("").trim()
            ))
        })
    }

    fn convert_to_string(
        &self,
        input: &Path,
        from: &Format,
        to: &Format,
        args: &[String],
    ) -> Result<String, PandocError> {
        let _span = tracing::debug_span!("pandoc", path = %input.display(), to = %to).entered();
        let cmd = self.command(input, from, to, args);
        let stdout = self.run(cmd, input)?;
        String::from_utf8(stdout).map_err(|_| PandocError::ConversionFailed {
            path: input.to_path_buf(),
            reason: "pandoc produced non-UTF-8 output".to_string(),
        })
    }

    fn convert_to_file(
        &self,
        input: &Path,
        from: &Format,
        to: &Format,
        output: &Path,
        args: &[String],
    ) -> Result<(), PandocError> {
        let _span = tracing::debug_span!("pandoc", path = %input.display(), to = %to).entered();
        let mut cmd = self.command(input, from, to, args);
        cmd.arg("--output").arg(output);
        self.run(cmd, input).map(|_| ())
    }
}

/// Extract `3.1.11` from `pandoc 3.1.11\nFeatures: ...`.
fn parse_version(stdout: &str) -> Option<String> {
    let first = stdout.lines().next()?;
    let mut words = first.split_whitespace();
    let name = words.next()?;
    if !name.starts_with("pandoc") {
        return None;
    }
    let version = words.next()?;
    version
        .chars()
        .next()
        .filter(|c| c.is_ascii_digit())
        .map(|_| version.to_string())
}

/// Probe the engine once and return its version.
///
/// Callers cache the result; the probe spawns a process.
pub fn verify_pandoc(pandoc: &dyn Pandoc) -> Result<String, PandocError> {
    let _span = tracing::info_span!("verify_pandoc").entered();
    match pandoc.version() {
        Ok(version) => {
            tracing::info!(version = %version, "pandoc available");
            Ok(version)
        }
        Err(e) => {
            tracing::warn!(error = %e, "pandoc unavailable");
            Err(e)
        }
    }
}

/// Build the pandoc argument list for one conversion.
///
/// Order: base options, then the config's direction-specific extras, then
/// `extra_args`. Nothing is deduplicated.
pub fn prepare_pandoc_args(
    config: &PandocConfig,
    source_format: &Format,
    target_format: &Format,
    extra_args: &[String],
) -> Vec<String> {
    let opts = &config.pandoc_options;
    let mut args = vec![format!("--wrap={}", opts.wrap)];
    if opts.standalone {
        args.push("--standalone".to_string());
    }
    args.push(format!("--markdown-headings={}", opts.markdown_headings));
    if opts.reference_links {
        args.push("--reference-links".to_string());
    }
    args.extend(
        opts.resource_path
            .iter()
            .map(|p| format!("--resource-path={}", p)),
    );

    if *source_format == Format::Html {
        args.extend(config.html_to_md_extra_args.iter().cloned());
    }
    if *target_format == Format::Docx {
        args.extend(config.md_to_docx_extra_args.iter().cloned());
    }

    args.extend(extra_args.iter().cloned());
    args
}
