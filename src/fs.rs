//! Filesystem helpers used by the conversion pipeline.
//!
//! Thin wrappers over `std::fs` that report non-existence as data instead of
//! an error, plus glob-filtered file discovery.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::GlobBuilder;

/// Result of stat-ing a path. `exists == false` for missing paths.
#[derive(Debug, Clone, Default)]
pub struct FileStat {
    pub exists: bool,
    pub is_file: bool,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Stat a path. Missing paths yield a `FileStat` with `exists == false`;
/// other I/O errors (permissions, etc.) are returned.
pub fn stat(path: &Path) -> io::Result<FileStat> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(FileStat {
            exists: true,
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FileStat::default()),
        Err(e) => Err(e),
    }
}

/// Read a file as UTF-8 text. Invalid UTF-8 is replaced, not rejected.
pub fn read_text(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Input is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

/// Write text, returning the number of bytes written.
pub fn write_text(path: &Path, content: &str) -> io::Result<u64> {
    std::fs::write(path, content)?;
    Ok(content.len() as u64)
}

/// Create a directory and its parents. Existing directories are fine.
pub fn create_directory(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
}

/// Find files under `dir` whose file name matches `pattern` (glob syntax,
/// `{a,b}` alternation supported). Results are sorted.
///
/// Matching ignores case, like extension-based format detection, so
/// `*.html` also collects `Page.HTML`. Symlinks are not followed.
pub fn find_files(dir: &Path, pattern: &str, recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid file pattern '{}': {}", pattern, e))?
        .compile_matcher();

    let mut walker = walkdir::WalkDir::new(dir).follow_links(false).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "Skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| matcher.is_match(e.file_name()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}
