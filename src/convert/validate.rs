//! Validation predicates for conversion input and output.
//!
//! Every check returns `(is_valid, errors)` so callers can merge error lists
//! from several checks before deciding whether to retry.

use std::path::Path;

use crate::config::PandocConfig;

/// Fail iff `min_size > 0` and the output is smaller than it.
pub fn check_file_size(converted_size: u64, min_size: u64) -> (bool, Vec<String>) {
    if min_size > 0 && converted_size < min_size {
        return (
            false,
            vec![format!(
                "Converted file too small: {} bytes (minimum {} bytes)",
                converted_size, min_size
            )],
        );
    }
    (true, Vec::new())
}

/// Fail iff `original_size > 0` and `converted / original < threshold`.
///
/// `threshold` defaults to 0.1. A ratio equal to the threshold passes.
pub fn check_conversion_ratio(
    converted_size: u64,
    original_size: u64,
    threshold: Option<f64>,
) -> (bool, Vec<String>) {
    if original_size == 0 {
        return (true, Vec::new());
    }
    let threshold = threshold.unwrap_or(PandocConfig::DEFAULT_RATIO_THRESHOLD);
    let ratio = converted_size as f64 / original_size as f64;
    if ratio < threshold {
        return (
            false,
            vec![format!(
                "Conversion ratio too low: {:.3} (threshold {:.3}, {} -> {} bytes)",
                ratio, threshold, original_size, converted_size
            )],
        );
    }
    (true, Vec::new())
}

/// Check that HTML has a `<body>` element and, with `check_links`, that every
/// anchor carries a non-empty `href`.
#[cfg(feature = "html-structure")]
pub fn validate_html_structure(html_content: &str, check_links: bool) -> (bool, Vec<String>) {
    use lol_html::{element, rewrite_str, RewriteStrSettings};

    let _span = tracing::debug_span!("validate_html_structure").entered();

    let mut body_tags = 0usize;
    let mut bad_links = 0usize;

    let parsed = rewrite_str(
        html_content,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("body", |_el| {
                    body_tags += 1;
                    Ok(())
                }),
                element!("a", |el| {
                    let empty = el
                        .get_attribute("href")
                        .map(|h| h.trim().is_empty())
                        .unwrap_or(true);
                    if empty {
                        bad_links += 1;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    );

    if let Err(e) = parsed {
        return (false, vec![format!("Failed to parse HTML: {}", e)]);
    }

    let mut errors = Vec::new();
    if body_tags == 0 {
        errors.push("HTML has no <body> element".to_string());
    }
    if check_links && bad_links > 0 {
        errors.push(format!(
            "HTML has {} link(s) with an empty or missing href",
            bad_links
        ));
    }
    (errors.is_empty(), errors)
}

/// Without an HTML parser the structure cannot be confirmed, which fails.
#[cfg(not(feature = "html-structure"))]
pub fn validate_html_structure(_html_content: &str, _check_links: bool) -> (bool, Vec<String>) {
    (
        false,
        vec!["HTML parser unavailable (built without the html-structure feature)".to_string()],
    )
}

/// WordprocessingML main namespace
#[cfg(feature = "docx-structure")]
const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Check that a DOCX has at least one paragraph and, with `check_links`, that
/// its document relationship part is present.
///
/// Any failure to open or parse the package is a validation failure.
#[cfg(feature = "docx-structure")]
pub fn validate_docx_structure(path: &Path, check_links: bool) -> (bool, Vec<String>) {
    let _span = tracing::debug_span!("validate_docx_structure", path = %path.display()).entered();
    match inspect_docx(path) {
        Ok((paragraphs, has_rels)) => {
            let mut errors = Vec::new();
            if paragraphs == 0 {
                errors.push(format!("DOCX has no paragraphs: {}", path.display()));
            }
            if check_links && !has_rels {
                errors.push(format!(
                    "DOCX structure incomplete (missing document relationships): {}",
                    path.display()
                ));
            }
            (errors.is_empty(), errors)
        }
        Err(e) => (
            false,
            vec![format!("Failed to read DOCX {}: {}", path.display(), e)],
        ),
    }
}

/// Paragraph count of `word/document.xml` and whether the relationship part exists.
#[cfg(feature = "docx-structure")]
fn inspect_docx(path: &Path) -> anyhow::Result<(usize, bool)> {
    use std::io::Read;

    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| anyhow::anyhow!("missing word/document.xml"))?
        .read_to_string(&mut xml)?;

    let doc = roxmltree::Document::parse(&xml)?;
    let paragraphs = doc
        .descendants()
        .filter(|n| n.has_tag_name((W_NS, "p")))
        .count();

    let has_rels = archive.by_name("word/_rels/document.xml.rels").is_ok();
    Ok((paragraphs, has_rels))
}

/// Without a DOCX reader the structure is unknown, which is treated as a pass.
#[cfg(not(feature = "docx-structure"))]
pub fn validate_docx_structure(path: &Path, _check_links: bool) -> (bool, Vec<String>) {
    tracing::warn!(
        path = %path.display(),
        "DOCX structure check skipped (built without the docx-structure feature)"
    );
    (true, Vec::new())
}
