//! Cleanup rules for pandoc/Jekyll artifacts in converted Markdown.
//!
//! Each rule is a named regex substitution applied to the whole document.
//! Rules run in table order, and the table is re-applied until the text stops
//! changing, so the result is a fixpoint: cleaning cleaned text is a no-op.
//!
//! ## Adding new rules
//!
//! 1. Add a compiled regex below
//! 2. Add a `CleaningRule` entry to `ALL_RULES` before `blank_lines`
//!    (newline collapsing must stay last)

use std::sync::LazyLock;

use regex::Regex;

// ============ Compiled Regexes (LazyLock) ============

/// Matches pandoc attribute blocks like `{#intro .lead}`.
static ATTRIBUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("hardcoded attribute regex"));

/// Matches `:::` fenced-div markers and the rest of their line.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":::[^\n]*").expect("hardcoded fence regex"));

/// Matches raw `<div ...>` and `</div>` tags.
static DIV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?div\b[^>]*>").expect("hardcoded div regex"));

/// Matches HTML comments, including multi-line ones.
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("hardcoded comment regex"));

/// Matches runs of 3+ newlines.
static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("hardcoded blank lines regex"));

/// A cleanup rule: every match of `pattern` is replaced by `replacement`.
pub struct CleaningRule {
    pub name: &'static str,
    pub description: &'static str,
    pub pattern: &'static LazyLock<Regex>,
    pub replacement: &'static str,
}

/// All cleanup rules, applied in order.
pub static ALL_RULES: &[CleaningRule] = &[
    CleaningRule {
        name: "attribute_blocks",
        description: "Remove {...} attribute blocks",
        pattern: &ATTRIBUTE_RE,
        replacement: "",
    },
    CleaningRule {
        name: "fenced_divs",
        description: "Remove ::: div fences and the rest of their line",
        pattern: &FENCE_RE,
        replacement: "",
    },
    CleaningRule {
        name: "div_tags",
        description: "Remove literal <div> and </div> tags",
        pattern: &DIV_RE,
        replacement: "",
    },
    CleaningRule {
        name: "html_comments",
        description: "Remove <!-- ... --> comments",
        pattern: &COMMENT_RE,
        replacement: "",
    },
    CleaningRule {
        name: "blank_lines",
        description: "Collapse 3+ consecutive newlines to 2",
        pattern: &BLANK_LINES_RE,
        replacement: "\n\n",
    },
];

/// Strip conversion artifacts from pandoc Markdown output.
pub fn post_process_markdown(content: &str) -> String {
    let _span = tracing::debug_span!("post_process_markdown").entered();

    let mut current = content.to_string();
    // Every effective substitution shortens the text, so this terminates.
    loop {
        let next = apply_rules(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// One pass over the rule table.
fn apply_rules(input: &str) -> String {
    let mut text = input.to_string();
    for rule in ALL_RULES {
        let count = rule.pattern.find_iter(&text).count();
        if count > 0 {
            text = rule
                .pattern
                .replace_all(&text, rule.replacement)
                .into_owned();
            tracing::debug!(rule = rule.name, changes = count, "Cleaning rule applied");
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_removes_attribute_blocks() {
        assert_eq!(
            post_process_markdown("# Intro {#intro .lead}\n"),
            "# Intro \n"
        );
    }

    #[test]
    fn test_removes_fenced_divs() {
        let input = "::: {.note}\nBody text\n:::\n";
        assert_eq!(post_process_markdown(input), "\nBody text\n\n");
    }

    #[test]
    fn test_removes_div_tags_and_comments() {
        let input = "<div class=\"x\">Hello</div> <!-- generated\nby pandoc -->world";
        assert_eq!(post_process_markdown(input), "Hello world");
    }

    #[test]
    fn test_collapses_newlines_last() {
        // Comment removal exposes a 4-newline run that must still collapse
        let input = "a\n\n<!-- x -->\n\nb\n\n\n\n\nc";
        assert_eq!(post_process_markdown(input), "a\n\nb\n\nc");
    }

    #[test]
    fn test_plain_markdown_untouched() {
        let input = "# Title\n\nSome *text* with `code`.\n\n- item\n";
        assert_eq!(post_process_markdown(input), input);
    }

    #[test]
    fn test_rules_table_order() {
        let names: Vec<_> = ALL_RULES.iter().map(|r| r.name).collect();
        assert_eq!(names.last(), Some(&"blank_lines"));
        for rule in ALL_RULES {
            assert!(!rule.description.is_empty(), "{} has no description", rule.name);
        }
    }

    #[test]
    fn test_idempotent_on_representative_input() {
        let input = "::: {.cell}\n<div>\n## Heading {#h}\n</div>\n<!-- c -->\n\n\n\n\nText\n:::\n";
        let once = post_process_markdown(input);
        assert_eq!(post_process_markdown(&once), once);
    }

    proptest! {
        #[test]
        fn prop_idempotent(input in "[a-z{}:<>!/\\-\n div]{0,120}") {
            let once = post_process_markdown(&input);
            prop_assert_eq!(post_process_markdown(&once), once);
        }

        #[test]
        fn prop_idempotent_any_text(input in "\\PC{0,200}") {
            let once = post_process_markdown(&input);
            prop_assert_eq!(post_process_markdown(&once), once);
        }

        #[test]
        fn prop_no_long_newline_runs(input in "[a\n{}]{0,80}") {
            prop_assert!(!post_process_markdown(&input).contains("\n\n\n"));
        }
    }
}
