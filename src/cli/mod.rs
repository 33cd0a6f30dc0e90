//! CLI implementation for panflow

mod display;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use panflow::config::{merge_values, overrides_from_pairs, PandocConfig};
use panflow::convert::validate_output;
use panflow::project::{find_project_root, resolve_project_path};
use panflow::{Format, IntegrationResult, PandocIntegration};

use display::{print_batch, print_conversion, print_json, print_status, print_validation};

#[derive(Parser)]
#[command(name = "panflow")]
#[command(about = "Validated document conversion with pandoc")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root (default: detected from the current directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Extra YAML config file layered over user and project config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override a config key, e.g. --set validation.min_file_size=10
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    set: Vec<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Show progress logs (sets the default log level to info)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an HTML file to Markdown
    Html {
        /// Input HTML file
        input: PathBuf,
        /// Output path (default: <output_dir>/<stem>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert a Markdown file to DOCX
    Docx {
        /// Input Markdown file
        input: PathBuf,
        /// Output path (default: <output_dir>/<stem>.docx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert every matching file in a directory
    Dir {
        /// Input directory
        input: PathBuf,
        /// Target format: markdown or docx
        #[arg(long, default_value = "markdown")]
        to: String,
        /// Output directory (default: configured output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Glob for input files (default depends on --to)
        #[arg(long)]
        pattern: Option<String>,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Verify pandoc and print its version
    Check,
    /// Check a finished conversion without running pandoc
    Validate {
        /// Converted file
        output: PathBuf,
        /// Source file it was converted from
        input: PathBuf,
    },
}

/// Run CLI with pre-parsed arguments (main.rs inspects `verbose` first)
pub fn run_with(cli: Cli) -> Result<()> {
    let root = cli.project.clone().unwrap_or_else(find_project_root);

    match cli.command {
        Commands::Html {
            ref input,
            ref output,
        } => {
            let mut panflow = integration(&cli, &root)?;
            let result = panflow.html_to_markdown(input, output.as_deref());
            report(&cli, &result, print_conversion)
        }
        Commands::Docx {
            ref input,
            ref output,
        } => {
            let mut panflow = integration(&cli, &root)?;
            let result = panflow.markdown_to_docx(input, output.as_deref());
            report(&cli, &result, print_conversion)
        }
        Commands::Dir {
            ref input,
            ref to,
            ref output,
            ref pattern,
            recursive,
        } => {
            let target = parse_target(to)?;
            let mut panflow = integration(&cli, &root)?;
            let result = panflow.convert_directory(
                input,
                output.as_deref(),
                target,
                pattern.as_deref(),
                recursive,
            );
            report(&cli, &result, print_batch)
        }
        Commands::Check => cmd_check(&cli, &root),
        Commands::Validate {
            ref output,
            ref input,
        } => cmd_validate(&cli, &root, output, input),
    }
}

/// Accept the names `dir --to` supports.
fn parse_target(name: &str) -> Result<Format> {
    match Format::parse(name) {
        f @ (Format::Markdown | Format::Docx) => Ok(f),
        other => bail!("Unsupported target format '{}' (expected markdown or docx)", other),
    }
}

/// Build the override layer from `--config` and `--set`, `--set` winning.
fn overrides(cli: &Cli) -> Result<Option<serde_yaml::Value>> {
    let mut layers = Vec::new();
    if let Some(path) = &cli.config {
        let layer = PandocConfig::load_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?
            .with_context(|| format!("Config file not found: {}", path.display()))?;
        layers.push(layer);
    }
    if !cli.set.is_empty() {
        layers.push(overrides_from_pairs(cli.set.iter().map(String::as_str))?);
    }

    let mut layers = layers.into_iter();
    Ok(layers.next().map(|mut first| {
        for layer in layers {
            merge_values(&mut first, &layer);
        }
        first
    }))
}

/// Initialized façade, or an error carrying the initialization message.
fn integration(cli: &Cli, root: &Path) -> Result<PandocIntegration> {
    let mut panflow = PandocIntegration::new(root);
    if let Some(layer) = overrides(cli)? {
        panflow = panflow.with_overrides(layer);
    }
    let init = panflow.initialize();
    if !init.success {
        if cli.json {
            print_json(&init)?;
        }
        bail!("{}", init.message);
    }
    Ok(panflow)
}

/// Print a result and turn failure into a non-zero exit.
fn report<T: serde::Serialize>(
    cli: &Cli,
    result: &IntegrationResult<T>,
    print: fn(&IntegrationResult<T>),
) -> Result<()> {
    if cli.json {
        print_json(result)?;
    } else {
        print(result);
    }
    if !result.success {
        bail!("{}", result.message);
    }
    Ok(())
}

fn cmd_check(cli: &Cli, root: &Path) -> Result<()> {
    let panflow = integration(cli, root)?;
    let status = panflow.status();
    if cli.json {
        print_json(&status)?;
    } else {
        print_status(&status);
    }
    Ok(())
}

fn cmd_validate(cli: &Cli, root: &Path, output: &Path, input: &Path) -> Result<()> {
    let output = resolve_project_path(root, output);
    let input = resolve_project_path(root, input);
    let valid = validate_output(&output, &input);

    if cli.json {
        print_json(&serde_json::json!({
            "output": output,
            "input": input,
            "valid": valid,
        }))?;
    } else {
        print_validation(&output, valid);
    }
    if !valid {
        bail!("Validation failed for {}", output.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_html_parses() {
        let cli = Cli::try_parse_from(["panflow", "html", "page.html", "-o", "out/page.md"]).unwrap();
        match cli.command {
            Commands::Html { input, output } => {
                assert_eq!(input, PathBuf::from("page.html"));
                assert_eq!(output, Some(PathBuf::from("out/page.md")));
            }
            _ => panic!("Expected Html command"),
        }
    }

    #[test]
    fn test_cli_dir_defaults() {
        let cli = Cli::try_parse_from(["panflow", "dir", "docs"]).unwrap();
        match cli.command {
            Commands::Dir {
                to,
                output,
                pattern,
                recursive,
                ..
            } => {
                assert_eq!(to, "markdown");
                assert!(output.is_none());
                assert!(pattern.is_none());
                assert!(!recursive);
            }
            _ => panic!("Expected Dir command"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "panflow",
            "check",
            "--json",
            "-v",
            "--set",
            "output_dir=out",
            "--set",
            "retry_mechanism.conversion_retry_delay=0",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
        assert_eq!(cli.set.len(), 2);
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("markdown").unwrap(), Format::Markdown);
        assert_eq!(parse_target("md").unwrap(), Format::Markdown);
        assert_eq!(parse_target("docx").unwrap(), Format::Docx);
        assert!(parse_target("pdf").is_err());
    }

    #[test]
    fn test_overrides_from_set() {
        let cli = Cli::try_parse_from(["panflow", "check", "--set", "output_dir=elsewhere"]).unwrap();
        let layer = overrides(&cli).unwrap().unwrap();
        let config = PandocConfig::from_layers(&[layer]).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("elsewhere"));
    }

    #[test]
    fn test_no_overrides() {
        let cli = Cli::try_parse_from(["panflow", "check"]).unwrap();
        assert!(overrides(&cli).unwrap().is_none());
    }
}
