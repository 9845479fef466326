//! Command definitions and execution
//!
//! Builds the `clap` command tree, turns parsed arguments into a
//! [`CliCommand`] and runs it against the core engine.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tighten_core::{
    ExpectationRule, FileRewriter, ModelRule, RewriteSummary, TightenConfig, TightenError,
};
use tracing::{info, warn};

use crate::report;

/// Available subcommands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// List optional associations with redundant presence validations
    Detect(DetectOptions),
    /// Rewrite them into the required form
    Rewrite(RewriteOptions),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectOptions {
    pub directory: PathBuf,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    pub target: PathBuf,
    pub dry_run: bool,
    pub include_specs: bool,
    pub spec_dir: PathBuf,
}

/// Build the command-line interface
pub fn build_cli() -> Command {
    let config = TightenConfig::default();
    let model_dir = config.model_dir.to_string_lossy().to_string();
    let spec_dir = config.spec_dir.to_string_lossy().to_string();

    Command::new("tighten")
        .version(tighten_core::VERSION)
        .about("Find and fix optional belongs_to associations with redundant presence validations")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("detect")
                .about("List associations whose presence validation is redundant")
                .arg(
                    Arg::new("directory")
                        .value_name("DIR")
                        .help("Model directory to scan")
                        .default_value(model_dir.clone())
                        .index(1),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            Command::new("rewrite")
                .about("Rewrite optional associations as required and drop their presence validations")
                .arg(
                    Arg::new("target")
                        .value_name("PATH")
                        .help("Model directory or single model file")
                        .default_value(model_dir)
                        .index(1),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Show a diff of the changes without writing files")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("include-specs")
                        .long("include-specs")
                        .help("Also add .required to belong_to expectations in model specs")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("spec-dir")
                        .long("spec-dir")
                        .value_name("DIR")
                        .help("Spec directory rewritten by --include-specs")
                        .default_value(spec_dir),
                ),
        )
}

/// Parse matched arguments into a command
pub fn parse_command(matches: &ArgMatches) -> Result<CliCommand> {
    match matches.subcommand() {
        Some(("detect", detect)) => {
            let format = match detect.get_one::<String>("format").map(String::as_str) {
                Some("json") => OutputFormat::Json,
                _ => OutputFormat::Text,
            };
            Ok(CliCommand::Detect(DetectOptions {
                directory: path_arg(detect, "directory")?,
                format,
            }))
        }
        Some(("rewrite", rewrite)) => Ok(CliCommand::Rewrite(RewriteOptions {
            target: path_arg(rewrite, "target")?,
            dry_run: rewrite.get_flag("dry-run"),
            include_specs: rewrite.get_flag("include-specs"),
            spec_dir: path_arg(rewrite, "spec-dir")?,
        })),
        Some((name, _)) => Err(anyhow!("Unknown command: {name}")),
        None => Err(anyhow!("No command given")),
    }
}

fn path_arg(matches: &ArgMatches, name: &str) -> Result<PathBuf> {
    matches
        .get_one::<String>(name)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Missing argument: {name}"))
}

pub fn execute(command: CliCommand, config: &TightenConfig) -> Result<()> {
    match command {
        CliCommand::Detect(options) => run_detect(&options, config),
        CliCommand::Rewrite(options) => run_rewrite(&options, config),
    }
}

pub fn run_detect(options: &DetectOptions, config: &TightenConfig) -> Result<()> {
    let findings = config.matcher().scan(&options.directory)?;
    info!(count = findings.len(), "detection finished");

    match options.format {
        OutputFormat::Text => print!("{}", report::findings_text(&findings)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&findings)?),
    }
    Ok(())
}

pub fn run_rewrite(options: &RewriteOptions, config: &TightenConfig) -> Result<()> {
    let target = options.target.as_path();
    if !target.exists() {
        return Err(TightenError::PathNotFound(target.to_path_buf()).into());
    }

    let mut rewriter = FileRewriter::new().source_extension(config.source_extension.clone());
    rewriter.add_rule(Box::new(
        ModelRule::new(config.matcher()).spec_suffix(config.spec_suffix.clone()),
    ));

    if options.include_specs {
        // Collect fields before the models are rewritten and stop matching.
        let fields = known_fields(target, config)?;
        info!(fields = fields.len(), "fields eligible for spec rewriting");
        rewriter = rewriter.known_fields(fields);
        rewriter.add_rule(Box::new(
            ExpectationRule::new().spec_suffix(config.spec_suffix.clone()),
        ));
    }

    let mut summary = if target.is_file() {
        let mut summary = RewriteSummary::new();
        summary.files_processed = 1;
        if rewriter.rewrite_file(target, options.dry_run)? {
            summary.changed_files.push(target.to_path_buf());
        }
        summary
    } else {
        rewriter.rewrite_directory(target, options.dry_run)?
    };

    if options.include_specs {
        if options.spec_dir.exists() {
            summary.merge(rewriter.rewrite_directory(&options.spec_dir, options.dry_run)?);
        } else {
            warn!(spec_dir = %options.spec_dir.display(), "spec directory does not exist, skipping specs");
        }
    }

    print!("{}", report::rewrite_summary_text(&summary, options.dry_run));
    Ok(())
}

fn known_fields(target: &Path, config: &TightenConfig) -> Result<BTreeSet<String>> {
    let matcher = config.matcher();
    let fields = if target.is_file() {
        matcher
            .find_in_file(target)?
            .into_iter()
            .map(|finding| finding.field)
            .collect()
    } else {
        matcher
            .scan(target)?
            .into_iter()
            .map(|found| found.finding.field)
            .collect()
    };
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliCommand> {
        let matches = build_cli().try_get_matches_from(args)?;
        parse_command(&matches)
    }

    #[test]
    fn test_detect_defaults_to_model_directory() {
        let command = parse(&["tighten", "detect"]).unwrap();
        assert_eq!(
            command,
            CliCommand::Detect(DetectOptions {
                directory: PathBuf::from("app/models"),
                format: OutputFormat::Text,
            })
        );
    }

    #[test]
    fn test_detect_json_format() {
        let command = parse(&["tighten", "detect", "models", "--format", "json"]).unwrap();
        assert_eq!(
            command,
            CliCommand::Detect(DetectOptions {
                directory: PathBuf::from("models"),
                format: OutputFormat::Json,
            })
        );
    }

    #[test]
    fn test_rewrite_flags() {
        let command = parse(&[
            "tighten",
            "rewrite",
            "app/models/post.rb",
            "--dry-run",
            "--include-specs",
            "--spec-dir",
            "test/models",
        ])
        .unwrap();
        assert_eq!(
            command,
            CliCommand::Rewrite(RewriteOptions {
                target: PathBuf::from("app/models/post.rb"),
                dry_run: true,
                include_specs: true,
                spec_dir: PathBuf::from("test/models"),
            })
        );
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(parse(&["tighten", "detect", "--format", "yaml"]).is_err());
    }
}
