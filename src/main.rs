#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # gradebook
//!
//! Command line front end for the grading workflow of one course.
//!
//! Everything lives under a root directory (`--root` or `GRADEBOOK_ROOT`):
//! the course configuration (`gradebook.json`), team rosters under `teams/`,
//! submission ledgers under `ledger/`, grading documents under `grades/` and
//! opened issues under `issues/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bpaf::*;
use chrono::{DateTime, Utc};
use colored::Colorize;
use dotenvy::dotenv;
use gradebook::{
    Identity, Location, Pipeline,
    config::{CourseConfig, config_path_from_env, root_from_env},
    pipeline::grading_errors,
    platform::LocalPlatform,
    rubric::parse_document,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Workflow subcommands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Record a submission
    Submit(String, String, String, Option<DateTime<Utc>>, Option<String>),
    /// Write ungraded documents from rubric templates
    Start(String, Vec<PathBuf>),
    /// Validate the grading documents of a subject
    Check(String),
    /// Publish the reports of a subject
    Publish(String),
    /// Compute semester grades
    Final,
}

/// Parsed command line.
#[derive(Debug, Clone)]
struct Options {
    /// Root directory override.
    root:   Option<PathBuf>,
    /// Configuration file override.
    config: Option<PathBuf>,
    /// What to do.
    cmd:    Cmd,
}

/// Parse the command line arguments and return the `Options`
fn options() -> Options {
    /// parses a subject name
    fn s() -> impl Parser<String> {
        positional("SUBJECT").help("Subject name, e.g. assignment-1")
    }

    let root = long("root")
        .help("Directory holding the course data (defaults to GRADEBOOK_ROOT or .)")
        .argument::<PathBuf>("DIR")
        .optional();
    let config = long("config")
        .help("Course configuration file (defaults to GRADEBOOK_CONFIG or <root>/gradebook.json)")
        .argument::<PathBuf>("FILE")
        .optional();

    let identity = positional("IDENTITY").help("Who submitted");
    let reference = positional("REFERENCE").help("Commit hash of the submission");
    let at = long("at")
        .help("Submission time, RFC 3339 (defaults to now)")
        .argument::<DateTime<Utc>>("TIME")
        .optional();
    let feedback = long("feedback")
        .help("Anonymous feedback to record with the submission")
        .argument::<String>("TEXT")
        .optional();
    let submit = construct!(Cmd::Submit(s(), identity, reference, at, feedback))
        .to_options()
        .command("submit")
        .help("Record a submission and acknowledge it");

    let templates = positional("RUBRIC")
        .help("Grading document holding a part's title and rubric")
        .some("at least one rubric template is required");
    let start = construct!(Cmd::Start(s(), templates))
        .to_options()
        .command("start")
        .help("Write one ungraded document per part");

    let check = construct!(Cmd::Check(s()))
        .to_options()
        .command("check")
        .help("Validate grading documents without changing anything");

    let publish = construct!(Cmd::Publish(s()))
        .to_options()
        .command("publish")
        .help("Publish per-student reports");

    let final_grades = pure(Cmd::Final)
        .to_options()
        .command("final")
        .help("Compute semester letter grades");

    let cmd = construct!([submit, start, check, publish, final_grades]);

    construct!(Options { root, config, cmd })
        .to_options()
        .descr("Grading workflow for hand-edited rubric documents")
        .run()
}

/// Reads and parses each rubric template.
fn read_templates(subject: &str, paths: &[PathBuf]) -> Result<Vec<gradebook::rubric::GradeDocument>> {
    paths
        .iter()
        .map(|path| -> Result<_> {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read {}", path.display()))?;
            let part = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            Ok(parse_document(&text, &Location::subject(subject).with_part(part))?)
        })
        .collect()
}

/// Runs one command.
async fn run(root: &Path, config: CourseConfig, cmd: Cmd) -> Result<()> {
    let pipeline = Pipeline::new(LocalPlatform::new(root), config);

    match cmd {
        Cmd::Submit(subject, identity, reference, at, feedback) => {
            let record = pipeline
                .record_submission(
                    &subject,
                    &Identity::new(identity),
                    &reference,
                    at.unwrap_or_else(Utc::now),
                    feedback.as_deref(),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Cmd::Start(subject, paths) => {
            let templates = read_templates(&subject, &paths)?;
            for path in pipeline.start_grading(&subject, &templates).await? {
                println!("{path}");
            }
        }
        Cmd::Check(subject) => {
            let grades = pipeline.check(&subject).await?;
            for grade in grades.values() {
                println!("{}: {}/100", grade.identity, grade.total());
            }
        }
        Cmd::Publish(subject) => {
            for report in pipeline.publish(&subject).await? {
                println!("{}: {}/100", report.identity, report.total);
            }
        }
        Cmd::Final => {
            let summary = pipeline.final_grades().await?;
            println!("{}", summary.render(&pipeline.config().advisors));
        }
    };

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let opts = options();
    let root = opts.root.unwrap_or_else(root_from_env);
    let config_path = opts.config.unwrap_or_else(|| config_path_from_env(&root));
    let config = CourseConfig::load(&config_path)?;

    if let Err(e) = run(&root, config, opts.cmd).await {
        match grading_errors(&e) {
            Some(errors) => {
                for error in errors.iter() {
                    eprintln!("{} {error}", format!("[{}]", error.kind()).red().bold());
                }
                eprintln!("{}", format!("{} problem(s) found", errors.len()).red());
            }
            None => eprintln!("{} {e:#}", "error:".red().bold()),
        }
        std::process::exit(1);
    }

    Ok(())
}
