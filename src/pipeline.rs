#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Orchestration of one course's grading workflow over a [`Platform`].
//!
//! Layout in the staff file store:
//!
//! * `grades/<subject>/<NN>-<part>.md`: one grading document per part,
//! * `grades/<subject>/reports/<identity>.md`: published reports,
//! * `grades/final.md` and `grades/final.json`: the semester summary.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use futures::{
    future::try_join_all,
    stream::{self, StreamExt, TryStreamExt},
};
use tracing::{debug, info, warn};

use crate::{
    aggregate::{AggregatedGrade, PartAggregator},
    config::CourseConfig,
    error::{GradingError, GradingErrors, Location},
    final_grade::{FinalGradeEngine, GradeSummary, StudentScores},
    ledger::{FeedbackRecord, SubmissionLedger, SubmissionRecord, encode_comment},
    platform::Platform,
    rubric::{GradeDocument, render_scaffold},
    template::{Bindings, Variable},
    totals::{GradeReport, TotalsCalculator, extract_total},
    types::{Identity, Roster},
    util::{slugify, student_repository},
    validate::RubricValidator,
};

/// Directory holding every subject's grading documents.
pub const GRADES_DIR: &str = "grades";
/// Name of the per-subject directory of published reports.
pub const REPORTS_DIR: &str = "reports";

/// Directory of the grading documents of `subject`.
pub fn subject_dir(subject: &str) -> String {
    format!("{GRADES_DIR}/{subject}")
}

/// Path of the grading document of the `index`-th (0-based) part.
pub fn part_path(subject: &str, index: usize, title: &str) -> String {
    format!("{}/{:02}-{}.md", subject_dir(subject), index + 1, slugify(title))
}

/// Path of the published report of `identity`.
pub fn report_path(subject: &str, identity: &Identity) -> String {
    format!("{}/{REPORTS_DIR}/{identity}.md", subject_dir(subject))
}

/// Title of the issue acknowledging a submission.
pub fn received_title(subject: &str) -> String {
    format!("{subject} received")
}

/// Title of the issue carrying a published report.
pub fn grades_title(subject: &str) -> String {
    format!("{subject} grades")
}

/// Drives the grading workflow of one course.
pub struct Pipeline<P> {
    /// Where documents, ledgers, rosters and issues live.
    platform: P,
    /// Course configuration.
    config:   CourseConfig,
}

impl<P: Platform> Pipeline<P> {
    /// Creates a pipeline for `config` over `platform`.
    pub fn new(platform: P, config: CourseConfig) -> Self {
        Self { platform, config }
    }

    /// The platform in use.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The course configuration.
    pub fn config(&self) -> &CourseConfig {
        &self.config
    }

    /// Members of a team, as a roster.
    async fn roster(&self, team: &str) -> Result<Roster> {
        let members = self
            .platform
            .list_roster(team)
            .await
            .with_context(|| format!("Could not list team `{team}`"))?;
        Ok(members.into_iter().collect())
    }

    /// Every submission recorded for `subject`.
    async fn ledger(&self, subject: &str) -> Result<SubmissionLedger> {
        let records = self
            .platform
            .read_ledger(subject)
            .await
            .with_context(|| format!("Could not read the `{subject}` ledger"))?;
        Ok(records.into_iter().collect())
    }

    /// Records a submission and acknowledges it in the student's repository.
    ///
    /// Late days are derived when the subject has a configured deadline.
    /// Non-empty `feedback` goes to the anonymous feedback ledger first,
    /// without the identity.
    pub async fn record_submission(
        &self,
        subject: &str,
        identity: &Identity,
        reference: &str,
        timestamp: DateTime<Utc>,
        feedback: Option<&str>,
    ) -> Result<SubmissionRecord> {
        if let Some(feedback) = feedback.map(str::trim).filter(|f| !f.is_empty()) {
            let record = FeedbackRecord {
                subject:  subject.to_string(),
                feedback: feedback.to_string(),
            };
            self.platform
                .append_feedback(&record)
                .await
                .with_context(|| format!("Could not record feedback on `{subject}`"))?;
            debug!("Recorded feedback on {subject}");
        }

        let mut record = SubmissionRecord::builder()
            .subject(subject)
            .identity(identity.clone())
            .reference(reference)
            .timestamp(timestamp)
            .build();
        if let Some(deadline) = self.config.deadline(subject) {
            record = record.with_deadline(deadline);
        }

        self.platform
            .append_ledger_record(subject, &record)
            .await
            .with_context(|| format!("Could not record {identity}'s `{subject}` submission"))?;

        let body = format!("{}\n/cc @{identity}\n", encode_comment(&record)?);
        self.platform
            .create_issue(
                &student_repository(&self.config.course, identity),
                &received_title(subject),
                &body,
            )
            .await
            .with_context(|| format!("Could not acknowledge {identity}'s `{subject}` submission"))?;

        info!(
            "Recorded {subject} for {identity} at {reference} ({} late day(s))",
            record.late_days.unwrap_or(0)
        );
        Ok(record)
    }

    /// Writes one ungraded document per part for the latest submission of
    /// every identity.
    ///
    /// `parts` supply each part's title and rubric; their entries are
    /// ignored. Documents that already exist are left untouched so graders'
    /// work is never overwritten. Returns the paths written.
    pub async fn start_grading(&self, subject: &str, parts: &[GradeDocument]) -> Result<Vec<String>> {
        let ledger = self.ledger(subject).await?;
        let latest = ledger.latest(subject);
        if latest.is_empty() {
            warn!("{subject}: no submissions recorded, documents will have no entries");
        }

        let template = self.config.source_template()?;
        let existing = self.platform.list_directory(&subject_dir(subject)).await?;
        let mut written = Vec::new();

        for (index, part) in parts.iter().enumerate() {
            let path = part_path(subject, index, &part.title);
            let name = path.rsplit('/').next().unwrap_or(&path);
            if existing.iter().any(|e| e == name) {
                warn!("{path} already exists, leaving it as is");
                continue;
            }

            let mut sources = Vec::with_capacity(latest.len());
            for (identity, record) in &latest {
                let bindings = Bindings::new()
                    .bind(Variable::Course, self.config.course.as_str())
                    .bind(Variable::Subject, subject)
                    .bind(Variable::Part, part.title.as_str())
                    .bind(Variable::Identity, identity.as_str())
                    .bind(Variable::Reference, record.reference.as_str());
                sources.push((identity, template.render(&bindings)?));
            }

            let text = render_scaffold(
                &part.title,
                &part.rubric,
                sources.iter().map(|(identity, url)| (*identity, url.as_str())),
            );
            self.platform.write_document(&path, &text).await?;
            debug!("Wrote {path} with {} entries", sources.len());
            written.push(path);
        }

        info!("{subject}: {} grading document(s) ready", written.len());
        Ok(written)
    }

    /// Names of the grading documents of `subject`, in part order.
    async fn part_names(&self, subject: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .platform
            .list_directory(&subject_dir(subject))
            .await?
            .into_iter()
            .filter(|name| name.ends_with(".md"))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Parses, validates and aggregates every part of `subject` without
    /// changing anything.
    ///
    /// Grading problems are returned as a [`GradingErrors`] inside the
    /// error, listing every problem found across all parts.
    pub async fn check(&self, subject: &str) -> Result<BTreeMap<Identity, AggregatedGrade>> {
        let staff = self.roster(&self.config.staff_team).await?;
        let names = self.part_names(subject).await?;
        if names.is_empty() {
            bail!("No grading documents found for `{subject}`");
        }

        let texts = try_join_all(names.iter().map(|name| async move {
            let path = format!("{}/{name}", subject_dir(subject));
            self.platform
                .read_document(&path)
                .await
                .with_context(|| format!("Could not read grading document {path}"))
        }))
        .await?;

        let parts = names
            .iter()
            .zip(&texts)
            .map(|(name, text)| (name.trim_end_matches(".md"), text.as_str()));
        let documents = RubricValidator::new(&staff).check_subject(subject, parts)?;
        let grades = PartAggregator::new(subject).aggregate(&documents)?;

        info!(
            "{subject}: {} part(s) and {} identities check out",
            documents.len(),
            grades.len()
        );
        Ok(grades)
    }

    /// Publishes the report of every identity in `subject`.
    ///
    /// Nothing is written unless the whole subject checks out. Reports are
    /// published at most `max_concurrency` at a time, and running this again
    /// rewrites the reports without opening duplicate issues.
    pub async fn publish(&self, subject: &str) -> Result<Vec<GradeReport>> {
        let grades = self.check(subject).await?;
        let reports = TotalsCalculator.reports(grades.values());
        let limit = self.config.max_concurrency.max(1);

        stream::iter(&reports)
            .map(|report| self.publish_report(report))
            .buffer_unordered(limit)
            .try_collect::<Vec<()>>()
            .await?;

        info!("{subject}: published {} report(s)", reports.len());
        Ok(reports)
    }

    /// Writes one report and opens its issue unless it is already open.
    async fn publish_report(&self, report: &GradeReport) -> Result<()> {
        let path = report_path(&report.subject, &report.identity);
        self.platform
            .write_document(&path, &report.text)
            .await
            .with_context(|| format!("Could not write {path}"))?;

        let repo = student_repository(&self.config.course, &report.identity);
        let title = grades_title(&report.subject);
        if self.platform.issue_exists(&repo, &title).await? {
            debug!("{repo} already has `{title}`");
        } else {
            self.platform
                .create_issue(&repo, &title, &report.text)
                .await
                .with_context(|| format!("Could not open `{title}` in {repo}"))?;
            debug!("Opened `{title}` in {repo} ({}/100)", report.total);
        }
        Ok(())
    }

    /// Published total of `identity` for `subject`.
    ///
    /// A report that is missing or lacks a single total line is a
    /// [`GradingError::MissingTotal`].
    async fn published_total(&self, subject: &str, identity: &Identity) -> Result<f64> {
        let location = Location::subject(subject);
        let reports = self
            .platform
            .list_directory(&format!("{}/{REPORTS_DIR}", subject_dir(subject)))
            .await?;
        if !reports.iter().any(|name| *name == format!("{identity}.md")) {
            return Err(GradingError::MissingTotal {
                location,
                identity: identity.clone(),
            }
            .into());
        }

        let text = self
            .platform
            .read_document(&report_path(subject, identity))
            .await?;
        Ok(extract_total(&text, &location, identity)? as f64)
    }

    /// Published totals of `identity` for each of `subjects`, in order.
    async fn published_totals(&self, subjects: &[String], identity: &Identity) -> Result<Vec<f64>> {
        try_join_all(
            subjects
                .iter()
                .map(|subject| self.published_total(subject, identity)),
        )
        .await
    }

    /// Computes the semester grade of every student and writes
    /// `grades/final.md` and `grades/final.json`.
    pub async fn final_grades(&self) -> Result<GradeSummary> {
        let students = self.roster(&self.config.students_team).await?;
        let ledgers = try_join_all(
            self.config
                .assignments
                .iter()
                .map(|subject| self.ledger(subject)),
        )
        .await?;

        let mut scores = Vec::with_capacity(students.len());
        for identity in students.iter() {
            let late_days = self
                .config
                .assignments
                .iter()
                .zip(&ledgers)
                .map(|(subject, ledger)| {
                    ledger
                        .current(subject, identity)
                        .and_then(|record| record.late_days)
                        .unwrap_or(0)
                })
                .collect();
            let quiz = match &self.config.quiz {
                Some(subject) => self.published_total(subject, identity).await?,
                None => 0.0,
            };

            scores.push(
                StudentScores::builder()
                    .identity(identity.clone())
                    .assignment_scores(
                        self.published_totals(&self.config.assignments, identity)
                            .await?,
                    )
                    .late_days(late_days)
                    .quiz(quiz)
                    .iteration_scores(
                        self.published_totals(&self.config.iterations, identity)
                            .await?,
                    )
                    .point_adjustment(self.config.point_adjustment(identity))
                    .build(),
            );
        }

        let summary = FinalGradeEngine::new(self.config.policy()).grade_all(&scores)?;
        self.platform
            .write_document(
                &format!("{GRADES_DIR}/final.md"),
                &summary.render(&self.config.advisors),
            )
            .await?;
        self.platform
            .write_document(
                &format!("{GRADES_DIR}/final.json"),
                &serde_json::to_string_pretty(&summary.records)?,
            )
            .await?;

        info!("Final grades computed for {} student(s)", summary.records.len());
        Ok(summary)
    }
}

/// Splits pipeline failures into grading problems and everything else.
pub fn grading_errors(error: &anyhow::Error) -> Option<&GradingErrors> {
    error.downcast_ref::<GradingErrors>()
}
