#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    final_grade::{Breakdown, Cutoff, GradingPolicy},
    template::Template,
    types::Identity,
};

/// Directory the local platform lives in when `GRADEBOOK_ROOT` is unset.
pub const DEFAULT_ROOT: &str = ".";
/// Configuration file name, relative to the root.
pub const DEFAULT_CONFIG_FILE: &str = "gradebook.json";
/// Reports published at once when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default name of the team whose members may grade.
fn default_staff_team() -> String {
    "staff".to_string()
}

/// Default name of the team whose members receive final grades.
fn default_students_team() -> String {
    "students".to_string()
}

/// Default bound on concurrent publications.
fn default_concurrency() -> usize {
    read_usize("GRADEBOOK_CONCURRENCY", DEFAULT_CONCURRENCY)
}

/// Everything a course needs to run the grading pipeline, as stored in
/// `gradebook.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Course identifier, used to name repositories (`<course>-student-<id>`).
    pub course:                String,
    /// Team whose members are authorized to grade.
    #[serde(default = "default_staff_team")]
    pub staff_team:            String,
    /// Team whose members receive final grades.
    #[serde(default = "default_students_team")]
    pub students_team:         String,
    /// Project advisor of each student.
    #[serde(default)]
    pub advisors:              BTreeMap<Identity, Identity>,
    /// Manual, signed adjustment to each student's project score.
    #[serde(default)]
    pub point_adjustments:     BTreeMap<Identity, f64>,
    /// Late days a student may use without penalty.
    #[serde(default)]
    pub allowed_late_days:     u32,
    /// Points applied per late day beyond the allowance.
    #[serde(default)]
    pub late_day_penalty_rate: f64,
    /// Component weights.
    pub breakdown:             Breakdown,
    /// Letter cutoffs, highest first.
    pub cutoffs:               Vec<Cutoff>,
    /// Assignment subjects, in course order.
    #[serde(default)]
    pub assignments:           Vec<String>,
    /// The quiz subject, if the course has one.
    #[serde(default)]
    pub quiz:                  Option<String>,
    /// Project iteration subjects; the last one is the final project.
    #[serde(default)]
    pub iterations:            Vec<String>,
    /// Submission deadline of each subject.
    #[serde(default)]
    pub deadlines:             BTreeMap<String, DateTime<Utc>>,
    /// Link to a submission, with `{{course}}`, `{{subject}}`, `{{part}}`,
    /// `{{identity}}` and `{{reference}}` placeholders.
    pub source_url_template:   String,
    /// Reports published at once.
    #[serde(default = "default_concurrency")]
    pub max_concurrency:       usize,
}

impl CourseConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).context("Course configuration is not valid JSON")?;
        config
            .source_template()
            .context("Invalid `source_url_template` in course configuration")?;
        Ok(config)
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read course configuration {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("While loading {}", path.display()))
    }

    /// The parsed submission link template.
    pub fn source_template(&self) -> Result<Template> {
        Ok(Template::parse(&self.source_url_template)?)
    }

    /// Rules for the final-grade engine.
    pub fn policy(&self) -> GradingPolicy {
        GradingPolicy::builder()
            .allowed_late_days(self.allowed_late_days)
            .late_day_penalty_rate(self.late_day_penalty_rate)
            .breakdown(self.breakdown)
            .cutoffs(self.cutoffs.clone())
            .build()
    }

    /// Deadline of `subject`, if one is configured.
    pub fn deadline(&self, subject: &str) -> Option<DateTime<Utc>> {
        self.deadlines.get(subject).copied()
    }

    /// Manual adjustment for `identity`, `0` if none.
    pub fn point_adjustment(&self, identity: &Identity) -> f64 {
        self.point_adjustments.get(identity).copied().unwrap_or(0.0)
    }
}

/// Reads a `usize` from the environment, falling back to `default` when the
/// variable is unset, unparsable or zero.
fn read_usize(env: &str, default: usize) -> usize {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

/// Root directory of the local platform (`GRADEBOOK_ROOT`).
pub fn root_from_env() -> PathBuf {
    std::env::var("GRADEBOOK_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_ROOT))
}

/// Path of the configuration file (`GRADEBOOK_CONFIG`), defaulting to
/// `gradebook.json` under `root`.
pub fn config_path_from_env(root: &Path) -> PathBuf {
    std::env::var("GRADEBOOK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| root.join(DEFAULT_CONFIG_FILE))
}
