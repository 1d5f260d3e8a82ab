#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The collaboration platform the pipeline drives: file storage, comment
//! ledgers, team rosters and an issue tracker.
//!
//! Retries, throttling and authentication belong to implementations of
//! [`Platform`]; the pipeline treats every call as possibly slow and
//! at-least-once.

use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::{Context, Result, anyhow};
use serde::{Serialize, de::DeserializeOwned};
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    ledger::{FeedbackRecord, SubmissionRecord, decode_comments, encode_comment},
    types::Identity,
    util::slugify,
};

/// Operations the grading pipeline needs from the collaboration platform.
#[allow(async_fn_in_trait)]
pub trait Platform {
    /// Reads a document from the staff file store.
    async fn read_document(&self, path: &str) -> Result<String>;
    /// Creates or replaces a document in the staff file store.
    async fn write_document(&self, path: &str, text: &str) -> Result<()>;
    /// Names of the entries directly under `path`, sorted.
    async fn list_directory(&self, path: &str) -> Result<Vec<String>>;
    /// Appends a record to the ledger of `subject`.
    async fn append_ledger_record(&self, subject: &str, record: &SubmissionRecord) -> Result<()>;
    /// Every record in the ledger of `subject`, in append order.
    async fn read_ledger(&self, subject: &str) -> Result<Vec<SubmissionRecord>>;
    /// Appends a record to the anonymous feedback ledger.
    async fn append_feedback(&self, record: &FeedbackRecord) -> Result<()>;
    /// Every feedback record, in append order.
    async fn read_feedback(&self) -> Result<Vec<FeedbackRecord>>;
    /// Members of `team`.
    async fn list_roster(&self, team: &str) -> Result<Vec<Identity>>;
    /// Whether `repo` already has an issue titled `title`.
    async fn issue_exists(&self, repo: &str, title: &str) -> Result<bool>;
    /// Opens an issue in `repo`.
    async fn create_issue(&self, repo: &str, title: &str, body: &str) -> Result<()>;
}

/// An issue held by [`MemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Issue title.
    pub title: String,
    /// Issue body.
    pub body:  String,
}

/// Everything [`MemoryPlatform`] stores.
#[derive(Debug, Default)]
struct MemoryState {
    /// Documents by path.
    documents: BTreeMap<String, String>,
    /// Ledger records by subject.
    ledgers:   BTreeMap<String, Vec<SubmissionRecord>>,
    /// Anonymous feedback.
    feedback:  Vec<FeedbackRecord>,
    /// Team members by team name.
    rosters:   BTreeMap<String, Vec<Identity>>,
    /// Issues by repository.
    issues:    BTreeMap<String, Vec<Issue>>,
}

/// An in-process platform, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    /// Shared state.
    state: Mutex<MemoryState>,
}

impl MemoryPlatform {
    /// An empty platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state.
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the members of `team`.
    pub fn with_roster<I, M>(self, team: &str, members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Identity>,
    {
        self.state()
            .rosters
            .insert(team.to_string(), members.into_iter().map(Into::into).collect());
        self
    }

    /// Stores a document.
    pub fn with_document(self, path: &str, text: &str) -> Self {
        self.state()
            .documents
            .insert(path.to_string(), text.to_string());
        self
    }

    /// A stored document, if present.
    pub fn document(&self, path: &str) -> Option<String> {
        self.state().documents.get(path).cloned()
    }

    /// Issues opened in `repo`, in creation order.
    pub fn issues(&self, repo: &str) -> Vec<Issue> {
        self.state().issues.get(repo).cloned().unwrap_or_default()
    }

    /// Issues opened across every repository.
    pub fn issue_count(&self) -> usize {
        self.state().issues.values().map(Vec::len).sum()
    }
}

impl Platform for MemoryPlatform {
    async fn read_document(&self, path: &str) -> Result<String> {
        self.document(path)
            .ok_or_else(|| anyhow!("No document at {path}"))
    }

    async fn write_document(&self, path: &str, text: &str) -> Result<()> {
        self.state()
            .documents
            .insert(path.to_string(), text.to_string());
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .state()
            .documents
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        names.dedup();
        Ok(names)
    }

    async fn append_ledger_record(&self, subject: &str, record: &SubmissionRecord) -> Result<()> {
        self.state()
            .ledgers
            .entry(subject.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn read_ledger(&self, subject: &str) -> Result<Vec<SubmissionRecord>> {
        Ok(self.state().ledgers.get(subject).cloned().unwrap_or_default())
    }

    async fn append_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        self.state().feedback.push(record.clone());
        Ok(())
    }

    async fn read_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        Ok(self.state().feedback.clone())
    }

    async fn list_roster(&self, team: &str) -> Result<Vec<Identity>> {
        self.state()
            .rosters
            .get(team)
            .cloned()
            .ok_or_else(|| anyhow!("No team named {team}"))
    }

    async fn issue_exists(&self, repo: &str, title: &str) -> Result<bool> {
        Ok(self
            .state()
            .issues
            .get(repo)
            .is_some_and(|issues| issues.iter().any(|i| i.title == title)))
    }

    async fn create_issue(&self, repo: &str, title: &str, body: &str) -> Result<()> {
        self.state()
            .issues
            .entry(repo.to_string())
            .or_default()
            .push(Issue {
                title: title.to_string(),
                body:  body.to_string(),
            });
        Ok(())
    }
}

/// A platform backed by a local directory:
///
/// * documents live at their path under the root,
/// * `ledger/<subject>.md` holds one fenced JSON comment per record,
/// * `feedback.md` holds the anonymous feedback the same way,
/// * `teams/<team>.txt` lists one member per line (`#` starts a comment),
/// * `issues/<repo>/<NNN>-<slug of title>.md` holds one issue each, numbered
///   in creation order, with the exact title on its first line.
#[derive(Debug, Clone)]
pub struct LocalPlatform {
    /// Directory everything lives under.
    root: PathBuf,
}

impl LocalPlatform {
    /// A platform rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory everything lives under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the ledger file of `subject`.
    fn ledger_path(&self, subject: &str) -> PathBuf {
        self.root.join("ledger").join(format!("{subject}.md"))
    }

    /// Path of the anonymous feedback ledger.
    fn feedback_path(&self) -> PathBuf {
        self.root.join("feedback.md")
    }

    /// Appends `value` as a fenced JSON comment to the file at `path`.
    async fn append_comment<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        Self::ensure_parent(path).await?;
        let comment = encode_comment(value)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Could not open ledger {}", path.display()))?;
        file.write_all(format!("{comment}\n").as_bytes())
            .await
            .with_context(|| format!("Could not append to ledger {}", path.display()))?;
        file.flush().await?;
        Ok(())
    }

    /// Every fenced JSON comment in the file at `path`, none if it is missing.
    async fn read_comments<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        if !fs::try_exists(path)
            .await
            .with_context(|| format!("Could not look for ledger {}", path.display()))?
        {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("Could not read ledger {}", path.display()))?;
        decode_comments(&text).with_context(|| format!("Corrupt ledger {}", path.display()))
    }

    /// Directory holding the issues of `repo`.
    fn issue_dir(&self, repo: &str) -> PathBuf {
        self.root.join("issues").join(repo)
    }

    /// Issue files of `repo`, in creation order.
    async fn issue_files(&self, repo: &str) -> Result<Vec<PathBuf>> {
        let dir = self.issue_dir(repo);
        if !fs::try_exists(&dir)
            .await
            .with_context(|| format!("Could not look for {}", dir.display()))?
        {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("Could not list issues in {}", dir.display()))?;
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Could not list issues in {}", dir.display()))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Creates the parent directory of `path`.
    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        Ok(())
    }
}

impl Platform for LocalPlatform {
    async fn read_document(&self, path: &str) -> Result<String> {
        let path = self.root.join(path);
        fs::read_to_string(&path)
            .await
            .with_context(|| format!("Could not read {}", path.display()))
    }

    async fn write_document(&self, path: &str, text: &str) -> Result<()> {
        let path = self.root.join(path);
        Self::ensure_parent(&path).await?;
        fs::write(&path, text)
            .await
            .with_context(|| format!("Could not write {}", path.display()))
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.root.join(path);
        if !fs::try_exists(&dir)
            .await
            .with_context(|| format!("Could not look for {}", dir.display()))?
        {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("Could not list {}", dir.display()))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Could not list {}", dir.display()))?
        {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    async fn append_ledger_record(&self, subject: &str, record: &SubmissionRecord) -> Result<()> {
        Self::append_comment(&self.ledger_path(subject), record).await
    }

    async fn read_ledger(&self, subject: &str) -> Result<Vec<SubmissionRecord>> {
        Self::read_comments(&self.ledger_path(subject)).await
    }

    async fn append_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        Self::append_comment(&self.feedback_path(), record).await
    }

    async fn read_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        Self::read_comments(&self.feedback_path()).await
    }

    async fn list_roster(&self, team: &str) -> Result<Vec<Identity>> {
        let path = self.root.join("teams").join(format!("{team}.txt"));
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Could not read roster {}", path.display()))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(Identity::from)
            .collect())
    }

    async fn issue_exists(&self, repo: &str, title: &str) -> Result<bool> {
        for path in self.issue_files(repo).await? {
            let text = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Could not read issue {}", path.display()))?;
            let heading = text.lines().next().and_then(|l| l.strip_prefix("# "));
            if heading == Some(title) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn create_issue(&self, repo: &str, title: &str, body: &str) -> Result<()> {
        let dir = self.issue_dir(repo);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Could not create {}", dir.display()))?;

        // Issues are never replaced; a taken number moves on to the next one.
        let mut number = self.issue_files(repo).await?.len() + 1;
        loop {
            let path = dir.join(format!("{number:03}-{}.md", slugify(title)));
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(format!("# {title}\n\n{body}").as_bytes())
                        .await
                        .with_context(|| format!("Could not write issue {}", path.display()))?;
                    file.flush().await?;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => number += 1,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Could not create issue {}", path.display()));
                }
            }
        }
    }
}
