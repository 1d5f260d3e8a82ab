#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::BTreeMap;

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::types::Identity;

/// Seconds in one late day.
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// One submission event; never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(on(String, into), on(Identity, into))]
pub struct SubmissionRecord {
    /// What was submitted, e.g. `assignment-1`.
    pub subject:   String,
    /// Who submitted it.
    pub identity:  Identity,
    /// Version pointer (commit hash) of the submitted work.
    pub reference: String,
    /// When the submission was received.
    pub timestamp: DateTime<Utc>,
    /// Days past the deadline, when a deadline was known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_days: Option<u32>,
}

impl SubmissionRecord {
    /// Returns a copy with late days derived from `deadline`.
    pub fn with_deadline(self, deadline: DateTime<Utc>) -> Self {
        Self {
            late_days: Some(late_days(self.timestamp, deadline)),
            ..self
        }
    }
}

/// Anonymous feedback left alongside a submission. It carries no identity
/// so staff can read it without knowing who wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// What the feedback is about, e.g. `assignment-1`.
    pub subject:  String,
    /// Free text from the student.
    pub feedback: String,
}

/// Whole days (rounded up) between `deadline` and `timestamp`, `0` if on
/// time.
pub fn late_days(timestamp: DateTime<Utc>, deadline: DateTime<Utc>) -> u32 {
    let seconds = (timestamp - deadline).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    let days = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// Append-only store of submission records.
///
/// The current submission for a `(subject, identity)` key is the record with
/// the latest timestamp; among equal timestamps the one appended last wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionLedger {
    /// Records in append order.
    records: Vec<SubmissionRecord>,
}

impl SubmissionLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn append(&mut self, record: SubmissionRecord) {
        self.records.push(record);
    }

    /// Every record, in append order.
    pub fn records(&self) -> &[SubmissionRecord] {
        &self.records
    }

    /// The current submission of `identity` for `subject`.
    pub fn current(&self, subject: &str, identity: &Identity) -> Option<&SubmissionRecord> {
        self.records
            .iter()
            .filter(|r| r.subject == subject && &r.identity == identity)
            .max_by_key(|r| r.timestamp)
    }

    /// The current submission of every identity that submitted `subject`.
    pub fn latest(&self, subject: &str) -> BTreeMap<Identity, &SubmissionRecord> {
        let mut latest: BTreeMap<Identity, &SubmissionRecord> = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.subject == subject) {
            match latest.get(&record.identity) {
                Some(current) if current.timestamp > record.timestamp => {}
                _ => {
                    latest.insert(record.identity.clone(), record);
                }
            }
        }
        latest
    }
}

impl FromIterator<SubmissionRecord> for SubmissionLedger {
    fn from_iter<T: IntoIterator<Item = SubmissionRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Problems reading a ledger written as fenced JSON comments.
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    /// A fenced block did not hold a valid record.
    #[error("ledger block starting on line {line} is not a valid record: {source}")]
    InvalidRecord {
        /// Line of the opening fence.
        line:   usize,
        /// Why decoding failed.
        source: serde_json::Error,
    },
    /// A fenced block was never closed.
    #[error("ledger block starting on line {0} is not terminated")]
    Unterminated(usize),
    /// A record could not be encoded.
    #[error("could not encode ledger record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Opening fence of a ledger comment.
const OPEN_FENCE: &str = "```json";
/// Closing fence of a ledger comment.
const CLOSE_FENCE: &str = "```";

/// Serializes a value as a ledger comment: a fenced, pretty-printed JSON
/// block.
pub fn encode_comment<T: Serialize>(value: &T) -> Result<String, LedgerError> {
    let json = serde_json::to_string_pretty(value)?;
    Ok(format!("{OPEN_FENCE}\n{json}\n{CLOSE_FENCE}\n"))
}

/// Decodes every fenced JSON block in `text`, ignoring prose around them.
pub fn decode_comments<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, LedgerError> {
    let mut values = Vec::new();
    let mut block: Option<(usize, Vec<&str>)> = None;

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if let Some((start, body)) = block.as_mut() {
            if trimmed == CLOSE_FENCE {
                let start = *start;
                let json = body.join("\n");
                block = None;
                let value = serde_json::from_str(&json)
                    .map_err(|source| LedgerError::InvalidRecord { line: start, source })?;
                values.push(value);
            } else {
                body.push(line);
            }
        } else if trimmed == OPEN_FENCE {
            block = Some((idx + 1, Vec::new()));
        }
    }

    match block {
        Some((start, _)) => Err(LedgerError::Unterminated(start)),
        None => Ok(values),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, day, hour, 0, 0).unwrap()
    }

    fn record(identity: &str, reference: &str, timestamp: DateTime<Utc>) -> SubmissionRecord {
        SubmissionRecord::builder()
            .subject("assignment-1")
            .identity(identity)
            .reference(reference)
            .timestamp(timestamp)
            .build()
    }

    #[test]
    fn latest_record_wins_per_identity() {
        let ledger: SubmissionLedger = [
            record("alice", "a1", at(1, 10)),
            record("bob", "b1", at(1, 11)),
            record("alice", "a2", at(2, 9)),
            record("alice", "a0", at(1, 8)),
        ]
        .into_iter()
        .collect();

        let latest = ledger.latest("assignment-1");
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[&Identity::new("alice")].reference, "a2");
        assert_eq!(
            ledger
                .current("assignment-1", &Identity::new("bob"))
                .map(|r| r.reference.as_str()),
            Some("b1")
        );
        assert!(ledger.latest("assignment-2").is_empty());
    }

    #[test]
    fn equal_timestamps_prefer_the_last_append() {
        let ledger: SubmissionLedger = [
            record("alice", "first", at(1, 10)),
            record("alice", "second", at(1, 10)),
        ]
        .into_iter()
        .collect();
        assert_eq!(ledger.latest("assignment-1")[&Identity::new("alice")].reference, "second");
        assert_eq!(
            ledger
                .current("assignment-1", &Identity::new("alice"))
                .map(|r| r.reference.as_str()),
            Some("second")
        );
    }

    #[test]
    fn late_days_round_up() {
        let deadline = at(10, 12);
        assert_eq!(late_days(at(10, 11), deadline), 0);
        assert_eq!(late_days(at(10, 12), deadline), 0);
        assert_eq!(late_days(at(10, 13), deadline), 1);
        assert_eq!(late_days(at(12, 12), deadline), 2);
        assert_eq!(late_days(at(12, 13), deadline), 3);
        assert_eq!(record("a", "r", at(11, 0)).with_deadline(deadline).late_days, Some(1));
    }

    #[test]
    fn comments_decode_between_prose() {
        let first = record("alice", "abc", at(1, 10));
        let second = record("bob", "def", at(1, 11)).with_deadline(at(1, 0));
        let text = format!(
            "Submissions\n\n{}\nsome chatter\n{}",
            encode_comment(&first).unwrap(),
            encode_comment(&second).unwrap()
        );
        assert!(text.contains("  \"subject\": \"assignment-1\""));
        let decoded: Vec<SubmissionRecord> = decode_comments(&text).expect("decode");
        assert_eq!(decoded, vec![first, second]);
    }

    #[test]
    fn broken_blocks_are_reported() {
        assert!(matches!(
            decode_comments::<SubmissionRecord>("```json\n{}\n```\n"),
            Err(LedgerError::InvalidRecord { line: 1, .. })
        ));
        assert!(matches!(
            decode_comments::<SubmissionRecord>("x\n```json\n{"),
            Err(LedgerError::Unterminated(2))
        ));
    }
}
