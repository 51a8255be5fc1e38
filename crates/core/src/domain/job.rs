// Batch Job Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::quota::UserQuota;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Owner of a job, a quota row and content records
pub type UserId = String;

/// Content record ID (UUID v4)
pub type ContentId = String;

/// Job Status
///
/// `pending -> processing -> {completed, failed, cancelled, paused}`,
/// `paused -> pending` on resume. Completed, failed and cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl JobStatus {
    pub const TERMINAL: [JobStatus; 3] =
        [JobStatus::Cancelled, JobStatus::Completed, JobStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Paused => "paused",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// States from which a job may move into `self`.
    ///
    /// Stores use this list for their compare-and-set status writes, so an
    /// external cancel can never be overwritten by a late `completed`.
    pub fn allowed_sources(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Paused => &[JobStatus::Pending, JobStatus::Processing],
            JobStatus::Pending => &[JobStatus::Paused, JobStatus::Processing],
            JobStatus::Completed => &[JobStatus::Processing],
            JobStatus::Failed => &[JobStatus::Pending, JobStatus::Processing],
            JobStatus::Cancelled => &[
                JobStatus::Pending,
                JobStatus::Processing,
                JobStatus::Paused,
            ],
        }
    }

    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        to.allowed_sources().contains(self)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "paused" => Ok(JobStatus::Paused),
            "cancelled" => Ok(JobStatus::Cancelled),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::UnknownStatus {
                kind: "job",
                value: other.to_string(),
            }),
        }
    }
}

/// Job Type - selects the input acquisition step of the item pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    /// Each line is a keyword
    KeywordsBatch,
    /// Each line is `keyword|url`; the url is fetched and rewritten
    SourceBatch,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::KeywordsBatch => "keywords-batch",
            JobType::SourceBatch => "source-batch",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keywords-batch" => Ok(JobType::KeywordsBatch),
            "source-batch" => Ok(JobType::SourceBatch),
            other => Err(DomainError::UnknownJobType(other.to_string())),
        }
    }
}

/// Requested body length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl OutputLength {
    /// Approximate word target handed to the generation client
    pub fn target_words(&self) -> u32 {
        match self {
            OutputLength::Short => 600,
            OutputLength::Medium => 1200,
            OutputLength::Long => 2000,
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_tone() -> String {
    "informative".to_string()
}

/// Per-job generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub length: OutputLength,
    /// Generate a heading outline first and write the body section by section
    #[serde(default)]
    pub outline_mode: bool,
    /// External site the finished records are linked to (publishing is out of scope)
    #[serde(default)]
    pub linked_site_id: Option<String>,
    #[serde(default)]
    pub insert_featured_image: bool,
    #[serde(default)]
    pub insert_inline_images: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            language: default_language(),
            tone: default_tone(),
            length: OutputLength::default(),
            outline_mode: false,
            linked_site_id: None,
            insert_featured_image: false,
            insert_inline_images: false,
        }
    }
}

/// Input lines plus settings, persisted as one JSON column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    pub lines: Vec<String>,
    #[serde(default)]
    pub settings: JobSettings,
}

impl JobData {
    pub fn new(lines: Vec<String>, settings: JobSettings) -> Self {
        Self { lines, settings }
    }
}

/// Result of one processed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Record validated and published
    Completed(ContentId),
    /// Item failed at any step; the job continues
    Failed,
}

/// Progress flushed to the store after every input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCheckpoint {
    /// Index of the line that was just processed
    pub item_index: i64,
    pub outcome: ItemOutcome,
}

impl ItemCheckpoint {
    pub fn completed(item_index: i64, record_id: impl Into<ContentId>) -> Self {
        Self {
            item_index,
            outcome: ItemOutcome::Completed(record_id.into()),
        }
    }

    pub fn failed(item_index: i64) -> Self {
        Self {
            item_index,
            outcome: ItemOutcome::Failed,
        }
    }

    /// The checkpoint value persisted after this line
    pub fn next_index(&self) -> i64 {
        self.item_index + 1
    }
}

/// Batch Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: JobId,
    pub user_id: UserId,
    pub job_type: JobType,
    pub status: JobStatus,

    // Progress
    pub total_items: i64,
    pub completed_items: i64,
    pub failed_items: i64,
    pub current_item_index: i64,

    pub job_data: JobData,
    pub produced_ids: Vec<ContentId>,

    // Quota snapshot and running spend
    pub tokens_at_start: i64,
    pub tokens_used: i64,
    pub articles_limit_at_start: i64,

    pub error_message: Option<String>,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub updated_at: i64,
}

impl BatchJob {
    /// Create a new pending job
    ///
    /// `total_items` is fixed here from the number of input lines and never
    /// changes afterwards.
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        user_id: impl Into<String>,
        job_type: JobType,
        job_data: JobData,
    ) -> Self {
        let total_items = job_data.lines.len() as i64;
        Self {
            id: id.into(),
            user_id: user_id.into(),
            job_type,
            status: JobStatus::Pending,
            total_items,
            completed_items: 0,
            failed_items: 0,
            current_item_index: 0,
            job_data,
            produced_ids: Vec::new(),
            tokens_at_start: 0,
            tokens_used: 0,
            articles_limit_at_start: 0,
            error_message: None,
            created_at,
            started_at: None,
            finished_at: None,
            updated_at: created_at,
        }
    }

    /// Create a test job with deterministic ID and timestamp.
    ///
    /// Uses a simple counter for deterministic test IDs (job-1, job-2, ...).
    /// Timestamps start at 1000 and increment by 1000.
    ///
    /// **Note**: production code injects ID and time via providers.
    pub fn new_test(user_id: impl Into<String>, job_type: JobType, lines: &[&str]) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let job_data = JobData::new(
            lines.iter().map(|l| l.to_string()).collect(),
            JobSettings::default(),
        );
        Self::new(
            format!("job-{}", counter),
            (counter * 1000) as i64,
            user_id,
            job_type,
            job_data,
        )
    }

    /// Record the owner's quota at creation time (reporting only)
    pub fn snapshot_quota(&mut self, quota: &UserQuota) {
        self.tokens_at_start = quota.tokens_remaining;
        self.articles_limit_at_start = quota.article_allowance;
    }

    pub fn settings(&self) -> &JobSettings {
        &self.job_data.settings
    }

    /// Input line at `index`, if any
    pub fn line(&self, index: i64) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.job_data.lines.get(i))
            .map(String::as_str)
    }

    pub fn remaining_items(&self) -> i64 {
        (self.total_items - self.current_item_index).max(0)
    }

    /// `completed_items + failed_items == current_item_index`
    pub fn is_progress_consistent(&self) -> bool {
        self.completed_items + self.failed_items == self.current_item_index
    }

    /// Move to `to`, validating against the state machine.
    ///
    /// `reason` replaces `error_message` when given; otherwise the last reason
    /// is kept for reporting.
    pub fn transition(
        &mut self,
        to: JobStatus,
        now_millis: i64,
        reason: Option<String>,
    ) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        if to == JobStatus::Processing && self.started_at.is_none() {
            self.started_at = Some(now_millis);
        }
        if to.is_terminal() {
            self.finished_at = Some(now_millis);
        }
        if reason.is_some() {
            self.error_message = reason;
        }
        self.updated_at = now_millis;
        Ok(())
    }

    /// Apply one line's checkpoint (counters, checkpoint index, produced id)
    pub fn apply_checkpoint(&mut self, checkpoint: &ItemCheckpoint, now_millis: i64) {
        match &checkpoint.outcome {
            ItemOutcome::Completed(record_id) => {
                self.completed_items += 1;
                self.produced_ids.push(record_id.clone());
            }
            ItemOutcome::Failed => self.failed_items += 1,
        }
        self.current_item_index = checkpoint.next_index();
        self.updated_at = now_millis;
    }
}
