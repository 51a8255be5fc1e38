// Item Pipeline - one input line to one content record

mod validation;

pub use validation::validate_record;

use crate::application::quota::QuotaAccountant;
use crate::application::worker::constants::MIN_SOURCE_CHARS;
use crate::domain::{
    BatchJob, ContentId, ContentRecord, GenerationStep, ItemCheckpoint, ItemInput,
};
use crate::error::AppError;
use crate::port::{
    ContentFetcher, ContentRepository, FetchError, GenerationClient, GenerationContext,
    IdProvider, TimeProvider,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a single item did not produce a published record
///
/// Item errors never fail the job; the worker counts them and moves on.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Invalid input line: {0}")]
    InvalidInput(String),

    #[error("Remote fetch failed: {0}")]
    RemoteFetchFailed(#[from] FetchError),

    #[error("Generation failed at step {step}: {reason}")]
    GenerationFailed {
        step: GenerationStep,
        reason: String,
    },

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Store error: {0}")]
    Store(#[from] AppError),
}

/// Result of one pipeline run
#[derive(Debug)]
pub struct ItemReport {
    /// Record created for this line (draft or published), if creation got that far
    pub record_id: Option<ContentId>,
    /// Tokens recorded while processing this line, successful or not
    pub tokens_used: i64,
    pub result: Result<(), ItemError>,
}

impl ItemReport {
    pub fn is_published(&self) -> bool {
        self.result.is_ok() && self.record_id.is_some()
    }

    /// Checkpoint for the line at `item_index`
    pub fn checkpoint(&self, item_index: i64) -> ItemCheckpoint {
        match (&self.result, &self.record_id) {
            (Ok(()), Some(record_id)) => ItemCheckpoint::completed(item_index, record_id.clone()),
            _ => ItemCheckpoint::failed(item_index),
        }
    }
}

/// Everything the pipeline learned before it stopped
#[derive(Default)]
struct ItemProgress {
    record_id: Option<ContentId>,
    tokens_used: i64,
}

/// Runs the generation steps for one line and gates the result
///
/// Both job types share the steps; source-batch lines fetch the page first and
/// hand its text to the generation context.
pub struct ItemPipeline {
    content_repo: Arc<dyn ContentRepository>,
    generation_client: Arc<dyn GenerationClient>,
    content_fetcher: Arc<dyn ContentFetcher>,
    accountant: Arc<QuotaAccountant>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ItemPipeline {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        generation_client: Arc<dyn GenerationClient>,
        content_fetcher: Arc<dyn ContentFetcher>,
        accountant: Arc<QuotaAccountant>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            content_repo,
            generation_client,
            content_fetcher,
            accountant,
            id_provider,
            time_provider,
        }
    }

    /// Process one input line of `job`
    pub async fn process(&self, job: &BatchJob, line: &str) -> ItemReport {
        let mut progress = ItemProgress::default();
        let result = self.run(job, line, &mut progress).await;
        ItemReport {
            record_id: progress.record_id,
            tokens_used: progress.tokens_used,
            result,
        }
    }

    async fn run(
        &self,
        job: &BatchJob,
        line: &str,
        progress: &mut ItemProgress,
    ) -> Result<(), ItemError> {
        let input = ItemInput::parse(job.job_type, line)
            .map_err(|e| ItemError::InvalidInput(e.to_string()))?;

        let mut context = self.prepare_context(&input).await?;

        let record = ContentRecord::stub(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            job.user_id.clone(),
            Some(job.id.clone()),
            input.keyword.clone(),
            input.source_url.clone(),
        );
        self.content_repo.insert(&record).await?;
        progress.record_id = Some(record.id.clone());

        for step in GenerationStep::PIPELINE {
            let generated = self
                .generation_client
                .generate(step, &context, job.settings())
                .await
                .map_err(|e| ItemError::GenerationFailed {
                    step,
                    reason: e.to_string(),
                })?;

            // Charge before persisting text: the call already cost the user
            self.accountant
                .record_spend(&job.id, &job.user_id, generated.tokens_used)
                .await?;
            let now = self.time_provider.now_millis();
            self.content_repo
                .add_tokens(&record.id, generated.tokens_used, now)
                .await?;
            progress.tokens_used += generated.tokens_used;

            let text = generated.text.trim();
            self.content_repo
                .update_field(&record.id, step.target_field(), text, now)
                .await?;
            context.record(step, text);

            debug!(
                job_id = %job.id,
                record_id = %record.id,
                step = %step,
                tokens = generated.tokens_used,
                "Generation step finished"
            );
        }

        let draft = self
            .content_repo
            .find_by_id(&record.id)
            .await?
            .ok_or_else(|| AppError::content_not_found(&record.id))?;
        validate_record(&draft).map_err(ItemError::ValidationFailed)?;

        // A published record has always been paid for
        self.accountant.consume_article(&job.user_id).await?;
        if let Err(e) = self
            .content_repo
            .publish(&record.id, self.time_provider.now_millis())
            .await
        {
            if let Err(refund) = self.accountant.refund_article(&job.user_id).await {
                warn!(
                    job_id = %job.id,
                    user_id = %job.user_id,
                    error = %refund,
                    "Failed to refund article after publish error"
                );
            }
            return Err(e.into());
        }

        info!(
            job_id = %job.id,
            record_id = %record.id,
            keyword = %input.keyword,
            tokens = progress.tokens_used,
            "Content published"
        );
        Ok(())
    }

    /// Build the generation context, fetching the source page when the line has one
    async fn prepare_context(&self, input: &ItemInput) -> Result<GenerationContext, ItemError> {
        let context = GenerationContext::new(input.keyword.clone());
        let Some(url) = &input.source_url else {
            return Ok(context);
        };

        let text = self.content_fetcher.fetch(url).await?;
        let chars = text.chars().count();
        if chars < MIN_SOURCE_CHARS {
            return Err(FetchError::TooShort {
                url: url.clone(),
                chars,
                min: MIN_SOURCE_CHARS,
            }
            .into());
        }
        Ok(context.with_source(text))
    }
}
