// Generation Client Port
// Abstraction over the third-party generative-text API

use crate::domain::{GenerationStep, JobSettings};
use async_trait::async_trait;
use thiserror::Error;

/// Inputs available to a step: the keyword, optional source text and the
/// outputs of earlier steps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationContext {
    pub keyword: String,
    /// Plain text of the fetched source (source-batch only)
    pub source_text: Option<String>,
    pub title: Option<String>,
    pub seo_title: Option<String>,
    pub meta_description: Option<String>,
}

impl GenerationContext {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source_text: impl Into<String>) -> Self {
        self.source_text = Some(source_text.into());
        self
    }

    /// Make a step's output available to the following steps
    pub fn record(&mut self, step: GenerationStep, text: &str) {
        let text = Some(text.to_string());
        match step {
            GenerationStep::Title => self.title = text,
            GenerationStep::SeoTitle => self.seo_title = text,
            GenerationStep::MetaDescription => self.meta_description = text,
            GenerationStep::Body => {}
        }
    }
}

/// Generated text and what it cost
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub text: String,
    pub tokens_used: i64,
}

/// Generation errors
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Empty response for step {0}")]
    EmptyResponse(GenerationStep),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Generation Client trait
///
/// Implementations:
/// - HttpGenerationClient (infra-http): OpenAI-compatible chat API
/// - MockGenerationClient: scripted outputs for tests
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Run one generation step
    ///
    /// # Errors
    /// Any error aborts the current item only.
    async fn generate(
        &self,
        step: GenerationStep,
        context: &GenerationContext,
        settings: &JobSettings,
    ) -> Result<Generated, GenerationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Scripted generation client
    ///
    /// Outputs may contain `{keyword}`, which is replaced by the context's
    /// keyword. Every call is recorded.
    pub struct MockGenerationClient {
        outputs: HashMap<GenerationStep, String>,
        failing_steps: HashSet<GenerationStep>,
        failing_keywords: HashSet<String>,
        tokens_per_call: i64,
        calls: Mutex<Vec<(GenerationStep, GenerationContext)>>,
    }

    impl Default for MockGenerationClient {
        fn default() -> Self {
            let outputs = HashMap::from([
                (
                    GenerationStep::Title,
                    "The Complete Guide to {keyword}: Tips and Best Practices".to_string(),
                ),
                (
                    GenerationStep::SeoTitle,
                    "{keyword}: A Practical Guide".to_string(),
                ),
                (
                    GenerationStep::MetaDescription,
                    "Learn {keyword} step by step with practical examples.".to_string(),
                ),
                (
                    GenerationStep::Body,
                    "## Introduction\n\n{keyword} explained in depth.\n\n## Summary\n\nDone."
                        .to_string(),
                ),
            ]);
            Self {
                outputs,
                failing_steps: HashSet::new(),
                failing_keywords: HashSet::new(),
                tokens_per_call: 10,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockGenerationClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_output(mut self, step: GenerationStep, text: impl Into<String>) -> Self {
            self.outputs.insert(step, text.into());
            self
        }

        pub fn failing_on(mut self, step: GenerationStep) -> Self {
            self.failing_steps.insert(step);
            self
        }

        pub fn failing_for_keyword(mut self, keyword: impl Into<String>) -> Self {
            self.failing_keywords.insert(keyword.into());
            self
        }

        pub fn with_tokens_per_call(mut self, tokens: i64) -> Self {
            self.tokens_per_call = tokens;
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<(GenerationStep, GenerationContext)> {
            self.calls.lock().unwrap().clone()
        }

        /// Keywords that reached the title step, in call order
        pub fn keywords_started(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(step, _)| *step == GenerationStep::Title)
                .map(|(_, ctx)| ctx.keyword.clone())
                .collect()
        }
    }

    #[async_trait]
    impl GenerationClient for MockGenerationClient {
        async fn generate(
            &self,
            step: GenerationStep,
            context: &GenerationContext,
            _settings: &JobSettings,
        ) -> Result<Generated, GenerationError> {
            self.calls.lock().unwrap().push((step, context.clone()));

            let failing = self.failing_steps.contains(&step)
                || self.failing_keywords.contains(&context.keyword);
            if failing {
                return Err(GenerationError::Api {
                    status: 500,
                    message: format!("mock failure at {}", step),
                });
            }

            let text = self
                .outputs
                .get(&step)
                .map(|t| t.replace("{keyword}", &context.keyword))
                .unwrap_or_default();

            Ok(Generated {
                text,
                tokens_used: self.tokens_per_call,
            })
        }
    }
}
