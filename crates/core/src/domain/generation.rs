// Generation Steps & Token Pricing

use crate::domain::content::ContentField;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One call to the generation client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStep {
    Title,
    SeoTitle,
    MetaDescription,
    Body,
}

impl GenerationStep {
    /// Execution order inside the item pipeline; later steps use earlier outputs
    pub const PIPELINE: [GenerationStep; 4] = [
        GenerationStep::Title,
        GenerationStep::SeoTitle,
        GenerationStep::MetaDescription,
        GenerationStep::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStep::Title => "title",
            GenerationStep::SeoTitle => "seo_title",
            GenerationStep::MetaDescription => "meta_description",
            GenerationStep::Body => "body",
        }
    }

    /// Content field the step's output is persisted to
    pub fn target_field(&self) -> ContentField {
        match self {
            GenerationStep::Title => ContentField::Title,
            GenerationStep::SeoTitle => ContentField::SeoTitle,
            GenerationStep::MetaDescription => ContentField::MetaDescription,
            GenerationStep::Body => ContentField::Body,
        }
    }
}

impl std::fmt::Display for GenerationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step is billed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepRate {
    /// Short metadata fields: flat cost regardless of output size
    Fixed(i64),
    /// Tokens per generated word
    PerWord(f64),
}

/// Token cost = output words x per-step rate x model multiplier.
///
/// Fixed-rate steps ignore the word count but are still scaled by the model.
#[derive(Debug, Clone)]
pub struct TokenPricing {
    rates: HashMap<GenerationStep, StepRate>,
    model_multipliers: HashMap<String, f64>,
    default_multiplier: f64,
}

impl Default for TokenPricing {
    fn default() -> Self {
        let rates = HashMap::from([
            (GenerationStep::Title, StepRate::Fixed(15)),
            (GenerationStep::SeoTitle, StepRate::Fixed(10)),
            (GenerationStep::MetaDescription, StepRate::Fixed(20)),
            (GenerationStep::Body, StepRate::PerWord(1.3)),
        ]);
        let model_multipliers = HashMap::from([
            ("gpt-4o-mini".to_string(), 1.0),
            ("gpt-4.1-mini".to_string(), 1.0),
            ("gpt-4o".to_string(), 4.0),
            ("gpt-4.1".to_string(), 4.0),
            ("claude-3-5-sonnet".to_string(), 4.0),
        ]);
        Self {
            rates,
            model_multipliers,
            default_multiplier: 1.0,
        }
    }
}

impl TokenPricing {
    pub fn with_rate(mut self, step: GenerationStep, rate: StepRate) -> Self {
        self.rates.insert(step, rate);
        self
    }

    pub fn with_model_multiplier(mut self, model: impl Into<String>, multiplier: f64) -> Self {
        self.model_multipliers
            .insert(model.into().to_ascii_lowercase(), multiplier);
        self
    }

    pub fn model_multiplier(&self, model: &str) -> f64 {
        self.model_multipliers
            .get(&model.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.default_multiplier)
    }

    /// Cost of one successful call (never below 1)
    pub fn cost(&self, step: GenerationStep, model: &str, output: &str) -> i64 {
        let base = match self.rates.get(&step) {
            Some(StepRate::Fixed(cost)) => *cost as f64,
            Some(StepRate::PerWord(rate)) => output.split_whitespace().count() as f64 * rate,
            None => 1.0,
        };
        let scaled = (base * self.model_multiplier(model)).round() as i64;
        scaled.max(1)
    }
}
