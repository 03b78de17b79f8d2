//! Batch inference boundary.

use async_trait::async_trait;

use crate::config::SamplingParams;
use crate::error::Result;

mod completions;

pub use completions::CompletionsEngine;

/// Sampled completions for one request slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutput {
    pub completions: Vec<String>,
}

impl GenerationOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            completions: vec![text.into()],
        }
    }

    /// The only completion the pipeline uses. Extra samples are ignored.
    pub fn first(&self) -> Option<&str> {
        self.completions.first().map(String::as_str)
    }
}

/// A batch text generator.
///
/// `generate` receives the whole batch at once and must return one
/// [`GenerationOutput`] per prompt, in prompt order.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompts: &[String],
        params: &SamplingParams,
    ) -> Result<Vec<GenerationOutput>>;
}
