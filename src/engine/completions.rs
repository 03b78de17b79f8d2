//! OpenAI-compatible `/v1/completions` backend (vLLM, TGI, llama.cpp server ...).
//!
//! The whole batch goes out as one request with `prompt` as an array; the
//! server answers with `choices` tagged by `index`, which are regrouped per
//! prompt here.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{GenerationOutput, InferenceEngine};
use crate::config::SamplingParams;
use crate::error::{PipelineError, Result};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a [String],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    repetition_penalty: f32,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    index: usize,
    #[serde(default)]
    text: String,
}

pub struct CompletionsEngine {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl CompletionsEngine {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| PipelineError::Generation(format!("bad API key header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl InferenceEngine for CompletionsEngine {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompts: &[String],
        params: &SamplingParams,
    ) -> Result<Vec<GenerationOutput>> {
        let body = CompletionRequest {
            model: &self.model,
            prompt: prompts,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_new_tokens,
            repetition_penalty: params.repetition_penalty,
            n: params.n,
        };
        debug!("POST {} ({} prompts)", self.url, prompts.len());

        let resp = self.client.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let msg = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Generation(format!("{status}: {msg}")));
        }
        let parsed: CompletionResponse = resp.json().await?;
        Ok(group_choices(parsed.choices, prompts.len(), params.n))
    }
}

/// Choice `index` runs over `prompt * n + sample`; fold them back per prompt
/// in sample order. Slots with no choice come back empty.
fn group_choices(
    mut choices: Vec<CompletionChoice>,
    n_prompts: usize,
    n: u32,
) -> Vec<GenerationOutput> {
    let per_prompt = n.max(1) as usize;
    choices.sort_by_key(|c| c.index);

    let mut outputs = vec![GenerationOutput::default(); n_prompts];
    for choice in choices {
        if let Some(slot) = outputs.get_mut(choice.index / per_prompt) {
            slot.completions.push(choice.text);
        }
    }
    outputs
}
