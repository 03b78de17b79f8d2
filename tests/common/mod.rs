#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use dpo_creator::{Embedder, GenerationOutput, InferenceEngine, PipelineError, Result, SamplingParams};

/// Number after `question ` in a rendered prompt.
pub fn question_id(prompt: &str) -> usize {
    let tail = prompt.split("question ").nth(1).unwrap_or("");
    tail.chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

pub fn corpus_line(i: usize) -> String {
    format!("{{\"input\": \"question {i}\", \"output\": \"answer {i}\", \"source\": \"unit\"}}\n")
}

/// Answers deterministically from the question id:
/// - `id % 5 == 0`: repeats the chosen answer after the marker
/// - `id % 5 == 1`: near-copy of the chosen answer, no marker
/// - otherwise: unrelated text after the marker
#[derive(Default)]
pub struct ScriptedEngine {
    pub batches: Mutex<Vec<usize>>,
    pub params_seen: Mutex<Vec<SamplingParams>>,
}

impl ScriptedEngine {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        prompts: &[String],
        params: &SamplingParams,
    ) -> Result<Vec<GenerationOutput>> {
        self.batches.lock().unwrap().push(prompts.len());
        self.params_seen.lock().unwrap().push(params.clone());
        Ok(prompts
            .iter()
            .map(|p| {
                let id = question_id(p);
                let text = match id % 5 {
                    0 => format!("Assistant: answer {id}"),
                    1 => format!("answer {id} but slightly reworded"),
                    _ => format!("User: ...\nAssistant: something unrelated {id}"),
                };
                GenerationOutput {
                    completions: vec![text, "second sample, never used".to_string()],
                }
            })
            .collect())
    }
}

/// Fails on the n-th call (0-based), succeeds with echo output otherwise.
pub struct FailingEngine {
    pub fail_on: usize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl InferenceEngine for FailingEngine {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, prompts: &[String], _: &SamplingParams) -> Result<Vec<GenerationOutput>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on {
            return Err(PipelineError::Generation("CUDA out of memory".into()));
        }
        Ok(prompts.iter().map(|_| GenerationOutput::new("echo")).collect())
    }
}

/// Returns one output fewer than asked, or an empty slot in the middle.
pub struct ShortEngine {
    pub drop_last: bool,
}

#[async_trait]
impl InferenceEngine for ShortEngine {
    fn name(&self) -> &str {
        "short"
    }

    async fn generate(&self, prompts: &[String], _: &SamplingParams) -> Result<Vec<GenerationOutput>> {
        let mut out: Vec<_> = prompts.iter().map(|_| GenerationOutput::new("x")).collect();
        if self.drop_last {
            out.pop();
        } else if let Some(mid) = out.get_mut(prompts.len() / 2) {
            mid.completions.clear();
        }
        Ok(out)
    }
}

/// `[0, 1]` for text mentioning "unrelated", `[1, 0]` for anything else.
/// Text mentioning "boom" is an embedding error.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("boom") {
            return Err(PipelineError::Embedding("model server went away".into()));
        }
        if text.contains("unrelated") {
            Ok(vec![0.0, 2.0])
        } else {
            Ok(vec![4.0, 0.0])
        }
    }
}
