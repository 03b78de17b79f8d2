//! Fixed pipeline constants and the small parameter structs built from them.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Seed used for both shuffling (split) and down-sampling (`--limit-data`).
pub const DEFAULT_SEED: u64 = 42;

pub const DEFAULT_SPLIT_RATIOS: SplitRatios = SplitRatios {
    sft: 0.60,
    pref: 0.38,
    test: 0.02,
};

// Output name prefixes for the three split stages
pub const SFT_PREFIX: &str = "sft_";
pub const PREF_PREFIX: &str = "rlhf_";
pub const TEST_PREFIX: &str = "test_";

pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_MAX_SIMILARITY: f32 = 0.85;

pub const DEFAULT_BASE_MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";
pub const DEFAULT_COMPLETIONS_URL: &str = "http://localhost:8000/v1/completions";
pub const DEFAULT_EMBEDDING_MODEL: &str = "whaleloops/phrase-bert";
pub const DEFAULT_EMBEDDINGS_URL: &str = "http://localhost:8080/v1/embeddings";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const STATS_FILE: &str = "filter_stats.json";
pub const META_FILE: &str = "meta.json";
pub const JSONL_EXT: &str = "jsonl";

/// Ratio configuration for the SFT / preference / test cut.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub sft: f64,
    pub pref: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        DEFAULT_SPLIT_RATIOS
    }
}

impl SplitRatios {
    /// Reject negative ratios and ratios that do not sum to 1.0 (within 1e-3).
    pub fn validated(self) -> Result<Self> {
        for (name, r) in [("sft", self.sft), ("pref", self.pref), ("test", self.test)] {
            if !(0.0..=1.0).contains(&r) {
                return Err(PipelineError::InvalidRatios(format!(
                    "{name} ratio {r} is outside [0, 1]"
                )));
            }
        }
        let sum = self.sft + self.pref + self.test;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(PipelineError::InvalidRatios(format!(
                "sft + pref + test must sum to 1. Got: {} + {} + {} = {}",
                self.sft, self.pref, self.test, sum
            )));
        }
        Ok(self)
    }
}

/// Sampling configuration sent with every generation batch.
///
/// `n` is pinned to 1: only the first completion of each slot is ever used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_new_tokens: u32,
    pub repetition_penalty: f32,
    pub n: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.2,
            top_p: 0.9,
            max_new_tokens: 256,
            repetition_penalty: 1.2,
            n: 1,
        }
    }
}
