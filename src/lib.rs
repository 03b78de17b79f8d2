//! Preference-pair (DPO) dataset builder.
//!
//! Three offline stages, one binary each:
//! - `split_corpus`: shuffle each JSONL file and cut it into SFT / RLHF / test slices
//! - `gen_rejections`: sample a "rejected" answer for every RLHF prompt
//! - `filter_pairs`: drop pairs whose chosen and rejected answers are near-duplicates
//!
//! The inference engine and the embedding model sit behind the
//! [`InferenceEngine`] and [`Embedder`] traits.

pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod filter;
pub mod generate;
pub mod jsonl;
pub mod logging;
pub mod progress;
pub mod split;
pub mod stats;
pub mod template;

pub use config::{SamplingParams, SplitRatios};
pub use embed::{cosine_similarity, normalize_l2, ApiEmbedder, Embedder};
pub use engine::{CompletionsEngine, GenerationOutput, InferenceEngine};
pub use error::{PipelineError, Result};
pub use filter::{classify_pair, filter_dir, filter_pairs, FilterVerdict};
pub use generate::{
    build_pairs, generate_dir, generate_rejections, GeneratedRejection, PreferenceCandidate,
};
pub use split::{split_dir, split_records, CorpusSplit};
pub use stats::{FileStats, RunStats};
pub use template::ChatTemplate;
