mod common;

use std::sync::atomic::AtomicUsize;

use indicatif::ProgressBar;

use common::{question_id, FailingEngine, ScriptedEngine, ShortEngine};
use dpo_creator::generate::{generate_file, GenerateOptions};
use dpo_creator::{
    build_pairs, generate_rejections, ChatTemplate, GeneratedRejection, PipelineError,
    PreferenceCandidate, SamplingParams,
};

fn candidates(n: usize) -> Vec<PreferenceCandidate> {
    (0..n)
        .map(|i| PreferenceCandidate {
            input: format!("question {i}"),
            output: format!("answer {i}"),
        })
        .collect()
}

#[tokio::test]
async fn one_rejection_per_candidate_in_order() {
    for (n, batch) in [(0usize, 4usize), (1, 4), (7, 3), (12, 4), (10, 32)] {
        let engine = ScriptedEngine::default();
        let cands = candidates(n);
        let out = generate_rejections(
            &engine,
            &ChatTemplate::default(),
            &cands,
            batch,
            &SamplingParams::default(),
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(out.rejections.len(), n);
        for (i, r) in out.rejections.iter().enumerate() {
            assert!(r.contains(&format!("{i}")), "slot {i} got {r:?}");
        }

        let sizes = engine.batch_sizes();
        assert_eq!(sizes.len(), n.div_ceil(batch));
        assert!(sizes.iter().all(|&s| s <= batch));
        assert_eq!(sizes.iter().sum::<usize>(), n);
    }
}

#[tokio::test]
async fn only_first_completion_is_used_and_marker_is_stripped() {
    let engine = ScriptedEngine::default();
    let cands = candidates(3);
    let out = generate_rejections(
        &engine,
        &ChatTemplate::default(),
        &cands,
        8,
        &SamplingParams::default(),
        &ProgressBar::hidden(),
    )
    .await
    .unwrap();

    assert_eq!(out.rejections[0], "answer 0");
    assert_eq!(out.rejections[1], "answer 1 but slightly reworded");
    assert_eq!(out.rejections[2], "something unrelated 2");
    assert_eq!(out.marker_misses, 1);
    assert!(out.rejections.iter().all(|r| !r.contains("second sample")));

    let params = engine.params_seen.lock().unwrap()[0].clone();
    assert_eq!(params, SamplingParams::default());
}

#[tokio::test]
async fn prompts_are_rendered_through_the_template() {
    let engine = ScriptedEngine::default();
    let template = ChatTemplate::default();
    let rendered = template.render("question 42");
    assert_eq!(question_id(&rendered), 42);
    assert!(rendered.starts_with("<start_of_turn>user\n"));
    assert!(rendered.ends_with("<start_of_turn>model\n"));

    let out = generate_rejections(
        &engine,
        &template,
        &candidates(43)[42..],
        1,
        &SamplingParams::default(),
        &ProgressBar::hidden(),
    )
    .await
    .unwrap();
    assert_eq!(out.rejections, vec!["something unrelated 42".to_string()]);
}

#[tokio::test]
async fn empty_slot_yields_empty_string() {
    let engine = ShortEngine { drop_last: false };
    let out = generate_rejections(
        &engine,
        &ChatTemplate::default(),
        &candidates(5),
        5,
        &SamplingParams::default(),
        &ProgressBar::hidden(),
    )
    .await
    .unwrap();

    assert_eq!(out.rejections.len(), 5);
    assert_eq!(out.rejections[2], "");
    assert_eq!(out.empty_slots, 1);
}

#[tokio::test]
async fn short_engine_answer_is_a_generation_failure() {
    let engine = ShortEngine { drop_last: true };
    let err = generate_rejections(
        &engine,
        &ChatTemplate::default(),
        &candidates(4),
        4,
        &SamplingParams::default(),
        &ProgressBar::hidden(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
}

#[test]
fn pairs_copy_chosen_verbatim() {
    let cands = vec![PreferenceCandidate {
        input: "q".into(),
        output: "  padded chosen  ".into(),
    }];
    let pairs = build_pairs(&cands, vec!["r".into()]);
    assert_eq!(pairs, vec![GeneratedRejection::new("q", "  padded chosen  ", "r")]);
}

#[tokio::test]
async fn generate_file_writes_same_name_and_drops_incomplete_records() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("rlhf_alpaca.jsonl");
    std::fs::write(
        &src,
        concat!(
            "{\"input\": \"question 2\", \"output\": \"answer 2\"}\n",
            "{\"input\": \"question 3\"}\n",
            "garbage\n",
            "{\"input\": \"question 4\", \"output\": \"\"}\n",
            "{\"input\": \"question 7\", \"output\": \"answer 7\"}\n",
        ),
    )
    .unwrap();
    let out_dir = dir.path().join("dpo_data");

    let engine = ScriptedEngine::default();
    let outcome = generate_file(
        &engine,
        &src,
        &out_dir,
        &GenerateOptions::default(),
        &ProgressBar::hidden(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.written, 2);
    assert_eq!(outcome.dropped, 3);
    assert_eq!(outcome.output_path, out_dir.join("rlhf_alpaca.jsonl"));

    let text = std::fs::read_to_string(&outcome.output_path).unwrap();
    let pairs: Vec<GeneratedRejection> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(pairs[0], GeneratedRejection::new("question 2", "answer 2", "something unrelated 2"));
    assert_eq!(pairs[1].input, "question 7");
}

#[tokio::test]
async fn limit_caps_each_file() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("big.jsonl");
    let body: String = (0..30).map(common::corpus_line).collect();
    std::fs::write(&src, body).unwrap();

    let opts = GenerateOptions {
        limit: Some(10),
        batch_size: 4,
        ..GenerateOptions::default()
    };
    let engine = ScriptedEngine::default();
    let outcome = generate_file(&engine, &src, dir.path().join("out").as_path(), &opts, &ProgressBar::hidden())
        .await
        .unwrap();

    assert_eq!(outcome.written, 10);
    assert_eq!(engine.batch_sizes(), vec![4, 4, 2]);
}

#[tokio::test]
async fn engine_failure_leaves_no_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("rlhf_x.jsonl");
    let body: String = (0..10).map(common::corpus_line).collect();
    std::fs::write(&src, body).unwrap();
    let out_dir = dir.path().join("out");

    let engine = FailingEngine {
        fail_on: 1,
        calls: AtomicUsize::new(0),
    };
    let opts = GenerateOptions {
        batch_size: 4,
        ..GenerateOptions::default()
    };
    let err = generate_file(&engine, &src, &out_dir, &opts, &ProgressBar::hidden())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Generation(_)));
    assert!(!out_dir.join("rlhf_x.jsonl").exists());
}
