use std::fs;
use std::io::Write;
use tempfile::TempDir;

use wikirag_core::chunker::{split, split_source, ChunkingConfig};
use wikirag_core::config::Config;
use wikirag_core::data_loader::FileSource;
use wikirag_core::traits::TextSource;
use wikirag_core::types::{ConversationState, Metric, Role, SourceRecord, SourceText, TopicKey};
use wikirag_core::Error;

fn photosynthesis_paragraph() -> String {
    let sentences = [
        "Photosynthesis is a process used by plants and other organisms to convert light energy into chemical energy.",
        "Most plants, algae and cyanobacteria perform photosynthesis and are called photoautotrophs.",
        "Oxygen is released as a by-product when water molecules are split inside the chloroplasts.",
        "The light reactions capture energy while the Calvin cycle fixes carbon dioxide into sugars.",
    ];
    let mut text = String::new();
    let mut i = 0;
    while text.chars().count() < 1200 {
        if !text.is_empty() { text.push(' '); }
        text.push_str(sentences[i % sentences.len()]);
        i += 1;
    }
    text.chars().take(1200).collect()
}

fn shared_overlap(prev: &str, next: &str) -> usize {
    let a: Vec<char> = prev.chars().collect();
    let b: Vec<char> = next.chars().collect();
    (1..=a.len().min(b.len())).rev().find(|&k| a[a.len() - k..] == b[..k]).unwrap_or(0)
}

#[test]
fn passages_respect_size_and_overlap() {
    let text = photosynthesis_paragraph();
    let passages = split(&[text], 500, 50).expect("split");
    assert!(passages.len() >= 3);
    for p in &passages {
        assert!(p.text.chars().count() <= 500, "passage too long: {}", p.text.chars().count());
        assert!(!p.text.trim().is_empty());
    }
    for pair in passages.windows(2) {
        let overlap = shared_overlap(&pair[0].text, &pair[1].text);
        assert!(overlap >= 50, "overlap {overlap} < 50");
    }
}

#[test]
fn twelve_hundred_chars_make_three_passages() {
    let text = "abcdefghi ".repeat(120);
    assert_eq!(text.chars().count(), 1200);
    let passages = split(&[text], 500, 50).expect("split");
    assert_eq!(passages.len(), 3);
    assert_eq!(passages.iter().map(|p| p.order).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(passages[0].text.chars().count() > 450);
    assert!(passages[1].text.chars().count() > 450);
    assert!(passages[2].text.chars().count() < 400);
}

#[test]
fn short_source_is_one_passage() {
    let passages = split(&["  Short text about leaves.  "], 500, 50).expect("split");
    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].text, "Short text about leaves.");
}

#[test]
fn text_without_whitespace_is_hard_cut_with_exact_overlap() {
    let text = "x".repeat(1200);
    let passages = split(&[text], 500, 50).expect("split");
    assert_eq!(passages.len(), 3);
    assert_eq!(passages[0].text.len(), 500);
    for pair in passages.windows(2) {
        assert!(shared_overlap(&pair[0].text, &pair[1].text) >= 50);
    }
}

#[test]
fn whitespace_run_at_window_end_still_overlaps() {
    let text = format!("{}{}{}", "a".repeat(350), " ".repeat(200), "b".repeat(650));
    let passages = split(&[text], 500, 50).expect("split");
    assert_eq!(passages.len(), 3);
    assert_eq!(passages[0].text, "a".repeat(350));
    assert!(passages[1].text.starts_with(&"a".repeat(50)));
    for p in &passages {
        assert!(p.text.chars().count() <= 500);
    }
    for pair in passages.windows(2) {
        assert!(shared_overlap(&pair[0].text, &pair[1].text) >= 50);
    }
}

#[test]
fn multibyte_text_is_measured_in_characters() {
    let text = "фотосинтез ".repeat(100);
    let passages = split(&[text], 120, 20).expect("split");
    for p in &passages { assert!(p.text.chars().count() <= 120); }
    for pair in passages.windows(2) { assert!(shared_overlap(&pair[0].text, &pair[1].text) >= 20); }
}

#[test]
fn records_keep_source_index_and_global_order() {
    let source = SourceText::Records(vec![
        SourceRecord::titled("A", "first page"),
        SourceRecord::new("   "),
        SourceRecord::titled("B", "second page"),
    ]);
    let passages = split_source(source, &ChunkingConfig::default()).expect("split");
    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].source, 0);
    assert_eq!(passages[1].source, 1);
    assert_eq!(passages[1].order, 1);
}

#[test]
fn blank_source_is_empty_input() {
    let err = split_source(SourceText::Raw("  \n ".into()), &ChunkingConfig::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyInput(_)));
}

#[test]
fn whitespace_only_texts_are_empty_chunk() {
    let err = split(&["\n\n\t"], 500, 50).unwrap_err();
    assert!(matches!(err, Error::EmptyChunk));
}

#[test]
fn topic_key_sanitization() {
    assert_eq!(TopicKey::new("Machine Learning!").expect("key").as_str(), "Machine_Learning");
    assert_eq!(TopicKey::new("  a/b  ").expect("key").as_str(), "ab");
    assert_eq!(TopicKey::new("Photosynthesis").expect("key").as_str(), "Photosynthesis");
    assert_eq!(TopicKey::sanitize("__rust_lang__"), "rust_lang");
    assert!(matches!(TopicKey::new("?!/"), Err(Error::EmptyInput(_))));
}

#[test]
fn colliding_topics_share_a_key() {
    assert_eq!(TopicKey::new("C++").expect("key"), TopicKey::new("C").expect("key"));
}

#[test]
fn metric_scores_rank_closer_vectors_higher() {
    let q = [1.0f32, 0.0];
    let near = [0.9f32, 0.1];
    let far = [0.0f32, 1.0];
    for metric in [Metric::L2, Metric::Cosine] {
        assert!(metric.score(&q, &near) > metric.score(&q, &far), "{metric}");
    }
    assert_eq!("cosine".parse::<Metric>().expect("metric"), Metric::Cosine);
    assert!("manhattan".parse::<Metric>().is_err());
}

#[test]
fn conversation_clear_returns_previous_turns() {
    let mut state = ConversationState::new();
    state.push_exchange("What is ATP?", "An energy carrier.");
    assert_eq!(state.len(), 2);
    assert_eq!(state.turns()[0].role, Role::User);
    let archived = state.clear();
    assert!(state.is_empty());
    assert_eq!(archived.len(), 2);
    assert_eq!(archived.render(), "Human: What is ATP?\nAssistant: An energy carrier.");
}

#[test]
fn settings_defaults_and_overrides() {
    let config = Config::from_toml_str(
        r#"
        [chunking]
        chunk_size = 300

        [index]
        metric = "cosine"

        [llm]
        model = "mistral"
        "#,
    );
    let settings = config.settings().expect("settings");
    assert_eq!(settings.chunking.chunk_size, 300);
    assert_eq!(settings.chunking.chunk_overlap, 50);
    assert_eq!(settings.index.metric, Metric::Cosine);
    assert_eq!(settings.index.cache_dir, "index_cache");
    assert_eq!(settings.retrieval.top_k, 4);
    assert_eq!(settings.llm.model, "mistral");
    assert_eq!(settings.wikipedia.top_k_results, 3);
    let model: String = config.get("llm.model").expect("get");
    assert_eq!(model, "mistral");
}

#[test]
fn settings_reject_bad_chunking() {
    let config = Config::from_toml_str("[chunking]\nchunk_size = 50\nchunk_overlap = 60\n");
    assert!(config.settings().is_err());
}

#[tokio::test]
async fn file_source_reads_sorted_txt_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();
    let mut f = fs::File::create(dir.join("a.txt")).unwrap();
    writeln!(f, "alpha bravo").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();

    let source = FileSource::new(dir);
    let text = source.fetch("anything").await.expect("fetch");
    let records = text.into_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].title.as_deref(), Some("a"));
    assert_eq!(records[1].text, "charlie delta");
}

#[tokio::test]
async fn file_source_missing_dir_is_blank() {
    let tmp = TempDir::new().unwrap();
    let source = FileSource::new(tmp.path().join("nope"));
    let text = source.fetch("x").await.expect("fetch");
    assert!(text.is_blank());
}
