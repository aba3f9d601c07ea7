//! End-to-end retrieval over a built corpus

use chrono::{DateTime, Utc};
use lexica::config::Config;
use lexica::corpus::Role;
use lexica::indexer::{BuildStage, Indexer};
use lexica::retrieval::{SearchFilters, SearchHit, SearchMode, SearchQuery, Searcher};
use lexica::storage::{ArtifactRepository, CorpusSnapshot, CorpusStore};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const ROWS: &str = r#"{"msg": 0, "conv_id": "c1", "ts": "2024-05-01T10:00:00Z", "role": "user", "text": "how to parse json in python"}
{"msg": 1, "conv_id": "c1", "ts": "2024-05-01T10:00:01Z", "role": "assistant", "text": "use the json module to parse json"}
{"msg": 2, "conv_id": "c2", "ts": "2024-04-02T09:00:00Z", "role": "user", "text": "my tokio runtime panics on shutdown"}
{"msg": 3, "conv_id": "c2", "ts": "2024-04-02T09:01:00Z", "role": "assistant", "text": "drop the runtime outside async context: `rt.shutdown_background()`"}
{"msg": 4, "conv_id": "c2", "ts": "2024-04-02T09:02:00Z", "role": "user", "text": "that fixed the tokio panic, thanks"}
{"msg": 5, "conv_id": "c3", "ts": "2023-01-15T12:00:00Z", "role": "user", "text": "sourdough starter feeding schedule"}
{"msg": 6, "conv_id": "c3", "ts": "2023-01-15T12:05:00Z", "role": "assistant", "text": "feed the starter twice a day with equal flour and water"}
"#;

fn now() -> DateTime<Utc> {
    "2024-06-01T00:00:00Z".parse().unwrap()
}

fn build_corpus(stage: Option<BuildStage>) -> (TempDir, Config, CorpusStore) {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = temp.path().join("data");

    let source = temp.path().join("rows.jsonl");
    fs::write(&source, ROWS).unwrap();
    let repo = ArtifactRepository::new(&config.data_dir().unwrap()).unwrap();
    let (store, _) = repo.import(&source, Some("chat")).unwrap();

    let indexer = Indexer::new(&config);
    match stage {
        Some(stage) => {
            indexer.build(&store, stage, now()).unwrap();
        }
        None => {
            indexer.build(&store, BuildStage::Meta, now()).unwrap();
            indexer.build(&store, BuildStage::Lexical, now()).unwrap();
        }
    }
    (temp, config, store)
}

fn searcher(config: &Config, store: &CorpusStore) -> Searcher {
    let snapshot = CorpusSnapshot::load(store).expect("Failed to load snapshot");
    Searcher::new(snapshot, config.fusion.clone())
}

fn ids(hits: &[SearchHit]) -> Vec<u32> {
    hits.iter().map(|h| h.id).collect()
}

#[test]
fn test_assistant_answer_outranks_question() {
    let (_temp, config, store) = build_corpus(Some(BuildStage::All));
    let hits = searcher(&config, &store)
        .search(&SearchQuery::new("parse json", 10), now())
        .unwrap();

    let rank = |id: u32| hits.iter().position(|h| h.id == id).unwrap();
    assert!(rank(1) < rank(0), "got order {:?}", ids(&hits));

    println!("✓ parse json -> {:?}", ids(&hits));
}

#[test]
fn test_no_candidates_returns_empty() {
    let (_temp, config, store) = build_corpus(None);
    let searcher = searcher(&config, &store);

    assert!(searcher
        .search(&SearchQuery::new("kubernetes", 10), now())
        .unwrap()
        .is_empty());
    assert!(searcher.search(&SearchQuery::new("", 10), now()).unwrap().is_empty());
}

#[test]
fn test_identical_queries_identical_rankings() {
    let (_temp, config, store) = build_corpus(Some(BuildStage::All));
    let a = searcher(&config, &store);
    let b = searcher(&config, &store);
    let query = SearchQuery::new("tokio runtime panic", 5).with_explain(true);

    let first = a.search(&query, now()).unwrap();
    let second = b.search(&query, now()).unwrap();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first[0].explain, second[0].explain);
    assert!(first.len() <= 5);
}

#[test]
fn test_semantic_and_graph_absent_zero_their_signals() {
    let (_temp, config, store) = build_corpus(None);
    let hits = searcher(&config, &store)
        .search(&SearchQuery::new("tokio runtime", 10).with_explain(true), now())
        .unwrap();

    assert!(!hits.is_empty());
    for hit in &hits {
        let signals = hit.explain.as_ref().unwrap();
        assert_eq!(signals.cos, 0.0);
        assert_eq!(signals.ppr, 0.0);
        assert_eq!(signals.pr_global, 0.0);
        assert!(signals.bm25 > 0.0);
    }
}

#[test]
fn test_full_build_populates_every_signal() {
    let (_temp, config, store) = build_corpus(Some(BuildStage::All));
    let hits = searcher(&config, &store)
        .search(&SearchQuery::new("tokio runtime", 10).with_explain(true), now())
        .unwrap();

    let top = hits.iter().find(|h| h.id == 2).unwrap();
    let signals = top.explain.as_ref().unwrap();
    assert!(signals.cos > 0.0);
    assert!(signals.pr_global > 0.0);
    assert!(signals.ppr > 0.0);
    assert!(signals.fresh > 0.0 && signals.fresh < 1.0);
}

#[test]
fn test_modes_and_filters() {
    let (_temp, config, store) = build_corpus(Some(BuildStage::All));
    let searcher = searcher(&config, &store);

    let filters = SearchFilters::parse(Some("assistant"), Some(true), None, None, None).unwrap();
    for mode in [SearchMode::Hybrid, SearchMode::Snippets] {
        let query = SearchQuery::new("runtime", 10)
            .with_mode(mode)
            .with_filters(filters.clone());
        let hits = searcher.search(&query, now()).unwrap();
        assert_eq!(ids(&hits), vec![3], "mode {}", mode);
        assert_eq!(hits[0].role, Role::Assistant);
    }

    let basic = searcher
        .search(
            &SearchQuery::new("runtime", 10)
                .with_mode(SearchMode::Basic)
                .with_filters(filters),
            now(),
        )
        .unwrap();
    assert_eq!(ids(&basic), vec![2, 3]);

    let unfiltered = searcher
        .search(&SearchQuery::new("starter flour", 10), now())
        .unwrap();
    assert_eq!(unfiltered[0].conv_id, "c3");

    let recent = SearchFilters::parse(None, None, Some("2024-01-01"), None, None).unwrap();
    let hits = searcher
        .search(&SearchQuery::new("starter flour", 10).with_filters(recent), now())
        .unwrap();
    assert!(hits.iter().all(|h| h.conv_id != "c3"));
}

#[test]
fn test_conversation_window() {
    let (_temp, _config, store) = build_corpus(None);
    let corpus = store.load_corpus().unwrap();
    let window = |conv: &str, center: Option<u32>, size: usize| -> Vec<u32> {
        corpus
            .conversation_window(conv, center, size)
            .iter()
            .map(|m| m.id)
            .collect()
    };

    assert_eq!(window("c2", None, 15), vec![2, 3, 4]);
    assert_eq!(window("c2", Some(4), 1), vec![3, 4]);
    assert_eq!(window("c2", Some(99), 0), vec![2]);
    assert!(window("nope", None, 15).is_empty());
}

#[test]
fn test_snapshot_survives_rebuild() {
    let (_temp, mut config, store) = build_corpus(Some(BuildStage::All));
    let before = searcher(&config, &store);
    let query = SearchQuery::new("json module", 10).with_explain(true);
    let first = before.search(&query, now()).unwrap();

    config.embedding.dims = 64;
    config.graph.same_topic_min_cos = -1.0;
    Indexer::new(&config)
        .build(&store, BuildStage::All, now())
        .unwrap();

    let again = before.search(&query, now()).unwrap();
    assert_eq!(first, again);
    assert_eq!(before.snapshot().embeddings.as_ref().unwrap().dims(), 1024);
}

#[test]
fn test_parallel_queries_share_snapshot() {
    let (_temp, config, store) = build_corpus(Some(BuildStage::All));
    let searcher = Arc::new(searcher(&config, &store));
    let expected = searcher
        .search(&SearchQuery::new("tokio", 10), now())
        .unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let searcher = Arc::clone(&searcher);
            let expected = &expected;
            scope.spawn(move || {
                let hits = searcher
                    .search(&SearchQuery::new("tokio", 10), now())
                    .unwrap();
                assert_eq!(&hits, expected);
            });
        }
    });
}
