use chrono::{DateTime, Utc};
use lexica::config::Config;
use lexica::indexer::{BuildStage, Indexer};
use lexica::lexical::LexicalIndex;
use lexica::storage::{ArtifactKind, ArtifactRepository, CorpusSnapshot, CorpusStore};
use lexica::LexicaError;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ROWS: &str = r#"{"msg": 0, "conv_id": "c1", "conv_title": "Parsing", "ts": "2024-05-01T10:00:00Z", "role": "user", "text": "how to parse json in python"}
{"msg": 1, "conv_id": "c1", "conv_title": "Parsing", "ts": "2024-05-01T10:01:00Z", "role": "assistant", "text": "use the json module to parse json: ```json.loads(s)```"}
{"msg": 2, "conv_id": "c1", "ts": "2024-05-01T10:02:00Z", "role": "user", "text": "thanks, what about yaml?"}
{"msg": 3, "conv_id": "c2", "ts": "not a timestamp", "role": "user", "text": "rye bread recipe"}
{"msg": 4, "conv_id": "c2", "role": "robot", "text": "beep"}
{"conv_id": "c3", "role": "user", "text": "no id"}
this line is not json
"#;

fn now() -> DateTime<Utc> {
    "2024-06-01T00:00:00Z".parse().unwrap()
}

fn setup() -> (TempDir, Config, ArtifactRepository, CorpusStore) {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = temp.path().join("data");

    let source = temp.path().join("rows.jsonl");
    fs::write(&source, ROWS).unwrap();

    let repo = ArtifactRepository::new(&config.data_dir().unwrap()).unwrap();
    let (store, corpus) = repo.import(&source, None).expect("Failed to import corpus");
    assert_eq!(corpus.len(), 4);
    assert_eq!(corpus.skipped, 3);

    (temp, config, repo, store)
}

#[test]
fn test_malformed_rows_do_not_abort_import() {
    let (_temp, _config, repo, store) = setup();

    assert_eq!(repo.list().unwrap(), vec![store.id().to_string()]);
    assert_eq!(store.id().len(), 10);

    let corpus = store.load_corpus().unwrap();
    let ids: Vec<u32> = corpus.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    // unparseable timestamps keep the row
    assert!(corpus.get(3).unwrap().timestamp().is_none());
    assert!(corpus.get(1).unwrap().has_code);
}

#[test]
fn test_query_before_build_is_not_built() {
    let (_temp, config, _repo, store) = setup();

    let err = CorpusSnapshot::load(&store).unwrap_err();
    assert!(matches!(err, LexicaError::NotBuilt { ref artifact, .. } if artifact == "meta"));

    let indexer = Indexer::new(&config);
    indexer.build(&store, BuildStage::Meta, now()).unwrap();
    let err = CorpusSnapshot::load(&store).unwrap_err();
    assert!(matches!(err, LexicaError::NotBuilt { ref artifact, .. } if artifact == "lexical"));

    indexer.build(&store, BuildStage::Lexical, now()).unwrap();
    let snapshot = CorpusSnapshot::load(&store).expect("lexical and meta are enough to query");
    assert!(snapshot.embeddings.is_none());
    assert!(snapshot.graph.is_none());
    assert!(snapshot.global.is_none());
    assert!(matches!(
        snapshot.require(ArtifactKind::Vectors),
        Err(LexicaError::NotBuilt { .. })
    ));
}

#[test]
fn test_rebuild_produces_identical_artifacts() {
    let (_temp, config, _repo, store) = setup();
    let indexer = Indexer::new(&config);

    indexer.build(&store, BuildStage::All, now()).unwrap();
    let first = store.manifest().unwrap();

    indexer.build(&store, BuildStage::All, now()).unwrap();
    let second = store.manifest().unwrap();

    for kind in ["meta", "lexical", "vectors", "graph", "authority"] {
        assert_eq!(
            first.artifacts[kind].blake3, second.artifacts[kind].blake3,
            "{} changed between identical builds",
            kind
        );
    }

    let mut leftovers = names_in(store.dir());
    let generations = store.dir().join("generations");
    let kept = names_in(&generations);
    assert_eq!(kept.len(), 2, "generations: {:?}", kept);
    for generation in &kept {
        leftovers.extend(names_in(&generations.join(generation)));
    }
    leftovers.retain(|name| name.ends_with(".tmp") || name == ".build.lock");
    assert!(leftovers.is_empty(), "stray files: {:?}", leftovers);
}

fn names_in(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect()
}

#[test]
fn test_graph_stage_uses_stored_vectors() {
    let (_temp, config, _repo, store) = setup();
    let indexer = Indexer::new(&config);

    let reply_only = indexer.build(&store, BuildStage::Graph, now()).unwrap();
    // c1 has three messages, c2 one
    assert_eq!(reply_only.published[0].records, 2);

    indexer.build(&store, BuildStage::Vectors, now()).unwrap();
    let with_topics = indexer.build(&store, BuildStage::Graph, now()).unwrap();
    assert!(with_topics.published[0].records >= 2);

    let graph: lexica::graph::MessageGraph = store.require(ArtifactKind::Graph).unwrap();
    for edge in &graph.edges {
        assert_ne!(edge.src, 3);
        assert_ne!(edge.dst, 3);
    }
}

#[test]
fn test_concurrent_build_is_rejected() {
    let (_temp, config, _repo, store) = setup();
    let indexer = Indexer::new(&config);

    let held = store.lock().unwrap();
    let result = indexer.build(&store, BuildStage::All, now());
    assert!(matches!(result, Err(LexicaError::BuildInProgress { .. })));
    assert!(!store.exists(ArtifactKind::Meta));

    drop(held);
    indexer.build(&store, BuildStage::All, now()).unwrap();
    assert!(store.exists(ArtifactKind::Meta));
}

#[test]
fn test_failed_rebuild_keeps_previous_artifact_set() {
    let (_temp, mut config, _repo, store) = setup();
    Indexer::new(&config)
        .build(&store, BuildStage::All, now())
        .unwrap();
    let before = store.manifest().unwrap();
    let lexical_before: LexicalIndex = store.require(ArtifactKind::Lexical).unwrap();

    config.lexical.k1 = 2.0;
    let rebuilt = LexicalIndex::build(&store.load_corpus().unwrap(), &config.lexical).unwrap();
    {
        let lock = store.lock().unwrap();
        let mut publication = store.begin(&lock).unwrap();
        publication
            .write(ArtifactKind::Lexical, &rebuilt, rebuilt.term_count())
            .unwrap();

        // tuple keys cannot be written as JSON object keys
        let unwritable: BTreeMap<(u32, u32), f64> = [((0, 1), 1.0)].into_iter().collect();
        assert!(publication.write(ArtifactKind::Graph, &unwritable, 1).is_err());
    }

    assert_eq!(store.manifest().unwrap(), before);
    let lexical_after: LexicalIndex = store.require(ArtifactKind::Lexical).unwrap();
    assert_eq!(lexical_after, lexical_before);
    assert_ne!(lexical_after, rebuilt);

    let snapshot = CorpusSnapshot::load(&store).unwrap();
    assert_eq!(snapshot.lexical, lexical_before);
    assert!(snapshot.graph.is_some() && snapshot.global.is_some());
    assert!(!store.dir().join(".build.lock").exists());
}

#[test]
fn test_stale_build_lock_is_reclaimed() {
    let (_temp, config, _repo, store) = setup();

    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    fs::write(
        store.dir().join(".build.lock"),
        format!("pid={} started=2024-01-01T00:00:00Z\n", pid),
    )
    .unwrap();

    Indexer::new(&config)
        .build(&store, BuildStage::All, now())
        .expect("lock of an exited build should be reclaimed");
    assert!(store.exists(ArtifactKind::Authority));
    assert!(!store.dir().join(".build.lock").exists());
}

#[test]
fn test_corrupt_vectors_fail_loudly() {
    let (_temp, config, _repo, store) = setup();
    Indexer::new(&config)
        .build(&store, BuildStage::All, now())
        .unwrap();

    let vectors = store.view().unwrap().path(ArtifactKind::Vectors).unwrap();
    fs::remove_file(&vectors).unwrap();
    fs::write(&vectors, b"garbage").unwrap();
    assert!(CorpusSnapshot::load(&store).is_err());
}

#[test]
fn test_unknown_corpus() {
    let (_temp, _config, repo, _store) = setup();
    assert!(matches!(
        repo.open("0000000000"),
        Err(LexicaError::CorpusNotFound { .. })
    ));
}
