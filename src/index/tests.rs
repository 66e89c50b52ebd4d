use super::*;

fn record(id: &str, vector: Vec<f32>, url: &str) -> IndexRecord {
    IndexRecord {
        id: id.to_string(),
        vector,
        payload: RecordPayload {
            text: format!("text for {id}"),
            url: url.to_string(),
            chunk_index: 0,
            metadata: BTreeMap::new(),
        },
    }
}

#[test]
fn ensure_collection_is_idempotent() {
    let index = VectorIndex::new();

    index
        .ensure_collection("docs", 3, Distance::Cosine)
        .expect("first creation should succeed");
    index
        .ensure_collection("docs", 3, Distance::Cosine)
        .expect("re-creation with same dimension is a no-op");
}

#[test]
fn ensure_collection_rejects_dimension_change() {
    let index = VectorIndex::new();
    index
        .ensure_collection("docs", 3, Distance::Cosine)
        .expect("creation should succeed");

    let result = index.ensure_collection("docs", 5, Distance::Cosine);
    assert!(matches!(result, Err(SupportError::ConfigMismatch(_))));
}

#[test]
fn ensure_collection_rejects_zero_dimension() {
    let index = VectorIndex::new();
    let result = index.ensure_collection("docs", 0, Distance::Cosine);
    assert!(matches!(result, Err(SupportError::InvalidArgument(_))));
}

#[test]
fn upsert_replaces_by_id() {
    let index = VectorIndex::new();
    index
        .ensure_collection("docs", 2, Distance::Cosine)
        .expect("creation should succeed");

    index
        .upsert("docs", vec![record("a", vec![1.0, 0.0], "kb://1")])
        .expect("insert should succeed");
    index
        .upsert("docs", vec![record("a", vec![0.0, 1.0], "kb://1")])
        .expect("replace should succeed");

    assert_eq!(index.count("docs").expect("collection exists"), 1);

    let hits = index
        .search("docs", &[0.0, 1.0], 1)
        .expect("search should succeed");
    assert_eq!(hits[0].record.vector, vec![0.0, 1.0]);
}

#[test]
fn upsert_rejects_wrong_dimension() {
    let index = VectorIndex::new();
    index
        .ensure_collection("docs", 2, Distance::Cosine)
        .expect("creation should succeed");

    let result = index.upsert("docs", vec![record("a", vec![1.0, 0.0, 0.5], "kb://1")]);
    assert!(matches!(result, Err(SupportError::ConfigMismatch(_))));
    assert_eq!(index.count("docs").expect("collection exists"), 0);
}

#[test]
fn search_empty_collection_returns_empty() {
    let index = VectorIndex::new();
    index
        .ensure_collection("docs", 2, Distance::Cosine)
        .expect("creation should succeed");

    let hits = index
        .search("docs", &[1.0, 0.0], 5)
        .expect("searching an empty collection is not an error");
    assert!(hits.is_empty());
}

#[test]
fn search_zero_top_k_is_invalid() {
    let index = VectorIndex::new();
    index
        .ensure_collection("docs", 2, Distance::Cosine)
        .expect("creation should succeed");

    let result = index.search("docs", &[1.0, 0.0], 0);
    assert!(matches!(result, Err(SupportError::InvalidArgument(_))));
}

#[test]
fn search_ranks_by_descending_similarity() {
    let index = VectorIndex::new();
    index
        .ensure_collection("docs", 2, Distance::Cosine)
        .expect("creation should succeed");

    index
        .upsert(
            "docs",
            vec![
                record("far", vec![0.0, 1.0], "kb://far"),
                record("close", vec![0.9, 0.1], "kb://close"),
                record("exact", vec![1.0, 0.0], "kb://exact"),
            ],
        )
        .expect("insert should succeed");

    let hits = index
        .search("docs", &[1.0, 0.0], 10)
        .expect("search should succeed");

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].record.id, "exact");
    assert_eq!(hits[1].record.id, "close");
    assert_eq!(hits[2].record.id, "far");
    assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
}

#[test]
fn search_never_exceeds_top_k() {
    let index = VectorIndex::new();
    index
        .ensure_collection("docs", 2, Distance::Cosine)
        .expect("creation should succeed");

    let records = (0..10)
        .map(|i| record(&format!("r{i}"), vec![1.0, i as f32 / 10.0], "kb://n"))
        .collect();
    index.upsert("docs", records).expect("insert should succeed");

    let hits = index
        .search("docs", &[1.0, 0.0], 4)
        .expect("search should succeed");
    assert_eq!(hits.len(), 4);
}

#[test]
fn ties_break_by_insertion_order() {
    let index = VectorIndex::new();
    index
        .ensure_collection("docs", 2, Distance::Cosine)
        .expect("creation should succeed");

    // Identical vectors produce identical scores.
    index
        .upsert(
            "docs",
            vec![
                record("first", vec![1.0, 1.0], "kb://1"),
                record("second", vec![1.0, 1.0], "kb://2"),
                record("third", vec![1.0, 1.0], "kb://3"),
            ],
        )
        .expect("insert should succeed");

    let hits = index
        .search("docs", &[1.0, 1.0], 3)
        .expect("search should succeed");
    let ids: Vec<&str> = hits.iter().map(|h| h.record.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
}

#[test]
fn replaced_record_keeps_insertion_slot() {
    let index = VectorIndex::new();
    index
        .ensure_collection("docs", 2, Distance::Cosine)
        .expect("creation should succeed");

    index
        .upsert(
            "docs",
            vec![
                record("a", vec![1.0, 1.0], "kb://a"),
                record("b", vec![1.0, 1.0], "kb://b"),
            ],
        )
        .expect("insert should succeed");
    // Re-upserting "a" must not move it behind "b" in tie-breaking.
    index
        .upsert("docs", vec![record("a", vec![1.0, 1.0], "kb://a")])
        .expect("replace should succeed");

    let hits = index
        .search("docs", &[1.0, 1.0], 2)
        .expect("search should succeed");
    assert_eq!(hits[0].record.id, "a");
    assert_eq!(hits[1].record.id, "b");
}

#[test]
fn unknown_collection_is_a_config_error() {
    let index = VectorIndex::new();
    assert!(matches!(
        index.search("missing", &[1.0], 1),
        Err(SupportError::ConfigMismatch(_))
    ));
    assert!(matches!(
        index.upsert("missing", vec![]),
        Err(SupportError::ConfigMismatch(_))
    ));
}

#[test]
fn cosine_of_zero_vector_is_zero() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
}

#[test]
fn concurrent_upserts_and_searches() {
    use std::sync::Arc;

    let index = Arc::new(VectorIndex::new());
    index
        .ensure_collection("docs", 2, Distance::Cosine)
        .expect("creation should succeed");

    let writer = {
        let index = Arc::clone(&index);
        std::thread::spawn(move || {
            for i in 0..100 {
                index
                    .upsert(
                        "docs",
                        vec![record(&format!("w{i}"), vec![1.0, 0.5], "kb://w")],
                    )
                    .expect("upsert should succeed");
            }
        })
    };

    let reader = {
        let index = Arc::clone(&index);
        std::thread::spawn(move || {
            for _ in 0..100 {
                index
                    .search("docs", &[1.0, 0.0], 3)
                    .expect("search should succeed");
            }
        })
    };

    writer.join().expect("writer thread should finish");
    reader.join().expect("reader thread should finish");
    assert_eq!(index.count("docs").expect("collection exists"), 100);
}
