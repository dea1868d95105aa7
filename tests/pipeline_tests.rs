//! End-to-end pipeline tests against generated PDFs and a scripted backend.

mod common;

use chrono::{SubsecRound, Utc};
use common::{
    Reply, ScriptedBackend, make_pdf, papers_dir, store_with, store_without_generator, write_pdf,
    write_registry,
};
use paper_tree_indexer::document::{Document, PageExtractor};
use paper_tree_indexer::indexer::{IndexOutcome, SkipReason};
use paper_tree_indexer::llm::Role;
use paper_tree_indexer::persistence::{load_record, record_exists};
use paper_tree_indexer::registry::Registry;
use paper_tree_indexer::{PaperEntry, PaperIndexError, Stage};
use std::sync::Arc;
use tempfile::TempDir;

const TREE_RESPONSE: &str = r#"{"id":"root","label":"T","children":[{"id":"s1","label":"Intro","position":{"page":1},"children":[]}]}"#;

#[test]
fn test_extraction_numbers_pages_from_one() {
    let bytes = make_pdf(&["Intro text", "Method text", "Results text"]);
    let extractor = PageExtractor::new(60);

    let pages: Vec<_> = extractor.extract_from_bytes(&bytes, std::path::Path::new("three.pdf")).unwrap().collect();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(pages[0].text.contains("Intro"));
    assert!(pages[2].text.contains("Results"));
}

#[test]
fn test_extraction_respects_page_cap() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("long.pdf");
    std::fs::write(&path, make_pdf(&["one", "two", "three", "four"])).unwrap();

    let document = Document::from_pdf(&path, &PageExtractor::new(2)).unwrap();
    assert_eq!(document.page_count(), 2);
    assert_eq!(document.total_pages, 4);
}

#[tokio::test]
async fn test_build_writes_page_anchored_record() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir, "t.pdf", &["Intro text", "Method text", "Results text"]);
    write_registry(
        &dir,
        r#"{"papers":[{"id":"t","title":"T","file_path":"papers/t.pdf"}]}"#,
    );
    let backend = Arc::new(ScriptedBackend::replying(&[TREE_RESPONSE]));
    let store = store_with(&dir, backend.clone());

    let start = Utc::now().trunc_subsecs(0);
    let outcome = store.build_by_id("t").await.unwrap();
    assert!(matches!(outcome, IndexOutcome::Built(_)));

    let record = load_record(&papers_dir(&dir), "t").unwrap();
    assert_eq!(record.paper_id, "t");
    assert_eq!(record.title, "T");
    assert!(record.built_at >= start);
    assert_eq!(record.tree.id, "root");
    assert_eq!(record.tree.children.len(), 1);
    let intro = &record.tree.children[0];
    assert_eq!(intro.label, "Intro");
    assert_eq!(intro.position.as_ref().map(|p| p.page), Some(1));

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0][0].role, Role::System);
    let user = &requests[0][1].content;
    assert!(user.contains("--- Page 1 ---"));
    assert!(user.contains("--- Page 3 ---"));
}

#[tokio::test]
async fn test_rebuild_replaces_record() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir, "t.pdf", &["Intro text"]);
    write_registry(
        &dir,
        r#"{"papers":[{"id":"t","title":"T","file_path":"papers/t.pdf"}]}"#,
    );
    let second = r#"{"id":"root","label":"T","children":[{"id":"s9","label":"Only","position":{"page":1}}]}"#;
    let backend = Arc::new(ScriptedBackend::replying(&[TREE_RESPONSE, second]));
    let store = store_with(&dir, backend);

    store.build_by_id("t").await.unwrap();
    store.build_by_id("t").await.unwrap();

    let record = load_record(&papers_dir(&dir), "t").unwrap();
    assert!(record.tree.find_by_id("s1").is_none());
    assert_eq!(record.tree.find_by_id("s9").map(|n| n.label.as_str()), Some("Only"));
}

#[tokio::test]
async fn test_upload_with_known_title_reuses_id() {
    let dir = TempDir::new().unwrap();
    write_registry(
        &dir,
        r#"{"papers":[{"id":"attention","title":"Attention Is All You Need","year":2017}]}"#,
    );
    let backend = Arc::new(ScriptedBackend::replying(&[TREE_RESPONSE]));
    let store = store_with(&dir, backend);

    let bytes = make_pdf(&["Scaled dot-product attention"]);
    let upload = store
        .submit_and_build("attention is all you need.pdf", &bytes)
        .await
        .unwrap();

    assert!(upload.submission.reused);
    assert_eq!(upload.submission.entry.id, "attention");
    assert!(matches!(upload.outcome, Ok(IndexOutcome::Built(_))));
    assert!(record_exists(&papers_dir(&dir), "attention"));

    let doc = store.registry().load().unwrap();
    assert_eq!(doc.papers.len(), 1);
    let entry = doc.find_by_title("ATTENTION IS ALL YOU NEED").unwrap();
    assert_eq!(entry.file_path.as_deref(), Some("papers/attention.pdf"));
    assert_eq!(entry.extra.get("year"), Some(&serde_json::json!(2017)));
}

#[tokio::test]
async fn test_upload_new_paper_registers_entry() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new(vec![Reply::Fail("model offline".into())]));
    let store = store_with(&dir, backend);

    let bytes = make_pdf(&["Some text"]);
    let upload = store.submit_and_build("My Paper.pdf", &bytes).await.unwrap();

    assert!(!upload.submission.reused);
    assert_eq!(upload.submission.entry.id, "my_paper");
    assert!(upload.submission.pdf_path.is_file());

    let failure = upload.outcome.unwrap_err();
    assert_eq!(failure.stage, Stage::Generate);
    assert!(!record_exists(&papers_dir(&dir), "my_paper"));

    let registry = Registry::new(store.config());
    let entry = registry.find("my_paper").unwrap();
    assert_eq!(entry.title, "My Paper");
    assert_eq!(entry.extra.get("venue"), Some(&serde_json::json!("Uploaded")));
}

#[tokio::test]
async fn test_batch_continues_past_failures() {
    let dir = TempDir::new().unwrap();
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        write_pdf(&dir, name, &["Body text"]);
    }
    write_registry(
        &dir,
        r#"{"papers":[
            {"id":"a","title":"A","file_path":"papers/a.pdf"},
            {"id":"b","title":"B","file_path":"papers/b.pdf"},
            {"id":"c","title":"C","file_path":"papers/c.pdf"}
        ]}"#,
    );
    let backend = Arc::new(ScriptedBackend::new(vec![
        Reply::Fail("upstream 500".into()),
        Reply::Text("Sorry, I cannot help with that.".into()),
        Reply::Text(TREE_RESPONSE.into()),
    ]));
    let store = store_with(&dir, backend.clone());

    let report = store.build_all().await.unwrap();

    assert_eq!(backend.request_count(), 3);
    assert_eq!(report.built, vec!["c".to_string()]);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].paper_id, "a");
    assert_eq!(report.failed[0].stage, Stage::Generate);
    assert_eq!(report.failed[1].paper_id, "b");
    assert_eq!(report.failed[1].stage, Stage::Parse);

    let dir_path = papers_dir(&dir);
    assert!(!record_exists(&dir_path, "a"));
    assert!(!record_exists(&dir_path, "b"));
    assert!(record_exists(&dir_path, "c"));
}

#[tokio::test]
async fn test_batch_skips_unindexable_entries() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir, "blank.pdf", &["", ""]);
    write_registry(
        &dir,
        r#"{"papers":[
            {"id":"meta","title":"Metadata Only"},
            {"id":"gone","title":"Gone","file_path":"papers/gone.pdf"},
            {"id":"blank","title":"Blank","file_path":"papers/blank.pdf"}
        ]}"#,
    );
    let backend = Arc::new(ScriptedBackend::default());
    let store = store_with(&dir, backend.clone());

    let report = store.build_all().await.unwrap();

    assert!(report.built.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.total(), 3);
    assert_eq!(report.skipped[0], ("meta".to_string(), SkipReason::NoFilePath));
    assert!(matches!(report.skipped[1].1, SkipReason::MissingFile(_)));
    assert_eq!(report.skipped[2], ("blank".to_string(), SkipReason::EmptyDocument));
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn test_noisy_response_is_recovered() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir, "n.pdf", &["Intro text", "Method text"]);
    let entry = PaperEntry::new("n", "Noisy Paper", Some("papers/n.pdf".to_string()));
    let noisy = format!("Here is the tree:\n```json\n{}\n```\nLet me know!", TREE_RESPONSE);
    let backend = Arc::new(ScriptedBackend::new(vec![Reply::Text(noisy)]));
    let store = store_with(&dir, backend);

    let outcome = store.build(&entry).await.unwrap();
    let IndexOutcome::Built(record) = outcome else {
        panic!("expected a built record");
    };
    assert_eq!(record.tree.label, "T");
    assert_eq!(record.title, "Noisy Paper");
    assert!(record.tree.position.is_none());
    assert_eq!(record.tree.node_count(), 2);
}

#[tokio::test]
async fn test_build_without_credential_fails_at_generate() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir, "k.pdf", &["Intro text"]);
    let store = store_without_generator(&dir);
    let entry = PaperEntry::new("k", "Keyless", Some("papers/k.pdf".to_string()));

    let err = store.build(&entry).await.unwrap_err();
    assert!(matches!(err, PaperIndexError::MissingCredential));
    assert_eq!(err.stage(), Stage::Generate);
    assert!(!record_exists(&papers_dir(&dir), "k"));
}

#[tokio::test]
async fn test_stray_children_are_tolerated_in_build() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir, "s.pdf", &["Intro text"]);
    let entry = PaperEntry::new("s", "S", Some("papers/s.pdf".to_string()));
    let reply = r#"{"id":"root","label":"S","children":[{"id":"a","label":"A","position":{"page":1}},"stray",42]} Replace {title} if needed."#;
    let backend = Arc::new(ScriptedBackend::replying(&[reply]));
    let store = store_with(&dir, backend);

    let outcome = store.build(&entry).await.unwrap();
    assert!(matches!(outcome, IndexOutcome::Built(_)));
    let record = load_record(&papers_dir(&dir), "s").unwrap();
    assert_eq!(record.tree.children.len(), 1);
    assert_eq!(record.tree.children[0].id, "a");
}
