mod common;

use std::sync::Arc;

use common::*;
use qa_agent::config::EmptyBatchPolicy;
use qa_agent::error::{ErrorKind, QaError, StoreError};
use qa_agent::models::{Answer, UploadedFile};
use tempfile::TempDir;

#[tokio::test]
async fn corrupt_file_is_skipped_and_the_rest_ingested() {
    let tmp = TempDir::new().unwrap();
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, Arc::new(EchoModel::default()));

    let files = vec![
        UploadedFile::new("broken.pdf", b"%PDF-1.4 truncated garbage".to_vec()),
        specs_md(),
        style_txt(),
    ];
    let report = agent.ingest(&files).await.unwrap();

    assert_eq!(report.documents_processed, 2);
    assert_eq!(report.status_message, "Success! Processed 2 documents.");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "broken.pdf");
    assert!(report.rebuilt);
    assert!(report.chunks_written >= 2);
}

#[tokio::test]
async fn unsupported_and_invalid_files_are_reported() {
    let tmp = TempDir::new().unwrap();
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, Arc::new(EchoModel::default()));

    let files = vec![
        UploadedFile::new("archive.zip", vec![0x50, 0x4b, 0x03, 0x04]),
        UploadedFile::new("latin1.txt", vec![0x63, 0x61, 0x66, 0xe9]),
        UploadedFile::new("bad.json", "{ nope"),
        shipping_json(),
    ];
    let report = agent.ingest(&files).await.unwrap();

    assert_eq!(report.documents_processed, 1);
    let skipped: Vec<&str> = report.skipped.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skipped, vec!["archive.zip", "latin1.txt", "bad.json"]);
}

#[tokio::test]
async fn answers_are_grounded_in_uploaded_documents() {
    let tmp = TempDir::new().unwrap();
    let model = Arc::new(EchoModel::default());
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, model.clone());

    agent
        .ingest(&[specs_md(), style_txt(), shipping_json()])
        .await
        .unwrap();

    let answer = agent
        .answer_query("Generate test cases for the discount code feature", None)
        .await
        .unwrap();

    let Answer::Generated(table) = answer else {
        panic!("expected a generated answer");
    };
    assert!(table.starts_with("| Test_ID | Feature |"));
    assert!(table.contains("SAVE15"), "table not grounded: {}", table);

    let prompt = model.last_prompt();
    assert!(prompt.contains("Discount code SAVE15 applies 15% off"));
    assert!(prompt.contains("USER REQUEST:\nGenerate test cases for the discount code feature"));
}

#[tokio::test]
async fn single_rule_file_grounds_the_answer() {
    let tmp = TempDir::new().unwrap();
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, Arc::new(EchoModel::default()));

    let report = agent
        .ingest(&[UploadedFile::new(
            "rules.txt",
            "Discount code SAVE15 applies 15% off",
        )])
        .await
        .unwrap();
    assert_eq!(report.documents_processed, 1);

    let Answer::Generated(table) = agent
        .answer_query("What does SAVE15 do?", None)
        .await
        .unwrap()
    else {
        panic!("expected a generated answer");
    };
    assert!(
        table
            .lines()
            .any(|row| row.starts_with("| TC-") && row.contains("15%")),
        "no row mentions 15%: {}",
        table
    );
}

#[tokio::test]
async fn query_without_knowledge_base_does_not_call_model() {
    let tmp = TempDir::new().unwrap();
    let model = Arc::new(EchoModel::default());
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, model.clone());

    let answer = agent.answer_query("anything", None).await.unwrap();
    assert_eq!(answer, Answer::KnowledgeBaseMissing);
    assert_eq!(answer.text(), "Knowledge Base not found. Please build it first.");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn second_ingest_replaces_the_first() {
    let tmp = TempDir::new().unwrap();
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, Arc::new(EchoModel::default()));

    agent.ingest(&[specs_md()]).await.unwrap();
    agent.ingest(&[style_txt()]).await.unwrap();

    let hits = agent
        .knowledge_base()
        .search(&HashEmbedder, "Discount code SAVE15", 10)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.chunk.source == "ui_ux_guide.txt"));

    let status = agent.status().await.unwrap().unwrap();
    assert_eq!(status.provider, "test");
    assert_eq!(status.dims, DIMS);

    assert!(agent.clear().await.unwrap());
    assert!(agent.status().await.unwrap().is_none());
    assert!(!agent.clear().await.unwrap());
}

#[tokio::test]
async fn empty_batch_keeps_previous_knowledge_base() {
    let tmp = TempDir::new().unwrap();
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, Arc::new(EchoModel::default()));

    agent.ingest(&[specs_md()]).await.unwrap();
    let report = agent
        .ingest(&[UploadedFile::new("notes.docx", b"binary".to_vec())])
        .await
        .unwrap();

    assert_eq!(report.status_message, "No documents processed.");
    assert_eq!(report.documents_processed, 0);
    assert!(!report.rebuilt);
    assert!(report.raw_html.is_none());

    let hits = agent
        .knowledge_base()
        .search(&HashEmbedder, "SAVE15", 1)
        .await
        .unwrap();
    assert_eq!(hits[0].chunk.source, "product_specs.md");
}

#[tokio::test]
async fn empty_batch_clears_with_clear_policy() {
    let tmp = TempDir::new().unwrap();
    let model = Arc::new(EchoModel::default());
    let agent = agent_with(&tmp, EmptyBatchPolicy::Clear, model.clone());

    agent.ingest(&[specs_md()]).await.unwrap();
    assert!(agent.knowledge_base().exists().await.unwrap());

    let report = agent.ingest(&[]).await.unwrap();
    assert_eq!(report.status_message, "No documents processed.");
    assert!(!agent.knowledge_base().exists().await.unwrap());

    let answer = agent.answer_query("discount", None).await.unwrap();
    assert_eq!(answer, Answer::KnowledgeBaseMissing);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn last_html_file_is_captured() {
    let tmp = TempDir::new().unwrap();
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, Arc::new(EchoModel::default()));

    let report = agent
        .ingest(&[
            UploadedFile::new("old.html", "<html><body>old page</body></html>"),
            specs_md(),
            checkout_html(),
        ])
        .await
        .unwrap();
    assert_eq!(report.raw_html.as_deref(), Some(CHECKOUT_HTML));
    assert_eq!(report.documents_processed, 3);

    let report = agent.ingest(&[specs_md()]).await.unwrap();
    assert!(report.raw_html.is_none());
}

#[tokio::test]
async fn script_uses_retrieved_rules_when_available() {
    let tmp = TempDir::new().unwrap();
    let model = Arc::new(EchoModel::default());
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, model.clone());

    let script = agent
        .synthesize_script("Verify Pay Now button is green", CHECKOUT_HTML, None)
        .await
        .unwrap();
    assert!(script.contains("```python"));
    assert!(model.last_prompt().contains("RULES: \nHTML:"));

    agent.ingest(&[style_txt(), specs_md()]).await.unwrap();
    agent
        .synthesize_script("Verify Pay Now button is green", CHECKOUT_HTML, None)
        .await
        .unwrap();

    let prompt = model.last_prompt();
    assert!(prompt.contains("The Pay Now button must be green."));
    assert!(prompt.contains("id=\"pay-now\""));
    assert!(prompt.contains("TEST CASE: \"Verify Pay Now button is green\""));
}

#[tokio::test]
async fn model_failure_is_a_tagged_error() {
    let tmp = TempDir::new().unwrap();
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, Arc::new(FailingModel));

    agent.ingest(&[specs_md()]).await.unwrap();
    let err = agent.answer_query("discount", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Model);
    assert!(err.to_string().contains("429"));

    let err = agent
        .synthesize_script("tc", CHECKOUT_HTML, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Model);
}

#[tokio::test]
async fn embedding_failure_aborts_ingest_and_keeps_old_store() {
    let tmp = TempDir::new().unwrap();
    let agent = agent_with(&tmp, EmptyBatchPolicy::Keep, Arc::new(EchoModel::default()));
    agent.ingest(&[specs_md()]).await.unwrap();

    // Same store, but the configured (disabled) embedding backend.
    let config = test_config(&tmp, EmptyBatchPolicy::Keep);
    let disabled = qa_agent::agent::QaAgent::from_config(config).unwrap();
    let err = disabled.ingest(&[style_txt()]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Embedding);

    let hits = agent
        .knowledge_base()
        .search(&HashEmbedder, "SAVE15", 1)
        .await
        .unwrap();
    assert_eq!(hits[0].chunk.source, "product_specs.md");

    // Reading with a different backend is refused.
    let err = disabled
        .answer_query("SAVE15", Some("test-key"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QaError::Store(StoreError::BackendMismatch { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn searches_stay_consistent_during_rebuilds() {
    let tmp = TempDir::new().unwrap();
    let agent = Arc::new(agent_with(
        &tmp,
        EmptyBatchPolicy::Keep,
        Arc::new(EchoModel::default()),
    ));
    agent.ingest(&[specs_md()]).await.unwrap();

    let writer = {
        let agent = agent.clone();
        tokio::spawn(async move {
            for i in 0..40 {
                let file = if i % 2 == 0 { style_txt() } else { specs_md() };
                agent.ingest(&[file]).await.unwrap();
            }
        })
    };

    let mut searches = 0;
    loop {
        let hits = agent
            .knowledge_base()
            .search(&HashEmbedder, "SAVE15 green", 3)
            .await
            .unwrap_or_else(|e| panic!("search failed during rebuild: {}", e));
        assert!(!hits.is_empty());
        searches += 1;
        if writer.is_finished() {
            break;
        }
    }
    writer.await.unwrap();
    assert!(searches > 0);

    let generations = std::fs::read_dir(tmp.path().join("knowledge_base/generations"))
        .unwrap()
        .count();
    assert!(generations <= 2, "{} generations left behind", generations);
}
