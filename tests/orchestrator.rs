mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use adaptive_rag::orchestrator::RetrievalSettings;
use adaptive_rag_core::context::LimitType;
use adaptive_rag_core::index::VectorIndex;
use adaptive_rag_core::models::{ChatMessage, IndexState, Mode, Role};
use adaptive_rag_core::CoreError;

use common::{orchestrator, settings, StubChat, StubEmbedder};

fn text(n: usize) -> Vec<u8> {
    "x".repeat(n).into_bytes()
}

fn history() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("Tell me about the Foo widget"),
        ChatMessage::assistant("The Foo widget is a gadget."),
    ]
}

#[tokio::test]
async fn test_small_upload_stays_full_context() {
    let orch = orchestrator(10_000, StubEmbedder::new(), StubChat::new(), RetrievalSettings::default());
    let outcome = orch.upload("a.txt", &text(4000)).unwrap();
    assert_eq!(outcome.document.token_count, 4000);
    assert_eq!(outcome.total_tokens, 4000);
    assert!(!outcome.mode_switched);
    assert_eq!(orch.current_mode(), Mode::FullContext);
}

#[tokio::test]
async fn test_crossing_upload_reports_switch() {
    let orch = orchestrator(10_000, StubEmbedder::new(), StubChat::new(), RetrievalSettings::default());
    assert!(!orch.upload("a.txt", &text(9000)).unwrap().mode_switched);
    let second = orch.upload("b.txt", &text(1500)).unwrap();
    assert!(second.mode_switched);
    assert_eq!(second.total_tokens, 10_500);
    assert_eq!(orch.current_mode(), Mode::Retrieval);

    // Already above the threshold: no second switch.
    assert!(!orch.upload("c.txt", &text(10)).unwrap().mode_switched);
}

#[tokio::test]
async fn test_full_context_chat_sends_whole_corpus() {
    let embedder = StubEmbedder::new();
    let chat = StubChat::new();
    let orch = orchestrator(10_000, embedder.clone(), chat.clone(), RetrievalSettings::default());
    orch.upload("a.md", b"alpha notes").unwrap();
    orch.upload("b.txt", b"beta notes").unwrap();

    let out = orch.chat("what is alpha?", &history()).await.unwrap();
    assert_eq!(out.mode, Mode::FullContext);
    assert_eq!(out.enhanced_query, None);
    assert_eq!(out.relevant_chunks_count, 0);
    assert!(out.relevant_chunks.is_empty());
    assert_eq!(out.token_count, 21);
    // "alpha notes\n\nbeta notes"
    assert_eq!(out.context_tokens_used, 23);
    assert_eq!(out.context_metrics.context_limit_type, LimitType::DocumentLimit);

    assert!(embedder.batch_sizes().is_empty());
    assert_eq!(chat.rewrite_requests(), 0);

    let sent = chat.answer_requests();
    assert_eq!(sent.len(), 1);
    let messages = &sent[0].messages;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[0].content.contains("Current mode: full_context"));
    assert!(messages[0].content.contains("alpha notes\n\nbeta notes"));
    assert_eq!(messages[3], ChatMessage::user("what is alpha?"));
    assert_eq!(sent[0].model, "gpt-4o");
    assert_eq!(sent[0].max_tokens, 1000);
}

#[tokio::test]
async fn test_empty_corpus_chat_has_no_context() {
    let orch = orchestrator(10_000, StubEmbedder::new(), StubChat::new(), RetrievalSettings::default());
    let out = orch.chat("anything?", &[]).await.unwrap();
    assert_eq!(out.mode, Mode::FullContext);
    assert_eq!(out.context_tokens_used, 0);
    assert_eq!(out.token_count, 0);
}

#[tokio::test]
async fn test_lazy_rebuild_happens_once() {
    let embedder = StubEmbedder::new();
    let orch = orchestrator(1000, embedder.clone(), StubChat::new(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();
    assert_eq!(orch.index_state().await, IndexState::Empty);

    let first = orch.chat("first question", &[]).await.unwrap();
    assert_eq!(first.mode, Mode::Retrieval);
    assert_eq!(orch.index_state().await, IndexState::Populated);
    assert_eq!(orch.index_size().await, 3);

    orch.chat("second question", &[]).await.unwrap();
    // One rebuild batch of three chunks, then one single-text batch per query.
    assert_eq!(embedder.batch_sizes(), vec![3, 1, 1]);
}

#[tokio::test]
async fn test_upload_while_populated_does_not_reembed() {
    let embedder = StubEmbedder::new();
    let orch = orchestrator(1000, embedder.clone(), StubChat::new(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();
    orch.chat("q", &[]).await.unwrap();

    orch.upload("more.txt", &text(800)).unwrap();
    assert_eq!(orch.index_size().await, 3);
    orch.chat("q", &[]).await.unwrap();
    assert_eq!(embedder.batch_sizes(), vec![3, 1, 1]);
}

#[tokio::test]
async fn test_delete_empties_index_and_next_chat_rebuilds() {
    let embedder = StubEmbedder::new();
    let orch = orchestrator(1000, embedder.clone(), StubChat::new(), RetrievalSettings::default());
    let keep = orch.upload("keep.txt", &text(1200)).unwrap();
    let dropped = orch.upload("drop.txt", &text(600)).unwrap();
    orch.chat("q", &[]).await.unwrap();
    assert_eq!(orch.index_size().await, 5);

    orch.remove(&dropped.document.id).await.unwrap();
    assert_eq!(orch.index_state().await, IndexState::Empty);
    assert_eq!(orch.corpus().total_tokens(), 1200);

    let out = orch.chat("q", &[]).await.unwrap();
    assert_eq!(orch.index_size().await, 3);
    assert!(out
        .relevant_chunks
        .iter()
        .all(|c| c.document_name == "keep.txt"));
    assert!(orch.get(&keep.document.id).is_ok());
}

#[tokio::test]
async fn test_remove_unknown_is_not_found() {
    let orch = orchestrator(1000, StubEmbedder::new(), StubChat::new(), RetrievalSettings::default());
    let err = orch.remove("missing").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    assert!(matches!(orch.get("missing"), Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_clear_resets_corpus_and_index() {
    let orch = orchestrator(1000, StubEmbedder::new(), StubChat::new(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();
    orch.chat("q", &[]).await.unwrap();

    orch.clear().await;
    let status = orch.status().await;
    assert_eq!(status.total_documents, 0);
    assert_eq!(status.total_tokens, 0);
    assert_eq!(status.vector_store_size, 0);
    assert_eq!(status.index_state, IndexState::Empty);
    assert_eq!(status.current_mode, Mode::FullContext);
}

#[tokio::test]
async fn test_enhancement_failure_falls_back_to_message() {
    let chat = StubChat::failing_rewrites();
    let orch = orchestrator(1000, StubEmbedder::new(), chat.clone(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();

    let out = orch.chat("and its price?", &history()).await.unwrap();
    assert_eq!(out.enhanced_query.as_deref(), Some("and its price?"));
    assert!(out.response.starts_with("answer"));
    assert_eq!(chat.rewrite_requests(), 1);
}

#[tokio::test]
async fn test_enhanced_query_is_used_for_retrieval() {
    let chat = StubChat::new();
    let orch = orchestrator(1000, StubEmbedder::new(), chat.clone(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();

    let out = orch.chat("and its price?", &history()).await.unwrap();
    assert_eq!(out.enhanced_query.as_deref(), Some("standalone query"));

    // The answer still sees the raw message last.
    let sent = chat.answer_requests();
    let last = sent[0].messages.last().unwrap();
    assert_eq!(last, &ChatMessage::user("and its price?"));
    assert!(sent[0].messages[0].content.contains("Current mode: rag"));
}

#[tokio::test]
async fn test_no_history_skips_enhancement() {
    let chat = StubChat::new();
    let orch = orchestrator(1000, StubEmbedder::new(), chat.clone(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();

    let out = orch.chat("plain question", &[]).await.unwrap();
    assert_eq!(out.enhanced_query.as_deref(), Some("plain question"));
    assert_eq!(chat.rewrite_requests(), 0);
}

#[tokio::test]
async fn test_context_budget_keeps_greedy_prefix() {
    // Three 500-token windows cover 1200 chars; two fit in 1000 tokens.
    let orch = orchestrator(1000, StubEmbedder::new(), StubChat::new(), settings(1000));
    orch.upload("big.txt", &text(1200)).unwrap();

    let out = orch.chat("q", &[]).await.unwrap();
    assert_eq!(out.relevant_chunks_count, 2);
    assert_eq!(out.relevant_chunks[0].chunk_index, 0);
    assert_eq!(out.relevant_chunks[1].chunk_index, 1);
    assert_eq!(out.context_metrics.context_limit_type, LimitType::RetrievalLimit);
    assert_eq!(out.context_metrics.max_context_tokens, 1000);
    assert_eq!(out.context_metrics.context_fill_percentage, 100.0);
}

#[tokio::test]
async fn test_retrieval_ranks_by_similarity() {
    let orch = orchestrator(20, StubEmbedder::new(), StubChat::new(), RetrievalSettings::default());
    orch.upload("apples.txt", "aaaaaaaaaaaa".as_bytes()).unwrap();
    orch.upload("bees.txt", "bbbbbbbbbbbb".as_bytes()).unwrap();

    let out = orch.chat("bbb", &[]).await.unwrap();
    assert_eq!(out.relevant_chunks[0].document_name, "bees.txt");
    assert!(out.relevant_chunks[0].similarity_score > out.relevant_chunks[1].similarity_score);
}

#[tokio::test]
async fn test_concurrent_chats_trigger_single_rebuild() {
    let embedder = StubEmbedder::slow(Duration::from_millis(50));
    let orch = orchestrator(1000, embedder.clone(), StubChat::new(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();

    let (a, b) = tokio::join!(orch.chat("one", &[]), orch.chat("two", &[]));
    a.unwrap();
    b.unwrap();

    let rebuild_batches = embedder.batch_sizes().iter().filter(|n| **n == 3).count();
    assert_eq!(rebuild_batches, 1);
    assert_eq!(orch.index_size().await, 3);
}

#[tokio::test]
async fn test_rebuild_failure_leaves_index_empty() {
    let embedder = StubEmbedder::new();
    embedder.fail.store(true, Ordering::SeqCst);
    let orch = orchestrator(1000, embedder.clone(), StubChat::new(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();

    let err = orch.chat("q", &[]).await.unwrap_err();
    assert!(matches!(err, CoreError::Gateway(ref m) if m.contains("unavailable")));
    assert_eq!(orch.index_state().await, IndexState::Empty);

    embedder.fail.store(false, Ordering::SeqCst);
    orch.chat("q", &[]).await.unwrap();
    assert_eq!(orch.index_state().await, IndexState::Populated);
}

#[tokio::test]
async fn test_rebuild_saves_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("snap").join("index");
    let orch = orchestrator(1000, StubEmbedder::new(), StubChat::new(), RetrievalSettings::default())
        .with_snapshot_path(&base);
    orch.upload("big.txt", &text(1200)).unwrap();
    orch.chat("q", &[]).await.unwrap();

    let mut restored = VectorIndex::new(3);
    assert!(restored.load(&base).unwrap());
    assert_eq!(restored.len(), 3);
    assert!(restored.chunks().all(|c| c.document_name == "big.txt"));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_without_mutation() {
    let orch = orchestrator(1000, StubEmbedder::new(), StubChat::new(), RetrievalSettings::default());
    assert!(matches!(
        orch.upload("sheet.xlsx", b"PK"),
        Err(CoreError::InvalidInput(_))
    ));
    assert!(orch.corpus().is_empty());
    assert!(matches!(
        orch.chat("   ", &[]).await,
        Err(CoreError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_status_and_metrics_follow_mode() {
    let orch = orchestrator(1000, StubEmbedder::new(), StubChat::new(), settings(4000));
    orch.upload("a.txt", &text(250)).unwrap();
    let m = orch.metrics();
    assert_eq!(m.mode, Mode::FullContext);
    assert_eq!(m.max_context_tokens, 1000);
    assert_eq!(m.context_fill_percentage, 25.0);

    orch.upload("b.txt", &text(750)).unwrap();
    let status = orch.status().await;
    assert_eq!(status.total_documents, 2);
    assert_eq!(status.token_threshold, 1000);
    assert_eq!(status.current_mode, Mode::Retrieval);
    assert_eq!(status.context_metrics.max_context_tokens, 4000);
    assert_eq!(status.context_metrics.context_fill_percentage, 25.0);
    assert_eq!(status.index_state, IndexState::Empty);
}

#[tokio::test]
async fn test_blank_upload_is_not_embedded() {
    let embedder = StubEmbedder::new();
    let orch = orchestrator(1000, embedder.clone(), StubChat::new(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();
    let blank = orch.upload("blank.txt", b"").unwrap();
    assert_eq!(blank.document.token_count, 0);

    let out = orch.chat("q", &[]).await.unwrap();
    assert_eq!(out.mode, Mode::Retrieval);
    assert_eq!(orch.index_size().await, 3);
    assert_eq!(embedder.batch_sizes(), vec![3, 1]);
    assert!(out.relevant_chunks.iter().all(|c| c.document_name == "big.txt"));
}

#[tokio::test]
async fn test_ensure_index_follows_the_mode_it_is_given() {
    let embedder = StubEmbedder::new();
    let orch = orchestrator(1000, embedder.clone(), StubChat::new(), RetrievalSettings::default());
    orch.upload("big.txt", &text(1200)).unwrap();

    // A mode captured before the corpus grew does not trigger a rebuild.
    let state = orch.ensure_index(Mode::FullContext).await.unwrap();
    assert_eq!(state, IndexState::Empty);
    assert!(embedder.batch_sizes().is_empty());

    let state = orch.ensure_index(Mode::Retrieval).await.unwrap();
    assert_eq!(state, IndexState::Populated);
    assert_eq!(embedder.batch_sizes(), vec![3]);
}

#[tokio::test]
async fn test_snapshot_failure_does_not_fail_chat() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let orch = orchestrator(1000, StubEmbedder::new(), StubChat::new(), RetrievalSettings::default())
        .with_snapshot_path(blocker.join("index"));
    orch.upload("big.txt", &text(1200)).unwrap();

    orch.chat("q", &[]).await.unwrap();
    assert_eq!(orch.index_state().await, IndexState::Populated);
    assert_eq!(orch.index_size().await, 3);
}
