//! Integration tests for the RAG exchange pipeline
//!
//! Exercises a full exchange against in-process embedder, index and
//! generation backends, without network access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use ragbuddy::{
    cli::config::{PersonaConfig, ZeroMatchPolicy},
    embedding::{EmbeddingBackend, EmbeddingEngine, EmbeddingVector},
    generation::{GenerationBackend, GenerationOptions, Generator},
    rag::{ExchangeOptions, GenerationRequest, RAGPipeline, RetrievalEngine},
    session::{Role, SessionState},
    upload::UploadContext,
    vector_db::{MatchMetadata, RetrievalMatch, VectorIndex},
    RagError, Result,
};

const DIM: usize = 4;

/// How the test embedder responds
#[derive(Debug, Clone, Copy)]
enum EmbedMode {
    Ok,
    Down,
    Stalled,
}

struct FixedEmbedder {
    len: usize,
    mode: EmbedMode,
}

impl FixedEmbedder {
    fn ok(len: usize) -> Self {
        Self {
            len,
            mode: EmbedMode::Ok,
        }
    }

    fn with_mode(mode: EmbedMode) -> Self {
        Self { len: DIM, mode }
    }
}

#[async_trait]
impl EmbeddingBackend for FixedEmbedder {
    fn model(&self) -> &str {
        "fixed-embedder"
    }

    async fn embed(&self, _text: &str, _dimension: usize) -> Result<EmbeddingVector> {
        match self.mode {
            EmbedMode::Ok => Ok(vec![0.25; self.len]),
            EmbedMode::Down => Err(RagError::EmbeddingUnavailable("HTTP 503".to_string())),
            EmbedMode::Stalled => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(vec![0.25; self.len])
            }
        }
    }
}

struct FixedIndex {
    matches: Vec<RetrievalMatch>,
    dimension: usize,
    down: bool,
    queries: AtomicUsize,
}

impl FixedIndex {
    fn new(matches: Vec<RetrievalMatch>) -> Self {
        Self {
            matches,
            dimension: DIM,
            down: false,
            queries: AtomicUsize::new(0),
        }
    }

    fn down() -> Self {
        Self {
            down: true,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl VectorIndex for FixedIndex {
    fn name(&self) -> &str {
        "fixed-index"
    }

    async fn dimension(&self) -> Result<usize> {
        Ok(self.dimension)
    }

    async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.down {
            return Err(RagError::RetrievalUnavailable("connection refused".to_string()));
        }
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }
}

/// What the generation backend was asked
#[derive(Debug, Clone)]
struct SeenRequest {
    model: String,
    text: String,
    history_len: usize,
    roles: Vec<Role>,
    has_attachment: bool,
}

struct RecordingBackend {
    available: Vec<&'static str>,
    /// Calls left that fail with GenerationUnavailable
    failures: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
}

impl RecordingBackend {
    fn new(available: Vec<&'static str>) -> Self {
        Self {
            available,
            failures: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing(times: usize) -> Self {
        Self {
            failures: AtomicUsize::new(times),
            ..Self::new(vec!["gemini-2.5-flash"])
        }
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn supports_system_instruction(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerationRequest,
        _options: GenerationOptions,
    ) -> Result<String> {
        if !self.available.contains(&model) {
            return Err(RagError::ModelUnavailable {
                model: model.to_string(),
                reason: "404 NOT_FOUND".to_string(),
            });
        }

        self.seen.lock().unwrap().push(SeenRequest {
            model: model.to_string(),
            text: request.full_text(),
            history_len: request.history().len(),
            roles: request.contents().iter().map(|c| c.role()).collect(),
            has_attachment: request.attachment().is_some(),
        });

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RagError::GenerationUnavailable("HTTP 500".to_string()));
        }
        Ok("이차 공기량을 늘리십시오.".to_string())
    }
}

fn passage(id: &str, score: f32, source: &str, page: i64) -> RetrievalMatch {
    RetrievalMatch::new(
        id,
        score,
        MatchMetadata {
            source: source.to_string(),
            page,
            text: format!("{} page {} text", source, page),
        },
    )
}

struct Harness {
    pipeline: RAGPipeline,
    index: Arc<FixedIndex>,
    backend: Arc<RecordingBackend>,
}

fn harness(
    embedder: FixedEmbedder,
    index: FixedIndex,
    backend: RecordingBackend,
    models: &[&str],
    options: ExchangeOptions,
) -> Harness {
    let index = Arc::new(index);
    let backend = Arc::new(backend);

    let generator = Generator::new(
        backend.clone(),
        models.iter().map(|m| m.to_string()).collect(),
        GenerationOptions {
            temperature: 0.2,
            live_search: false,
        },
    )
    .unwrap();

    let pipeline = RAGPipeline::new(
        EmbeddingEngine::new(Arc::new(embedder), DIM),
        RetrievalEngine::new(index.clone(), DIM),
        generator,
        &PersonaConfig::default(),
        options,
    );

    Harness {
        pipeline,
        index,
        backend,
    }
}

fn simple(matches: Vec<RetrievalMatch>) -> Harness {
    harness(
        FixedEmbedder::ok(DIM),
        FixedIndex::new(matches),
        RecordingBackend::new(vec!["gemini-2.5-flash"]),
        &["gemini-2.5-flash"],
        ExchangeOptions::default(),
    )
}

#[tokio::test]
async fn test_duplicate_sources_cited_once() {
    let h = simple(vec![
        passage("1", 0.91, "manual_a", 12),
        passage("2", 0.88, "manual_a", 12),
        passage("3", 0.75, "manual_b", 3),
    ]);
    let mut session = SessionState::new();

    let answer = assert_ok!(
        h.pipeline
            .ask(&mut session, "f-CaO가 높은 이유는?", &CancellationToken::new())
            .await
    );

    let heading = PersonaConfig::default().sources_heading;
    assert!(answer.text.ends_with(&format!(
        "{}\n- manual_a (P.12)\n- manual_b (P.3)",
        heading
    )));
    assert_eq!(answer.text.matches("- manual_a (P.12)").count(), 1);
    assert_eq!(answer.citations.len(), 2);
    assert_eq!(answer.match_count, 3);
    assert_eq!(answer.model.as_deref(), Some("gemini-2.5-flash"));

    let turns = session.log().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role(), Role::Assistant);
    assert_eq!(turns[1].text(), answer.text);

    let seen = h.backend.seen();
    assert!(seen[0].text.contains("manual_a page 12 text"));
    assert!(seen[0].text.contains("f-CaO가 높은 이유는?"));
}

#[tokio::test]
async fn test_zero_matches_proceeds_without_citations() {
    let h = simple(Vec::new());
    let mut session = SessionState::new();

    let answer = assert_ok!(
        h.pipeline
            .ask(&mut session, "kiln shell temperature", &CancellationToken::new())
            .await
    );

    assert_eq!(answer.text, "이차 공기량을 늘리십시오.");
    assert!(answer.citations.is_empty());
    assert_eq!(answer.match_count, 0);
    assert_eq!(h.backend.seen().len(), 1);
}

#[tokio::test]
async fn test_short_circuit_policy_skips_generation() {
    let options = ExchangeOptions {
        zero_match_policy: ZeroMatchPolicy::ShortCircuit,
        ..ExchangeOptions::default()
    };
    let h = harness(
        FixedEmbedder::ok(DIM),
        FixedIndex::new(Vec::new()),
        RecordingBackend::new(vec!["gemini-2.5-flash"]),
        &["gemini-2.5-flash"],
        options.clone(),
    );
    let mut session = SessionState::new();

    let answer = assert_ok!(
        h.pipeline
            .ask(&mut session, "unrelated", &CancellationToken::new())
            .await
    );

    assert_eq!(answer.text, options.no_match_message);
    assert!(answer.model.is_none());
    assert!(h.backend.seen().is_empty());
    assert_eq!(session.log().len(), 2);
}

#[tokio::test]
async fn test_short_circuit_policy_still_answers_about_upload() {
    let options = ExchangeOptions {
        zero_match_policy: ZeroMatchPolicy::ShortCircuit,
        ..ExchangeOptions::default()
    };
    let h = harness(
        FixedEmbedder::ok(DIM),
        FixedIndex::new(Vec::new()),
        RecordingBackend::new(vec!["gemini-2.5-flash"]),
        &["gemini-2.5-flash"],
        options,
    );
    let mut session = SessionState::new();
    session.attach(UploadContext::from_bytes("kiln.csv", b"a,b\n1,2\n"));

    let answer = assert_ok!(
        h.pipeline
            .ask(&mut session, "explain this data", &CancellationToken::new())
            .await
    );
    assert!(answer.model.is_some());
    assert_eq!(h.backend.seen().len(), 1);
}

#[tokio::test]
async fn test_generation_failure_keeps_only_user_turn() {
    let h = harness(
        FixedEmbedder::ok(DIM),
        FixedIndex::new(vec![passage("1", 0.9, "manual_a", 1)]),
        RecordingBackend::failing(1),
        &["gemini-2.5-flash"],
        ExchangeOptions::default(),
    );
    let mut session = SessionState::new();

    let err = assert_err!(
        h.pipeline
            .ask(&mut session, "why is clinker dusty?", &CancellationToken::new())
            .await
    );

    assert!(matches!(err, RagError::GenerationUnavailable(_)));
    assert_eq!(session.log().len(), 1);
    assert_eq!(session.log().turns()[0].role(), Role::User);
    assert_eq!(session.exchange_count(), 1);
    assert_eq!(session.failure_count(), 1);
}

#[tokio::test]
async fn test_wrong_embedding_length_never_reaches_index() {
    let h = harness(
        FixedEmbedder::ok(DIM - 1),
        FixedIndex::new(vec![passage("1", 0.9, "manual_a", 1)]),
        RecordingBackend::new(vec!["gemini-2.5-flash"]),
        &["gemini-2.5-flash"],
        ExchangeOptions::default(),
    );
    let mut session = SessionState::new();

    let err = assert_err!(
        h.pipeline
            .ask(&mut session, "question", &CancellationToken::new())
            .await
    );

    assert!(matches!(
        err,
        RagError::DimensionMismatch {
            expected: DIM,
            actual: 3
        }
    ));
    assert_eq!(h.index.queries.load(Ordering::SeqCst), 0);
    assert!(h.backend.seen().is_empty());
}

#[tokio::test]
async fn test_verify_compatibility() {
    let h = simple(Vec::new());
    assert_eq!(assert_ok!(h.pipeline.verify_compatibility().await), DIM);

    let mut index = FixedIndex::new(Vec::new());
    index.dimension = 3072;
    let h = harness(
        FixedEmbedder::ok(DIM),
        index,
        RecordingBackend::new(vec!["gemini-2.5-flash"]),
        &["gemini-2.5-flash"],
        ExchangeOptions::default(),
    );

    let err = assert_err!(h.pipeline.verify_compatibility().await);
    assert!(matches!(
        err,
        RagError::DimensionMismatch {
            expected: 3072,
            actual: DIM
        }
    ));
}

#[tokio::test]
async fn test_csv_upload_summary_reaches_model() {
    let mut csv = String::from("temp,o2,co,nox,feed\n");
    for i in 0..100 {
        csv.push_str(&format!("{},{},{},{},{}\n", 1400 + i, 2, 100, 500, 300));
    }

    let h = simple(vec![passage("1", 0.8, "manual_a", 4)]);
    let mut session = SessionState::new();
    session.attach(UploadContext::from_bytes("kiln.csv", csv.as_bytes()));

    assert_ok!(
        h.pipeline
            .ask(&mut session, "이 데이터를 해석해 주세요", &CancellationToken::new())
            .await
    );

    let seen = h.backend.seen();
    assert!(seen[0].text.contains("Rows: 100, Columns: 5"));
    assert!(!seen[0].has_attachment);
}

#[tokio::test]
async fn test_follow_up_sees_history() {
    let h = simple(vec![passage("1", 0.8, "manual_a", 4)]);
    let mut session = SessionState::new();
    let cancel = CancellationToken::new();

    assert_ok!(h.pipeline.ask(&mut session, "first question", &cancel).await);
    assert_ok!(h.pipeline.ask(&mut session, "and why?", &cancel).await);

    let seen = h.backend.seen();
    assert_eq!(seen[0].history_len, 0);
    assert_eq!(seen[1].history_len, 2);
    assert!(seen[1].text.contains("and why?"));
    assert_eq!(session.log().len(), 4);
}

#[tokio::test]
async fn test_fallback_model_recorded() {
    let h = harness(
        FixedEmbedder::ok(DIM),
        FixedIndex::new(vec![passage("1", 0.8, "manual_a", 4)]),
        RecordingBackend::new(vec!["gemini-2.5-flash"]),
        &["gemini-2.5-pro", "gemini-2.5-flash"],
        ExchangeOptions::default(),
    );
    let mut session = SessionState::new();

    let answer = assert_ok!(
        h.pipeline
            .ask(&mut session, "question", &CancellationToken::new())
            .await
    );
    assert_eq!(answer.model.as_deref(), Some("gemini-2.5-flash"));
    assert_eq!(h.backend.seen()[0].model, "gemini-2.5-flash");
}

#[tokio::test]
async fn test_cancelled_exchange_records_failure() {
    let h = simple(vec![passage("1", 0.8, "manual_a", 4)]);
    let mut session = SessionState::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = assert_err!(h.pipeline.ask(&mut session, "question", &cancel).await);

    assert!(matches!(err, RagError::Cancelled { .. }));
    assert_eq!(session.log().len(), 1);
    assert_eq!(session.failure_count(), 1);
    assert!(h.backend.seen().is_empty());
}

#[tokio::test]
async fn test_retry_after_failure_sends_alternating_history() {
    let h = harness(
        FixedEmbedder::ok(DIM),
        FixedIndex::new(vec![passage("1", 0.9, "manual_a", 1)]),
        RecordingBackend::failing(1),
        &["gemini-2.5-flash"],
        ExchangeOptions::default(),
    );
    let mut session = SessionState::new();
    let cancel = CancellationToken::new();

    assert_err!(h.pipeline.ask(&mut session, "q1", &cancel).await);
    assert_ok!(h.pipeline.ask(&mut session, "q1", &cancel).await);

    let seen = h.backend.seen();
    assert_eq!(seen[1].roles, vec![Role::User]);
    assert_eq!(seen[1].history_len, 0);

    // the failed turn stays in the log
    assert_eq!(session.log().len(), 3);

    assert_ok!(h.pipeline.ask(&mut session, "q2", &cancel).await);
    let seen = h.backend.seen();
    assert_eq!(
        seen[2].roles,
        vec![Role::User, Role::Assistant, Role::User]
    );
}

/// Upstream failure before generation: abort, user turn only, model never called
async fn assert_aborted_before_generation(h: Harness, is_expected: fn(&RagError) -> bool) {
    let mut session = SessionState::new();

    let err = assert_err!(
        h.pipeline
            .ask(&mut session, "clinker quality", &CancellationToken::new())
            .await
    );

    assert!(is_expected(&err), "unexpected error: {:?}", err);
    assert_eq!(session.log().len(), 1);
    assert_eq!(session.log().turns()[0].role(), Role::User);
    assert_eq!(session.failure_count(), 1);
    assert!(h.backend.seen().is_empty());
}

#[tokio::test]
async fn test_embedding_failure_aborts_exchange() {
    let h = harness(
        FixedEmbedder::with_mode(EmbedMode::Down),
        FixedIndex::new(vec![passage("1", 0.9, "manual_a", 1)]),
        RecordingBackend::new(vec!["gemini-2.5-flash"]),
        &["gemini-2.5-flash"],
        ExchangeOptions::default(),
    );
    let index = h.index.clone();

    assert_aborted_before_generation(h, |e| matches!(e, RagError::EmbeddingUnavailable(_))).await;
    assert_eq!(index.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retrieval_failure_aborts_exchange() {
    let h = harness(
        FixedEmbedder::ok(DIM),
        FixedIndex::down(),
        RecordingBackend::new(vec!["gemini-2.5-flash"]),
        &["gemini-2.5-flash"],
        ExchangeOptions::default(),
    );

    assert_aborted_before_generation(h, |e| matches!(e, RagError::RetrievalUnavailable(_))).await;
}

#[tokio::test]
async fn test_stage_timeout_aborts_exchange() {
    let options = ExchangeOptions {
        stage_timeout: Duration::from_millis(20),
        ..ExchangeOptions::default()
    };
    let h = harness(
        FixedEmbedder::with_mode(EmbedMode::Stalled),
        FixedIndex::new(vec![passage("1", 0.9, "manual_a", 1)]),
        RecordingBackend::new(vec!["gemini-2.5-flash"]),
        &["gemini-2.5-flash"],
        options,
    );

    assert_aborted_before_generation(h, |e| {
        matches!(e, RagError::Timeout { stage, duration_ms: 20 } if stage == "embed")
    })
    .await;
}
