use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vaultnote_core::db::open_db_in_memory;
use vaultnote_core::gateway::transport::{
    CompletionTransport, GenerateRequest, GenerateResponse, TransportError,
};
use vaultnote_core::{
    GatewayError, GrammarSuggestion, InferenceGateway, NoteService, NoteServiceError,
    SqliteNoteRepository,
};

const BASE_BACKOFF_MS: u64 = 1200;

#[derive(Clone, Copy)]
enum Reply {
    Text(&'static str),
    RateLimited,
    Fail,
}

#[derive(Default)]
struct Counters {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Transport double: serves a scripted reply sequence (then a fallback),
/// optionally simulating per-request latency, and records concurrency.
struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    latency: Duration,
    counters: Arc<Counters>,
}

impl ScriptedTransport {
    fn new(script: Vec<Reply>, fallback: Reply) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            Self {
                script: Mutex::new(script.into()),
                fallback,
                latency: Duration::ZERO,
                counters: Arc::clone(&counters),
            },
            counters,
        )
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn send(&self, _request: &GenerateRequest) -> Result<GenerateResponse, TransportError> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = self.script.lock().pop_front().unwrap_or(self.fallback);
        match reply {
            Reply::Text(text) => Ok(completion(text)),
            Reply::RateLimited => Err(TransportError::RateLimited),
            Reply::Fail => Err(TransportError::Http("scripted failure".to_string())),
        }
    }
}

fn completion(text: &str) -> GenerateResponse {
    serde_json::from_value(serde_json::json!({
        "candidates": [ { "content": { "parts": [ { "text": text } ] } } ]
    }))
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn rate_limits_back_off_exponentially_before_success() {
    let (transport, counters) = ScriptedTransport::new(
        vec![Reply::RateLimited, Reply::RateLimited, Reply::Text("summary text")],
        Reply::Fail,
    );
    let gateway = InferenceGateway::new(transport);

    let started = Instant::now();
    let summary = gateway.summarize("needs a summary").await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary, "summary text");
    assert_eq!(counters.calls.load(Ordering::SeqCst), 3);
    // Two backoff delays: base, then doubled.
    assert!(
        elapsed >= Duration::from_millis(BASE_BACKOFF_MS + 2 * BASE_BACKOFF_MS),
        "elapsed {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(BASE_BACKOFF_MS + 2 * BASE_BACKOFF_MS + 4 * BASE_BACKOFF_MS),
        "elapsed {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_normalize_to_unavailable_and_fallbacks() {
    let (transport, counters) = ScriptedTransport::new(Vec::new(), Reply::Fail);
    let gateway = InferenceGateway::new(transport);

    assert!(matches!(
        gateway.summarize("body").await,
        Err(GatewayError::Unavailable)
    ));
    // 6 attempts: the first plus five retries.
    assert_eq!(counters.calls.load(Ordering::SeqCst), 6);

    assert_eq!(
        gateway.generate_tags("body").await,
        vec!["note".to_string(), "document".to_string()]
    );
    assert_eq!(
        gateway.check_grammar("teh quick fox").await,
        vec![GrammarSuggestion {
            text: "teh".to_string(),
            suggestion: "the".to_string(),
        }]
    );
    assert!(gateway.check_grammar("all fine here").await.is_empty());
    assert!(gateway.insights("body").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn blank_input_short_circuits_without_network_calls() {
    let (transport, counters) = ScriptedTransport::new(Vec::new(), Reply::Fail);
    let gateway = InferenceGateway::new(transport);

    assert_eq!(gateway.summarize("   ").await.unwrap(), "");
    assert!(gateway.generate_tags("").await.is_empty());
    assert_eq!(gateway.translate("  ", "French").await.unwrap(), "  ");
    assert!(gateway.check_grammar("").await.is_empty());
    assert!(gateway.insights("\n").await.is_empty());
    assert_eq!(counters.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn back_to_back_operations_serialize_through_single_flight() {
    let (transport, counters) =
        ScriptedTransport::new(vec![Reply::Text("one"), Reply::Text("two")], Reply::Fail);
    let transport = transport.with_latency(Duration::from_millis(400));
    let gateway = InferenceGateway::new(transport);

    let (first, second) = tokio::join!(gateway.summarize("a"), gateway.summarize("b"));
    assert_eq!(first.unwrap(), "one");
    assert_eq!(second.unwrap(), "two");

    assert_eq!(counters.calls.load(Ordering::SeqCst), 2);
    // The second request never went on the wire while the first was in flight.
    assert_eq!(counters.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn bounded_wait_proceeds_anyway_instead_of_starving() {
    let (transport, counters) =
        ScriptedTransport::new(vec![Reply::Text("one"), Reply::Text("two")], Reply::Fail);
    // Longer than the 10 x 250 ms polling budget.
    let transport = transport.with_latency(Duration::from_millis(3000));
    let gateway = InferenceGateway::new(transport);

    let (first, second) = tokio::join!(gateway.summarize("a"), gateway.summarize("b"));
    assert!(first.is_ok());
    assert!(second.is_ok());

    // The waiter gave up on the slot and overlapped with the first request.
    assert_eq!(counters.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn ai_tools_cooldown_gates_the_bundle_per_category() {
    let (transport, _) = ScriptedTransport::new(
        vec![
            Reply::Text("first summary"),
            Reply::Text("tag1, tag2"),
            Reply::Text("second summary"),
            Reply::Text("tag3"),
        ],
        Reply::Fail,
    );
    let gateway = InferenceGateway::new(transport);

    let (summary, tags) = gateway.summarize_and_tag("body").await.unwrap();
    assert_eq!(summary, "first summary");
    assert_eq!(tags, vec!["tag1".to_string(), "tag2".to_string()]);

    // Within the window: rejected without a network call.
    assert!(matches!(
        gateway.summarize_and_tag("body").await,
        Err(GatewayError::Cooldown { .. })
    ));
    assert!(gateway.ai_tools_cooldown().is_some());
    // Categories are independent.
    assert!(gateway.translate_cooldown().is_none());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(gateway.ai_tools_cooldown().is_none());

    let (summary, tags) = gateway.summarize_and_tag("body").await.unwrap();
    assert_eq!(summary, "second summary");
    assert_eq!(tags, vec!["tag3".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn throttled_outcomes_wait_longer_than_clean_ones() {
    let (transport, _) = ScriptedTransport::new(Vec::new(), Reply::RateLimited);
    let gateway = InferenceGateway::new(transport);

    assert!(matches!(
        gateway.summarize_and_tag("body").await,
        Err(GatewayError::Unavailable)
    ));

    let remaining = gateway.ai_tools_cooldown().unwrap();
    assert!(remaining > Duration::from_secs(30), "remaining {remaining:?}");

    // A clean window would already be over; the throttled one is not.
    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(gateway.ai_tools_cooldown().is_some());

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(gateway.ai_tools_cooldown().is_none());
}

#[tokio::test(start_paused = true)]
async fn translate_has_its_own_cooldown_window() {
    let (transport, _) = ScriptedTransport::new(vec![Reply::Text("hola mundo")], Reply::Fail);
    let gateway = InferenceGateway::new(transport);

    let translated = gateway.translate("hello world", "Spanish").await.unwrap();
    assert_eq!(translated, "hola mundo");

    assert!(matches!(
        gateway.translate("hello world", "Spanish").await,
        Err(GatewayError::Cooldown { .. })
    ));
    assert!(gateway.translate_cooldown().is_some());
    assert!(gateway.ai_tools_cooldown().is_none());
}

#[tokio::test(start_paused = true)]
async fn refresh_ai_features_updates_metadata_only() {
    let (transport, _) = ScriptedTransport::new(
        vec![
            // Consumed by create-time enrichment.
            Reply::Text("create summary"),
            Reply::Text("x, y"),
            // Consumed by the manual refresh bundle.
            Reply::Text("fresh summary"),
            Reply::Text("alpha, beta"),
        ],
        Reply::Fail,
    );
    let gateway = Arc::new(InferenceGateway::new(transport));

    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::new(&mut conn);
    let mut service = NoteService::new(repo, Arc::clone(&gateway));

    let created = service.create("Title", "body text").await.unwrap();
    assert_eq!(created.ai_summary.as_deref(), Some("create summary"));

    let refreshed = service.refresh_ai_features(created.id).await.unwrap();
    assert_eq!(refreshed.ai_summary.as_deref(), Some("fresh summary"));
    assert_eq!(refreshed.tags, vec!["alpha".to_string(), "beta".to_string()]);
    // Metadata refresh only: no version bump, no updated_at bump.
    assert_eq!(refreshed.version, created.version);
    assert_eq!(refreshed.updated_at, created.updated_at);

    // The bundle armed its cooldown; an immediate second refresh is rejected.
    assert!(matches!(
        service.refresh_ai_features(created.id).await,
        Err(NoteServiceError::Cooldown { .. })
    ));
}
