//! Function registration and calls over the loopback store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbx_arbiter::{
    ArbiterClient, ArbiterRequest, ArbiterResponse, ArbiterTransport, HttpArbiterTransport, Token,
};
use dbx_domain::config::StoreConfig;
use dbx_domain::{ContentType, Error, HypercatRoot, Result};
use dbx_store::{
    parse_notify_frame, CoreStoreClient, Func, FuncResult, FuncStatus, MemoryStore, ObserveMode,
    StoreTransport, TransportError,
};
use tokio::sync::mpsc;

const ENDPOINT: &str = "tcp://app-store:5555";

fn core_with(arbiter: Arc<dyn ArbiterTransport>, store: Arc<dyn StoreTransport>) -> CoreStoreClient {
    let cfg = StoreConfig {
        endpoint: ENDPOINT.into(),
        ..StoreConfig::default()
    };
    CoreStoreClient::new(ArbiterClient::new(arbiter), store, &cfg)
}

fn core(store: &Arc<MemoryStore>) -> CoreStoreClient {
    let transport = HttpArbiterTransport::with_api_key("", None, Duration::from_secs(1)).unwrap();
    core_with(Arc::new(transport), store.clone())
}

// ── Fakes ────────────────────────────────────────────────────────────

/// Arbiter that refuses every token.
struct DenyingArbiter;

#[async_trait]
impl ArbiterTransport for DenyingArbiter {
    async fn send(&self, _request: ArbiterRequest) -> Result<ArbiterResponse> {
        Ok(ArbiterResponse {
            status: 403,
            body: b"not permitted".to_vec(),
        })
    }
}

/// Loopback store whose `observe` can be made to fail.
struct FlakyObserve {
    inner: Arc<MemoryStore>,
    fail_observe: AtomicBool,
}

#[async_trait]
impl StoreTransport for FlakyObserve {
    async fn post(
        &self,
        token: &Token,
        path: &str,
        payload: &[u8],
        ct: ContentType,
    ) -> std::result::Result<(), TransportError> {
        self.inner.post(token, path, payload, ct).await
    }

    async fn get(
        &self,
        token: &Token,
        path: &str,
        ct: ContentType,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        self.inner.get(token, path, ct).await
    }

    async fn delete(
        &self,
        token: &Token,
        path: &str,
        ct: ContentType,
    ) -> std::result::Result<(), TransportError> {
        self.inner.delete(token, path, ct).await
    }

    async fn observe(
        &self,
        token: &Token,
        path: &str,
        ct: ContentType,
        mode: ObserveMode,
    ) -> std::result::Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        if self.fail_observe.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("observe refused".into()));
        }
        self.inner.observe(token, path, ct, mode).await
    }

    async fn notify(
        &self,
        token: &Token,
        path: &str,
        ct: ContentType,
    ) -> std::result::Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        self.inner.notify(token, path, ct).await
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn echo(_ct: ContentType, payload: Vec<u8>) -> FuncResult {
    Ok(payload)
}

async fn fails(_ct: ContentType, _payload: Vec<u8>) -> FuncResult {
    Err("Test Error".to_string())
}

async fn upper(ct: ContentType, payload: Vec<u8>) -> FuncResult {
    if ct != ContentType::Text {
        return Err(format!("expected TEXT, got {ct}"));
    }
    Ok(payload.to_ascii_uppercase())
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn call_round_trip_echoes_payload() {
    let store = Arc::new(MemoryStore::new());
    let func = Func::new(core(&store));
    func.register("databox", "echo", ContentType::Json, echo)
        .await
        .unwrap();

    for _ in 0..3 {
        let resp = func.call("echo", b"This is a test", ContentType::Json).await;
        assert_eq!(resp.status, FuncStatus::Ok);
        assert_eq!(resp.response, b"This is a test");
    }
}

#[tokio::test]
async fn handler_error_becomes_error_status() {
    let store = Arc::new(MemoryStore::new());
    let func = Func::new(core(&store));
    func.register("databox", "fails", ContentType::Json, fails)
        .await
        .unwrap();

    let resp = func.call("fails", b"x", ContentType::Json).await;
    assert_eq!(resp.status, FuncStatus::Error);
    assert_eq!(resp.response, b"Test Error");
}

#[tokio::test]
async fn caller_and_provider_can_be_separate_clients() {
    let store = Arc::new(MemoryStore::new());
    let provider = Func::new(core(&store));
    let caller = Func::new(core(&store));

    provider
        .register("databox", "upper", ContentType::Text, upper)
        .await
        .unwrap();

    let resp = caller.call("upper", b"shout", ContentType::Text).await;
    assert!(resp.is_ok());
    assert_eq!(resp.response, b"SHOUT");
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let func = Func::new(core(&store));
    func.register("databox", "dup", ContentType::Json, echo)
        .await
        .unwrap();
    let err = func
        .register("databox", "dup", ContentType::Json, echo)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Function(_)));
    assert_eq!(func.registered(), vec!["dup".to_string()]);
    assert_eq!(store.observer_count(), 1, "listener is started once");
}

#[tokio::test]
async fn registration_advertises_function_in_catalogue() {
    let store = Arc::new(MemoryStore::new());
    let func = Func::new(core(&store));
    func.register("databox", "lookup", ContentType::Json, echo)
        .await
        .unwrap();

    let item: dbx_domain::HypercatItem =
        serde_json::from_slice(&store.value("/cat").unwrap()).unwrap();
    assert_eq!(item.href, format!("{ENDPOINT}/notification/request/lookup"));
    assert!(item.is_func());

    // The loopback store keeps the last registration under /cat.
    let root = HypercatRoot {
        catalogue_metadata: vec![],
        items: vec![item],
    };
    store.insert("/cat", serde_json::to_vec(&root).unwrap());
    let cat = core(&store).store_catalogue(ENDPOINT).await.unwrap();
    assert_eq!(cat.items.len(), 1);
}

#[tokio::test]
async fn unserved_function_times_out() {
    let store = Arc::new(MemoryStore::new());
    let func = Func::new(core(&store));

    let resp = func
        .call_with_timeout("nobody", b"?", ContentType::Json, Duration::from_millis(50))
        .await;
    assert_eq!(resp.status, FuncStatus::Error);
    assert!(String::from_utf8_lossy(&resp.response).contains("timed out"));
}

#[tokio::test]
async fn shutdown_stops_serving() {
    let store = Arc::new(MemoryStore::new());
    let func = Func::new(core(&store));
    func.register("databox", "echo", ContentType::Json, echo)
        .await
        .unwrap();
    func.shutdown().await;

    let resp = func
        .call_with_timeout("echo", b"hi", ContentType::Json, Duration::from_millis(50))
        .await;
    assert_eq!(resp.status, FuncStatus::Error);
}

#[tokio::test]
async fn token_denial_reports_failed_to_get_token() {
    let store = Arc::new(MemoryStore::new());
    let func = Func::new(core_with(Arc::new(DenyingArbiter), store.clone()));

    let resp = func.call("echo", b"hi", ContentType::Json).await;
    assert_eq!(resp.status, FuncStatus::FailedToGetToken);
    assert!(String::from_utf8_lossy(&resp.response).contains("Error getting Arbiter Token"));
    assert_eq!(store.posts(), 0);
}

#[tokio::test]
async fn undecodable_answer_reports_invalid_payload() {
    let store = Arc::new(MemoryStore::new());
    let responder = core(&store);
    let mut requests = responder
        .observe(
            "/notification/request/*",
            ContentType::Json,
            ObserveMode::Notification,
        )
        .await
        .unwrap();
    tokio::spawn(async move {
        if let Some(raw) = requests.recv().await {
            let request = parse_notify_frame(&raw.data).unwrap();
            let path = request.path.replacen("/request/", "/response/", 1);
            responder
                .write(&path, b"not json", ContentType::Json)
                .await
                .unwrap();
        }
    });

    let func = Func::new(core(&store));
    let resp = func
        .call_with_timeout("garbled", b"?", ContentType::Json, Duration::from_secs(5))
        .await;
    assert_eq!(resp.status, FuncStatus::InvalidPayload);
}

#[tokio::test]
async fn failed_listener_start_leaves_name_free() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyObserve {
        inner: inner.clone(),
        fail_observe: AtomicBool::new(true),
    });
    let transport = HttpArbiterTransport::with_api_key("", None, Duration::from_secs(1)).unwrap();
    let func = Func::new(core_with(Arc::new(transport), store.clone()));

    assert!(func
        .register("databox", "echo", ContentType::Json, echo)
        .await
        .is_err());
    assert!(func.registered().is_empty());

    store.fail_observe.store(false, Ordering::SeqCst);
    func.register("databox", "echo", ContentType::Json, echo)
        .await
        .unwrap();
    assert_eq!(func.registered(), vec!["echo".to_string()]);
    assert_eq!(inner.observer_count(), 1);

    let resp = func.call("echo", b"again", ContentType::Json).await;
    assert!(resp.is_ok());
    assert_eq!(resp.response, b"again");
}
