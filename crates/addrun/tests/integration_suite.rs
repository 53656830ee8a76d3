//! Integration tests for the loader and bridge against a real runtime.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rand::Rng;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

use addrun::BridgeInvoker;
use addrun::EntryPoint;
use addrun::EntryRegistry;
use addrun::ImageLocation;
use addrun::InvokeError;
use addrun::LoadError;
use addrun::LoaderConfig;
use addrun::LoaderState;
use addrun::LoaderStatus;
use addrun::PollPolicy;
use addrun::RuntimeHandle;
use addrun::RuntimeLoader;
use addrun::WasmEntry;
use addrun::entry;
use addrun::image::PRELUDE_WAT;
use addrun::loader::INTERRUPTED;
use addrun::run_self_tests;

const TRAPPING_DEFINITION: &str = r#"
(module
  (func (export "add_numbers") (param f64 f64) (result f64)
    unreachable))
"#;

const INTEGER_DEFINITION: &str = r#"
(module
  (func (export "add_numbers") (param i32 i32) (result i32)
    local.get 0
    local.get 1
    i32.add))
"#;

const SUBTRACTING_DEFINITION: &str = r#"
(module
  (import "runtime" "sub" (func $sub (param f64 f64) (result f64)))
  (func (export "add_numbers") (param f64 f64) (result f64)
    local.get 0
    local.get 1
    call $sub))
"#;

const EMPTY_IMAGE: &str = "(module (memory (export \"memory\") 1))";

fn fast_config() -> LoaderConfig {
    LoaderConfig::default().with_poll(PollPolicy::new(20, Duration::from_millis(10)))
}

fn embedded_entry() -> Arc<dyn EntryPoint> {
    Arc::new(WasmEntry::new(ImageLocation::Embedded))
}

async fn ready_bridge(config: LoaderConfig) -> BridgeInvoker {
    let registry = EntryRegistry::new();
    registry.publish(embedded_entry());
    let loader = RuntimeLoader::new(config, registry);
    loader.bootstrap().await.expect("Failed to bootstrap runtime");
    BridgeInvoker::new(loader)
}

/// Wraps the embedded entry point, counting boots and optionally stalling.
struct CountingEntry {
    inner: WasmEntry,
    boots: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingEntry {
    fn new(delay: Duration) -> (Self, Arc<AtomicUsize>) {
        let boots = Arc::new(AtomicUsize::new(0));
        let entry = Self {
            inner: WasmEntry::new(ImageLocation::Embedded),
            boots: boots.clone(),
            delay,
        };
        (entry, boots)
    }
}

#[async_trait::async_trait]
impl EntryPoint for CountingEntry {
    async fn boot(&self) -> entry::Result<RuntimeHandle> {
        self.boots.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.boot().await
    }
}

struct FailingEntry;

#[async_trait::async_trait]
impl EntryPoint for FailingEntry {
    async fn boot(&self) -> entry::Result<RuntimeHandle> {
        Err(entry::Error::Other("network unreachable".to_string()))
    }
}

struct PanickingEntry;

#[async_trait::async_trait]
impl EntryPoint for PanickingEntry {
    async fn boot(&self) -> entry::Result<RuntimeHandle> {
        panic!("entry point blew up");
    }
}

// --- Happy path ---

#[tokio::test]
async fn test_invoke_representative_pairs() {
    let bridge = ready_bridge(fast_config()).await;

    assert_eq!(bridge.invoke(5.0, 3.0).await.unwrap().value, 8.0);
    assert_eq!(bridge.invoke(0.0, 0.0).await.unwrap().value, 0.0);
    assert_eq!(bridge.invoke(-10.0, 5.0).await.unwrap().value, -5.0);
    assert!((bridge.invoke(2.5, 3.7).await.unwrap().value - 6.2).abs() < 1e-4);
    assert!((bridge.invoke(0.1, 0.2).await.unwrap().value - 0.3).abs() < 1e-4);
}

#[tokio::test]
async fn test_invoke_matches_native_addition() {
    let bridge = ready_bridge(fast_config()).await;
    let mut rng = rand::thread_rng();

    for _ in 0..100 {
        let a: f64 = rng.gen_range(-1.0e9..1.0e9);
        let b: f64 = rng.gen_range(-1.0e9..1.0e9);
        let invocation = bridge.invoke(a, b).await.expect("Invocation failed");
        assert_eq!(invocation.value, a + b, "add_numbers({}, {})", a, b);
    }
}

#[tokio::test]
async fn test_invoke_message() {
    let bridge = ready_bridge(fast_config()).await;
    let status = bridge.invoke_status(5.0, 3.0).await;
    assert_eq!(status.category(), "success");
    assert_eq!(status.text(), "Runtime result: add_numbers(5, 3) = 8");
}

#[tokio::test]
async fn test_ready_handle_has_both_modules() {
    let bridge = ready_bridge(fast_config()).await;
    let handle = bridge.loader().handle().expect("Ready loader must hold a handle");
    assert_eq!(handle.modules().await, vec!["main".to_string(), "runtime".to_string()]);
    assert_eq!(bridge.loader().status(), LoaderStatus::Ready);
}

// --- Polling for the entry point ---

#[tokio::test]
async fn test_entry_published_while_polling() {
    let registry = EntryRegistry::new();
    let loader = RuntimeLoader::new(fast_config(), registry.clone());

    let publisher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.publish(embedded_entry());
    });

    loader.bootstrap().await.expect("Entry point arrived within budget");
    publisher.await.unwrap();
    assert!(loader.is_ready());
}

#[tokio::test]
async fn test_entry_published_after_budget_is_unavailable() {
    let registry = EntryRegistry::new();
    let config = LoaderConfig::default().with_poll(PollPolicy::new(3, Duration::from_millis(10)));
    let loader = RuntimeLoader::new(config, registry.clone());

    let publisher = tokio::spawn({
        let registry = registry.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            registry.publish(embedded_entry());
        }
    });

    let err = loader.bootstrap().await.unwrap_err();
    assert_eq!(
        err,
        LoadError::RuntimeUnavailable {
            attempts: 3,
            waited: Duration::from_millis(30),
        }
    );

    // The failure is permanent, even once the entry point shows up.
    publisher.await.unwrap();
    assert!(registry.is_published());
    assert_eq!(loader.bootstrap().await.unwrap_err(), err);
    assert!(matches!(loader.state(), LoaderState::Failed(_)));
    assert_eq!(loader.status().category(), "error");

    let bridge = BridgeInvoker::new(loader);
    assert_eq!(bridge.invoke(1.0, 2.0).await, Err(InvokeError::RuntimeNotReady));
}

// --- Bootstrap failures ---

#[tokio::test]
async fn test_entry_failure_is_bootstrap_failed() {
    let registry = EntryRegistry::new();
    registry.publish(Arc::new(FailingEntry));
    let loader = RuntimeLoader::new(fast_config(), registry);

    let err = loader.bootstrap().await.unwrap_err();
    assert_eq!(err, LoadError::BootstrapFailed("network unreachable".to_string()));
    assert!(loader.handle().is_none());
    assert!(!loader.is_ready());
}

#[tokio::test]
async fn test_missing_image_file_is_bootstrap_failed() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EntryRegistry::new();
    registry.publish(Arc::new(WasmEntry::new(ImageLocation::File(dir.path().join("absent.wasm")))));
    let loader = RuntimeLoader::new(fast_config(), registry);

    let err = loader.bootstrap().await.unwrap_err();
    assert!(matches!(err, LoadError::BootstrapFailed(ref cause) if cause.contains("absent.wasm")));
}

#[tokio::test]
async fn test_corrupt_image_is_bootstrap_failed() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("corrupt.wasm");
    std::fs::write(&image, b"\0asm\x01\0\0\0garbage").unwrap();

    let registry = EntryRegistry::new();
    registry.publish(Arc::new(WasmEntry::new(ImageLocation::File(image))));
    let loader = RuntimeLoader::new(fast_config(), registry);

    assert!(matches!(loader.bootstrap().await, Err(LoadError::BootstrapFailed(_))));
    assert!(matches!(loader.state(), LoaderState::Failed(_)));
}

#[tokio::test]
async fn test_image_without_add_cannot_host_definition() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("empty.wat");
    std::fs::write(&image, EMPTY_IMAGE).unwrap();

    let registry = EntryRegistry::new();
    registry.publish(Arc::new(WasmEntry::new(ImageLocation::File(image))));
    let loader = RuntimeLoader::new(fast_config(), registry);

    let err = loader.bootstrap().await.unwrap_err();
    assert!(matches!(err, LoadError::BootstrapFailed(ref cause) if cause.contains("main")));
    assert!(loader.handle().is_none());
}

#[tokio::test]
async fn test_image_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("prelude.wat");
    std::fs::write(&image, PRELUDE_WAT).unwrap();

    let registry = EntryRegistry::new();
    registry.publish(Arc::new(WasmEntry::new(ImageLocation::File(image))));
    let loader = RuntimeLoader::new(fast_config(), registry);
    loader.bootstrap().await.expect("Failed to bootstrap from file");

    let bridge = BridgeInvoker::new(loader);
    assert_eq!(bridge.invoke(100.0, 200.0).await.unwrap().value, 300.0);
}

// --- Image over HTTP ---

#[tokio::test]
async fn test_image_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0.1.0/prelude.wat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRELUDE_WAT))
        .expect(1)
        .mount(&server)
        .await;

    let location = ImageLocation::Url(format!("{}/v0.1.0/prelude.wat", server.uri()));
    let registry = EntryRegistry::new();
    registry.publish(Arc::new(WasmEntry::new(location)));
    let loader = RuntimeLoader::new(fast_config(), registry);
    loader.bootstrap().await.expect("Failed to bootstrap over HTTP");

    let bridge = BridgeInvoker::new(loader);
    assert_eq!(bridge.invoke(10.0, -5.0).await.unwrap().value, 5.0);
}

#[tokio::test]
async fn test_image_http_error_is_bootstrap_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let location = ImageLocation::Url(format!("{}/missing.wasm", server.uri()));
    let registry = EntryRegistry::new();
    registry.publish(Arc::new(WasmEntry::new(location)));
    let loader = RuntimeLoader::new(fast_config(), registry);

    let err = loader.bootstrap().await.unwrap_err();
    assert!(matches!(err, LoadError::BootstrapFailed(ref cause) if cause.contains("404")));
}

// --- Invocation failures ---

#[tokio::test]
async fn test_trap_is_invocation_failed_and_keeps_runtime() {
    let bridge = ready_bridge(fast_config().with_definition(TRAPPING_DEFINITION)).await;

    for _ in 0..2 {
        let err = bridge.invoke(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, InvokeError::InvocationFailed(_)));
    }

    // Failed calls leave the loader alone and are still attempted each time.
    let loader = bridge.loader();
    assert!(loader.is_ready());
    let handle = loader.handle().expect("Handle must survive failed calls");
    assert_eq!(handle.calls().await, 2);
}

#[tokio::test]
async fn test_signature_mismatch_is_invocation_failed() {
    let bridge = ready_bridge(fast_config().with_definition(INTEGER_DEFINITION)).await;
    let status = bridge.invoke_status(1.0, 2.0).await;
    assert_eq!(status.category(), "error");
    assert!(bridge.loader().is_ready());
}

// --- Duplicate and concurrent bootstrap ---

#[tokio::test]
async fn test_concurrent_bootstrap_boots_once() {
    let (entry, boots) = CountingEntry::new(Duration::from_millis(50));
    let registry = EntryRegistry::new();
    registry.publish(Arc::new(entry));
    let loader = RuntimeLoader::new(fast_config(), registry);

    let other = loader.clone();
    let (first, second) = tokio::join!(loader.bootstrap(), other.bootstrap());
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(boots.load(Ordering::SeqCst), 1);
    assert!(loader.is_ready());
    assert!(loader.handle().is_some());

    // Calling again once ready is a no-op.
    loader.bootstrap().await.expect("Ready loader stays ready");
    assert_eq!(boots.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_waiters_share_failure() {
    let registry = EntryRegistry::new();
    registry.publish(Arc::new(FailingEntry));
    let loader = RuntimeLoader::new(fast_config(), registry);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let loader = loader.clone();
        tasks.push(tokio::spawn(async move { loader.bootstrap().await }));
    }
    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err, LoadError::BootstrapFailed("network unreachable".to_string()));
    }
}

#[tokio::test]
async fn test_readiness_and_handle_stay_paired() {
    let (entry, _) = CountingEntry::new(Duration::from_millis(50));
    let registry = EntryRegistry::new();
    let loader = RuntimeLoader::new(fast_config(), registry.clone());

    let mut rx = loader.subscribe();
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            seen.push(LoaderStatus::from(&state).category());
            if state.outcome().is_some() {
                break;
            }
        }
        seen
    });

    let early = tokio::spawn({
        let loader = loader.clone();
        async move { loader.bootstrap().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    registry.publish(Arc::new(entry));

    let late = loader.bootstrap().await;
    assert!(late.is_ok());
    assert!(early.await.unwrap().is_ok());

    assert_eq!(watcher.await.unwrap(), vec!["loading", "ready"]);
    assert_eq!(loader.is_ready(), loader.handle().is_some());
}

#[tokio::test]
async fn test_invoke_while_loading_is_not_ready() {
    let (entry, _) = CountingEntry::new(Duration::from_millis(200));
    let registry = EntryRegistry::new();
    registry.publish(Arc::new(entry));
    let loader = RuntimeLoader::new(fast_config(), registry);
    let bridge = BridgeInvoker::new(loader.clone());

    let loading = tokio::spawn({
        let loader = loader.clone();
        async move { loader.bootstrap().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(loader.state(), LoaderState::Loading));
    assert_eq!(bridge.invoke(5.0, 3.0).await, Err(InvokeError::RuntimeNotReady));
    assert!(matches!(loader.state(), LoaderState::Loading));

    loading.await.unwrap().expect("Slow entry still boots");
    let handle = loader.handle().expect("Ready loader must hold a handle");
    assert_eq!(handle.calls().await, 0);

    assert_eq!(bridge.invoke(5.0, 3.0).await.unwrap().value, 8.0);
    assert_eq!(handle.calls().await, 1);
}

// --- Interrupted bootstrap ---

#[tokio::test]
async fn test_panicking_entry_fails_loader() {
    let registry = EntryRegistry::new();
    registry.publish(Arc::new(PanickingEntry));
    let loader = RuntimeLoader::new(fast_config(), registry);

    let crashed = tokio::spawn({
        let loader = loader.clone();
        async move { loader.bootstrap().await }
    });
    assert!(crashed.await.is_err());

    let outcome = tokio::time::timeout(Duration::from_secs(2), loader.bootstrap())
        .await
        .expect("Later bootstrap must not wait forever");
    assert_eq!(outcome.unwrap_err(), LoadError::BootstrapFailed(INTERRUPTED.to_string()));
    assert_eq!(loader.status().category(), "error");

    let bridge = BridgeInvoker::new(loader);
    assert_eq!(bridge.invoke(1.0, 2.0).await, Err(InvokeError::RuntimeNotReady));
}

#[tokio::test]
async fn test_aborted_bootstrap_releases_waiters() {
    let (entry, _) = CountingEntry::new(Duration::from_secs(30));
    let registry = EntryRegistry::new();
    registry.publish(Arc::new(entry));
    let loader = RuntimeLoader::new(fast_config(), registry);

    let winner = tokio::spawn({
        let loader = loader.clone();
        async move { loader.bootstrap().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(loader.state(), LoaderState::Loading));

    let waiter = tokio::spawn({
        let loader = loader.clone();
        async move { loader.bootstrap().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    winner.abort();
    assert!(winner.await.unwrap_err().is_cancelled());

    let outcome = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("Waiter must be released")
        .unwrap();
    assert_eq!(outcome.unwrap_err(), LoadError::BootstrapFailed(INTERRUPTED.to_string()));
    assert!(loader.handle().is_none());
}

// --- Self-test suite ---

#[tokio::test]
async fn test_self_tests_pass() {
    let bridge = ready_bridge(fast_config()).await;
    let report = run_self_tests(&bridge).await.expect("Runtime is ready");

    assert_eq!(report.total(), 10);
    assert!(report.all_passed(), "{}", report.render());
    assert!(report.render().contains("Failed: 0"));
}

#[tokio::test]
async fn test_self_tests_catch_wrong_definition() {
    let bridge = ready_bridge(fast_config().with_definition(SUBTRACTING_DEFINITION)).await;
    let report = run_self_tests(&bridge).await.expect("Runtime is ready");

    // Only the cases adding zero on the right survive subtraction.
    assert_eq!(report.passed(), 2);
    assert_eq!(report.failed(), 8);
}

#[tokio::test]
async fn test_self_tests_record_traps() {
    let bridge = ready_bridge(fast_config().with_definition(TRAPPING_DEFINITION)).await;
    let report = run_self_tests(&bridge).await.expect("Runtime is ready");
    assert_eq!(report.failed(), 10);
    assert!(report.render().contains("ERROR"));
}

#[tokio::test]
async fn test_self_tests_need_ready_runtime() {
    let loader = RuntimeLoader::new(fast_config(), EntryRegistry::new());
    let bridge = BridgeInvoker::new(loader);
    assert_eq!(run_self_tests(&bridge).await, Err(InvokeError::RuntimeNotReady));
}
