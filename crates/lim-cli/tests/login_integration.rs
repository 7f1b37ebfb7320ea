//! Browser login integration tests
//!
//! Drives the callback listener over real HTTP and runs the whole login flow
//! with a stand-in browser that follows the console's redirect itself.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use lim::auth::{
    login, AuthCallbackServer, BrowserLauncher, CallbackOutcome, LoginOptions, USER_AGENT,
};
use lim_core::config::ConfigStore;
use lim_core::error::{AuthError, ConfigError};
use lim_core::traits::CredentialStore;

const GRACE: Duration = Duration::from_secs(2);

#[derive(Default)]
struct MemoryStore {
    key: Option<String>,
    persists: AtomicUsize,
    fail: bool,
}

impl MemoryStore {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryStore {
    fn credential(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn set_credential(&mut self, credential: Option<String>) {
        self.key = credential;
    }

    fn persist(&self) -> Result<(), ConfigError> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ConfigError::Write {
                path: "/read-only/config.toml".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(())
    }
}

/// Browser stand-in: records the URL it was asked to open and, if told to,
/// hits the callback the way the console's redirect would
struct FakeBrowser {
    callback: Option<String>,
    opened: StdMutex<Vec<String>>,
    fail: bool,
}

impl FakeBrowser {
    fn redirecting_to(callback: String) -> Self {
        Self {
            callback: Some(callback),
            opened: StdMutex::new(Vec::new()),
            fail: false,
        }
    }

    fn idle() -> Self {
        Self {
            callback: None,
            opened: StdMutex::new(Vec::new()),
            fail: false,
        }
    }

    fn broken() -> Self {
        Self {
            fail: true,
            ..Self::idle()
        }
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl BrowserLauncher for FakeBrowser {
    fn open(&self, url: &str) -> Result<(), AuthError> {
        self.opened.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(AuthError::Browser("no display".into()));
        }
        if let Some(callback) = self.callback.clone() {
            tokio::spawn(async move {
                // Retry until the listener answers; it is already bound
                for _ in 0..20 {
                    if reqwest::get(&callback).await.is_ok() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(25)).await;
                }
            });
        }
        Ok(())
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn options(port: u16) -> LoginOptions {
    LoginOptions {
        console_endpoint: "https://console.example.test".to_string(),
        callback_addr: SocketAddr::from(([127, 0, 0, 1], port)),
        shutdown_grace: GRACE,
    }
}

fn localhost() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

#[tokio::test]
async fn test_callback_with_key_over_http() {
    let store = Arc::new(Mutex::new(MemoryStore::default()));
    let mut server = AuthCallbackServer::start(localhost(), store.clone())
        .await
        .unwrap();

    let response = reqwest::get(format!("{}?api-key=lim_8f46b6cb", server.callback_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    assert!(response.text().await.unwrap().is_empty());

    let outcome = server.wait().await.unwrap();
    assert!(matches!(
        outcome,
        CallbackOutcome::LoggedIn {
            persist_error: None
        }
    ));
    server.shutdown(GRACE).await;

    let store = store.lock().await;
    assert_eq!(store.credential(), Some("lim_8f46b6cb"));
    assert_eq!(store.persist_count(), 1);
}

#[tokio::test]
async fn test_callback_without_key_over_http() {
    let store = Arc::new(Mutex::new(MemoryStore::default()));
    let mut server = AuthCallbackServer::start(localhost(), store.clone())
        .await
        .unwrap();

    let response = reqwest::get(server.callback_url()).await.unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "missing api-key");

    let outcome = server.wait().await.unwrap();
    assert!(!outcome.succeeded());
    server.shutdown(GRACE).await;

    let store = store.lock().await;
    assert!(store.credential().is_none());
    assert_eq!(store.persist_count(), 0);
}

#[tokio::test]
async fn test_preflight_over_http() {
    let store = Arc::new(Mutex::new(MemoryStore::default()));
    let mut server = AuthCallbackServer::start(localhost(), store)
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, server.callback_url())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(
        headers["access-control-allow-methods"],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(headers["access-control-allow-headers"], "*");
    assert_eq!(headers["access-control-max-age"], "86400");

    // A preflight does not settle the login
    let pending = tokio::time::timeout(Duration::from_millis(100), server.wait()).await;
    assert!(pending.is_err());
    server.shutdown(GRACE).await;
}

#[tokio::test]
async fn test_repeated_callback_is_gone() {
    let store = Arc::new(Mutex::new(MemoryStore::default()));
    let mut server = AuthCallbackServer::start(localhost(), store.clone())
        .await
        .unwrap();
    let url = server.callback_url();

    let first = reqwest::get(format!("{}?api-key=lim_first", url))
        .await
        .unwrap();
    assert_eq!(first.status(), 200);
    let second = reqwest::get(format!("{}?api-key=lim_second", url))
        .await
        .unwrap();
    assert_eq!(second.status(), 410);

    server.wait().await.unwrap();
    server.shutdown(GRACE).await;

    let store = store.lock().await;
    assert_eq!(store.credential(), Some("lim_first"));
    assert_eq!(store.persist_count(), 1);
}

#[tokio::test]
async fn test_persist_failure_is_still_acknowledged() {
    let store = Arc::new(Mutex::new(MemoryStore::failing()));
    let mut server = AuthCallbackServer::start(localhost(), store)
        .await
        .unwrap();

    let response = reqwest::get(format!("{}?api-key=lim_x", server.callback_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let outcome = server.wait().await.unwrap();
    assert!(outcome.succeeded());
    assert!(matches!(
        outcome,
        CallbackOutcome::LoggedIn {
            persist_error: Some(ConfigError::Write { .. })
        }
    ));
    server.shutdown(GRACE).await;
}

#[tokio::test]
async fn test_login_saves_key_to_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "instance_id = \"ios_keep\"\n").unwrap();

    let port = free_port();
    let browser = FakeBrowser::redirecting_to(format!(
        "http://127.0.0.1:{}/authn/callback?api-key=lim_from_console",
        port
    ));
    let store = Arc::new(Mutex::new(ConfigStore::open(&path).unwrap()));

    login(&options(port), store, &browser, CancellationToken::new())
        .await
        .unwrap();

    let opened = browser.opened();
    assert_eq!(opened.len(), 1);
    let url = url::Url::parse(&opened[0]).unwrap();
    assert_eq!(url.host_str(), Some("console.example.test"));
    assert_eq!(url.path(), "/authn/login");
    assert_eq!(
        url.query_pairs().find(|(k, _)| k == "user-agent").unwrap().1,
        USER_AGENT
    );

    let reopened = ConfigStore::open(&path).unwrap();
    assert_eq!(reopened.credential(), Some("lim_from_console"));
    assert_eq!(reopened.file().instance_id.as_deref(), Some("ios_keep"));

    // Listener is gone once login returns
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn test_login_without_key_fails() {
    let port = free_port();
    let browser =
        FakeBrowser::redirecting_to(format!("http://127.0.0.1:{}/authn/callback", port));
    let store = Arc::new(Mutex::new(MemoryStore::default()));

    let outcome = login(&options(port), store.clone(), &browser, CancellationToken::new()).await;

    assert!(matches!(outcome, Err(AuthError::MissingCredential)));
    assert_eq!(store.lock().await.persist_count(), 0);
}

#[tokio::test]
async fn test_login_persist_failure_is_reported() {
    let port = free_port();
    let browser = FakeBrowser::redirecting_to(format!(
        "http://127.0.0.1:{}/authn/callback?api-key=lim_x",
        port
    ));
    let store = Arc::new(Mutex::new(MemoryStore::failing()));

    let outcome = login(&options(port), store, &browser, CancellationToken::new()).await;
    assert!(matches!(outcome, Err(AuthError::Persist(_))));
}

#[tokio::test]
async fn test_login_browser_failure_is_fatal() {
    let port = free_port();
    let browser = FakeBrowser::broken();
    let store = Arc::new(Mutex::new(MemoryStore::default()));

    let outcome = login(&options(port), store, &browser, CancellationToken::new()).await;

    assert!(matches!(outcome, Err(AuthError::Browser(_))));
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn test_login_cancelled() {
    let port = free_port();
    let browser = FakeBrowser::idle();
    let store = Arc::new(Mutex::new(MemoryStore::default()));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = login(&options(port), store.clone(), &browser, cancel).await;

    assert!(matches!(outcome, Err(AuthError::Cancelled)));
    assert!(outcome.unwrap_err().is_cancelled());
    assert_eq!(store.lock().await.persist_count(), 0);
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn test_login_port_in_use() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();
    let browser = FakeBrowser::idle();
    let store = Arc::new(Mutex::new(MemoryStore::default()));

    let outcome = login(&options(port), store, &browser, CancellationToken::new()).await;

    assert!(matches!(outcome, Err(AuthError::Bind { .. })));
    assert!(browser.opened().is_empty());
}

#[tokio::test]
async fn test_login_rejects_bad_console_endpoint() {
    let mut options = options(free_port());
    options.console_endpoint = "console without scheme".to_string();
    let store = Arc::new(Mutex::new(MemoryStore::default()));

    let outcome = login(&options, store, &FakeBrowser::idle(), CancellationToken::new()).await;
    assert!(matches!(outcome, Err(AuthError::InvalidConsoleEndpoint(_))));
}
