//! Local HTTP listener that receives the API key from the console
//!
//! The console redirects the browser to
//! `http://localhost:<port>/authn/callback?api-key=<key>` once the operator
//! has signed in. The first GET on that path settles the login: with a key it
//! is written to the credential store and answered `200`, without one it is
//! answered `400`. Later GETs get `410 Gone`. `OPTIONS` answers the CORS
//! preflight and leaves the login pending.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lim_core::error::{AuthError, ConfigError};
use lim_core::traits::CredentialStore;

/// Path the console redirects to
pub const CALLBACK_PATH: &str = "/authn/callback";

/// Query parameter carrying the API key
pub const CREDENTIAL_PARAM: &str = "api-key";

/// How the single callback settled the login
#[derive(Debug)]
pub enum CallbackOutcome {
    /// A key arrived. `persist_error` is set when it could not be saved.
    LoggedIn { persist_error: Option<ConfigError> },
    /// The callback carried no key
    Rejected,
}

impl CallbackOutcome {
    /// The boolean the console flow cares about
    pub fn succeeded(&self) -> bool {
        matches!(self, CallbackOutcome::LoggedIn { .. })
    }
}

struct CallbackState<S> {
    store: Arc<Mutex<S>>,
    completion: std::sync::Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
}

impl<S> CallbackState<S> {
    /// Take the completion sender; `None` once the login has been settled
    fn take_completion(&self) -> Option<oneshot::Sender<CallbackOutcome>> {
        match self.completion.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// A running callback listener
pub struct AuthCallbackServer {
    local_addr: SocketAddr,
    outcome: oneshot::Receiver<CallbackOutcome>,
    shutdown: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl AuthCallbackServer {
    /// Bind `addr` and start serving the callback route
    pub async fn start<S>(addr: SocketAddr, store: Arc<Mutex<S>>) -> Result<Self, AuthError>
    where
        S: CredentialStore + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AuthError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| AuthError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        let (tx, outcome) = oneshot::channel();
        let app = router(store, tx);
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
        });

        tracing::debug!(addr = %local_addr, "Login callback server listening");

        Ok(Self {
            local_addr,
            outcome,
            shutdown,
            task,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Full URL of the callback route
    pub fn callback_url(&self) -> String {
        format!("http://{}{}", self.local_addr, CALLBACK_PATH)
    }

    /// Wait for the callback to settle the login
    ///
    /// Cancel-safe: dropping the future leaves the outcome for a later call.
    pub async fn wait(&mut self) -> Result<CallbackOutcome, AuthError> {
        (&mut self.outcome)
            .await
            .map_err(|_| AuthError::ServerStopped)
    }

    /// Stop accepting connections, giving in-flight requests `grace` to finish
    pub async fn shutdown(mut self, grace: Duration) {
        self.shutdown.cancel();
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(Ok(()))) => tracing::debug!("Login callback server stopped"),
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Login callback server failed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Login callback server task panicked"),
            Err(_) => {
                tracing::warn!(?grace, "Login callback server did not stop in time, aborting");
                self.task.abort();
            }
        }
    }
}

fn router<S>(store: Arc<Mutex<S>>, completion: oneshot::Sender<CallbackOutcome>) -> Router
where
    S: CredentialStore + 'static,
{
    let state = Arc::new(CallbackState {
        store,
        completion: std::sync::Mutex::new(Some(completion)),
    });

    Router::new()
        .route(
            CALLBACK_PATH,
            get(handle_callback::<S>).options(handle_preflight),
        )
        .with_state(state)
}

async fn handle_preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, PUT, DELETE, OPTIONS"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "*"),
            (ACCESS_CONTROL_MAX_AGE, "86400"),
        ],
    )
}

async fn handle_callback<S>(
    State(state): State<Arc<CallbackState<S>>>,
    RawQuery(query): RawQuery,
) -> Response
where
    S: CredentialStore + 'static,
{
    let cors = [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")];

    let Some(completion) = state.take_completion() else {
        tracing::debug!("Ignoring repeated login callback");
        return (StatusCode::GONE, cors, "login already completed").into_response();
    };

    let Some(api_key) = query.as_deref().and_then(credential_from_query) else {
        tracing::warn!("Login callback arrived without an API key");
        let _ = completion.send(CallbackOutcome::Rejected);
        return (StatusCode::BAD_REQUEST, cors, "missing api-key").into_response();
    };

    let persisted = {
        let mut store = state.store.lock().await;
        store.set_credential(Some(api_key));
        store.persist()
    };
    let persist_error = match persisted {
        Ok(()) => {
            tracing::info!("API key saved");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save API key");
            Some(e)
        }
    };

    let _ = completion.send(CallbackOutcome::LoggedIn { persist_error });
    (StatusCode::OK, cors).into_response()
}

fn credential_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == CREDENTIAL_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[derive(Default)]
    struct MemoryStore {
        key: Option<String>,
        persists: AtomicUsize,
    }

    impl MemoryStore {
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
            Ok(())
        }
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_credential_from_query() {
        assert_eq!(
            credential_from_query("api-key=lim_abc").as_deref(),
            Some("lim_abc")
        );
        assert_eq!(
            credential_from_query("state=x&api-key=lim%2Fabc").as_deref(),
            Some("lim/abc")
        );
        assert_eq!(credential_from_query("api-key="), None);
        assert_eq!(credential_from_query("api_key=lim_abc"), None);
    }

    #[tokio::test]
    async fn test_callback_with_key_persists_it() {
        let store = Arc::new(Mutex::new(MemoryStore::default()));
        let (tx, rx) = oneshot::channel();
        let app = router(store.clone(), tx);

        let response = app
            .oneshot(request(Method::GET, "/authn/callback?api-key=lim_8f46"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN].to_str().unwrap(),
            "*"
        );
        assert!(body_text(response).await.is_empty());

        let outcome = rx.await.unwrap();
        assert!(matches!(
            outcome,
            CallbackOutcome::LoggedIn {
                persist_error: None
            }
        ));

        let store = store.lock().await;
        assert_eq!(store.credential(), Some("lim_8f46"));
        assert_eq!(store.persist_count(), 1);
    }

    #[tokio::test]
    async fn test_callback_without_key_is_rejected() {
        let store = Arc::new(Mutex::new(MemoryStore::default()));
        let (tx, rx) = oneshot::channel();
        let app = router(store.clone(), tx);

        let response = app
            .oneshot(request(Method::GET, "/authn/callback"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "missing api-key");

        let outcome = rx.await.unwrap();
        assert!(!outcome.succeeded());

        let store = store.lock().await;
        assert!(store.credential().is_none());
        assert_eq!(store.persist_count(), 0);
    }

    #[tokio::test]
    async fn test_preflight_leaves_login_pending() {
        let store = Arc::new(Mutex::new(MemoryStore::default()));
        let (tx, mut rx) = oneshot::channel();
        let app = router(store, tx);

        let response = app
            .oneshot(request(Method::OPTIONS, "/authn/callback"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "*");
        assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "86400");

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_second_callback_is_gone() {
        let store = Arc::new(Mutex::new(MemoryStore::default()));
        let (tx, _rx) = oneshot::channel();
        let app = router(store.clone(), tx);

        let first = app
            .clone()
            .oneshot(request(Method::GET, "/authn/callback?api-key=lim_first"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(request(Method::GET, "/authn/callback?api-key=lim_second"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::GONE);

        let store = store.lock().await;
        assert_eq!(store.credential(), Some("lim_first"));
        assert_eq!(store.persist_count(), 1);
    }

    #[tokio::test]
    async fn test_other_paths_are_not_found() {
        let store = Arc::new(Mutex::new(MemoryStore::default()));
        let (tx, _rx) = oneshot::channel();
        let app = router(store, tx);

        let response = app
            .oneshot(request(Method::GET, "/authn/other?api-key=x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
