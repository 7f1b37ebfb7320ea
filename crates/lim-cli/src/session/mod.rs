//! Remote command sessions
//!
//! A [`RemoteCommandSession`] owns one WebSocket connection to an instance's
//! control endpoint and runs exactly one command over it. Output chunks are
//! written to the local streams as they arrive and the terminal result's exit
//! code is handed back to the caller.
//!
//! [`run_command`] wires a session to a signal source: whichever of "result
//! arrived", "stream failed" and "operator interrupted" happens first decides
//! the outcome, and the session is closed exactly once either way.

mod guard;
mod signal;

pub use guard::{CompletionGuard, Termination};
pub use signal::{SignalBridge, TerminationSignal};

use std::future::Future;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use lim_core::error::{ConnectionError, SessionError};
use lim_core::RemoteEndpoint;
use lim_protocol::{ClientMessage, CommandRequest, CorrelationId, ProtocolError, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Lifecycle of a session
///
/// There is no disconnected state: a session only exists once the handshake
/// has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    AwaitingResult,
    Completed,
    Failed,
}

/// Handle that closes a session's connection from any task
///
/// All writes to the socket go through the same lock, so a close never
/// interleaves with a half-written request.
#[derive(Clone)]
pub struct SessionCloser {
    inner: Arc<CloserInner>,
}

struct CloserInner {
    sink: Mutex<WsSink>,
    closed: AtomicBool,
    timeout: Duration,
}

impl SessionCloser {
    fn new(sink: WsSink, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(CloserInner {
                sink: Mutex::new(sink),
                closed: AtomicBool::new(false),
                timeout,
            }),
        }
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Send a close frame and shut the socket; later calls do nothing
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let timeout = self.inner.timeout;
        let mut sink = self.inner.sink.lock().await;

        match tokio::time::timeout(timeout, sink.send(Message::Close(None))).await {
            Ok(Ok(())) => tracing::debug!("Sent close frame"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Failed to send close frame"),
            Err(_) => tracing::debug!(?timeout, "Timed out sending close frame"),
        }

        if let Ok(Err(e)) = tokio::time::timeout(timeout, sink.close()).await {
            tracing::debug!(error = %e, "Error closing connection");
        }
    }

    async fn send_text(&self, text: String) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let mut sink = self.inner.sink.lock().await;
        sink.send(Message::Text(text))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}

/// One command over one authenticated WebSocket connection
pub struct RemoteCommandSession {
    url: String,
    state: SessionState,
    source: WsSource,
    closer: SessionCloser,
    outstanding: Option<CorrelationId>,
}

impl RemoteCommandSession {
    /// Dial `endpoint`, presenting its token as a bearer credential
    ///
    /// `close_timeout` bounds the close handshake performed by [`close`].
    ///
    /// [`close`]: RemoteCommandSession::close
    pub async fn connect(
        endpoint: &RemoteEndpoint,
        close_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let url = endpoint.url.clone();
        let invalid = |reason: String| ConnectionError::InvalidEndpoint {
            url: url.clone(),
            reason,
        };

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| invalid(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", endpoint.token))
            .map_err(|_| invalid("token is not a valid header value".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        tracing::debug!(url = %url, "Connecting to endpoint");

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| classify_handshake_error(&url, e))?;

        tracing::debug!(status = %response.status(), "WebSocket connected");

        let (sink, source) = stream.split();
        Ok(Self {
            url,
            state: SessionState::Connected,
            source,
            closer: SessionCloser::new(sink, close_timeout),
            outstanding: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Correlation id of the request sent on this session, if any
    pub fn outstanding(&self) -> Option<&CorrelationId> {
        self.outstanding.as_ref()
    }

    /// Handle for closing the connection from another task
    pub fn closer(&self) -> SessionCloser {
        self.closer.clone()
    }

    /// Send the command. A session carries a single request.
    pub async fn send(&mut self, args: Vec<String>) -> Result<CorrelationId, SessionError> {
        if self.outstanding.is_some() {
            return Err(SessionError::AlreadySent);
        }

        let request = CommandRequest::new(args);
        let id = request.id.clone();
        let payload = ClientMessage::Command(request).encode()?;
        self.outstanding = Some(id.clone());

        if let Err(e) = self.closer.send_text(payload).await {
            self.state = SessionState::Failed;
            return Err(e);
        }

        tracing::debug!(id = %id, "Command sent");
        self.state = SessionState::AwaitingResult;
        Ok(id)
    }

    /// Stream results for the outstanding request until the terminal one
    ///
    /// Each chunk is written and flushed before the next frame is read.
    /// Frames that are not results for this request are skipped.
    pub async fn receive<O, E>(
        &mut self,
        stdout: &mut O,
        stderr: &mut E,
    ) -> Result<i32, SessionError>
    where
        O: Write,
        E: Write,
    {
        let id = self.outstanding.clone().ok_or(SessionError::NothingSent)?;

        let result = self.receive_loop(&id, stdout, stderr).await;
        self.state = match &result {
            Ok(_) => SessionState::Completed,
            Err(_) => SessionState::Failed,
        };
        result
    }

    async fn receive_loop<O, E>(
        &mut self,
        id: &CorrelationId,
        stdout: &mut O,
        stderr: &mut E,
    ) -> Result<i32, SessionError>
    where
        O: Write,
        E: Write,
    {
        loop {
            let frame = match self.source.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(SessionError::Transport(e.to_string())),
                None => return Err(ProtocolError::ClosedBeforeResult.into()),
            };

            let payload = match frame {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(data) => data,
                Message::Close(frame) => {
                    tracing::debug!(?frame, "Endpoint closed the connection");
                    return Err(ProtocolError::ClosedBeforeResult.into());
                }
                _ => continue,
            };

            let result = match ServerMessage::decode(&payload) {
                Ok(ServerMessage::CommandResult(result)) => result,
                Ok(ServerMessage::Unknown) => {
                    tracing::trace!("Ignoring message of unhandled type");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Discarding undecodable frame");
                    continue;
                }
            };

            if !id.matches(&result.id) {
                tracing::debug!(id = %result.id, "Ignoring result for another request");
                continue;
            }

            if self.closer.is_closed() {
                return Err(SessionError::Closed);
            }

            if let Some(chunk) = result.stdout_bytes() {
                write_chunk(stdout, chunk)?;
            }
            if let Some(chunk) = result.stderr_bytes() {
                write_chunk(stderr, chunk)?;
            }

            if let Some(code) = result.exit_code {
                tracing::debug!(id = %id, exit_code = code, "Command finished");
                return Ok(code);
            }
        }
    }

    /// Close the connection; idempotent
    pub async fn close(&self) {
        self.closer.close().await;
    }
}

fn write_chunk<W: Write>(out: &mut W, chunk: &[u8]) -> Result<(), SessionError> {
    out.write_all(chunk)
        .and_then(|()| out.flush())
        .map_err(SessionError::Output)
}

fn classify_handshake_error(url: &str, error: WsError) -> ConnectionError {
    match error {
        WsError::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
            ConnectionError::Unauthorized(response.status().as_u16())
        }
        WsError::Url(e) => ConnectionError::InvalidEndpoint {
            url: url.to_string(),
            reason: e.to_string(),
        },
        other => ConnectionError::Handshake {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Send `args` and stream the result, racing the exchange against `signals`
///
/// The signal observer runs on its own task. On a signal it claims the
/// outcome and closes the session; a result that arrives afterwards is
/// discarded. The session is closed before this returns in every case.
pub async fn run_command<O, E, F>(
    session: &mut RemoteCommandSession,
    args: Vec<String>,
    stdout: &mut O,
    stderr: &mut E,
    signals: F,
) -> Result<Termination, SessionError>
where
    O: Write,
    E: Write,
    F: Future<Output = TerminationSignal> + Send + 'static,
{
    let guard = Arc::new(CompletionGuard::new());
    let closer = session.closer();

    let observer = {
        let guard = guard.clone();
        let closer = closer.clone();
        tokio::spawn(async move {
            let signal = signals.await;
            if guard.settle(Termination::Signalled(signal)) {
                tracing::info!(%signal, "Interrupted, closing session");
                closer.close().await;
            }
        })
    };

    let exchange = async {
        session.send(args).await?;
        session.receive(stdout, stderr).await
    };

    let failure = tokio::select! {
        biased;
        _ = guard.settled() => None,
        result = exchange => match result {
            Ok(code) => {
                guard.settle(Termination::Completed(code));
                None
            }
            Err(e) => guard.settle(Termination::Failed).then_some(e),
        },
    };

    // A signal-side close already in flight must finish sending its frame
    if let Some(Termination::Signalled(_)) = guard.outcome() {
        let _ = observer.await;
    } else {
        observer.abort();
    }
    closer.close().await;

    if !matches!(guard.outcome(), Some(Termination::Completed(_))) {
        session.state = SessionState::Failed;
    }

    if let Some(e) = failure {
        return Err(e);
    }
    Ok(guard.outcome().unwrap_or(Termination::Failed))
}
