//! Per-connection session
//!
//! Drives one client through negotiation, authentication, dispatch and
//! relay, strictly in that order. Any failure ends the session.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::auth::AuthenticationMethod;
use crate::config::Config;
use crate::error::{ProxyError, ProxyResult};
use crate::protocol::{negotiate, Request, RequestDispatcher};
use crate::relay::{relay, RelayStats, DEFAULT_BUFFER_SIZE};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique session id
pub fn next_session_id() -> String {
    format!("conn_{}", NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Session lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Negotiation,
    Authentication,
    Dispatch,
    Relay,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Negotiation => "negotiation",
            Stage::Authentication => "authentication",
            Stage::Dispatch => "dispatch",
            Stage::Relay => "relay",
        };
        f.write_str(name)
    }
}

/// Settings shared by every session of a listener
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Authentication methods in server priority order
    pub methods: Vec<Arc<dyn AuthenticationMethod>>,
    pub dispatcher: RequestDispatcher,
    pub buffer_size: usize,
    pub handshake_timeout: Option<Duration>,
}

impl SessionOptions {
    /// Options with the given methods and no deadlines
    pub fn new(methods: Vec<Arc<dyn AuthenticationMethod>>) -> Self {
        Self {
            methods,
            dispatcher: RequestDispatcher::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            handshake_timeout: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            methods: config.authenticators(),
            dispatcher: RequestDispatcher::with_connect_timeout(config.server.connect_timeout),
            buffer_size: config.server.buffer_size,
            handshake_timeout: config.server.handshake_timeout,
        }
    }
}

/// A single client session
pub struct Session<S> {
    id: String,
    stream: S,
    options: Arc<SessionOptions>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(id: impl Into<String>, stream: S, options: Arc<SessionOptions>) -> Self {
        Self {
            id: id.into(),
            stream,
            options,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run the session to completion.
    ///
    /// Failures are logged here with the stage they happened in, then
    /// returned to the caller.
    pub async fn run(self) -> ProxyResult<RelayStats> {
        let Session {
            id,
            mut stream,
            options,
        } = self;

        let mut stage = Stage::Negotiation;
        let handshake = handshake(&mut stream, &options, &mut stage);
        let established = match options.handshake_timeout {
            Some(limit) => match timeout(limit, handshake).await {
                Ok(result) => result,
                Err(_) => Err(ProxyError::Timeout("handshake")),
            },
            None => handshake.await,
        };

        let (dest, request) = match established {
            Ok(established) => established,
            Err(e) => {
                log_failure(&id, stage, &e);
                return Err(e);
            }
        };

        let destination = request.destination();
        debug!(session_id = %id, target = %destination, "Starting relay");

        match relay(stream, dest, options.buffer_size).await {
            Ok(stats) => {
                stats.log_stats(&destination);
                Ok(stats)
            }
            Err(e) => {
                log_failure(&id, Stage::Relay, &e);
                Err(e)
            }
        }
    }
}

/// Negotiation, authentication and dispatch; `stage` tracks progress so a
/// failure or timeout can be attributed.
async fn handshake<S>(
    stream: &mut S,
    options: &SessionOptions,
    stage: &mut Stage,
) -> ProxyResult<(TcpStream, Request)>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    *stage = Stage::Negotiation;
    let method = negotiate(stream, &options.methods).await?;

    *stage = Stage::Authentication;
    if !method.authenticate(&mut *stream).await? {
        return Err(ProxyError::Auth(format!(
            "credentials rejected by {} method",
            method.name()
        )));
    }
    debug!(method = method.name(), "Client authenticated");

    *stage = Stage::Dispatch;
    let (dest, request) = options.dispatcher.dispatch(stream).await?;
    info!(command = %request.command, target = %request.destination(), "Request dispatched");

    Ok((dest, request))
}

fn log_failure(id: &str, stage: Stage, err: &ProxyError) {
    if err.is_client_fault() {
        info!(session_id = %id, stage = %stage, kind = err.kind(), error = %err, "Session failed");
    } else {
        error!(session_id = %id, stage = %stage, kind = err.kind(), error = %err, "Session failed");
    }
}
