//! Synchronous call bridge.
//!
//! Callers on any thread submit [`PendingCall`]s and block for the answer.
//! A single worker thread owns the remote session and services calls one at
//! a time, in submission order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::descriptor::{ToolDescriptor, descriptors_from};
use crate::result::{CallResult, ErrorKind};
use crate::session::{Connector, Session};
use crate::{Error, Result};

/// Default time a caller waits for a tool result.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the request queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

const WORKER_THREAD_NAME: &str = "toolbridge-worker";

/// Bridge settings.
#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig {
    pub call_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Lifecycle of a bridge. A bridge never leaves `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    /// `start` is connecting; calls are refused.
    Starting,
    Running,
    /// `stop` is draining queued calls.
    Stopping,
    Stopped,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// A call waiting to be serviced by the worker.
#[derive(Debug)]
pub struct PendingCall {
    pub id: u64,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    reply: SyncSender<CallResult>,
}

enum Request {
    Call(PendingCall),
    ListTools(SyncSender<Result<Vec<ToolDescriptor>>>),
}

struct Shared {
    state: BridgeState,
    requests: Option<mpsc::Sender<Request>>,
    worker: Option<JoinHandle<()>>,
}

struct Inner {
    config: BridgeConfig,
    shared: Mutex<Shared>,
    next_id: AtomicU64,
}

/// Handle to the process-wide bridge. Clones share one worker and session.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    /// Create an idle bridge.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                shared: Mutex::new(Shared {
                    state: BridgeState::Idle,
                    requests: None,
                    worker: None,
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn state(&self) -> BridgeState {
        self.lock().state
    }

    /// Spawn the worker and connect.
    ///
    /// Returns once the worker holds a live session. If the service is
    /// unreachable the worker is joined, the bridge ends up `Stopped`, and
    /// [`Error::Connection`] is returned.
    pub fn start<C: Connector>(&self, connector: C) -> Result<()> {
        {
            let mut shared = self.lock();
            if shared.state != BridgeState::Idle {
                return Err(Error::InvalidState(format!(
                    "cannot start a bridge that is {}",
                    shared.state
                )));
            }
            shared.state = BridgeState::Starting;
        }

        let (requests, receiver) = mpsc::channel(self.inner.config.queue_capacity.max(1));
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);

        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_main(connector, receiver, ready_tx));
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                self.lock().state = BridgeState::Stopped;
                return Err(Error::Connection(format!("failed to spawn worker: {e}")));
            }
        };

        let outcome = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(Error::Connection("worker exited during startup".into())));

        let mut shared = self.lock();
        match outcome {
            Ok(()) => {
                shared.state = BridgeState::Running;
                shared.requests = Some(requests);
                shared.worker = Some(worker);
                info!("bridge running");
                Ok(())
            }
            Err(e) => {
                shared.state = BridgeState::Stopped;
                drop(shared);
                let _ = worker.join();
                warn!(error = %e, "bridge failed to start");
                Err(e)
            }
        }
    }

    /// Drain queued calls, close the session and join the worker.
    ///
    /// A no-op on a bridge that is idle or already stopped.
    pub fn stop(&self) -> Result<()> {
        let worker = {
            let mut shared = self.lock();
            match shared.state {
                BridgeState::Running => {}
                BridgeState::Idle | BridgeState::Stopped => return Ok(()),
                state => {
                    return Err(Error::InvalidState(format!(
                        "cannot stop a bridge that is {state}"
                    )));
                }
            }
            shared.state = BridgeState::Stopping;
            // Dropping the only sender closes the queue once it is drained.
            shared.requests = None;
            shared.worker.take()
        };

        info!("bridge stopping");
        let joined = worker.map(JoinHandle::join);
        self.lock().state = BridgeState::Stopped;

        match joined {
            Some(Err(_)) => Err(Error::InvalidState("worker panicked".into())),
            _ => {
                info!("bridge stopped");
                Ok(())
            }
        }
    }

    /// Call a tool and block until its result or the call timeout.
    ///
    /// Every outcome is a value: failures come back as
    /// [`CallResult::Error`], never as a panic or `Err`.
    pub fn call_tool(&self, name: impl Into<String>, arguments: Map<String, Value>) -> CallResult {
        let tool_name = name.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = std_mpsc::sync_channel(1);

        let call = PendingCall {
            id,
            tool_name: tool_name.clone(),
            arguments,
            reply,
        };
        if let Err(message) = self.submit(Request::Call(call)) {
            debug!(id, tool = %tool_name, reason = %message, "call not scheduled");
            return CallResult::error(ErrorKind::Schedule, message);
        }
        debug!(id, tool = %tool_name, "call submitted");

        let timeout = self.inner.config.call_timeout;
        match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(id, tool = %tool_name, ?timeout, "call timed out");
                CallResult::error(
                    ErrorKind::Timeout,
                    format!("tool {tool_name} timed out after {timeout:?}"),
                )
            }
            Err(RecvTimeoutError::Disconnected) => CallResult::error(
                ErrorKind::RemoteCall,
                format!("worker exited before answering {tool_name}"),
            ),
        }
    }

    /// List tools through the worker's session.
    pub fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let (reply, receiver) = std_mpsc::sync_channel(1);
        self.submit(Request::ListTools(reply))
            .map_err(Error::Schedule)?;

        let timeout = self.inner.config.call_timeout;
        match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Schedule("worker exited before answering".into()))
            }
        }
    }

    fn submit(&self, request: Request) -> std::result::Result<(), String> {
        let shared = self.lock();
        let requests = match (&shared.state, &shared.requests) {
            (BridgeState::Running, Some(requests)) => requests,
            (state, _) => return Err(format!("bridge is {state}")),
        };
        requests.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => "request queue is full".to_string(),
            TrySendError::Closed(_) => "worker is no longer accepting calls".to_string(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let shared = self.shared.get_mut().unwrap_or_else(PoisonError::into_inner);
        shared.requests = None;
        if let Some(worker) = shared.worker.take() {
            let _ = worker.join();
        }
        shared.state = BridgeState::Stopped;
    }
}

fn worker_main<C: Connector>(
    connector: C,
    requests: mpsc::Receiver<Request>,
    ready: SyncSender<Result<()>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(Error::Connection(format!(
                "failed to build worker runtime: {e}"
            ))));
            return;
        }
    };

    runtime.block_on(async move {
        let mut session = match connector.connect().await {
            Ok(session) => session,
            Err(e) => {
                let _ = ready.send(Err(Error::Connection(e.to_string())));
                return;
            }
        };

        if ready.send(Ok(())).is_err() {
            let _ = session.close().await;
            return;
        }

        serve(&mut session, requests).await;

        match session.close().await {
            Ok(()) => debug!("remote session closed"),
            Err(e) => warn!(error = %e, "failed to close remote session"),
        }
    });
}

async fn serve<S: Session>(session: &mut S, mut requests: mpsc::Receiver<Request>) {
    while let Some(request) = requests.recv().await {
        match request {
            Request::Call(call) => {
                let PendingCall {
                    id,
                    tool_name,
                    arguments,
                    reply,
                } = call;
                debug!(id, tool = %tool_name, "servicing call");

                let result = match session.call_tool(&tool_name, arguments).await {
                    Ok(result) => CallResult::from_remote(&result),
                    Err(e) => CallResult::error(ErrorKind::RemoteCall, e.to_string()),
                };
                debug!(id, tool = %tool_name, error = result.is_error(), "call completed");

                if reply.send(result).is_err() {
                    warn!(id, tool = %tool_name, "caller stopped waiting; discarding result");
                }
            }
            Request::ListTools(reply) => {
                let result = session
                    .list_tools()
                    .await
                    .map(descriptors_from)
                    .map_err(Error::from);
                let _ = reply.send(result);
            }
        }
    }
}
