use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{error, warn};

use crate::error::RpcError;

/// Error type handlers may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Box<dyn Fn(Bytes) -> std::result::Result<Bytes, BoxError> + Send + Sync>;

/// A request decoded into a named call with opaque argument bytes.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: String,
    pub args: Bytes,
}

/// The serialization boundary: turns a raw request message into a named
/// call. Reply payloads are whatever bytes the handler returns; this core
/// never interprets them.
pub trait CallCodec: Send + Sync {
    fn decode_call(&self, message: &[u8]) -> std::result::Result<Call, RpcError>;
}

/// Reference codec for text protocols: `"method:args"`, where everything
/// after the first colon is the argument bytes. A bare method name is a
/// call with empty arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCallCodec;

impl CallCodec for TextCallCodec {
    fn decode_call(&self, message: &[u8]) -> std::result::Result<Call, RpcError> {
        let text = std::str::from_utf8(message)
            .map_err(|err| RpcError::InvalidCall(err.to_string()))?;
        let (method, args) = match text.split_once(':') {
            Some((method, args)) => (method, args),
            None => (text, ""),
        };
        if method.is_empty() {
            return Err(RpcError::InvalidCall("empty method name".into()));
        }
        Ok(Call {
            method: method.to_string(),
            args: Bytes::copy_from_slice(args.as_bytes()),
        })
    }
}

/// Handler registry: an explicit name-to-handler table built at
/// construction. A lookup miss is the `MethodNotFound` path.
#[derive(Default)]
pub struct Responder {
    handlers: HashMap<String, Handler>,
}

impl Responder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a method name, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Bytes) -> std::result::Result<Bytes, BoxError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// True if a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Invoke the handler registered under `method`.
    ///
    /// Handler panics are contained here and reported as
    /// [`RpcError::Handler`], so they can never unwind into the runtime.
    pub fn invoke(&self, method: &str, args: Bytes) -> std::result::Result<Bytes, RpcError> {
        let handler = self
            .handlers
            .get(method)
            .ok_or_else(|| RpcError::MethodNotFound(method.to_string()))?;

        match catch_unwind(AssertUnwindSafe(|| handler(args))) {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => Err(RpcError::Handler {
                method: method.to_string(),
                reason: err.to_string(),
            }),
            Err(panic) => Err(RpcError::Handler {
                method: method.to_string(),
                reason: panic_reason(panic.as_ref()),
            }),
        }
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Where a handler runs: on the connection's I/O task, or off it.
///
/// The pool handle is passed in explicitly so tests can substitute a
/// synchronous one.
pub trait WorkerPool: Send + Sync {
    fn submit(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Worker pool backed by tokio's blocking thread pool. Sized via the
/// runtime's `max_blocking_threads`, independent of connection count.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingPool;

impl WorkerPool for BlockingPool {
    fn submit(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        tokio::task::spawn_blocking(job);
    }
}

/// What to do with the connection when a handler fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Send a zero-length reply; the connection stays usable.
    #[default]
    EmptyReply,
    /// Abandon the reply and drop the connection; the client observes
    /// `ConnectionClosed`.
    Disconnect,
}

/// Dispatch verdict handed back to the connection.
#[derive(Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Reply(Bytes),
    Disconnect,
}

/// Routes assembled request messages to responder handlers and translates
/// failures into reply-or-disconnect verdicts.
pub struct Dispatcher {
    responder: Arc<Responder>,
    codec: Arc<dyn CallCodec>,
    pool: Option<Arc<dyn WorkerPool>>,
    failure_policy: FailurePolicy,
}

impl Dispatcher {
    /// Inline dispatcher: handlers run on the connection's I/O task.
    /// Suitable for fast, non-blocking handlers only.
    pub fn new(responder: Arc<Responder>, codec: Arc<dyn CallCodec>) -> Self {
        Self {
            responder,
            codec,
            pool: None,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Run handlers on the given worker pool instead of the I/O task.
    pub fn with_worker_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Override the handler-failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Decode and invoke without failure-policy translation.
    pub fn call(&self, message: Bytes) -> std::result::Result<Bytes, RpcError> {
        run_call(&self.responder, self.codec.as_ref(), message)
    }

    /// Dispatch one request message and translate the result per policy.
    ///
    /// Application-layer faults never escape this method: a missing method
    /// or an undecodable call is logged and answered with an empty reply
    /// (the connection stays open); a failed handler is logged and handled
    /// per [`FailurePolicy`].
    pub async fn dispatch(&self, message: Bytes) -> DispatchOutcome {
        let result = match &self.pool {
            None => run_call(&self.responder, self.codec.as_ref(), message),
            Some(pool) => {
                let (tx, rx) = oneshot::channel();
                let responder = Arc::clone(&self.responder);
                let codec = Arc::clone(&self.codec);
                pool.submit(Box::new(move || {
                    // The receiver is gone if the connection died; the
                    // result is simply discarded.
                    let _ = tx.send(run_call(&responder, codec.as_ref(), message));
                }));
                match rx.await {
                    Ok(result) => result,
                    Err(_) => Err(RpcError::Handler {
                        method: String::new(),
                        reason: "worker pool dropped the call".into(),
                    }),
                }
            }
        };

        match result {
            Ok(reply) => DispatchOutcome::Reply(reply),
            Err(RpcError::MethodNotFound(method)) => {
                warn!(%method, "no handler registered");
                DispatchOutcome::Reply(Bytes::new())
            }
            Err(RpcError::InvalidCall(reason)) => {
                warn!(%reason, "request could not be decoded into a call");
                DispatchOutcome::Reply(Bytes::new())
            }
            Err(err) => {
                error!(error = %err, "handler failed");
                match self.failure_policy {
                    FailurePolicy::EmptyReply => DispatchOutcome::Reply(Bytes::new()),
                    FailurePolicy::Disconnect => DispatchOutcome::Disconnect,
                }
            }
        }
    }
}

fn run_call(
    responder: &Responder,
    codec: &dyn CallCodec,
    message: Bytes,
) -> std::result::Result<Bytes, RpcError> {
    let call = codec.decode_call(&message)?;
    responder.invoke(&call.method, call.args)
}
