//! Framed RPC over TCP: an async server that assembles sentinel-terminated
//! messages and dispatches them to named handlers, and a blocking client
//! transceiver speaking the same wire format.
//!
//! The server never pipelines: within one connection, requests are handled
//! strictly one at a time in arrival order. Handlers run inline on the
//! connection's I/O task or, via [`Dispatcher::with_worker_pool`], off it.

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod server;
pub mod transceiver;

pub use connection::Connection;
pub use dispatch::{
    BlockingPool, BoxError, Call, CallCodec, DispatchOutcome, Dispatcher, FailurePolicy,
    Responder, TextCallCodec, WorkerPool,
};
pub use error::{Result, RpcError};
pub use server::Server;
pub use transceiver::SocketTransceiver;
