/// Errors that can occur in RPC operations.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] avrpc_frame::FrameError),

    /// No handler is registered under the requested method name.
    #[error("method {0:?} not found in responder")]
    MethodNotFound(String),

    /// A handler failed (returned an error or panicked).
    #[error("handler {method:?} failed: {reason}")]
    Handler { method: String, reason: String },

    /// The request message could not be decoded into a named call.
    #[error("invalid call: {0}")]
    InvalidCall(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;
