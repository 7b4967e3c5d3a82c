use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};

use crate::exit::CliResult;

pub mod call;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an RPC server hosting the built-in demo responder.
    Serve(ServeArgs),
    /// Call a method on a running server and print the reply.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Call(args) => call::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum HandlerErrorPolicy {
    /// Answer failed requests with an empty reply.
    EmptyReply,
    /// Drop the connection without replying.
    Disconnect,
}

impl From<HandlerErrorPolicy> for avrpc_ipc::FailurePolicy {
    fn from(policy: HandlerErrorPolicy) -> Self {
        match policy {
            HandlerErrorPolicy::EmptyReply => avrpc_ipc::FailurePolicy::EmptyReply,
            HandlerErrorPolicy::Disconnect => avrpc_ipc::FailurePolicy::Disconnect,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind, host:port.
    #[arg(default_value = "127.0.0.1:8888")]
    pub bind: String,
    /// Run handlers on a worker pool of this size instead of the I/O
    /// threads.
    #[arg(long, value_name = "N")]
    pub pool_size: Option<usize>,
    /// What to do with a connection whose handler fails.
    #[arg(long, value_enum, default_value = "empty-reply")]
    pub on_handler_error: HandlerErrorPolicy,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Server address, host:port.
    pub addr: String,
    /// Method name to invoke.
    pub method: String,
    /// Argument string passed to the handler.
    #[arg(long, default_value = "")]
    pub args: String,
    /// Socket read/write timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {}

/// Parse durations of the form `500ms`, `5s`, or `2m`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let (value, unit): (&str, fn(u64) -> Duration) = if let Some(v) = input.strip_suffix("ms") {
        (v, Duration::from_millis)
    } else if let Some(v) = input.strip_suffix('s') {
        (v, Duration::from_secs)
    } else if let Some(v) = input.strip_suffix('m') {
        (v, |m| Duration::from_secs(m * 60))
    } else {
        return Err(format!("invalid duration {input:?} (expected e.g. 5s, 500ms)"));
    };
    value
        .parse::<u64>()
        .map(unit)
        .map_err(|_| format!("invalid duration {input:?} (expected e.g. 5s, 500ms)"))
}
