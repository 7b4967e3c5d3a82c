use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use avrpc_ipc::{BlockingPool, Dispatcher, Responder, Server, TextCallCodec};

use crate::cmd::ServeArgs;
use crate::exit::{io_error, CliResult, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let mut dispatcher = Dispatcher::new(demo_responder(), Arc::new(TextCallCodec))
        .with_failure_policy(args.on_handler_error.into());

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(size) = args.pool_size {
        builder.max_blocking_threads(size);
        dispatcher = dispatcher.with_worker_pool(Arc::new(BlockingPool));
        info!(pool_size = size, "pooled dispatch enabled");
    }

    let runtime = builder
        .build()
        .map_err(|err| io_error("runtime startup failed", err))?;

    runtime.block_on(async move {
        let listener = Server::bind(&args.bind)
            .await
            .map_err(|err| io_error("bind failed", err))?;
        let server = Server::new(Arc::new(dispatcher));

        tokio::select! {
            result = server.serve(listener) => {
                result.map_err(|err| io_error("serve failed", err))
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                Ok(())
            }
        }
    })?;

    Ok(SUCCESS)
}

/// The responder hosted by `avrpc serve`: a greeter and an echo endpoint,
/// speaking the `method:args` text protocol.
fn demo_responder() -> Arc<Responder> {
    let mut responder = Responder::new();
    responder.register("hello", |args: Bytes| {
        let name = std::str::from_utf8(&args)?
            .strip_prefix("name=")
            .unwrap_or("world")
            .to_string();
        Ok(Bytes::from(format!("Hello, {name}")))
    });
    responder.register("echo", |args: Bytes| Ok(args));
    Arc::new(responder)
}
