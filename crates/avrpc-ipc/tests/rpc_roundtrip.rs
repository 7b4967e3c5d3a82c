//! End-to-end round trips: async server, blocking client, real sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use avrpc_ipc::{
    BlockingPool, BoxError, Dispatcher, FailurePolicy, Responder, Server, SocketTransceiver,
    TextCallCodec,
};

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
    responder.register("slow", |args: Bytes| {
        std::thread::sleep(Duration::from_millis(100));
        Ok(args)
    });
    responder.register("fails", |_| -> Result<Bytes, BoxError> {
        Err("intentional failure".into())
    });
    Arc::new(responder)
}

async fn start_server(dispatcher: Dispatcher) -> SocketAddr {
    let listener = Server::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let server = Server::new(Arc::new(dispatcher));
        let _ = server.serve(listener).await;
    });
    addr
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hello_round_trip() {
    let dispatcher = Dispatcher::new(demo_responder(), Arc::new(TextCallCodec));
    let addr = start_server(dispatcher).await;

    let reply = tokio::task::spawn_blocking(move || {
        let mut client = SocketTransceiver::connect(addr).expect("connect");
        let reply = client.transceive(b"hello:name=rich").expect("transceive");
        client.close().expect("close");
        reply
    })
    .await
    .expect("client thread");

    assert_eq!(reply.as_ref(), b"Hello, rich");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_client_many_calls() {
    let dispatcher = Dispatcher::new(demo_responder(), Arc::new(TextCallCodec));
    let addr = start_server(dispatcher).await;

    tokio::task::spawn_blocking(move || {
        let mut client = SocketTransceiver::connect(addr).expect("connect");

        for i in 0..10 {
            let request = format!("echo:message-{i}");
            let reply = client.transceive(request.as_bytes()).expect("transceive");
            assert_eq!(reply, Bytes::from(format!("message-{i}")));
        }

        // Large multi-frame payload through the same connection.
        let big = format!("echo:{}", "x".repeat(64 * 1024));
        let reply = client.transceive(big.as_bytes()).expect("large transceive");
        assert_eq!(reply.len(), 64 * 1024);

        client.close().expect("close");
    })
    .await
    .expect("client thread");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_failure_yields_empty_reply() {
    let dispatcher = Dispatcher::new(demo_responder(), Arc::new(TextCallCodec));
    let addr = start_server(dispatcher).await;

    tokio::task::spawn_blocking(move || {
        let mut client = SocketTransceiver::connect(addr).expect("connect");

        let reply = client.transceive(b"fails").expect("transceive");
        assert!(reply.is_empty());

        // The connection survives the failure.
        let reply = client.transceive(b"hello:name=rich").expect("transceive");
        assert_eq!(reply.as_ref(), b"Hello, rich");

        client.close().expect("close");
    })
    .await
    .expect("client thread");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_policy_closes_connection() {
    let dispatcher = Dispatcher::new(demo_responder(), Arc::new(TextCallCodec))
        .with_failure_policy(FailurePolicy::Disconnect);
    let addr = start_server(dispatcher).await;

    tokio::task::spawn_blocking(move || {
        let mut client = SocketTransceiver::connect(addr).expect("connect");
        let err = client.transceive(b"fails").expect_err("no reply expected");
        assert!(matches!(
            err,
            avrpc_ipc::RpcError::Frame(avrpc_frame::FrameError::ConnectionClosed)
        ));
    })
    .await
    .expect("client thread");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pooled_connections_get_their_own_replies() {
    let dispatcher = Dispatcher::new(demo_responder(), Arc::new(TextCallCodec))
        .with_worker_pool(Arc::new(BlockingPool));
    let addr = start_server(dispatcher).await;

    // Two concurrent connections with slow pooled handlers; each must get
    // its own reply on its own socket.
    let clients: Vec<_> = ["alpha", "beta"]
        .into_iter()
        .map(|tag| {
            tokio::task::spawn_blocking(move || {
                let mut client = SocketTransceiver::connect(addr).expect("connect");
                let request = format!("slow:{tag}");
                let reply = client.transceive(request.as_bytes()).expect("transceive");
                client.close().expect("close");
                (tag, reply)
            })
        })
        .collect();

    for handle in clients {
        let (tag, reply) = handle.await.expect("client thread");
        assert_eq!(reply, Bytes::from(tag));
    }
}
