use std::io::Write;

use avrpc_frame::FrameConfig;
use avrpc_ipc::SocketTransceiver;

use crate::cmd::{parse_duration, CallArgs};
use crate::exit::{rpc_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: CallArgs) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout).map_err(|msg| CliError::new(USAGE, msg))?;
    let config = FrameConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        ..FrameConfig::default()
    };

    let mut client = SocketTransceiver::connect_with_config(args.addr.as_str(), config)
        .map_err(|err| rpc_error("connect failed", err))?;

    let request = if args.args.is_empty() {
        args.method.clone()
    } else {
        format!("{}:{}", args.method, args.args)
    };

    let reply = client
        .transceive(request.as_bytes())
        .map_err(|err| rpc_error("call failed", err))?;
    client.close().map_err(|err| rpc_error("close failed", err))?;

    // Reply bytes are opaque; write them through untouched.
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&reply)
        .and_then(|()| stdout.write_all(b"\n"))
        .map_err(|err| crate::exit::io_error("write to stdout failed", err))?;

    Ok(SUCCESS)
}
