mod cmd;
mod exit;
mod logging;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "avrpc", version, about = "Framed RPC server and client")]
struct Cli {
    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    match cmd::run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from(["avrpc", "serve", "0.0.0.0:9000", "--pool-size", "8"])
            .expect("serve args should parse");
        assert!(matches!(cli.command, Command::Serve(_)));
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["avrpc", "serve"]).expect("default serve should parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind, "127.0.0.1:8888");
        assert!(args.pool_size.is_none());
    }

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "avrpc",
            "call",
            "127.0.0.1:8888",
            "hello",
            "--args",
            "name=rich",
            "--timeout",
            "2s",
        ])
        .expect("call args should parse");

        let Command::Call(args) = cli.command else {
            panic!("expected call");
        };
        assert_eq!(args.method, "hello");
        assert_eq!(args.args, "name=rich");
    }

    #[test]
    fn rejects_unknown_handler_error_policy() {
        let err = Cli::try_parse_from([
            "avrpc",
            "serve",
            "--on-handler-error",
            "retry",
        ])
        .expect_err("unknown policy should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
