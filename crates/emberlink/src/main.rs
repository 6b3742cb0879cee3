mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "emberlink", version, about = "EmBER+ consumer CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "text",
        env = "EMBERLINK_LOG_FORMAT",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "EMBERLINK_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
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
    fn parses_invoke_with_negative_arguments() {
        let cli = Cli::try_parse_from([
            "emberlink",
            "invoke",
            "127.0.0.1:9000",
            "Mixer/Reset",
            "-6",
            "on",
        ])
        .expect("invoke args should parse");

        let Command::Invoke(args) = cli.command else {
            panic!("expected invoke");
        };
        assert_eq!(args.connect.addr, "127.0.0.1:9000");
        assert_eq!(args.path, "Mixer/Reset");
        assert_eq!(args.arguments, ["-6", "on"]);
    }

    #[test]
    fn parses_watch_with_count() {
        let cli = Cli::try_parse_from([
            "emberlink",
            "watch",
            "localhost:9000",
            "--count",
            "3",
            "--timeout",
            "500ms",
        ])
        .expect("watch args should parse");

        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.count, Some(3));
        assert_eq!(args.connect.timeout, "500ms");
    }

    #[test]
    fn output_formats_are_json_table_and_pretty() {
        for format in ["json", "table", "pretty"] {
            assert!(Cli::try_parse_from(["emberlink", "--format", format, "version"]).is_ok());
        }
        let err = Cli::try_parse_from(["emberlink", "--format", "raw", "version"])
            .expect_err("raw is not an output format");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn tree_requires_an_address() {
        let err = Cli::try_parse_from(["emberlink", "tree"]).expect_err("address is required");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
