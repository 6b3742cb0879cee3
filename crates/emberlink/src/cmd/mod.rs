use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use emberlink_consumer::{Consumer, ConsumerConfig};
use emberlink_schema::{DynamicSchema, Schema, StaticSchema};
use tokio::net::TcpStream;
use tracing::debug;

use crate::exit::{
    consumer_error, io_error, schema_error, CliError, CliResult, TIMEOUT, USAGE,
};
use crate::output::OutputFormat;

pub mod invoke;
pub mod tree;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a provider's tree once it is fully known.
    Tree(TreeArgs),
    /// Print change notifications as they arrive.
    Watch(WatchArgs),
    /// Invoke a function and print its result.
    Invoke(InvokeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Tree(args) => block_on(tree::run(args, format)),
        Command::Watch(args) => block_on(watch::run(args, format)),
        Command::Invoke(args) => block_on(invoke::run(args, format)),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Provider address (host:port).
    pub addr: String,
    /// Schema descriptor (JSON). Default: mirror the whole tree.
    #[arg(long, value_name = "FILE", env = "EMBERLINK_SCHEMA")]
    pub schema: Option<PathBuf>,
    /// Time allowed for connecting, synchronizing and each invocation (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// S101 slot to address.
    #[arg(long, default_value = "0")]
    pub slot: u8,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Exit after printing N changes.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct InvokeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Identifier path of the function, `/`-separated.
    pub path: String,
    /// Arguments, parsed according to the function's signature.
    #[arg(value_name = "ARG", allow_negative_numbers = true)]
    pub arguments: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn block_on(future: impl Future<Output = CliResult<i32>>) -> CliResult<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;
    runtime.block_on(future)
}

/// Connect to the provider and wait until the tree is ready.
pub(crate) async fn connect(args: &ConnectArgs) -> CliResult<Consumer> {
    let timeout = parse_timeout(&args.timeout)?;
    let schema = load_schema(args.schema.as_deref())?;

    let stream = tokio::time::timeout(timeout, TcpStream::connect(&args.addr))
        .await
        .map_err(|_| CliError::new(TIMEOUT, format!("connect timed out after {timeout:?}")))?
        .map_err(|err| io_error("connect failed", err))?;
    debug!(addr = %args.addr, "connected");

    let config = ConsumerConfig {
        slot: args.slot,
        ..ConsumerConfig::default()
    };
    let consumer = Consumer::open(stream, schema, config);
    match tokio::time::timeout(timeout, consumer.await_ready()).await {
        Ok(Ok(())) => Ok(consumer),
        Ok(Err(err)) => Err(consumer_error("tree not ready", err)),
        Err(_) => Err(CliError::new(
            TIMEOUT,
            format!("tree not ready after {timeout:?}"),
        )),
    }
}

fn load_schema(path: Option<&Path>) -> CliResult<Arc<dyn Schema>> {
    match path {
        Some(path) => {
            let schema = StaticSchema::from_file(path)
                .map_err(|err| schema_error("schema load failed", err))?;
            Ok(Arc::new(schema))
        }
        None => Ok(Arc::new(DynamicSchema)),
    }
}

pub(crate) fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
