use std::fmt;
use std::io;

use emberlink_consumer::ConsumerError;
use emberlink_s101::FrameError;
use emberlink_schema::SchemaError;
use emberlink_tree::TreeError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed | FrameError::TooManyErrors { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    match err {
        SchemaError::LoadFailed(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn consumer_error(context: &str, err: ConsumerError) -> CliError {
    match err {
        ConsumerError::Frame(err) => frame_error(context, err),
        ConsumerError::Tree(
            TreeError::UnknownElement(_) | TreeError::NotAFunction(_) | TreeError::NotAParameter(_),
        ) => CliError::new(USAGE, format!("{context}: {err}")),
        ConsumerError::Tree(_) | ConsumerError::Sync(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ConsumerError::ConnectionLost(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        ConsumerError::InvocationFailed { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
