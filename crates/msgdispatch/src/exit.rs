use std::fmt;
use std::io;

use msgdispatch_producer::{FailureKind, ProducerError};

// Exit codes follow sysexits where one fits.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG: i32 = 78;
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
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn producer_error(context: &str, err: ProducerError) -> CliError {
    let code = match err.kind() {
        FailureKind::Validation => DATA_INVALID,
        FailureKind::Config => CONFIG,
        FailureKind::Auth => PERMISSION_DENIED,
        FailureKind::Transport if is_timeout(&err) => TIMEOUT,
        FailureKind::Transport => TRANSPORT_ERROR,
        FailureKind::Application | FailureKind::Protocol => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

fn is_timeout(err: &ProducerError) -> bool {
    matches!(err, ProducerError::Transport { source: Some(source), .. } if source.is_timeout())
}
