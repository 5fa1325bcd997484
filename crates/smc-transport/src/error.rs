use crate::SmcKey;
use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("key not found: {0}")]
    KeyNotFound(SmcKey),
    #[error("register range out of bounds: addr=0x{addr:04x} len={len}")]
    OutOfRange { addr: u16, len: usize },
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
    #[error("I/O error: {0}")]
    Io(String),
}
