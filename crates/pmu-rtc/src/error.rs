use smc_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = RtcError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RtcError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("time out of range for the PMU clock: {0}s")]
    OutOfRange(u64),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}
