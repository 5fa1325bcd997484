use crate::Category;
use smc_transport::{KeyType, SmcKey, TransportError};
use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported channel: {category} #{index}")]
    UnsupportedChannel { category: Category, index: usize },
    #[error("unsupported encoding {ty} for {category} key {key}")]
    UnsupportedEncoding {
        category: Category,
        key: SmcKey,
        ty: KeyType,
    },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    #[error("no configuration for {0} sensors")]
    ConfigurationMissing(Category),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
