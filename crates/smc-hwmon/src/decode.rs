use crate::minifloat;
use crate::registry::Registry;
use crate::types::{Category, SensorConfig};
use crate::{Error, Result};
use smc_transport::{KeyType, SmcBus, SmcKey, TransportError};
use tracing::{debug, error, warn};

/// Wire encodings a key may report, learned from its type tag at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Uint8,
    Uint32,
    Uint64,
    Float32,
}

impl Encoding {
    pub fn from_type(ty: KeyType) -> Option<Self> {
        match ty {
            KeyType::UI8 => Some(Encoding::Uint8),
            KeyType::UI32 => Some(Encoding::Uint32),
            KeyType::UI64 | KeyType::IOFT => Some(Encoding::Uint64),
            KeyType::FLT => Some(Encoding::Float32),
            _ => None,
        }
    }

    /// Payload size in bytes.
    pub fn width(self) -> usize {
        match self {
            Encoding::Uint8 => 1,
            Encoding::Uint32 | Encoding::Float32 => 4,
            Encoding::Uint64 => 8,
        }
    }

    /// Turn a little-endian payload into the category's output value.
    ///
    /// Floats come out in milli-units; integers are passed through unscaled (64-bit values
    /// saturate at `i64::MAX`).
    pub fn decode(self, payload: &[u8]) -> Result<i64, TransportError> {
        let width = self.width();
        if payload.len() < width {
            return Err(TransportError::ShortRead {
                expected: width,
                got: payload.len(),
            });
        }
        let mut b = [0u8; 8];
        b[..width].copy_from_slice(&payload[..width]);
        let raw = u64::from_le_bytes(b);
        Ok(match self {
            Encoding::Uint8 | Encoding::Uint32 => raw as i64,
            Encoding::Uint64 => i64::try_from(raw).unwrap_or(i64::MAX),
            Encoding::Float32 => minifloat::decode(raw as u32),
        })
    }
}

/// How a category's keys are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Assume `flt ` and skip the type query.
    #[default]
    Minifloat,
    /// Query the key's type tag and dispatch on it.
    Typed,
}

#[derive(Debug, Clone)]
pub struct Decoder {
    policies: [DecodePolicy; 4],
}

impl Default for Decoder {
    fn default() -> Self {
        let mut policies = [DecodePolicy::Minifloat; 4];
        policies[Category::Power.index()] = DecodePolicy::Typed;
        Self { policies }
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        let mut dec = Self::default();
        for category in Category::ALL {
            if config.category(category).is_some_and(|c| c.probe_type) {
                dec = dec.with_policy(category, DecodePolicy::Typed);
            }
        }
        dec
    }

    /// Power always queries its type; requests to change that are ignored.
    pub fn with_policy(mut self, category: Category, policy: DecodePolicy) -> Self {
        if category == Category::Power && policy != DecodePolicy::Typed {
            warn!("power keys are always type-probed, ignoring policy {policy:?}");
            return self;
        }
        self.policies[category.index()] = policy;
        self
    }

    pub fn policy(&self, category: Category) -> DecodePolicy {
        self.policies[category.index()]
    }

    /// Encodings a category accepts when its type tag is queried.
    pub fn accepts(category: Category, enc: Encoding) -> bool {
        match category {
            Category::Power => matches!(enc, Encoding::Uint8 | Encoding::Float32),
            _ => matches!(
                enc,
                Encoding::Float32 | Encoding::Uint32 | Encoding::Uint64
            ),
        }
    }

    /// Resolve `(category, index)` through `registry` and read one sample from `bus`.
    pub fn read<B: SmcBus>(
        &self,
        bus: &B,
        registry: &Registry,
        category: Category,
        index: usize,
    ) -> Result<i64> {
        let channel = registry.channel(category, index)?;
        if channel.key.is_empty() {
            return Err(Error::UnsupportedChannel { category, index });
        }
        self.read_key(bus, category, channel.key)
    }

    pub fn read_key<B: SmcBus>(&self, bus: &B, category: Category, key: SmcKey) -> Result<i64> {
        let enc = match self.policy(category) {
            DecodePolicy::Minifloat => Encoding::Float32,
            DecodePolicy::Typed => {
                let ty = bus.key_type(key).map_err(|e| {
                    error!(%key, error = %e, "key type query failed");
                    e
                })?;
                match Encoding::from_type(ty) {
                    Some(enc) if Self::accepts(category, enc) => enc,
                    _ => return Err(Error::UnsupportedEncoding { category, key, ty }),
                }
            }
        };
        let payload = bus.read_key(key, enc.width())?;
        let value = enc.decode(&payload)?;
        debug!(%category, %key, ?enc, value, "sensor read");
        Ok(value)
    }
}
