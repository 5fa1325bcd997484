//! smc-hwmon: typed telemetry channels over Apple SMC keys
//!
//! Builds per-category channel tables from a YAML description, decodes key payloads by
//! their runtime type tag, and exposes read/label/visibility per `(category, index)`.

mod types;
pub use types::*;

mod error;
pub use error::{Error, Result};

mod loader;
pub use loader::{load_config_dir, load_config_file, load_config_str};

pub mod minifloat;

mod registry;
pub use registry::{Attr, ChannelInfo, InfoKind, KeySource, Registry};

mod decode;
pub use decode::{DecodePolicy, Decoder, Encoding};

mod metrics;
pub use metrics::{MetricsHub, SensorMetrics};

mod hwmon;
pub use hwmon::{SensorReading, SmcHwmon, READ_ONLY_MODE};
