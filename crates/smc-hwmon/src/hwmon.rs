use crate::decode::Decoder;
use crate::metrics::{MetricsHub, SensorMetrics};
use crate::registry::{ChannelInfo, Registry};
use crate::types::{Category, SensorConfig};
use crate::{Error, Result};
use serde::Serialize;
use smc_transport::SmcBus;
use tracing::info;

/// Permission bits every channel attribute is exposed with.
pub const READ_ONLY_MODE: u32 = 0o444;

/// One channel's outcome in a [`SmcHwmon::snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    pub category: Category,
    pub index: usize,
    pub attr: String,
    pub key: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sensor-framework view of one SMC: read, label and visibility per `(category, index)`.
pub struct SmcHwmon<B> {
    bus: B,
    registry: Registry,
    decoder: Decoder,
    metrics: Option<SensorMetrics>,
}

impl<B: SmcBus> SmcHwmon<B> {
    pub fn attach(bus: B, config: &SensorConfig) -> Self {
        let registry = Registry::build(config);
        let decoder = Decoder::from_config(config);
        info!(
            id = config.id.as_deref().unwrap_or("smc"),
            power = registry.count(Category::Power),
            voltage = registry.count(Category::Voltage),
            current = registry.count(Category::Current),
            temperature = registry.count(Category::Temperature),
            "hwmon attached"
        );
        Self {
            bus,
            registry,
            decoder,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, hub: &MetricsHub) -> Self {
        for category in Category::ALL {
            hub.sensors
                .channels
                .with_label_values(&[category.hwmon_prefix()])
                .set(self.registry.count(category) as i64);
        }
        self.metrics = Some(hub.sensors.clone());
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn channel_info(&self) -> Vec<ChannelInfo> {
        self.registry.channel_info()
    }

    pub fn read(&self, category: Category, index: usize) -> Result<i64> {
        let res = self.decoder.read(&self.bus, &self.registry, category, index);
        if let Some(m) = &self.metrics {
            m.record_read(category, res.is_ok());
        }
        res
    }

    pub fn read_label(&self, category: Category, index: usize) -> Result<&str> {
        Ok(self.registry.channel(category, index)?.label.as_str())
    }

    pub fn is_writable(&self, _category: Category, _index: usize) -> bool {
        false
    }

    pub fn mode(&self, _category: Category, _index: usize) -> u32 {
        READ_ONLY_MODE
    }

    pub fn write(&self, _category: Category, _index: usize, _value: i64) -> Result<()> {
        Err(Error::UnsupportedOperation("sensor channels are read-only"))
    }

    /// Read every channel; failures are recorded per channel.
    pub fn snapshot(&self) -> Vec<SensorReading> {
        let mut out = Vec::with_capacity(self.registry.total());
        for category in Category::ALL {
            for (index, ch) in self.registry.channels(category).iter().enumerate() {
                let (value, error) = match self.read(category, index) {
                    Ok(v) => (Some(v), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                out.push(SensorReading {
                    category,
                    index,
                    attr: category.attr_name(index, "input"),
                    key: ch.key.mnemonic(),
                    label: ch.label.clone(),
                    value,
                    error,
                });
            }
        }
        out
    }
}
