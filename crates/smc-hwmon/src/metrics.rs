use crate::Category;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct SensorMetrics {
    pub reads: IntCounterVec,
    pub read_errors: IntCounterVec,
    pub channels: IntGaugeVec,
}

impl SensorMetrics {
    pub fn record_read(&self, category: Category, ok: bool) {
        let label = [category.hwmon_prefix()];
        self.reads.with_label_values(&label).inc();
        if !ok {
            self.read_errors.with_label_values(&label).inc();
        }
    }
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub sensors: SensorMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let reads = IntCounterVec::new(
            Opts::new("smc_sensor_reads_total", "Total sensor reads attempted"),
            &["category"],
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let read_errors = IntCounterVec::new(
            Opts::new("smc_sensor_read_errors_total", "Total sensor reads that failed"),
            &["category"],
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let channels = IntGaugeVec::new(
            Opts::new("smc_sensor_channels", "Channels registered per category"),
            &["category"],
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let sensors = SensorMetrics {
            reads,
            read_errors,
            channels,
        };
        let _ = registry.register(Box::new(sensors.reads.clone()));
        let _ = registry.register(Box::new(sensors.read_errors.clone()));
        let _ = registry.register(Box::new(sensors.channels.clone()));
        Ok(Self { registry, sensors })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
