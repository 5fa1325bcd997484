use core::fmt;
use serde::{Deserialize, Serialize};
use smc_transport::SmcKey;

/// Physical quantity a channel reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Power,
    Voltage,
    Current,
    Temperature,
}

impl Category {
    /// Registration order of the channel-info table.
    pub const ALL: [Category; 4] = [
        Category::Power,
        Category::Voltage,
        Category::Current,
        Category::Temperature,
    ];

    pub fn index(self) -> usize {
        match self {
            Category::Power => 0,
            Category::Voltage => 1,
            Category::Current => 2,
            Category::Temperature => 3,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Category::Power => "Power",
            Category::Voltage => "Voltage",
            Category::Current => "Current",
            Category::Temperature => "Temperature",
        }
    }

    /// Device-tree node holding this category's keys.
    pub fn config_node(self) -> &'static str {
        match self {
            Category::Power => "pwr_keys",
            Category::Voltage => "voltage_keys",
            Category::Current => "current_keys",
            Category::Temperature => "temp_keys",
        }
    }

    /// hwmon attribute prefix (`temp1_input`, `in0_label`, ...).
    pub fn hwmon_prefix(self) -> &'static str {
        match self {
            Category::Power => "power",
            Category::Voltage => "in",
            Category::Current => "curr",
            Category::Temperature => "temp",
        }
    }

    /// hwmon numbers voltage inputs from 0 and everything else from 1.
    pub fn attr_name(self, index: usize, attr: &str) -> String {
        let n = match self {
            Category::Voltage => index,
            _ => index + 1,
        };
        format!("{}{}_{}", self.hwmon_prefix(), n, attr)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Longest label stored for a channel, in bytes.
pub const MAX_LABEL_LEN: usize = 60;

/// One monitored quantity backed by one SMC key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    #[serde(serialize_with = "ser_key")]
    pub key: SmcKey,
    pub label: String,
    pub category: Category,
}

impl Channel {
    pub fn new(category: Category, key: SmcKey, label: &str) -> Self {
        Self {
            key,
            label: truncate_label(label),
            category,
        }
    }
}

fn ser_key<S: serde::Serializer>(key: &SmcKey, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&key.mnemonic())
}

/// Cut `label` to at most [`MAX_LABEL_LEN`] bytes on a character boundary.
pub fn truncate_label(label: &str) -> String {
    if label.len() <= MAX_LABEL_LEN {
        return label.to_string();
    }
    let mut end = MAX_LABEL_LEN;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    label[..end].to_string()
}

/// Sensor description for one device, usually loaded from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sensors: CategoryTable,
}

impl SensorConfig {
    pub fn category(&self, category: Category) -> Option<&CategoryConfig> {
        match category {
            Category::Power => self.sensors.power.as_ref(),
            Category::Voltage => self.sensors.voltage.as_ref(),
            Category::Current => self.sensors.current.as_ref(),
            Category::Temperature => self.sensors.temperature.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryTable {
    #[serde(default)]
    pub power: Option<CategoryConfig>,
    #[serde(default)]
    pub voltage: Option<CategoryConfig>,
    #[serde(default)]
    pub current: Option<CategoryConfig>,
    #[serde(default)]
    pub temperature: Option<CategoryConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Ask the SMC for each key's type before decoding instead of assuming `flt `.
    #[serde(default)]
    pub probe_type: bool,
    #[serde(default)]
    pub keys: Option<Vec<KeyEntry>>,
    #[serde(default)]
    pub legacy_keys: Option<KeyBlob>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyEntry {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Node name, used as label of last resort.
    #[serde(default)]
    pub name: Option<String>,
}

/// Legacy key list: 4-byte mnemonics, each followed by a NUL terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BlobRepr", into = "BlobRepr")]
pub struct KeyBlob(pub Vec<u8>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum BlobRepr {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<BlobRepr> for KeyBlob {
    fn from(r: BlobRepr) -> Self {
        match r {
            BlobRepr::Text(s) => KeyBlob(s.into_bytes()),
            BlobRepr::Bytes(b) => KeyBlob(b),
        }
    }
}

impl From<KeyBlob> for BlobRepr {
    fn from(b: KeyBlob) -> Self {
        match String::from_utf8(b.0) {
            Ok(s) => BlobRepr::Text(s),
            Err(e) => BlobRepr::Bytes(e.into_bytes()),
        }
    }
}

impl KeyBlob {
    pub const STRIDE: usize = 5;

    /// Number of complete mnemonic slots.
    pub fn count(&self) -> usize {
        self.0.len() / Self::STRIDE
    }

    pub fn mnemonics(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.0
            .chunks_exact(Self::STRIDE)
            .map(|c| [c[0], c[1], c[2], c[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_truncation_respects_char_boundaries() {
        let long = "é".repeat(40); // 80 bytes
        let t = truncate_label(&long);
        assert!(t.len() <= MAX_LABEL_LEN);
        assert_eq!(t, "é".repeat(30));
        assert_eq!(truncate_label("CPU die"), "CPU die");
    }

    #[test]
    fn blob_slices_every_five_bytes() {
        let blob = KeyBlob(b"TC0P\0TC1P\0TG".to_vec());
        assert_eq!(blob.count(), 2);
        let keys: Vec<[u8; 4]> = blob.mnemonics().collect();
        assert_eq!(keys, vec![*b"TC0P", *b"TC1P"]);
    }

    #[test]
    fn attr_names_follow_hwmon_numbering() {
        assert_eq!(Category::Voltage.attr_name(0, "input"), "in0_input");
        assert_eq!(Category::Temperature.attr_name(0, "label"), "temp1_label");
        assert_eq!(Category::Power.attr_name(2, "input"), "power3_input");
    }
}
