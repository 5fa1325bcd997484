//! Per-category channel tables built once at attach time.

use crate::types::{Category, CategoryConfig, Channel, KeyBlob, KeyEntry, SensorConfig};
use crate::{Error, Result};
use smc_transport::SmcKey;
use tracing::{info, warn};

/// Where a category's keys come from.
#[derive(Debug, Clone, Copy)]
pub enum KeySource<'a> {
    /// Key/label pairs.
    Explicit(&'a [KeyEntry]),
    /// Concatenated NUL-terminated mnemonics.
    Legacy(&'a KeyBlob),
}

impl<'a> KeySource<'a> {
    /// Explicit entries win whenever present; the blob is only a fallback.
    pub fn select(cfg: &'a CategoryConfig) -> Option<Self> {
        if let Some(entries) = cfg.keys.as_deref() {
            return Some(KeySource::Explicit(entries));
        }
        cfg.legacy_keys.as_ref().map(KeySource::Legacy)
    }

    pub fn channels(self, category: Category) -> Vec<Channel> {
        match self {
            KeySource::Explicit(entries) => from_entries(category, entries),
            KeySource::Legacy(blob) => from_blob(category, blob),
        }
    }
}

fn from_entries(category: Category, entries: &[KeyEntry]) -> Vec<Channel> {
    let mut out = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let key = match entry.key.as_deref() {
            Some(s) => match SmcKey::parse(s) {
                Some(k) => k,
                None => {
                    warn!(%category, index = i, key = s, "malformed SMC key, slot left empty");
                    SmcKey::EMPTY
                }
            },
            None => {
                warn!(%category, index = i, "missing key property, slot left empty");
                SmcKey::EMPTY
            }
        };
        let label = match (&entry.label, &entry.name) {
            (Some(label), _) => label.clone(),
            (None, Some(name)) if key.is_empty() => name.clone(),
            _ => synthesized_label(category, key),
        };
        out.push(Channel::new(category, key, &label));
    }
    out
}

fn from_blob(category: Category, blob: &KeyBlob) -> Vec<Channel> {
    if blob.0.len() % KeyBlob::STRIDE != 0 {
        warn!(%category, len = blob.0.len(), "legacy key blob has a trailing partial entry");
    }
    blob.mnemonics()
        .map(|m| {
            let key = SmcKey::from_bytes(m);
            Channel::new(category, key, &synthesized_label(category, key))
        })
        .collect()
}

fn synthesized_label(category: Category, key: SmcKey) -> String {
    format!("{} ({})", category.display_name(), key.mnemonic())
}

/// Attribute bits of one channel-info entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr(u32);

impl Attr {
    pub const INPUT: Attr = Attr(1 << 0);
    pub const LABEL: Attr = Attr(1 << 1);
    pub const REGISTER_TZ: Attr = Attr(1 << 2);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Attr) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for Attr {
    type Output = Attr;

    fn bitor(self, rhs: Attr) -> Attr {
        Attr(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    Chip,
    Sensor(Category),
}

/// One entry of the table handed to the sensor framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub kind: InfoKind,
    pub attrs: Attr,
    pub count: usize,
}

/// Immutable channel tables, one per category.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tables: [Vec<Channel>; 4],
}

impl Registry {
    /// Build every category independently; a category that cannot be built ends up empty.
    pub fn build(config: &SensorConfig) -> Self {
        let mut tables: [Vec<Channel>; 4] = Default::default();
        for category in Category::ALL {
            match Self::build_category(category, config.category(category)) {
                Ok(channels) => {
                    info!(
                        %category,
                        node = category.config_node(),
                        count = channels.len(),
                        "found SMC keys"
                    );
                    tables[category.index()] = channels;
                }
                Err(e) => warn!(%category, error = %e, "category disabled"),
            }
        }
        Self { tables }
    }

    fn build_category(category: Category, cfg: Option<&CategoryConfig>) -> Result<Vec<Channel>> {
        let source = cfg
            .and_then(KeySource::select)
            .ok_or(Error::ConfigurationMissing(category))?;
        Ok(source.channels(category))
    }

    pub fn channels(&self, category: Category) -> &[Channel] {
        &self.tables[category.index()]
    }

    pub fn count(&self, category: Category) -> usize {
        self.tables[category.index()].len()
    }

    pub fn channel(&self, category: Category, index: usize) -> Result<&Channel> {
        self.tables[category.index()]
            .get(index)
            .ok_or(Error::UnsupportedChannel { category, index })
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(Vec::is_empty)
    }

    pub fn total(&self) -> usize {
        self.tables.iter().map(Vec::len).sum()
    }

    /// Chip entry followed by every non-empty category, in registration order.
    pub fn channel_info(&self) -> Vec<ChannelInfo> {
        let mut out = vec![ChannelInfo {
            kind: InfoKind::Chip,
            attrs: Attr::REGISTER_TZ,
            count: 1,
        }];
        for category in Category::ALL {
            let count = self.count(category);
            if count > 0 {
                out.push(ChannelInfo {
                    kind: InfoKind::Sensor(category),
                    attrs: Attr::INPUT | Attr::LABEL,
                    count,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_config_str;
    use crate::types::MAX_LABEL_LEN;

    fn registry(yaml: &str) -> Registry {
        Registry::build(&load_config_str(yaml).unwrap())
    }

    #[test]
    fn explicit_entries_keep_order_and_labels() {
        let reg = registry(
            r#"
sensors:
  temperature:
    keys:
      - { key: TC0P, label: CPU proximity }
      - { key: TG0P }
      - { key: TC0P, label: duplicate }
"#,
        );
        let temps = reg.channels(Category::Temperature);
        assert_eq!(temps.len(), 3);
        assert_eq!(temps[0].label, "CPU proximity");
        assert_eq!(temps[1].label, "Temperature (TG0P)");
        assert_eq!(temps[0].key, temps[2].key);
        assert_eq!(temps[1].key, SmcKey::parse("TG0P").unwrap());
    }

    #[test]
    fn missing_key_leaves_empty_slot() {
        let reg = registry(
            r#"
sensors:
  power:
    keys:
      - { name: "pwr@0" }
      - { key: TOOLONG }
      - { key: PSTR }
"#,
        );
        let p = reg.channels(Category::Power);
        assert_eq!(p.len(), 3);
        assert!(p[0].key.is_empty());
        assert_eq!(p[0].label, "pwr@0");
        assert!(p[1].key.is_empty());
        assert_eq!(p[2].key, SmcKey::parse("PSTR").unwrap());
    }

    #[test]
    fn legacy_blob_is_a_fallback_only() {
        let reg = registry(
            r#"
sensors:
  voltage:
    legacy_keys: "VD0R\0VP0R\0"
  current:
    keys:
      - { key: ID0R }
    legacy_keys: "IB0R\0IB1R\0"
"#,
        );
        let v = reg.channels(Category::Voltage);
        assert_eq!(v.len(), 2);
        assert_eq!(v[1].label, "Voltage (VP0R)");
        let c = reg.channels(Category::Current);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].key, SmcKey::parse("ID0R").unwrap());
    }

    #[test]
    fn absent_categories_are_empty_not_errors() {
        let reg = registry("sensors: {}");
        assert!(reg.is_empty());
        for category in Category::ALL {
            assert_eq!(reg.count(category), 0);
            assert!(matches!(
                reg.channel(category, 0),
                Err(Error::UnsupportedChannel { .. })
            ));
        }
        assert_eq!(reg.channel_info().len(), 1);
    }

    #[test]
    fn index_bound_is_strict() {
        let reg = registry(
            r#"
sensors:
  power:
    keys: [{ key: PSTR }, { key: PDTR }]
"#,
        );
        assert!(reg.channel(Category::Power, 1).is_ok());
        assert!(matches!(
            reg.channel(Category::Power, 2),
            Err(Error::UnsupportedChannel {
                category: Category::Power,
                index: 2
            })
        ));
    }

    #[test]
    fn long_labels_are_truncated() {
        let long = "x".repeat(200);
        let yaml = format!("sensors:\n  current:\n    keys:\n      - {{ key: ID0R, label: {long} }}\n");
        let reg = registry(&yaml);
        let ch = reg.channel(Category::Current, 0).unwrap();
        assert_eq!(ch.label.len(), MAX_LABEL_LEN);
    }

    #[test]
    fn channel_info_lists_non_empty_categories_in_order() {
        let reg = registry(
            r#"
sensors:
  temperature:
    keys: [{ key: TC0P }]
  power:
    keys: [{ key: PSTR }, { key: PDTR }]
"#,
        );
        let info = reg.channel_info();
        assert_eq!(info.len(), 3);
        assert_eq!(info[0].kind, InfoKind::Chip);
        assert!(info[0].attrs.contains(Attr::REGISTER_TZ));
        assert_eq!(info[1].kind, InfoKind::Sensor(Category::Power));
        assert_eq!(info[1].count, 2);
        assert_eq!(info[2].kind, InfoKind::Sensor(Category::Temperature));
        assert!(info[2].attrs.contains(Attr::INPUT | Attr::LABEL));
    }
}
