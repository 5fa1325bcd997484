use crate::types::SensorConfig;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

pub fn load_config_str(raw: &str) -> anyhow::Result<SensorConfig> {
    let cfg: SensorConfig = serde_yaml::from_str(raw).context("parsing sensor config yaml")?;
    Ok(cfg)
}

pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<SensorConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading sensor config: {}", path.display()))?;
    let cfg: SensorConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("decoding sensor config: {}", path.display()))?;
    Ok(cfg)
}

/// Load every `.yml`/`.yaml` config in `dir`, sorted by file name.
pub fn load_config_dir(dir: impl AsRef<Path>) -> anyhow::Result<Vec<(PathBuf, SensorConfig)>> {
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    let mut out = Vec::with_capacity(entries.len());
    for p in entries {
        let cfg = load_config_file(&p)?;
        out.push((p, cfg));
    }
    Ok(out)
}
