use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use pmu_rtc::PmuRtc;
use smc_hwmon::{self as hwmon, Category, InfoKind, MetricsHub, SmcHwmon};
use smc_transport::{KeyType, MockPmu, MockSmc, SmcKey};

#[derive(Parser, Debug)]
#[command(
    name = "smcmon",
    version,
    about = "Apple SMC/PMU telemetry and clock tool",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a sensor config and list its channels
    SensorsValidate {
        /// YAML config file path
        #[arg(long)]
        file: Option<String>,
        /// Directory containing YAML configs
        #[arg(long)]
        dir: Option<String>,
        /// Print channels as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Read every channel against a mock SMC seeded from a fixture
    SensorsRead {
        /// YAML config file path
        #[arg(long)]
        file: String,
        /// YAML fixture with key types and payloads
        #[arg(long)]
        fixture: String,
        /// Print readings as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        /// Dump Prometheus metrics after reading
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
    /// Decode single-precision bit patterns (hex like 0x41CC0000) to milli-units
    MinifloatDecode {
        #[arg(required = true)]
        bits: Vec<String>,
    },
    /// Calendar time from raw RTC register values
    RtcDecode {
        /// Running-time register (hex, 32.16 fixed point)
        #[arg(long)]
        running: String,
        /// Offset register (hex, 32.15 fixed point)
        #[arg(long)]
        offset: String,
    },
    /// Offset register value that sets the clock to a given time
    RtcOffset {
        /// Running-time register (hex, 32.16 fixed point)
        #[arg(long)]
        running: String,
        /// Target time: RFC 3339 or unix seconds
        #[arg(long)]
        time: String,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::SensorsValidate { file, dir, json } => {
            sensors_validate(file.as_deref(), dir.as_deref(), json)
        }
        Commands::SensorsRead {
            file,
            fixture,
            json,
            metrics,
        } => sensors_read(&file, &fixture, json, metrics),
        Commands::MinifloatDecode { bits } => minifloat_decode(&bits),
        Commands::RtcDecode { running, offset } => rtc_decode(&running, &offset),
        Commands::RtcOffset { running, time } => rtc_offset(&running, &time),
    }
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn print_registry(name: &str, cfg: &hwmon::SensorConfig, json: bool) -> Result<()> {
    let reg = hwmon::Registry::build(cfg);
    println!(
        "ok: {} ({} channels)",
        cfg.id.as_deref().unwrap_or(name),
        reg.total()
    );
    if json {
        let all: Vec<&hwmon::Channel> = Category::ALL
            .iter()
            .flat_map(|c| reg.channels(*c))
            .collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }
    for info in reg.channel_info() {
        if let InfoKind::Sensor(category) = info.kind {
            for (i, ch) in reg.channels(category).iter().enumerate() {
                println!(
                    "{}\t{}\t{}",
                    category.attr_name(i, "input"),
                    ch.key,
                    ch.label
                );
            }
        }
    }
    Ok(())
}

fn sensors_validate(file: Option<&str>, dir: Option<&str>, json: bool) -> Result<()> {
    match (file, dir) {
        (Some(f), None) => {
            let cfg = hwmon::load_config_file(f)?;
            print_registry(f, &cfg, json)?;
        }
        (None, Some(d)) => {
            let cfgs = hwmon::load_config_dir(d)?;
            println!("ok: loaded {} configs", cfgs.len());
            for (path, cfg) in &cfgs {
                print_registry(&path.display().to_string(), cfg, json)?;
            }
        }
        _ => {
            return Err(anyhow::anyhow!("provide --file <path> or --dir <dir>"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    keys: Vec<FixtureKey>,
}

#[derive(Debug, Deserialize)]
struct FixtureKey {
    key: String,
    /// Type mnemonic, space padded to four characters ("flt", "ui8", "ioft").
    #[serde(rename = "type", default)]
    ty: Option<String>,
    /// Engineering value; floats are stored through the integer minifloat encoder.
    #[serde(default)]
    value: Option<f64>,
    /// Raw little-endian payload as hex.
    #[serde(default)]
    hex: Option<String>,
    /// Make every access to this key fail.
    #[serde(default)]
    fail: bool,
}

fn parse_type(s: &str) -> Result<KeyType> {
    let b = s.as_bytes();
    if b.is_empty() || b.len() > 4 || !b.is_ascii() {
        return Err(anyhow::anyhow!("invalid key type '{s}'"));
    }
    let mut out = [b' '; 4];
    out[..b.len()].copy_from_slice(b);
    Ok(KeyType::from_bytes(out))
}

fn payload_for(ty: KeyType, value: f64) -> Result<Vec<u8>> {
    Ok(match ty {
        KeyType::FLT => {
            let milli = (value * 1000.0).round() as i64;
            hwmon::minifloat::encode(milli).to_le_bytes().to_vec()
        }
        KeyType::UI8 => vec![value as u8],
        KeyType::UI32 => (value as u32).to_le_bytes().to_vec(),
        KeyType::UI64 | KeyType::IOFT => (value as u64).to_le_bytes().to_vec(),
        other => return Err(anyhow::anyhow!("no value encoding for type {other}")),
    })
}

fn mock_smc_from_fixture(path: &str) -> Result<MockSmc> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("reading fixture: {path}"))?;
    let fixture: Fixture =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing fixture: {path}"))?;
    let smc = MockSmc::new();
    for k in fixture.keys {
        let key = SmcKey::parse(&k.key)
            .ok_or_else(|| anyhow::anyhow!("invalid SMC key '{}'", k.key))?;
        let ty = parse_type(k.ty.as_deref().unwrap_or("flt"))?;
        let payload = match (&k.hex, k.value) {
            (Some(h), _) => parse_hex_compact(h)?,
            (None, Some(v)) => payload_for(ty, v)?,
            (None, None) => Vec::new(),
        };
        smc.insert(key, ty, &payload);
        if k.fail {
            smc.fail_key(key);
        }
    }
    Ok(smc)
}

fn sensors_read(file: &str, fixture: &str, json: bool, metrics: bool) -> Result<()> {
    let cfg = hwmon::load_config_file(file)?;
    let smc = mock_smc_from_fixture(fixture)?;
    let hub = MetricsHub::new().map_err(anyhow::Error::msg)?;
    let hw = SmcHwmon::attach(smc, &cfg).with_metrics(&hub);
    let readings = hw.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&readings)?);
    } else {
        for r in &readings {
            match (r.value, &r.error) {
                (Some(v), _) => println!("{}\t{}\t{}\t{v}", r.attr, r.key, r.label),
                (None, Some(e)) => println!("{}\t{}\t{}\terror: {e}", r.attr, r.key, r.label),
                (None, None) => println!("{}\t{}\t{}\t-", r.attr, r.key, r.label),
            }
        }
    }
    let failed = readings.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        warn!(failed, total = readings.len(), "some channels failed to read");
    }
    if metrics {
        print!("{}", hub.encode_text());
    }
    Ok(())
}

fn minifloat_decode(items: &[String]) -> Result<()> {
    for s in items {
        let bits = u32::try_from(parse_hex_u64(s)?)
            .map_err(|_| anyhow::anyhow!("'{s}' does not fit in 32 bits"))?;
        println!("0x{bits:08X}\t{}", hwmon::minifloat::decode(bits));
    }
    Ok(())
}

fn rtc_decode(running: &str, offset: &str) -> Result<()> {
    let running = parse_hex_u64(running)?;
    let offset = parse_hex_u64(offset)?;
    let cfg = pmu_rtc::RtcConfig::default();
    let pmu = MockPmu::default().with_counter(cfg.running_time_addr);
    pmu.set_running_time(running);
    pmu.poke(cfg.offset_addr, &pmu_rtc::le48_encode(offset));
    let rtc = PmuRtc::with_config(pmu, cfg);
    let secs = rtc.read_seconds()?;
    let when = rtc.get_time()?;
    println!("{secs}\t{}", when.format(&Rfc3339)?);
    Ok(())
}

fn rtc_offset(running: &str, target: &str) -> Result<()> {
    let running = parse_hex_u64(running)?;
    let when = parse_time(target)?;
    let secs = u64::try_from(when.unix_timestamp())
        .map_err(|_| anyhow::anyhow!("time before the unix epoch: {target}"))?;
    let offset = pmu_rtc::offset_for(secs, running)?;
    let bytes = pmu_rtc::le48_encode(offset);
    info!(secs, running, offset, "computed RTC offset");
    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
    println!("0x{offset:012X}\t{}", hex.join(" "));
    Ok(())
}

fn parse_time(s: &str) -> Result<OffsetDateTime> {
    let t = s.trim();
    if let Ok(secs) = t.parse::<i64>() {
        return OffsetDateTime::from_unix_timestamp(secs)
            .map_err(|e| anyhow::anyhow!("invalid unix time '{t}': {e}"));
    }
    OffsetDateTime::parse(t, &Rfc3339).map_err(|e| anyhow::anyhow!("invalid time '{t}': {e}"))
}

fn parse_hex_u64(s: &str) -> Result<u64> {
    let t = s.trim();
    let no_prefix = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t);
    u64::from_str_radix(no_prefix, 16).map_err(|e| anyhow::anyhow!("invalid hex '{t}': {e}"))
}

fn parse_hex_compact(s: &str) -> Result<Vec<u8>> {
    let t: String = s.split_whitespace().collect();
    if t.len() % 2 != 0 {
        return Err(anyhow::anyhow!("odd hex length"));
    }
    let mut out = Vec::with_capacity(t.len() / 2);
    let bytes = t.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let pair = std::str::from_utf8(&bytes[i..i + 2])
            .map_err(|e| anyhow::anyhow!("invalid hex: {e}"))?;
        let hx = u8::from_str_radix(pair, 16).map_err(|e| anyhow::anyhow!("invalid hex: {e}"))?;
        out.push(hx);
        i += 2;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mnemonics_are_space_padded() {
        assert_eq!(parse_type("flt").unwrap(), KeyType::FLT);
        assert_eq!(parse_type("ui8").unwrap(), KeyType::UI8);
        assert_eq!(parse_type("ioft").unwrap(), KeyType::IOFT);
        assert!(parse_type("toolong").is_err());
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(parse_hex_u64("0x41CC0000").unwrap(), 0x41CC_0000);
        assert_eq!(parse_hex_u64("d100").unwrap(), 0xd100);
        assert_eq!(parse_hex_compact("00 00 80 3f").unwrap(), vec![0, 0, 0x80, 0x3f]);
        assert!(parse_hex_compact("abc").is_err());
    }

    #[test]
    fn fixture_values_use_the_minifloat_encoder() {
        let payload = payload_for(KeyType::FLT, 25.5).unwrap();
        assert_eq!(payload, 0x41CC_0000u32.to_le_bytes().to_vec());
        assert_eq!(payload_for(KeyType::UI8, 42.0).unwrap(), vec![42]);
    }

    #[test]
    fn times_parse_from_unix_or_rfc3339() {
        assert_eq!(parse_time("0").unwrap().unix_timestamp(), 0);
        assert_eq!(
            parse_time("2024-05-01T12:00:00Z").unwrap().unix_timestamp(),
            1_714_564_800
        );
    }
}
