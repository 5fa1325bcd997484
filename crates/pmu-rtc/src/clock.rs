use crate::{Result, RtcError};
use serde::{Deserialize, Serialize};
use smc_transport::{RegisterBus, TransportError};
use time::OffsetDateTime;
use tracing::{debug, error};

pub const MASK_48: u64 = (1 << 48) - 1;

/// Largest settable time: `t << 16` must still fit the 48-bit 32.16 format.
pub const MAX_SECONDS: u64 = u32::MAX as u64;

const REG_LEN: usize = 6;

fn default_running_time_addr() -> u16 {
    0xd002
}

fn default_offset_addr() -> u16 {
    0xd100
}

/// Register addresses of the clock inside the PMU map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcConfig {
    #[serde(default = "default_running_time_addr")]
    pub running_time_addr: u16,
    #[serde(default = "default_offset_addr")]
    pub offset_addr: u16,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            running_time_addr: default_running_time_addr(),
            offset_addr: default_offset_addr(),
        }
    }
}

/// Raw contents of the two clock registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockRegisters {
    /// 32.16 fixed-point seconds, read-only.
    pub running_time: u64,
    /// 32.15 fixed-point seconds.
    pub offset: u64,
}

impl ClockRegisters {
    pub fn seconds(&self) -> u64 {
        seconds_from_registers(self.running_time, self.offset)
    }
}

pub fn le48_decode(b: &[u8; REG_LEN]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..REG_LEN].copy_from_slice(b);
    u64::from_le_bytes(buf)
}

pub fn le48_encode(v: u64) -> [u8; REG_LEN] {
    let b = (v & MASK_48).to_le_bytes();
    [b[0], b[1], b[2], b[3], b[4], b[5]]
}

/// Whole calendar seconds for a register pair. The sum wraps at 48 bits like the hardware adder.
pub fn seconds_from_registers(running_time: u64, offset: u64) -> u64 {
    (((running_time & MASK_48) + ((offset & MASK_48) << 1)) & MASK_48) >> 16
}

/// Offset register value that makes the clock read `target` seconds.
///
/// The offset has one bit less resolution than the counter, so an odd `running_time`
/// reads back one second early until the counter ticks past the next second boundary.
/// Targets behind the counter use the 48-bit two's complement of the difference.
pub fn offset_for(target: u64, running_time: u64) -> Result<u64> {
    if target > MAX_SECONDS {
        return Err(RtcError::OutOfRange(target));
    }
    let fixed = target << 16;
    Ok((fixed.wrapping_sub(running_time & MASK_48) >> 1) & MASK_48)
}

/// Clock driver over a PMU register map.
pub struct PmuRtc<B> {
    bus: B,
    cfg: RtcConfig,
}

impl<B: RegisterBus> PmuRtc<B> {
    pub fn new(bus: B) -> Self {
        Self::with_config(bus, RtcConfig::default())
    }

    pub fn with_config(bus: B, cfg: RtcConfig) -> Self {
        Self { bus, cfg }
    }

    pub fn config(&self) -> RtcConfig {
        self.cfg
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn read_reg(&self, addr: u16) -> Result<u64> {
        let raw = self.bus.read(addr, REG_LEN).map_err(|e| {
            error!(addr, error = %e, "RTC register read failed");
            e
        })?;
        let bytes: [u8; REG_LEN] = raw
            .get(..REG_LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or(TransportError::ShortRead {
                expected: REG_LEN,
                got: raw.len(),
            })?;
        Ok(le48_decode(&bytes))
    }

    pub fn read_registers(&self) -> Result<ClockRegisters> {
        let running_time = self.read_reg(self.cfg.running_time_addr)?;
        let offset = self.read_reg(self.cfg.offset_addr)?;
        Ok(ClockRegisters {
            running_time,
            offset,
        })
    }

    pub fn read_seconds(&self) -> Result<u64> {
        Ok(self.read_registers()?.seconds())
    }

    /// Rewrite the offset so the clock reads `target` seconds.
    pub fn set_seconds(&self, target: u64) -> Result<()> {
        let running_time = self.read_reg(self.cfg.running_time_addr)?;
        let offset = offset_for(target, running_time)?;
        debug!(target_secs = target, running_time, offset, "setting RTC offset");
        self.bus
            .write(self.cfg.offset_addr, &le48_encode(offset))
            .map_err(|e| {
                error!(error = %e, "RTC offset write failed");
                RtcError::from(e)
            })
    }

    pub fn get_time(&self) -> Result<OffsetDateTime> {
        let secs = self.read_seconds()?;
        let ts = i64::try_from(secs).map_err(|_| RtcError::OutOfRange(secs))?;
        OffsetDateTime::from_unix_timestamp(ts).map_err(|_| RtcError::InvalidTimestamp(ts))
    }

    pub fn set_time(&self, when: OffsetDateTime) -> Result<()> {
        let ts = when.unix_timestamp();
        let secs = u64::try_from(ts).map_err(|_| RtcError::InvalidTimestamp(ts))?;
        self.set_seconds(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smc_transport::MockPmu;
    use std::time::Duration;

    fn rtc(running: u64) -> PmuRtc<MockPmu> {
        let pmu = MockPmu::default().with_counter(0xd002);
        pmu.set_running_time(running);
        PmuRtc::new(pmu)
    }

    #[test]
    fn combines_running_time_and_offset() {
        assert_eq!(seconds_from_registers((100 << 16) | 0x8000, 50 << 15), 150);
        assert_eq!(seconds_from_registers(0, 0), 0);
        let clock = rtc((100 << 16) | 0x8000);
        clock.bus().poke(0xd100, &le48_encode(50 << 15));
        let regs = clock.read_registers().unwrap();
        assert_eq!(regs.offset, 50 << 15);
        assert_eq!(clock.read_seconds().unwrap(), 150);
    }

    #[test]
    fn le48_helpers() {
        assert_eq!(
            le48_encode(0x0102_0304_0506_0708),
            [0x08, 0x07, 0x06, 0x05, 0x04, 0x03]
        );
        assert_eq!(le48_decode(&[0x08, 0x07, 0x06, 0x05, 0x04, 0x03]), 0x0304_0506_0708);
    }

    #[test]
    fn set_then_get_round_trips() {
        let clock = rtc(12_345 << 16);
        clock.set_seconds(1_700_000_000).unwrap();
        assert_eq!(clock.read_seconds().unwrap(), 1_700_000_000);
    }

    #[test]
    fn odd_running_time_floors_by_at_most_one_second() {
        for running in [1u64, 0x1_2345, (77 << 16) + 0xffff, 999_999_999] {
            let clock = rtc(running);
            let t = 1_600_000_000;
            clock.set_seconds(t).unwrap();
            let got = clock.read_seconds().unwrap();
            assert!(got == t || got + 1 == t, "running={running} got={got}");
        }
    }

    #[test]
    fn advancing_one_second_adds_exactly_one() {
        let clock = rtc((42 << 16) + 3);
        clock.set_seconds(1_000_000).unwrap();
        let before = clock.read_seconds().unwrap();
        clock.bus().advance(Duration::from_secs(1));
        assert_eq!(clock.read_seconds().unwrap(), before + 1);
        assert_eq!(clock.read_seconds().unwrap(), before + 1);
    }

    #[test]
    fn repeated_sets_stay_correct() {
        let clock = rtc(8 << 16);
        for t in [10u64, 2_000_000_000, 500, MAX_SECONDS, 86_400] {
            clock.set_seconds(t).unwrap();
            assert_eq!(clock.read_seconds().unwrap(), t);
            clock.bus().advance(Duration::from_secs(2));
        }
    }

    #[test]
    fn offset_is_written_once_as_six_bytes() {
        let clock = rtc(0);
        clock.set_seconds(3).unwrap();
        let log = clock.bus().write_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, 0xd100);
        assert_eq!(log[0].1, le48_encode((3 << 16) / 2).to_vec());
    }

    #[test]
    fn rejects_unrepresentable_targets() {
        let clock = rtc(1000 << 16);
        assert!(matches!(
            clock.set_seconds(MAX_SECONDS + 1),
            Err(RtcError::OutOfRange(_))
        ));
        assert!(clock.bus().write_log().is_empty());
    }

    #[test]
    fn target_behind_counter() {
        let clock = rtc(1_000_000 << 16);
        clock.set_seconds(500_000).unwrap();
        assert_eq!(clock.read_seconds().unwrap(), 500_000);

        for running in [(1000 << 16) + 1, 0x7fff_ffff_ffff, MASK_48] {
            let clock = rtc(running);
            for t in [1u64, 10, 999] {
                clock.set_seconds(t).unwrap();
                let got = clock.read_seconds().unwrap();
                assert!(got == t || got + 1 == t, "running={running:#x} t={t} got={got}");
            }
        }
        clock.bus().advance(Duration::from_secs(1));
        let before = clock.read_seconds().unwrap();
        clock.bus().advance(Duration::from_secs(1));
        assert_eq!(clock.read_seconds().unwrap(), before + 1);
    }

    #[test]
    fn failed_running_time_read_aborts_set() {
        let clock = rtc(7 << 16);
        clock.bus().fail_reads(true);
        assert!(matches!(
            clock.set_seconds(5),
            Err(RtcError::Transport(TransportError::Io(_)))
        ));
        assert!(clock.bus().write_log().is_empty());
        assert!(matches!(
            clock.read_seconds(),
            Err(RtcError::Transport(TransportError::Io(_)))
        ));
        assert!(clock.get_time().is_err());

        clock.bus().fail_reads(false);
        clock.set_seconds(5).unwrap();
        assert_eq!(clock.read_seconds().unwrap(), 5);
    }

    #[test]
    fn out_of_map_counter_is_a_transport_error() {
        let pmu = MockPmu::default();
        let cfg = RtcConfig {
            running_time_addr: 0xfffc,
            offset_addr: 0xd100,
        };
        let clock = PmuRtc::with_config(pmu, cfg);
        assert!(matches!(
            clock.set_seconds(5),
            Err(RtcError::Transport(TransportError::OutOfRange {
                addr: 0xfffc,
                len: 6
            }))
        ));
        assert!(clock.bus().write_log().is_empty());
    }

    #[test]
    fn write_failure_leaves_offset_untouched() {
        let clock = rtc(0);
        clock.set_seconds(100).unwrap();
        clock.bus().fail_writes(true);
        let err = clock.set_seconds(200).unwrap_err();
        assert!(matches!(err, RtcError::Transport(TransportError::Io(_))));
        assert_eq!(clock.read_seconds().unwrap(), 100);
    }

    #[test]
    fn calendar_round_trip() {
        let clock = rtc(0);
        let when = OffsetDateTime::from_unix_timestamp(1_714_564_800).unwrap();
        clock.set_time(when).unwrap();
        assert_eq!(clock.get_time().unwrap(), when);
        let before_epoch = OffsetDateTime::from_unix_timestamp(-1).unwrap();
        assert!(matches!(
            clock.set_time(before_epoch),
            Err(RtcError::InvalidTimestamp(-1))
        ));
    }

    #[test]
    fn custom_register_addresses() {
        let pmu = MockPmu::default().with_counter(0x0100);
        pmu.set_running_time(4 << 16);
        let cfg = RtcConfig {
            running_time_addr: 0x0100,
            offset_addr: 0x0200,
        };
        let clock = PmuRtc::with_config(pmu, cfg);
        clock.set_seconds(60).unwrap();
        assert_eq!(clock.bus().write_log()[0].0, 0x0200);
        assert_eq!(clock.read_seconds().unwrap(), 60);
    }
}
