use crate::{KeyType, RegisterBus, RegmapConfig, Result, SmcBus, SmcKey, TransportError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Locks never poison the mock; a panicking test thread leaves the data usable.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-process SMC with a fixed key table. Each instance is independent.
#[derive(Default)]
pub struct MockSmc {
    keys: Mutex<HashMap<SmcKey, (KeyType, Vec<u8>)>>,
    failing: Mutex<HashSet<SmcKey>>,
    reads: AtomicUsize,
}

impl MockSmc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: SmcKey, ty: KeyType, payload: &[u8]) {
        lock(&self.keys).insert(key, (ty, payload.to_vec()));
    }

    /// Store a `flt ` key holding raw single-precision bits.
    pub fn insert_f32_bits(&self, key: SmcKey, bits: u32) {
        self.insert(key, KeyType::FLT, &bits.to_le_bytes());
    }

    pub fn insert_u8(&self, key: SmcKey, value: u8) {
        self.insert(key, KeyType::UI8, &[value]);
    }

    pub fn insert_u64(&self, key: SmcKey, ty: KeyType, value: u64) {
        self.insert(key, ty, &value.to_le_bytes());
    }

    /// Make every access to `key` fail with an I/O error until cleared.
    pub fn fail_key(&self, key: SmcKey) {
        lock(&self.failing).insert(key);
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    /// Number of payload reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn check(&self, key: SmcKey) -> Result<()> {
        if lock(&self.failing).contains(&key) {
            return Err(TransportError::Io(format!("injected failure on {key}")));
        }
        Ok(())
    }
}

impl SmcBus for MockSmc {
    fn key_type(&self, key: SmcKey) -> Result<KeyType> {
        self.check(key)?;
        lock(&self.keys)
            .get(&key)
            .map(|(ty, _)| *ty)
            .ok_or(TransportError::KeyNotFound(key))
    }

    fn read_key(&self, key: SmcKey, len: usize) -> Result<Vec<u8>> {
        self.check(key)?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        let keys = lock(&self.keys);
        let (_, payload) = keys.get(&key).ok_or(TransportError::KeyNotFound(key))?;
        if payload.len() < len {
            return Err(TransportError::ShortRead {
                expected: len,
                got: payload.len(),
            });
        }
        Ok(payload[..len].to_vec())
    }
}

/// Register layout of the mock PMU's free-running 48-bit counter.
#[derive(Clone, Copy, Debug)]
struct Counter {
    addr: u16,
}

/// In-process PMU register file.
///
/// The optional running-time counter is a 48-bit little-endian 32.16 fixed-point value that
/// only moves forward through [`MockPmu::advance`]; software writes to it are rejected.
pub struct MockPmu {
    map: RegmapConfig,
    regs: Mutex<Vec<u8>>,
    counter: Option<Counter>,
    fail_reads: Mutex<bool>,
    fail_writes: Mutex<bool>,
    writes: Mutex<Vec<(u16, Vec<u8>)>>,
}

impl MockPmu {
    pub fn new(map: RegmapConfig) -> Self {
        Self {
            map,
            regs: Mutex::new(vec![0u8; map.max_register as usize + 1]),
            counter: None,
            fail_reads: Mutex::new(false),
            fail_writes: Mutex::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Attach a read-only running-time counter at `addr`.
    pub fn with_counter(mut self, addr: u16) -> Self {
        self.counter = Some(Counter { addr });
        self
    }

    /// Overwrite the running-time counter with a raw 32.16 value (masked to 48 bits).
    pub fn set_running_time(&self, raw: u64) {
        if let Some(c) = self.counter {
            self.poke(c.addr, &le48(raw));
        }
    }

    /// Raw running-time counter, or 0 when none is attached.
    pub fn running_time(&self) -> u64 {
        match self.counter {
            Some(c) => self.peek_le48(c.addr),
            None => 0,
        }
    }

    /// Let `dt` of real time elapse on the counter.
    pub fn advance(&self, dt: Duration) {
        let ticks = (dt.as_secs() << 16) + ((u64::from(dt.subsec_nanos()) << 16) / 1_000_000_000);
        let now = self.running_time();
        self.set_running_time(now.wrapping_add(ticks));
    }

    /// Store bytes directly, bypassing write checks and the write log.
    pub fn poke(&self, addr: u16, data: &[u8]) {
        let mut regs = lock(&self.regs);
        let start = (addr as usize).min(regs.len());
        let end = (start + data.len()).min(regs.len());
        regs[start..end].copy_from_slice(&data[..end - start]);
    }

    pub fn peek_le48(&self, addr: u16) -> u64 {
        let regs = lock(&self.regs);
        let start = addr as usize;
        let mut b = [0u8; 8];
        for (i, slot) in b.iter_mut().take(6).enumerate() {
            *slot = regs.get(start + i).copied().unwrap_or(0);
        }
        u64::from_le_bytes(b)
    }

    /// Make every bus read fail with an I/O error while set.
    pub fn fail_reads(&self, fail: bool) {
        *lock(&self.fail_reads) = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    /// Every accepted bulk write, in order.
    pub fn write_log(&self) -> Vec<(u16, Vec<u8>)> {
        lock(&self.writes).clone()
    }

    fn overlaps_counter(&self, addr: u16, len: usize) -> bool {
        match self.counter {
            Some(c) => {
                let (a0, a1) = (addr as usize, addr as usize + len);
                let (c0, c1) = (c.addr as usize, c.addr as usize + 6);
                a0 < c1 && c0 < a1
            }
            None => false,
        }
    }
}

impl Default for MockPmu {
    fn default() -> Self {
        Self::new(RegmapConfig::SERA_PMU)
    }
}

impl RegisterBus for MockPmu {
    fn read(&self, addr: u16, len: usize) -> Result<Vec<u8>> {
        if *lock(&self.fail_reads) {
            return Err(TransportError::Io(format!("injected read failure at 0x{addr:04x}")));
        }
        if !self.map.contains(addr, len) {
            return Err(TransportError::OutOfRange { addr, len });
        }
        let regs = lock(&self.regs);
        let start = addr as usize;
        Ok(regs[start..start + len].to_vec())
    }

    fn write(&self, addr: u16, data: &[u8]) -> Result<()> {
        if *lock(&self.fail_writes) {
            return Err(TransportError::Io(format!("injected write failure at 0x{addr:04x}")));
        }
        if !self.map.contains(addr, data.len()) {
            return Err(TransportError::OutOfRange {
                addr,
                len: data.len(),
            });
        }
        if self.overlaps_counter(addr, data.len()) {
            return Err(TransportError::Unsupported("running-time counter is read-only"));
        }
        self.poke(addr, data);
        lock(&self.writes).push((addr, data.to_vec()));
        Ok(())
    }
}

fn le48(v: u64) -> [u8; 6] {
    let b = v.to_le_bytes();
    [b[0], b[1], b[2], b[3], b[4], b[5]]
}
