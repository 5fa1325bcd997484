use core::fmt;

/// 32-bit SMC key, conventionally a 4-character mnemonic packed big-endian (`TC0P`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SmcKey(u32);

impl SmcKey {
    /// Sentinel for a registry slot with no backing key.
    pub const EMPTY: SmcKey = SmcKey(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn from_bytes(b: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(b))
    }

    /// Parse a mnemonic of exactly four ASCII characters.
    pub fn parse(s: &str) -> Option<Self> {
        if !s.is_ascii() {
            return None;
        }
        let bytes: [u8; 4] = s.as_bytes().try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Printable mnemonic; bytes outside the graphic ASCII range render as `.`.
    pub fn mnemonic(&self) -> String {
        self.to_bytes()
            .iter()
            .map(|&b| {
                if b == b' ' || b.is_ascii_graphic() {
                    b as char
                } else {
                    '.'
                }
            })
            .collect()
    }
}

impl fmt::Display for SmcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic())
    }
}

/// Raw type code reported by the SMC for a key, itself a packed mnemonic.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct KeyType(u32);

impl KeyType {
    pub const UI8: KeyType = KeyType::from_bytes(*b"ui8 ");
    pub const UI32: KeyType = KeyType::from_bytes(*b"ui32");
    pub const UI64: KeyType = KeyType::from_bytes(*b"ui64");
    pub const FLT: KeyType = KeyType::from_bytes(*b"flt ");
    pub const IOFT: KeyType = KeyType::from_bytes(*b"ioft");

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn from_bytes(b: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(b))
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08x})", SmcKey(self.0), self.0)
    }
}

/// Shape of a byte-addressed register space.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegmapConfig {
    pub reg_bits: u8,
    pub val_bits: u8,
    pub max_register: u16,
}

impl RegmapConfig {
    /// SERA PMU over SPMI: 16-bit addresses, byte-wide registers.
    pub const SERA_PMU: RegmapConfig = RegmapConfig {
        reg_bits: 16,
        val_bits: 8,
        max_register: 0xffff,
    };

    /// Whether `len` registers starting at `addr` all lie inside the map.
    pub fn contains(&self, addr: u16, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        let last = addr as usize + len - 1;
        last <= self.max_register as usize
    }
}

impl Default for RegmapConfig {
    fn default() -> Self {
        Self::SERA_PMU
    }
}
