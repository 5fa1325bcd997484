//! pmu-rtc: wall-clock time from the SERA PMU
//!
//! The PMU keeps a free-running 48-bit counter (32.16 fixed-point seconds) and a
//! software-settable 48-bit offset (32.15 fixed-point seconds). Calendar time is
//! `(running + 2 * offset) >> 16`; setting the time only ever rewrites the offset.
//!
//! Reads and writes are not transactional: a `set_time` racing another caller's
//! read-modify-write can observe a stale offset. Callers that need strict ordering
//! serialize access to the clock themselves.

mod error;
pub use error::{Result, RtcError};

mod clock;
pub use clock::{
    le48_decode, le48_encode, offset_for, seconds_from_registers, ClockRegisters, PmuRtc,
    RtcConfig, MASK_48, MAX_SECONDS,
};
