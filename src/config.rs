//! Compile-time clock configuration
//!
//! Every tunable the firmware needs lives here so the board wiring in
//! `main.rs` stays free of magic numbers.

use crate::timesync::SyncPolicy;

/// Runtime tunables for the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// How long the button level must hold before an edge counts (ms)
    pub debounce_ms: u32,
    /// Render ticks between two background resyncs
    pub resync_period_ticks: u32,
    /// Retry behaviour of the boot-time sync
    pub sync: SyncPolicy,
    /// Upper bound on one request/response exchange with the time link (ms)
    pub link_timeout_ms: u32,
    /// MAX7219 intensity, 0x0..=0xF
    pub intensity: u8,
    /// Number of chained 8x8 panels
    pub panels: usize,
}

impl ClockConfig {
    pub const DEFAULT: Self = Self {
        debounce_ms: 20,
        // A little less than a day so the sync drifts across the day
        resync_period_ticks: 85_000,
        sync: SyncPolicy::bounded(8, 500, 30_000),
        link_timeout_ms: 5_000,
        intensity: 0x5,
        panels: 2,
    };
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Name of the storage slot holding the selected style
pub const STYLE_SLOT: &str = "bin_clock.ini";

/// Time API the network co-processor is asked to fetch
pub const TIME_API: &str = "http://worldtimeapi.org/api/ip";
