//! RP2040 implementations of the clock's hardware traits

use matrix_clock::clock::{DateTime, Rtc};
use matrix_clock::display::PanelSink;
use matrix_clock::record::{self, RecordError};
use matrix_clock::style::ConfigSlot;
use max7219::connectors::Connector;
use max7219::{DataError, MAX7219};
use rp_pico::hal::rtc::{self, DayOfWeek, RealTimeClock, RtcError};

/// Chain of MAX7219-driven 8x8 panels
pub struct PanelChain<C> {
    driver: MAX7219<C>,
}

impl<C: Connector> PanelChain<C> {
    pub fn new(mut driver: MAX7219<C>, panels: usize, intensity: u8) -> Result<Self, DataError> {
        driver.power_on()?;
        for i in 0..panels {
            driver.set_intensity(i, intensity)?;
            driver.clear_display(i)?;
        }
        Ok(Self { driver })
    }
}

impl<C: Connector> PanelSink for PanelChain<C> {
    type Error = DataError;

    fn write_panel(&mut self, index: usize, rows: &[u8; 8]) -> Result<(), DataError> {
        self.driver.write_raw(index, rows)
    }
}

/// The RP2040's on-chip RTC
pub struct PicoRtc {
    rtc: RealTimeClock,
}

impl PicoRtc {
    pub fn new(rtc: RealTimeClock) -> Self {
        Self { rtc }
    }

    /// Placeholder time the RTC starts from before the first sync
    pub fn epoch() -> rtc::DateTime {
        rtc::DateTime {
            year: 2000,
            month: 1,
            day: 1,
            day_of_week: DayOfWeek::Saturday,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

fn day_of_week(index: u8) -> DayOfWeek {
    match index {
        0 => DayOfWeek::Sunday,
        1 => DayOfWeek::Monday,
        2 => DayOfWeek::Tuesday,
        3 => DayOfWeek::Wednesday,
        4 => DayOfWeek::Thursday,
        5 => DayOfWeek::Friday,
        _ => DayOfWeek::Saturday,
    }
}

impl Rtc for PicoRtc {
    type Error = RtcError;

    fn read(&mut self) -> Result<DateTime, RtcError> {
        let now = self.rtc.now()?;
        Ok(DateTime {
            year: now.year,
            month: now.month,
            day: now.day,
            day_of_week: now.day_of_week as u8,
            hour: now.hour,
            minute: now.minute,
            second: now.second,
        })
    }

    fn commit(&mut self, datetime: &DateTime) -> Result<(), RtcError> {
        self.rtc.set_datetime(rtc::DateTime {
            year: datetime.year,
            month: datetime.month,
            day: datetime.day,
            day_of_week: day_of_week(datetime.day_of_week),
            hour: datetime.hour,
            minute: datetime.minute,
            second: datetime.second,
        })
    }
}

/// Flash layout of the config sector
const FLASH_SIZE: u32 = 2 * 1024 * 1024;
const SECTOR_SIZE: u32 = 4096;
const PAGE_SIZE: usize = 256;
const XIP_BASE: u32 = 0x1000_0000;

/// One named text slot in the last sector of flash, stored as a
/// [`record`](matrix_clock::record)
pub struct FlashSlot {
    name: &'static str,
    offset: u32,
}

impl FlashSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            offset: FLASH_SIZE - SECTOR_SIZE,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl ConfigSlot for FlashSlot {
    type Error = RecordError;

    fn load(&mut self, buf: &mut [u8]) -> Result<Option<usize>, RecordError> {
        // SAFETY: the slot lies inside the XIP-mapped flash window
        let stored = unsafe { record::snapshot((XIP_BASE + self.offset) as *const u8) };
        record::decode(&stored, buf)
    }

    fn save(&mut self, value: &str) -> Result<(), RecordError> {
        let bytes = value.as_bytes();
        let mut page = [0xFFu8; PAGE_SIZE];
        record::encode(bytes, &mut page)?;

        // Code runs from flash: nothing may execute while it is erased
        cortex_m::interrupt::free(|_| unsafe {
            rp2040_flash::flash::flash_range_erase(self.offset, SECTOR_SIZE, true);
            rp2040_flash::flash::flash_range_program(self.offset, &page, true);
        });
        defmt::debug!("wrote {} bytes to slot {}", bytes.len(), self.name);
        Ok(())
    }
}
