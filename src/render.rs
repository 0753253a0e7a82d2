//! Once-a-second render loop

use embedded_hal::digital::v2::ToggleableOutputPin;

use crate::clock::{DateTime, Field, Rtc, TimeSample};
use crate::display::MatrixDisplay;
use crate::encoder;
use crate::style::{ClockStyle, ConfigSlot, StyleSelector, StyleStore};
use crate::timesync::ResyncCounter;

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Style change consumed (and written) this tick
    pub persisted: Option<ClockStyle>,
    /// Time that was drawn; `None` when the RTC could not be read
    pub shown: Option<TimeSample>,
    /// A resync is due. The tick itself never waits on the time source;
    /// the caller runs [`try_resync`](crate::timesync::try_resync) elsewhere
    /// and hands the result to [`RenderLoop::apply_resync`].
    pub resync_due: bool,
}

/// Owns every collaborator the per-second tick touches
pub struct RenderLoop<'a, D, R, C, L> {
    display: D,
    rtc: R,
    store: StyleStore<C>,
    led: L,
    selector: &'a StyleSelector,
    resync: ResyncCounter,
}

impl<'a, D, R, C, L> RenderLoop<'a, D, R, C, L>
where
    D: MatrixDisplay,
    R: Rtc,
    C: ConfigSlot,
    L: ToggleableOutputPin,
{
    pub fn new(
        display: D,
        rtc: R,
        store: StyleStore<C>,
        led: L,
        selector: &'a StyleSelector,
        resync_period_ticks: u32,
    ) -> Self {
        Self {
            display,
            rtc,
            store,
            led,
            selector,
            resync: ResyncCounter::new(resync_period_ticks),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn rtc_mut(&mut self) -> &mut R {
        &mut self.rtc
    }

    pub fn store(&self) -> &StyleStore<C> {
        &self.store
    }

    /// Commit a time fetched by a resync
    pub fn apply_resync(&mut self, datetime: &DateTime) -> Result<(), R::Error> {
        let result = self.rtc.commit(datetime);
        #[cfg(feature = "defmt")]
        match &result {
            Ok(()) => defmt::info!("RTC resynced to {}", datetime),
            Err(_) => defmt::warn!("RTC rejected resynced time"),
        }
        result
    }

    /// Run one tick. A failed flush is returned after the resync counter
    /// has advanced so a broken panel cannot stall time keeping.
    pub fn tick(&mut self) -> Result<TickReport, D::Error> {
        let mut report = TickReport::default();

        if let Some(style) = self.selector.take_pending() {
            match self.store.save(style) {
                Ok(()) => {
                    #[cfg(feature = "defmt")]
                    defmt::info!("clock style {} saved", style);
                }
                Err(_) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("error saving clock style {}", style);
                }
            }
            report.persisted = Some(style);
        }

        if self.led.toggle().is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("heartbeat LED toggle failed");
        }

        let frame = match self.rtc.read() {
            Ok(now) => {
                let sample = TimeSample::from(&now);
                report.shown = Some(sample);
                self.show(&sample)
            }
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("RTC read failed, frame skipped");
                Ok(())
            }
        };

        report.resync_due = self.resync.tick();

        frame.map(|()| report)
    }

    /// Draw all six fields with the active style and flush
    pub fn show(&mut self, sample: &TimeSample) -> Result<(), D::Error> {
        let style = self.selector.current();
        self.display.clear();
        for field in Field::ALL {
            encoder::draw(style, sample.field(field), style.column(field), &mut self.display);
        }
        self.display.flush()
    }
}
