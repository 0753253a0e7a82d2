#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;
use rtic::app;

use matrix_clock::{ClockStyle, EdgeSlot, StyleSelector};

mod board;

/// Written by the debounce poll, consumed by the render task
static SELECTOR: StyleSelector = StyleSelector::new(ClockStyle::Binary);
/// Written by the button interrupt, consumed by the debounce poll
static EDGES: EdgeSlot = EdgeSlot::new();

#[app(device = rp_pico::hal::pac, peripherals = true, dispatchers = [I2C0_IRQ, I2C1_IRQ])]
mod app {
    use embedded_hal::digital::v2::InputPin;
    use rtic::mutex_prelude::*;
    use matrix_clock::config::{ClockConfig, STYLE_SLOT};
    use matrix_clock::link::SerialTimeSource;
    use matrix_clock::timesync::{self, SyncError};
    use matrix_clock::{LedMatrix, Poll, RenderLoop, StyleController, StyleStore};
    use max7219::MAX7219;
    use rp_pico::hal::{
        clocks::{init_clocks_and_plls, Clock},
        fugit::{ExtU32, RateExtU32},
        gpio::{
            bank0::{Gpio0, Gpio1, Gpio15, Gpio16, Gpio17, Gpio18, Gpio19, Gpio25},
            FunctionSio, FunctionSpi, FunctionUart, Interrupt, Pin, PullDown, SioInput, SioOutput,
        },
        pac,
        rtc::RealTimeClock,
        sio::Sio,
        spi::Spi,
        timer::{Alarm, Alarm0, Alarm1, Timer},
        uart::{DataBits, StopBits, UartConfig, UartPeripheral},
        watchdog::Watchdog,
    };

    use crate::board::{FlashSlot, PanelChain, PicoRtc};

    const CONFIG: ClockConfig = ClockConfig::DEFAULT;

    type Spi0 = Spi<
        rp_pico::hal::spi::Enabled,
        pac::SPI0,
        (
            Pin<Gpio19, FunctionSpi, PullDown>,
            Pin<Gpio16, FunctionSpi, PullDown>,
            Pin<Gpio18, FunctionSpi, PullDown>,
        ),
    >;
    type CsPin = Pin<Gpio17, FunctionSio<SioOutput>, PullDown>;
    type Panels = PanelChain<max7219::connectors::SpiConnectorSW<Spi0, CsPin>>;
    type Uart0 = UartPeripheral<
        rp_pico::hal::uart::Enabled,
        pac::UART0,
        (
            Pin<Gpio0, FunctionUart, PullDown>,
            Pin<Gpio1, FunctionUart, PullDown>,
        ),
    >;
    type Button = Pin<Gpio15, FunctionSio<SioInput>, PullDown>;
    type Led = Pin<Gpio25, FunctionSio<SioOutput>, PullDown>;
    type ClockLoop = RenderLoop<
        'static,
        LedMatrix<Panels>,
        PicoRtc,
        FlashSlot,
        Led,
    >;

    // Shared resources (accessed by multiple tasks)
    #[shared]
    struct Shared {
        button: Button,
        alarm1: Alarm1,
        clock: ClockLoop,
    }

    // Local resources (accessed by single tasks)
    #[local]
    struct Local {
        alarm: Alarm0,
        timer: Timer,
        edge_timer: Timer,
        controller: StyleController<'static>,
        source: SerialTimeSource<Uart0, Timer>,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics) {
        let mut pac = ctx.device;
        let mut watchdog = Watchdog::new(pac.WATCHDOG);
        let sio = Sio::new(pac.SIO);

        let external_xtal_freq_hz = 12_000_000u32;
        let clocks = init_clocks_and_plls(
            external_xtal_freq_hz,
            pac.XOSC,
            pac.CLOCKS,
            pac.PLL_SYS,
            pac.PLL_USB,
            &mut pac.RESETS,
            &mut watchdog,
        )
        .ok()
        .unwrap();

        let mut timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
        let mut alarm = timer.alarm_0().unwrap();
        alarm.enable_interrupt();
        let mut alarm1 = timer.alarm_1().unwrap();
        alarm1.enable_interrupt();

        let pins = rp_pico::Pins::new(
            pac.IO_BANK0,
            pac.PADS_BANK0,
            sio.gpio_bank0,
            &mut pac.RESETS,
        );

        let led = pins.led.into_push_pull_output();

        // Pressed reads HIGH; both edges feed the debouncer
        let button = pins.gpio15.into_pull_down_input();
        button.set_interrupt_enabled(Interrupt::EdgeHigh, true);
        button.set_interrupt_enabled(Interrupt::EdgeLow, true);

        let mosi = pins.gpio19.into_function::<FunctionSpi>();
        let sck = pins.gpio18.into_function::<FunctionSpi>();
        let miso = pins.gpio16.into_function::<FunctionSpi>();
        let cs = pins.gpio17.into_push_pull_output();

        let spi = Spi::<_, _, _, 8>::new(pac.SPI0, (mosi, miso, sck));
        let spi = spi.init(
            &mut pac.RESETS,
            clocks.peripheral_clock.freq(),
            2_000_000u32.Hz(),
            &embedded_hal::spi::MODE_0,
        );
        let driver = MAX7219::from_spi_cs(CONFIG.panels, spi, cs).unwrap();
        let panels = PanelChain::new(driver, CONFIG.panels, CONFIG.intensity).unwrap();

        let uart_pins = (
            pins.gpio0.into_function::<FunctionUart>(),
            pins.gpio1.into_function::<FunctionUart>(),
        );
        let uart = UartPeripheral::new(pac.UART0, uart_pins, &mut pac.RESETS)
            .enable(
                UartConfig::new(115_200.Hz(), DataBits::Eight, None, StopBits::One),
                clocks.peripheral_clock.freq(),
            )
            .unwrap();
        let mut source = SerialTimeSource::new(uart, timer, CONFIG.link_timeout_ms);

        let rtc = RealTimeClock::new(
            pac.RTC,
            clocks.rtc_clock,
            &mut pac.RESETS,
            PicoRtc::epoch(),
        )
        .unwrap();
        let mut rtc = PicoRtc::new(rtc);

        let mut delay = timer;
        match timesync::initial_sync(&mut source, &mut rtc, &mut delay, &CONFIG.sync) {
            Ok(now) => defmt::info!("clock set to {}", now),
            Err(SyncError::Exhausted { attempts }) => {
                defmt::warn!("time sync gave up after {} attempts, using RTC time", attempts)
            }
            Err(_) => defmt::error!("RTC rejected synced time"),
        }

        let slot = FlashSlot::new(STYLE_SLOT);
        defmt::info!("loading clock style from {}", slot.name());
        let mut store = StyleStore::new(slot);
        let style = store.load_or_default();
        crate::SELECTOR.restore(style);
        defmt::info!("clock_style = {}", style);

        let clock = RenderLoop::new(
            LedMatrix::new(panels),
            rtc,
            store,
            led,
            &crate::SELECTOR,
            CONFIG.resync_period_ticks,
        );
        let controller = StyleController::new(&crate::SELECTOR, &crate::EDGES, CONFIG.debounce_ms);

        alarm.schedule(1_000_000u32.micros()).unwrap();

        (
            Shared {
                button,
                alarm1,
                clock,
            },
            Local {
                alarm,
                timer,
                edge_timer: timer,
                controller,
                source,
            },
            init::Monotonics(),
        )
    }

    fn now_ms(timer: &Timer) -> u32 {
        (timer.get_counter().ticks() / 1_000) as u32
    }

    // Hardware Task: Timer Interrupt (1Hz)
    #[task(binds = TIMER_IRQ_0, priority = 2, local = [alarm])]
    fn timer_tick(ctx: timer_tick::Context) {
        ctx.local.alarm.clear_interrupt();
        ctx.local.alarm.schedule(1_000_000u32.micros()).unwrap();

        render::spawn().ok();
    }

    // Hardware Task: GPIO Interrupt (either button edge)
    #[task(binds = IO_IRQ_BANK0, priority = 2, shared = [button, alarm1], local = [edge_timer])]
    fn button_edge(ctx: button_edge::Context) {
        let now = now_ms(ctx.local.edge_timer);
        let button = ctx.shared.button;
        let alarm1 = ctx.shared.alarm1;
        (button, alarm1).lock(|b, a| {
            b.clear_interrupt(Interrupt::EdgeHigh);
            b.clear_interrupt(Interrupt::EdgeLow);
            let level = b.is_high().unwrap_or(false);
            if crate::EDGES.on_edge(&crate::SELECTOR, level, now) {
                a.schedule(1_000u32.micros()).ok();
            }
        });
    }

    // Hardware Task: Debounce poll (Timer 1), re-armed every 1ms while settling
    #[task(binds = TIMER_IRQ_1, priority = 2, shared = [button, alarm1], local = [controller, timer])]
    fn debounce_poll(ctx: debounce_poll::Context) {
        let now = now_ms(ctx.local.timer);
        let controller = ctx.local.controller;
        let button = ctx.shared.button;
        let alarm1 = ctx.shared.alarm1;
        (button, alarm1).lock(|b, a| {
            a.clear_interrupt();
            let level = b.is_high().unwrap_or(false);
            match controller.poll(level, now) {
                Poll::Settling => {
                    a.schedule(1_000u32.micros()).ok();
                }
                Poll::Changed(style) => defmt::info!("style change to {} pending", style),
                Poll::Idle => {}
            }
        });
    }

    // Software Task: one clock tick
    #[task(priority = 2, shared = [clock])]
    fn render(mut ctx: render::Context) {
        match ctx.shared.clock.lock(|clock| clock.tick()) {
            Ok(report) => {
                if report.resync_due && resync::spawn().is_err() {
                    defmt::warn!("previous resync still running");
                }
            }
            Err(_) => defmt::warn!("display flush failed"),
        }
    }

    // Software Task: periodic resync, below the render tick so waiting on
    // the link never holds up the display
    #[task(priority = 1, shared = [clock], local = [source])]
    fn resync(mut ctx: resync::Context) {
        if let Ok(now) = timesync::try_resync(ctx.local.source) {
            ctx.shared.clock.lock(|clock| clock.apply_resync(&now)).ok();
        }
    }
}
