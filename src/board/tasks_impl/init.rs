use rtt_target::{rprintln, rtt_init_print};

use nrf52832_hal::clocks::Clocks;
use nrf52832_hal::delay::Delay;
use nrf52832_hal::gpio::{p0, Level};
use nrf52832_hal::rtc::Rtc;
use nrf52832_hal::uarte::{self, Baudrate, Parity, Uarte};

use nrf52_bootloader::drivers::{BoardPlatform, GpregretEntry, InternalFlash, MbrCpu, UarteTransport};

use crate::board::{CONFIG, STARTUP_TIMEOUT};
use crate::tasks::{Local, Shared};

pub fn init(ctx: crate::tasks::init::Context) -> (Shared, Local, crate::tasks::init::Monotonics) {
    rtt_init_print!();
    rprintln!("nrf52-bootloader {}", env!("CARGO_PKG_VERSION"));

    // Read (and clear) the DFU request before anything else can reset us.
    let entry = GpregretEntry::take(&ctx.device.POWER);
    rprintln!("DFU requested: {:?}", entry.requested());

    let gpio = p0::Parts::new(ctx.device.P0);

    // RTC1 runs off the LFCLK
    Clocks::new(ctx.device.CLOCK).start_lfclk();
    let rtc = Rtc::new(ctx.device.RTC1, BoardPlatform::PRESCALER).unwrap();

    // The watchdog may have been started by the application; it keeps
    // running across the reset and gets fed from the event loop.
    let platform = BoardPlatform::new(ctx.device.WDT, rtc, &STARTUP_TIMEOUT);

    // Set up the serial DFU link (nRF52 DK pins)
    let uarte_pins = uarte::Pins {
        txd: gpio.p0_06.into_push_pull_output(Level::High).degrade(),
        rxd: gpio.p0_08.into_floating_input().degrade(),
        cts: None,
        rts: None,
    };
    let uarte = Uarte::new(
        ctx.device.UARTE0,
        uarte_pins,
        Parity::EXCLUDED,
        Baudrate::BAUD115200,
    );
    let transport = UarteTransport::new(uarte, ctx.local.rx_buf);

    let flash = InternalFlash::new(ctx.device.NVMC);

    (
        Shared {},
        Local {
            flash,
            transport,
            platform,
            cpu: MbrCpu::new(CONFIG.layout.softdevice_start),
            entry,
            delay: Delay::new(ctx.core.SYST),
        },
        crate::tasks::init::Monotonics(),
    )
}
