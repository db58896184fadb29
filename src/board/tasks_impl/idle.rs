use rtt_target::rprintln;

use nrf52832_hal::delay::Delay;
use nrf52832_hal::pac::SCB;

use nrf52_bootloader::boot::{self, BootAction, BootPeripherals};
use nrf52_bootloader::drivers::{BoardPlatform, GpregretEntry, InternalFlash, MbrMover, UarteTransport};
use nrf52_bootloader::launch::start_application;
use nrf52_bootloader::store::Persistence;
use nrf52_bootloader::transport::DfuMode;
use nrf52_bootloader::{Bootloader, Error};

use crate::board::{CONFIG, QUEUE};

pub fn idle(ctx: crate::tasks::idle::Context) -> ! {
    let local = ctx.local;

    match run(local.flash, local.transport, local.platform, local.delay, local.entry) {
        Ok(BootAction::StartApplication(address)) => {
            // Only returns if the launch was refused
            if let Err(e) = unsafe { start_application(local.cpu, address, CONFIG.irq_count) } {
                rprintln!("cannot start application: {}", e);
            }
        }
        Ok(BootAction::Reset) => rprintln!("resetting"),
        Err(e) => rprintln!("bootloader failed: {}", e),
    }

    SCB::sys_reset();
}

fn run(
    flash: &mut InternalFlash,
    transport: &mut UarteTransport,
    platform: &mut BoardPlatform,
    delay: &mut Delay,
    entry: &mut GpregretEntry,
) -> Result<BootAction, Error> {
    // Radio-link sessions persist through the transactional store.
    let mode = entry.requested().unwrap_or(DfuMode::Serial);
    let store = Persistence::for_mode(mode, CONFIG.layout.settings_address)?;

    let mut bootloader = Bootloader::new(flash, store, transport, &QUEUE, CONFIG)?;
    rprintln!("settings: {:?}", bootloader.settings());

    boot::run(
        &mut bootloader,
        BootPeripherals {
            platform,
            mover: &mut MbrMover,
            delay,
            entry,
        },
    )
}
