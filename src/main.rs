#![no_main]
#![no_std]

use core::panic::PanicInfo;

use nrf52832_hal::pac::SCB;
use rtt_target::rprintln;

mod board;

#[rtic::app(device = nrf52832_hal::pac, peripherals = true)]
mod tasks {
    use nrf52832_hal::delay::Delay;
    use nrf52_bootloader::drivers::{
        BoardPlatform, GpregretEntry, InternalFlash, MbrCpu, UarteTransport, RX_LEN,
    };

    use crate::board::tasks_impl::{idle, init, serial_packet, startup_timeout};

    #[shared]
    pub struct Shared {}

    #[local]
    pub struct Local {
        pub flash: InternalFlash,
        pub transport: UarteTransport,
        pub platform: BoardPlatform,
        pub cpu: MbrCpu,
        pub entry: GpregretEntry,
        pub delay: Delay,
    }

    extern "Rust" {
        #[init(local = [rx_buf: [u8; RX_LEN] = [0; RX_LEN]])]
        fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics);

        #[idle(local = [flash, transport, platform, cpu, entry, delay])]
        fn idle(ctx: idle::Context) -> !;

        #[task(binds = RTC1, priority = 2)]
        fn startup_timeout(ctx: startup_timeout::Context);

        #[task(binds = UARTE0_UART0, priority = 2)]
        fn serial_packet(ctx: serial_packet::Context);
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    rprintln!("----- PANIC -----");
    rprintln!("{:#?}", info);
    SCB::sys_reset();
}
