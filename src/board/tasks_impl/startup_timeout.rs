use rtt_target::rprintln;

use nrf52_bootloader::drivers::acknowledge_startup_timer;

use crate::board::{QUEUE, STARTUP_TIMEOUT};

pub fn startup_timeout(_ctx: crate::tasks::startup_timeout::Context) {
    acknowledge_startup_timer();
    if let Err(e) = STARTUP_TIMEOUT.expire(&QUEUE) {
        rprintln!("timeout lost: {}", e);
    }
}
