use nrf52_bootloader::drivers::on_uarte_interrupt;

use crate::board::STARTUP_TIMEOUT;

pub fn serial_packet(_ctx: crate::tasks::serial_packet::Context) {
    on_uarte_interrupt(&STARTUP_TIMEOUT);
}
