use nrf52832_hal::pac::UARTE0;
use nrf52832_hal::uarte::Uarte;

use crate::error::Error;
use crate::transport::{SerialPins, StartupTimeout, Transport};

pub const RX_LEN: usize = 64;

/// Serial link the DFU packets arrive on.
///
/// Reception runs in the background with EasyDMA; every filled buffer
/// raises `UARTE0_UART0`, which is where `on_uarte_interrupt` runs.
pub struct UarteTransport {
    uarte: UARTE0,
    pins: SerialPins,
    rx: &'static mut [u8; RX_LEN],
}

impl UarteTransport {
    /// Takes over a configured HAL driver. Baud rate and parity stay as the
    /// HAL left them; `free` disconnects the pins, so their selection is
    /// kept and written back when a session starts.
    pub fn new(uarte: Uarte<UARTE0>, rx: &'static mut [u8; RX_LEN]) -> Self {
        let (uarte, pins) = uarte.free();
        let pins = SerialPins {
            rxd: pins.rxd.psel_bits(),
            txd: pins.txd.psel_bits(),
            cts: pins.cts.map(|pin| pin.psel_bits()),
            rts: pins.rts.map(|pin| pin.psel_bits()),
        };
        UarteTransport { uarte, pins, rx }
    }

    fn select_pins(&self, [rxd, txd, cts, rts]: [u32; 4]) {
        let psel = &self.uarte.psel;
        psel.rxd.write(|w| unsafe { w.bits(rxd) });
        psel.txd.write(|w| unsafe { w.bits(txd) });
        psel.cts.write(|w| unsafe { w.bits(cts) });
        psel.rts.write(|w| unsafe { w.bits(rts) });
    }
}

impl Transport for UarteTransport {
    fn update_start(&mut self) -> Result<(), Error> {
        let buffer = self.rx.as_mut_ptr() as u32;
        self.select_pins(self.pins.psel());
        let uarte = &self.uarte;
        uarte.enable.write(|w| w.enable().enabled());
        uarte.rxd.ptr.write(|w| unsafe { w.ptr().bits(buffer) });
        uarte
            .rxd
            .maxcnt
            .write(|w| unsafe { w.maxcnt().bits(RX_LEN as _) });
        uarte.events_endrx.reset();
        uarte.intenset.write(|w| w.endrx().set());
        uarte.tasks_startrx.write(|w| unsafe { w.bits(1) });
        info!("serial DFU listening");
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        let uarte = &self.uarte;
        uarte.intenclr.write(|w| w.endrx().clear());
        uarte.tasks_stoprx.write(|w| unsafe { w.bits(1) });
        uarte.enable.write(|w| w.enable().disabled());
        self.select_pins(SerialPins::released());
        info!("serial DFU closed");
        Ok(())
    }
}

/// UARTE0 interrupt body: note the packet for the startup timeout and keep
/// receiving into the same buffer.
pub fn on_uarte_interrupt(timeout: &StartupTimeout) {
    let uarte = unsafe { &*UARTE0::ptr() };
    if uarte.events_endrx.read().bits() == 0 {
        return;
    }
    uarte.events_endrx.reset();

    let received = uarte.rxd.amount.read().bits();
    if received > 0 {
        timeout.packet_received();
    }
    uarte.tasks_startrx.write(|w| unsafe { w.bits(1) });
}
