use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;
use crate::event::{EventQueue, UpdateStatusEvent};

/// How the update reaches the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfuMode {
    /// Serial (UART or USB CDC).
    Serial,
    /// Over the air, through the SoftDevice radio link.
    Ota,
}

/// The DFU transport that is active for this session.
pub trait Transport {
    fn update_start(&mut self) -> Result<(), Error>;
    fn close(&mut self) -> Result<(), Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn update_start(&mut self) -> Result<(), Error> {
        T::update_start(self)
    }

    fn close(&mut self) -> Result<(), Error> {
        T::close(self)
    }
}

/// Pin selection of a serial link, as `pin | port << 5` numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialPins {
    pub rxd: u32,
    pub txd: u32,
    pub cts: Option<u32>,
    pub rts: Option<u32>,
}

impl SerialPins {
    /// Bit 31 of a PSEL register: pin disconnected.
    pub const DISCONNECTED: u32 = 1 << 31;

    /// PSEL register values in RXD, TXD, CTS, RTS order.
    pub fn psel(&self) -> [u32; 4] {
        let select = |pin: Option<u32>| match pin {
            Some(pin) => pin & !Self::DISCONNECTED,
            None => Self::DISCONNECTED,
        };
        [select(Some(self.rxd)), select(Some(self.txd)), select(self.cts), select(self.rts)]
    }

    /// PSEL values with every line disconnected, as after reset.
    pub const fn released() -> [u32; 4] {
        [u32::MAX; 4]
    }
}

/// One-shot startup timeout for forced serial DFU.
///
/// The transport calls `packet_received` on every packet; the timer
/// interrupt calls `expire`. If nothing arrived by then a `Timeout` event is
/// queued, otherwise the expiry is a no-op.
pub struct StartupTimeout {
    packet_received: AtomicBool,
}

impl StartupTimeout {
    pub const fn new() -> Self {
        StartupTimeout {
            packet_received: AtomicBool::new(false),
        }
    }

    /// Forget any earlier packet. Called when the timer is armed.
    pub fn rearm(&self) {
        self.packet_received.store(false, Ordering::Release);
    }

    pub fn packet_received(&self) {
        self.packet_received.store(true, Ordering::Release);
    }

    pub fn expire(&self, queue: &EventQueue) -> Result<(), Error> {
        if self.packet_received.load(Ordering::Acquire) {
            return Ok(());
        }
        warn!("no DFU packet before startup timeout");
        queue.post_update(UpdateStatusEvent::Timeout)
    }
}

impl Default for StartupTimeout {
    fn default() -> Self {
        Self::new()
    }
}
