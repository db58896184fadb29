use nrf52832_hal::pac::POWER;

use crate::boot::{requested_mode, serial_only, DfuEntry};
use crate::transport::DfuMode;

/// DFU request left in GPREGRET by the application.
pub struct GpregretEntry {
    requested: Option<DfuMode>,
}

impl GpregretEntry {
    /// Reads the request and clears the register, so it only applies to
    /// this boot. The board has no radio transport, so only serial requests
    /// are honoured.
    pub fn take(power: &POWER) -> Self {
        let magic = power.gpregret.read().gpregret().bits();
        power.gpregret.write(|w| unsafe { w.gpregret().bits(0) });
        GpregretEntry {
            requested: serial_only(requested_mode(magic)),
        }
    }

    pub fn requested(&self) -> Option<DfuMode> {
        self.requested
    }
}

impl DfuEntry for GpregretEntry {
    fn stay_in_bootloader(&mut self) -> Option<DfuMode> {
        self.requested
    }
}
