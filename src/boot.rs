//! Cold boot: finish an interrupted swap, serve DFU if asked to, and decide
//! what runs next.

use embedded_hal::delay::DelayNs;
use embedded_storage::nor_flash::NorFlash;

use crate::error::Error;
use crate::event::RunState;
use crate::event_loop::Platform;
use crate::processor::Bootloader;
use crate::store::SettingsStore;
use crate::swap::ImageMover;
use crate::transport::{DfuMode, Transport};

/// Decides whether this boot stays in the bootloader for DFU.
pub trait DfuEntry {
    /// `Some(mode)` when DFU was requested, e.g. by the application before
    /// it reset into the bootloader.
    fn stay_in_bootloader(&mut self) -> Option<DfuMode>;
}

/// Value the application leaves in a retained register before resetting into
/// serial DFU.
pub const SERIAL_DFU_MAGIC: u8 = 0x4E;
/// Same, for DFU over the radio link.
pub const OTA_DFU_MAGIC: u8 = 0xA8;

pub fn requested_mode(magic: u8) -> Option<DfuMode> {
    match magic {
        SERIAL_DFU_MAGIC => Some(DfuMode::Serial),
        OTA_DFU_MAGIC => Some(DfuMode::Ota),
        _ => None,
    }
}

/// Entry decision for a board that only carries a serial transport and never
/// enables the SoftDevice: an OTA request is dropped, so the application
/// keeps running if it is valid and serial DFU is served otherwise.
pub fn serial_only(mode: Option<DfuMode>) -> Option<DfuMode> {
    match mode {
        Some(DfuMode::Ota) => {
            warn!("OTA DFU requested but not available, ignoring");
            None
        }
        other => other,
    }
}

/// What the board does once the boot sequence is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootAction {
    StartApplication(u32),
    Reset,
}

/// Everything `run` drives besides the bootloader context.
pub struct BootPeripherals<'a, P, M, D, E> {
    pub platform: &'a mut P,
    pub mover: &'a mut M,
    pub delay: &'a mut D,
    pub entry: &'a mut E,
}

pub fn run<F, S, T, P, M, D, E>(
    bootloader: &mut Bootloader<'_, F, S, T>,
    peripherals: BootPeripherals<'_, P, M, D, E>,
) -> Result<BootAction, Error>
where
    F: NorFlash,
    S: SettingsStore,
    T: Transport,
    P: Platform,
    M: ImageMover<F>,
    D: DelayNs,
    E: DfuEntry,
{
    let BootPeripherals { platform, mover, delay, entry } = peripherals;
    let app = bootloader.config().layout.app_start;

    if bootloader.sd_update_in_progress() {
        info!("resuming SoftDevice/bootloader update");
        bootloader.advance_pending_swap(mover, delay)?;
        bootloader.finalize_sd_update(platform)?;
    }

    let requested = entry.stay_in_bootloader();
    let app_valid = bootloader.is_app_valid(app);

    if requested.is_some() || !app_valid {
        let mode = requested.unwrap_or(DfuMode::Serial);
        // With a good application to fall back on, a silent serial session
        // gives up after the startup timeout.
        let timeout = app_valid.then_some(bootloader.config().dfu_startup_timeout);

        if bootloader.start_session(platform, mode, timeout)? == RunState::Reset {
            return Ok(BootAction::Reset);
        }
    }

    if !bootloader.sd_update_in_progress() && bootloader.is_app_valid(app) {
        Ok(BootAction::StartApplication(app))
    } else {
        Ok(BootAction::Reset)
    }
}
