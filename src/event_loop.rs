//! The cooperative wait loop that pumps a DFU session to completion.

use embedded_storage::nor_flash::NorFlash;
use fugit::MillisDurationU32;

use crate::error::Error;
use crate::event::{RunState, UpdateStatusEvent};
use crate::processor::Bootloader;
use crate::store::SettingsStore;
use crate::transport::{DfuMode, Transport};

/// Reload registers of the nRF52 watchdog.
pub const WATCHDOG_CHANNELS: u8 = 8;

/// What the loop needs from the chip.
pub trait Platform {
    /// Sleep until any interrupt fires.
    fn wait_for_event(&mut self);

    fn watchdog_running(&self) -> bool;

    fn watchdog_reload(&mut self, channel: u8);

    /// One-shot timer whose expiry ends up as a `Timeout` event.
    fn arm_startup_timer(&mut self, timeout: MillisDurationU32);

    /// Poll the USB stack when USB DFU is active.
    fn usb_task(&mut self) {}
}

impl<'q, F, S, T> Bootloader<'q, F, S, T>
where
    F: NorFlash,
    S: SettingsStore,
    T: Transport,
{
    /// Run until the session reaches a terminal state and return that state.
    ///
    /// The core only sleeps when neither the storage module nor the event
    /// queue holds work. A completion posted before the loop started, such as
    /// a direct save right after a swap, would otherwise wait for an
    /// interrupt that may never come.
    pub fn wait_for_events<P: Platform>(&mut self, platform: &mut P) -> Result<RunState, Error> {
        loop {
            if !self.store.has_pending() && self.queue.is_empty() {
                platform.wait_for_event();
            }

            // Once started the watchdog cannot be stopped.
            if platform.watchdog_running() {
                for channel in 0..WATCHDOG_CHANNELS {
                    platform.watchdog_reload(channel);
                }
            }

            self.store.service(&mut self.flash, self.queue)?;
            while let Some(message) = self.queue.next() {
                self.handle(message)?;
            }

            platform.usb_task();

            if self.state.is_terminal() {
                return Ok(self.state);
            }
        }
    }

    /// Start a DFU session and block until it finishes.
    ///
    /// `timeout` only applies to serial sessions: if no packet arrives in time
    /// the session ends in `RunState::Timeout`.
    pub fn start_session<P: Platform>(
        &mut self,
        platform: &mut P,
        mode: DfuMode,
        timeout: Option<MillisDurationU32>,
    ) -> Result<RunState, Error> {
        info!("starting {:?} DFU", mode);
        self.state = RunState::Updating;

        if let (DfuMode::Serial, Some(timeout)) = (mode, timeout) {
            platform.arm_startup_timer(timeout);
        }
        self.transport.update_start()?;

        self.wait_for_events(platform)
    }

    /// Record that the staged SoftDevice has been moved and wait for the
    /// record to land.
    pub fn finalize_sd_update<P: Platform>(&mut self, platform: &mut P) -> Result<RunState, Error> {
        self.process(UpdateStatusEvent::SoftDeviceSwapped)?;
        self.wait_for_events(platform)
    }
}
