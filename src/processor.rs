//! Update status processor: the state machine deciding what the settings
//! record becomes after each update event.

use embedded_storage::nor_flash::NorFlash;

use crate::config::Config;
use crate::error::Error;
use crate::event::{EventQueue, Message, RawUpdateStatus, RunState, UpdateStatusEvent};
use crate::settings::{Bank0, Bank1, BootloaderSettings};
use crate::store::{OpCode, SettingsStore, StorageEvent};
use crate::transport::Transport;
use crate::validator;

/// Outcome of one event: the full record to persist (if any), the next run
/// state, and whether the transport has to be shut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub settings: Option<BootloaderSettings>,
    pub state: RunState,
    pub close_transport: bool,
}

impl Transition {
    fn persist(settings: BootloaderSettings, state: RunState) -> Self {
        Transition { settings: Some(settings), state, close_transport: false }
    }

    fn state(state: RunState) -> Self {
        Transition { settings: None, state, close_transport: false }
    }
}

/// The transition table. No side effects: the same inputs always give the
/// same record and state.
///
/// Every mutating arm builds a complete record, so whatever reaches flash is
/// either entirely the old record or entirely the new one.
pub fn transition(
    event: &UpdateStatusEvent,
    current: &BootloaderSettings,
    state: RunState,
) -> Transition {
    match *event {
        UpdateStatusEvent::AppComplete { crc, size } => Transition::persist(
            BootloaderSettings {
                bank_0: Bank0::ValidApp,
                bank_0_crc: crc,
                bank_0_size: size,
                bank_1: Bank1::Invalid,
                ..*current
            },
            RunState::SettingsSaving,
        ),
        UpdateStatusEvent::SoftDeviceComplete { app_crc, sd_size, bl_size, app_size, sd_image_start } => {
            Transition::persist(
                BootloaderSettings {
                    bank_0: Bank0::ValidSoftDevice,
                    bank_0_crc: app_crc,
                    bank_0_size: sd_size.wrapping_add(bl_size).wrapping_add(app_size),
                    bank_1: Bank1::Invalid,
                    sd_image_size: sd_size,
                    bl_image_size: bl_size,
                    app_image_size: app_size,
                    sd_image_start,
                },
                RunState::SettingsSaving,
            )
        }
        UpdateStatusEvent::BootloaderComplete { sd_size, bl_size, app_size } => Transition::persist(
            BootloaderSettings {
                bank_1: Bank1::ValidBootloader,
                sd_image_size: sd_size,
                bl_image_size: bl_size,
                app_image_size: app_size,
                ..*current
            },
            RunState::SettingsSaving,
        ),
        UpdateStatusEvent::SoftDeviceSwapped => {
            let mut next = *current;
            // The SoftDevice has moved out of bank 0; nothing bootable is
            // left there. Without a SoftDevice in the update bank 0 is
            // untouched.
            if current.bank_0 == Bank0::ValidSoftDevice {
                next.clear_bank_0();
            }
            next.bank_1 = Bank1::Invalid;
            next.clear_image_sizes();
            Transition::persist(next, RunState::SettingsSaving)
        }
        UpdateStatusEvent::BankZeroErased => {
            // Issued mid-sequence, so the run state stays where it is.
            let mut next = *current;
            next.clear_bank_0();
            Transition::persist(next, state)
        }
        UpdateStatusEvent::Timeout => Transition {
            settings: None,
            state: RunState::Timeout,
            close_transport: true,
        },
        UpdateStatusEvent::ResetRequested => Transition::state(RunState::Reset),
    }
}

/// Context owning everything the update core touches: flash, settings store,
/// the active transport and the run state.
pub struct Bootloader<'q, F, S, T> {
    pub(crate) flash: F,
    pub(crate) store: S,
    pub(crate) transport: T,
    pub(crate) queue: &'q EventQueue,
    pub(crate) config: Config,
    pub(crate) state: RunState,
    /// What flash holds, as of the last completed store.
    pub(crate) committed: BootloaderSettings,
    /// The last record handed to the store. Storage runs in order, so this is
    /// what flash will hold once the queue drains.
    pub(crate) latest: BootloaderSettings,
    pub(crate) saves_in_flight: u8,
}

impl<'q, F, S, T> Bootloader<'q, F, S, T>
where
    F: NorFlash,
    S: SettingsStore,
    T: Transport,
{
    pub fn new(
        mut flash: F,
        mut store: S,
        transport: T,
        queue: &'q EventQueue,
        config: Config,
    ) -> Result<Self, Error> {
        let settings = store.load(&mut flash)?;
        Ok(Bootloader {
            flash,
            store,
            transport,
            queue,
            config,
            state: RunState::Updating,
            committed: settings,
            latest: settings,
            saves_in_flight: 0,
        })
    }

    /// Read-only snapshot of the committed record, for the boot decision.
    pub fn settings(&self) -> BootloaderSettings {
        self.committed
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn is_app_valid(&mut self, bank_address: u32) -> bool {
        validator::is_app_valid(&mut self.flash, &self.committed, bank_address)
    }

    pub fn process(&mut self, event: UpdateStatusEvent) -> Result<(), Error> {
        let next = transition(&event, &self.latest, self.state);
        info!("{:?}: {:?} -> {:?}", event, self.state, next.state);

        if next.close_transport {
            self.transport.close()?;
        }
        self.state = next.state;

        if let Some(settings) = next.settings {
            self.store.save(&mut self.flash, self.queue, &settings)?;
            self.latest = settings;
            self.saves_in_flight = self.saves_in_flight.saturating_add(1);
            info!("settings save submitted ({} in flight)", self.saves_in_flight);
        }
        Ok(())
    }

    /// Status codes outside the known set are dropped.
    pub fn process_raw(&mut self, raw: RawUpdateStatus) -> Result<(), Error> {
        match UpdateStatusEvent::try_from(raw) {
            Ok(event) => self.process(event),
            Err(code) => {
                warn!("ignoring update status code {}", code);
                Ok(())
            }
        }
    }

    pub fn handle(&mut self, message: Message) -> Result<(), Error> {
        match message {
            Message::Update(event) => self.process(event),
            Message::Raw(raw) => self.process_raw(raw),
            Message::Storage(event) => self.on_storage_event(event),
        }
    }

    fn on_storage_event(&mut self, event: StorageEvent) -> Result<(), Error> {
        if self.store.settings_handle() != Some(event.handle) {
            info!("storage {:?} at {:#x} is not the settings page", event.op, event.handle.block());
            return Ok(());
        }
        if let Err(e) = event.result {
            error!("settings storage failed: {}", e);
            return Err(e);
        }
        if event.op != OpCode::Store {
            return Ok(());
        }

        self.saves_in_flight = self.saves_in_flight.saturating_sub(1);
        self.committed = self.store.load(&mut self.flash)?;
        info!("settings committed: {:?}", self.committed);

        if self.state == RunState::SettingsSaving && self.saves_in_flight == 0 {
            self.state = RunState::Complete;
        }
        Ok(())
    }
}
