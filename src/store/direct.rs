use embedded_storage::nor_flash::NorFlash;

use super::{erase_covering, read_settings, Handle, OpCode, SettingsStore, StorageEvent};
use crate::error::Error;
use crate::event::{EventQueue, Message};
use crate::settings::{BootloaderSettings, SETTINGS_SIZE};

/// Erase the settings page and write the record in place, synchronously.
pub struct DirectStore {
    handle: Handle,
}

impl DirectStore {
    pub fn new(settings_address: u32) -> Self {
        DirectStore {
            handle: Handle { id: 0, block: settings_address },
        }
    }
}

impl SettingsStore for DirectStore {
    fn load<F: NorFlash>(&mut self, flash: &mut F) -> Result<BootloaderSettings, Error> {
        read_settings(flash, self.handle.block)
    }

    fn save<F: NorFlash>(
        &mut self,
        flash: &mut F,
        queue: &EventQueue,
        settings: &BootloaderSettings,
    ) -> Result<(), Error> {
        erase_covering(flash, self.handle.block, SETTINGS_SIZE as u32)?;
        flash
            .write(self.handle.block, &settings.to_bytes())
            .map_err(Error::flash)?;

        // The write has landed already; report it the same way the
        // transactional module would.
        queue.post(Message::Storage(StorageEvent {
            handle: self.handle,
            op: OpCode::Store,
            result: Ok(()),
            len: SETTINGS_SIZE as u32,
        }))
    }

    fn settings_handle(&self) -> Option<Handle> {
        Some(self.handle)
    }
}
