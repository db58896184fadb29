//! Settings store: durable home of the one `BootloaderSettings` record.
//!
//! Two strategies share one contract. `save` is fire-and-forget; completion
//! always comes back as a `Message::Storage` through the event queue, whether
//! the write already happened (direct) or is still queued (transactional).

mod direct;
mod transactional;

pub use direct::DirectStore;
pub use transactional::TransactionalStore;

use embedded_storage::nor_flash::NorFlash;

use crate::error::Error;
use crate::event::EventQueue;
use crate::settings::{BootloaderSettings, SETTINGS_SIZE};
use crate::transport::DfuMode;

/// A block registered with the storage module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    pub(crate) id: u8,
    pub(crate) block: u32,
}

impl Handle {
    pub fn block(&self) -> u32 {
        self.block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Store,
    Clear,
}

/// Completion notice for one storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEvent {
    pub handle: Handle,
    pub op: OpCode,
    pub result: Result<(), Error>,
    pub len: u32,
}

pub trait SettingsStore {
    /// The record as it is in flash right now.
    fn load<F: NorFlash>(&mut self, flash: &mut F) -> Result<BootloaderSettings, Error>;

    /// Replace the record. Completion is reported through `queue`.
    fn save<F: NorFlash>(
        &mut self,
        flash: &mut F,
        queue: &EventQueue,
        settings: &BootloaderSettings,
    ) -> Result<(), Error>;

    /// Run queued flash work, if the strategy has any.
    fn service<F: NorFlash>(&mut self, _flash: &mut F, _queue: &EventQueue) -> Result<(), Error> {
        Ok(())
    }

    fn has_pending(&self) -> bool {
        false
    }

    /// The block the record lives in; completions for other blocks are not
    /// about the record.
    fn settings_handle(&self) -> Option<Handle>;
}

/// Storage picked per session: radio-link updates go through the
/// transactional module, serial updates write the page directly.
pub enum Persistence {
    Direct(DirectStore),
    Transactional(TransactionalStore),
}

impl Persistence {
    pub fn for_mode(mode: DfuMode, settings_address: u32) -> Result<Self, Error> {
        Ok(match mode {
            DfuMode::Serial => Persistence::Direct(DirectStore::new(settings_address)),
            DfuMode::Ota => {
                Persistence::Transactional(TransactionalStore::for_settings(settings_address)?)
            }
        })
    }
}

impl SettingsStore for Persistence {
    fn load<F: NorFlash>(&mut self, flash: &mut F) -> Result<BootloaderSettings, Error> {
        match self {
            Persistence::Direct(store) => store.load(flash),
            Persistence::Transactional(store) => store.load(flash),
        }
    }

    fn save<F: NorFlash>(
        &mut self,
        flash: &mut F,
        queue: &EventQueue,
        settings: &BootloaderSettings,
    ) -> Result<(), Error> {
        match self {
            Persistence::Direct(store) => store.save(flash, queue, settings),
            Persistence::Transactional(store) => store.save(flash, queue, settings),
        }
    }

    fn service<F: NorFlash>(&mut self, flash: &mut F, queue: &EventQueue) -> Result<(), Error> {
        match self {
            Persistence::Direct(store) => store.service(flash, queue),
            Persistence::Transactional(store) => store.service(flash, queue),
        }
    }

    fn has_pending(&self) -> bool {
        match self {
            Persistence::Direct(store) => store.has_pending(),
            Persistence::Transactional(store) => store.has_pending(),
        }
    }

    fn settings_handle(&self) -> Option<Handle> {
        match self {
            Persistence::Direct(store) => store.settings_handle(),
            Persistence::Transactional(store) => store.settings_handle(),
        }
    }
}

pub(crate) fn read_settings<F: NorFlash>(
    flash: &mut F,
    address: u32,
) -> Result<BootloaderSettings, Error> {
    let mut buf = [0u8; SETTINGS_SIZE];
    flash.read(address, &mut buf).map_err(Error::flash)?;
    Ok(BootloaderSettings::from_bytes(&buf))
}

/// Erase every page touched by `[from, from + len)`.
pub(crate) fn erase_covering<F: NorFlash>(flash: &mut F, from: u32, len: u32) -> Result<(), Error> {
    let page = F::ERASE_SIZE as u32;
    let start = from - from % page;
    let end = from.checked_add(len).ok_or(Error::Layout)?;
    let end = end.div_ceil(page) * page;
    flash.erase(start, end).map_err(Error::flash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Message;
    use crate::settings::Bank0;
    use crate::test_support::RamFlash;

    const SETTINGS_ADDRESS: u32 = 0x3000;

    fn sample() -> BootloaderSettings {
        BootloaderSettings {
            bank_0: Bank0::ValidApp,
            bank_0_crc: 0xBEEF,
            bank_0_size: 4096,
            ..Default::default()
        }
    }

    fn drain<S: SettingsStore>(store: &mut S, flash: &mut RamFlash, queue: &EventQueue) {
        while store.has_pending() {
            store.service(flash, queue).unwrap();
        }
    }

    #[test]
    fn load_after_save_returns_the_same_record_in_both_modes() {
        for mode in [DfuMode::Serial, DfuMode::Ota] {
            let mut flash = RamFlash::new();
            let queue = EventQueue::new();
            let mut store = Persistence::for_mode(mode, SETTINGS_ADDRESS).unwrap();

            store.save(&mut flash, &queue, &sample()).unwrap();
            drain(&mut store, &mut flash, &queue);

            assert_eq!(store.load(&mut flash).unwrap(), sample());
        }
    }

    #[test]
    fn both_modes_report_store_completion_on_the_queue() {
        for mode in [DfuMode::Serial, DfuMode::Ota] {
            let mut flash = RamFlash::new();
            let queue = EventQueue::new();
            let mut store = Persistence::for_mode(mode, SETTINGS_ADDRESS).unwrap();

            store.save(&mut flash, &queue, &sample()).unwrap();
            drain(&mut store, &mut flash, &queue);

            let mut saw_store = false;
            while let Some(message) = queue.next() {
                if let Message::Storage(event) = message {
                    assert_eq!(event.handle.block(), SETTINGS_ADDRESS);
                    assert_eq!(event.result, Ok(()));
                    saw_store |= event.op == OpCode::Store;
                }
            }
            assert!(saw_store);
        }
    }

    #[test]
    fn erase_rounds_out_to_whole_pages() {
        let mut flash = RamFlash::filled(0x00);
        erase_covering(&mut flash, 0x1010, 0x20).unwrap();
        let page = RamFlash::PAGE as usize;
        assert!(flash.bytes()[0x1000..0x1000 + page].iter().all(|&b| b == 0xFF));
        assert_eq!(flash.bytes()[0x0FFF], 0x00);
        assert_eq!(flash.bytes()[0x1000 + page], 0x00);
    }
}
