use embedded_storage::nor_flash::NorFlash;
use heapless::{Deque, Vec};

use super::{erase_covering, read_settings, Handle, OpCode, SettingsStore, StorageEvent};
use crate::error::Error;
use crate::event::{EventQueue, Message};
use crate::settings::{BootloaderSettings, SETTINGS_SIZE};

const MAX_BLOCKS: usize = 2;
const MAX_PENDING: usize = 4;
const MAX_STORE_LEN: usize = 32;

#[derive(Debug, Clone, Copy)]
struct Block {
    start: u32,
    size: u32,
}

enum PendingOp {
    Clear {
        handle: Handle,
        len: u32,
    },
    Store {
        handle: Handle,
        offset: u32,
        data: Vec<u8, MAX_STORE_LEN>,
    },
}

/// Queued storage module.
///
/// Clears and stores are accepted immediately and executed strictly in
/// submission order, one per `service` call. Each one posts a
/// `StorageEvent` once it has hit flash.
pub struct TransactionalStore {
    blocks: Vec<Block, MAX_BLOCKS>,
    pending: Deque<PendingOp, MAX_PENDING>,
    settings: Option<Handle>,
}

impl TransactionalStore {
    pub fn new() -> Self {
        TransactionalStore {
            blocks: Vec::new(),
            pending: Deque::new(),
            settings: None,
        }
    }

    /// A store with the settings page already registered.
    pub fn for_settings(settings_address: u32) -> Result<Self, Error> {
        let mut store = Self::new();
        let handle = store.register(settings_address, SETTINGS_SIZE as u32)?;
        store.settings = Some(handle);
        Ok(store)
    }

    pub fn register(&mut self, block: u32, size: u32) -> Result<Handle, Error> {
        let id = self.blocks.len() as u8;
        self.blocks
            .push(Block { start: block, size })
            .map_err(|_| Error::StorageBusy)?;
        Ok(Handle { id, block })
    }

    pub fn clear(&mut self, handle: Handle, len: u32) -> Result<(), Error> {
        self.check(handle, 0, len)?;
        self.enqueue(PendingOp::Clear { handle, len })
    }

    pub fn store(&mut self, handle: Handle, data: &[u8], offset: u32) -> Result<(), Error> {
        self.check(handle, offset, data.len() as u32)?;
        let data = Vec::from_slice(data).map_err(|_| Error::Layout)?;
        self.enqueue(PendingOp::Store { handle, offset, data })
    }

    fn check(&self, handle: Handle, offset: u32, len: u32) -> Result<(), Error> {
        let block = self
            .blocks
            .get(handle.id as usize)
            .filter(|block| block.start == handle.block)
            .ok_or(Error::InvalidHandle)?;
        match offset.checked_add(len) {
            Some(end) if end <= block.size => Ok(()),
            _ => Err(Error::Layout),
        }
    }

    fn enqueue(&mut self, op: PendingOp) -> Result<(), Error> {
        self.pending.push_back(op).map_err(|_| Error::StorageBusy)
    }

    fn execute<F: NorFlash>(flash: &mut F, op: &PendingOp) -> StorageEvent {
        match op {
            PendingOp::Clear { handle, len } => StorageEvent {
                handle: *handle,
                op: OpCode::Clear,
                result: erase_covering(flash, handle.block, *len),
                len: *len,
            },
            PendingOp::Store { handle, offset, data } => StorageEvent {
                handle: *handle,
                op: OpCode::Store,
                result: flash.write(handle.block + offset, data).map_err(Error::flash),
                len: data.len() as u32,
            },
        }
    }
}

impl Default for TransactionalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for TransactionalStore {
    fn load<F: NorFlash>(&mut self, flash: &mut F) -> Result<BootloaderSettings, Error> {
        let handle = self.settings.ok_or(Error::InvalidHandle)?;
        read_settings(flash, handle.block)
    }

    fn save<F: NorFlash>(
        &mut self,
        _flash: &mut F,
        _queue: &EventQueue,
        settings: &BootloaderSettings,
    ) -> Result<(), Error> {
        let handle = self.settings.ok_or(Error::InvalidHandle)?;
        self.clear(handle, SETTINGS_SIZE as u32)?;
        self.store(handle, &settings.to_bytes(), 0)
    }

    fn service<F: NorFlash>(&mut self, flash: &mut F, queue: &EventQueue) -> Result<(), Error> {
        match self.pending.pop_front() {
            Some(op) => {
                let event = Self::execute(flash, &op);
                if let Err(e) = event.result {
                    error!("storage {:?} at {:#x} failed: {}", event.op, event.handle.block, e);
                }
                queue.post(Message::Storage(event))
            }
            None => Ok(()),
        }
    }

    fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn settings_handle(&self) -> Option<Handle> {
        self.settings
    }
}
