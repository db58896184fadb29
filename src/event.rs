//! Events flowing into the update status processor, and the deferred-work
//! queue that carries them out of interrupt context.

use core::sync::atomic::{AtomicUsize, Ordering};

use heapless::mpmc::Q8;

use crate::error::Error;
use crate::store::StorageEvent;

/// Progress reported by a transport or flash collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatusEvent {
    AppComplete {
        crc: u16,
        size: u32,
    },
    SoftDeviceComplete {
        app_crc: u16,
        sd_size: u32,
        bl_size: u32,
        app_size: u32,
        sd_image_start: u32,
    },
    BootloaderComplete {
        sd_size: u32,
        bl_size: u32,
        app_size: u32,
    },
    SoftDeviceSwapped,
    BankZeroErased,
    Timeout,
    ResetRequested,
}

/// Status as the DFU transports report it: a status code plus every field any
/// of the codes might need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawUpdateStatus {
    pub status_code: u8,
    pub app_crc: u16,
    pub sd_size: u32,
    pub bl_size: u32,
    pub app_size: u32,
    pub sd_image_start: u32,
}

impl RawUpdateStatus {
    pub const APP_COMPLETE: u8 = 0;
    pub const SD_COMPLETE: u8 = 1;
    pub const SD_SWAPPED: u8 = 2;
    pub const BOOT_COMPLETE: u8 = 3;
    pub const BANK_0_ERASED: u8 = 4;
    pub const TIMEOUT: u8 = 5;
    pub const RESET: u8 = 6;
}

impl TryFrom<RawUpdateStatus> for UpdateStatusEvent {
    /// The status code nobody knows how to handle.
    type Error = u8;

    fn try_from(raw: RawUpdateStatus) -> Result<Self, u8> {
        Ok(match raw.status_code {
            RawUpdateStatus::APP_COMPLETE => UpdateStatusEvent::AppComplete {
                crc: raw.app_crc,
                size: raw.app_size,
            },
            RawUpdateStatus::SD_COMPLETE => UpdateStatusEvent::SoftDeviceComplete {
                app_crc: raw.app_crc,
                sd_size: raw.sd_size,
                bl_size: raw.bl_size,
                app_size: raw.app_size,
                sd_image_start: raw.sd_image_start,
            },
            RawUpdateStatus::SD_SWAPPED => UpdateStatusEvent::SoftDeviceSwapped,
            RawUpdateStatus::BOOT_COMPLETE => UpdateStatusEvent::BootloaderComplete {
                sd_size: raw.sd_size,
                bl_size: raw.bl_size,
                app_size: raw.app_size,
            },
            RawUpdateStatus::BANK_0_ERASED => UpdateStatusEvent::BankZeroErased,
            RawUpdateStatus::TIMEOUT => UpdateStatusEvent::Timeout,
            RawUpdateStatus::RESET => UpdateStatusEvent::ResetRequested,
            code => return Err(code),
        })
    }
}

/// Where the update session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Updating,
    SettingsSaving,
    Complete,
    Timeout,
    Reset,
}

impl RunState {
    /// The event-wait loop hands control back once one of these is reached.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Complete | RunState::Timeout | RunState::Reset)
    }
}

/// One unit of deferred work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Update(UpdateStatusEvent),
    Raw(RawUpdateStatus),
    Storage(StorageEvent),
}

/// Work posted from interrupt handlers (and from the storage module) and
/// drained by the event-wait loop in thread mode.
///
/// Lock-free, so it can sit in a `static` and be posted to from any priority.
pub struct EventQueue {
    inner: Q8<Message>,
    /// Never below the number of messages actually queued.
    queued: AtomicUsize,
}

impl EventQueue {
    pub const fn new() -> Self {
        EventQueue {
            inner: Q8::new(),
            queued: AtomicUsize::new(0),
        }
    }

    pub fn post(&self, message: Message) -> Result<(), Error> {
        self.queued.fetch_add(1, Ordering::AcqRel);
        self.inner.enqueue(message).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            Error::QueueFull
        })
    }

    pub fn post_update(&self, event: UpdateStatusEvent) -> Result<(), Error> {
        self.post(Message::Update(event))
    }

    pub fn next(&self) -> Option<Message> {
        let message = self.inner.dequeue();
        if message.is_some() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
        }
        message
    }

    /// No deferred work is waiting to be drained.
    pub fn is_empty(&self) -> bool {
        self.queued.load(Ordering::Acquire) == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
