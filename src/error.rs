use core::fmt;

use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// Everything that can stop an update from making progress.
///
/// All of these are fatal to the caller except where noted: a bootloader that
/// cannot trust its own flash has nothing safe left to do but halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Erase, write or read of the flash failed.
    Flash(NorFlashErrorKind),
    /// The active DFU transport failed to start or close.
    Transport,
    /// The deferred-work queue had no room left.
    QueueFull,
    /// The storage module cannot accept another operation yet.
    StorageBusy,
    /// A storage operation named a handle that was never registered.
    InvalidHandle,
    /// The SoftDevice region does not match its staged image after a swap.
    SoftDeviceInvalid,
    /// The bootloader region does not match its staged image after a swap.
    BootloaderInvalid,
    /// An address or size falls outside the configured flash layout.
    Layout,
    /// A SoftDevice/MBR call returned a non-zero error code.
    SoftDevice(u32),
}

impl Error {
    pub fn flash<E: NorFlashError>(e: E) -> Self {
        Error::Flash(e.kind())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Flash(kind) => write!(f, "flash operation failed: {:?}", kind),
            Error::Transport => f.write_str("DFU transport error"),
            Error::QueueFull => f.write_str("event queue full"),
            Error::StorageBusy => f.write_str("storage queue full"),
            Error::InvalidHandle => f.write_str("unregistered storage handle"),
            Error::SoftDeviceInvalid => f.write_str("SoftDevice image failed validation"),
            Error::BootloaderInvalid => f.write_str("bootloader image failed validation"),
            Error::Layout => f.write_str("address outside flash layout"),
            Error::SoftDevice(code) => write!(f, "SoftDevice call failed: {:#x}", code),
        }
    }
}
