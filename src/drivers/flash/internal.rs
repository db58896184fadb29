use nrf52832_hal::nvmc::Nvmc;
use nrf52832_hal::pac::NVMC;

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

/// First byte after the MBR.
const FLASH_START: u32 = 0x1000;
const FLASH_SIZE: usize = 512 * 1024 - FLASH_START as usize;

/// The on-chip flash past the MBR, addressed by absolute bus address.
pub struct InternalFlash {
    nvmc: Nvmc<NVMC>,
}

impl InternalFlash {
    pub fn new(nvmc: NVMC) -> InternalFlash {
        // Flash is memory mapped at 0x0 and nothing else writes it while the
        // bootloader runs.
        let storage = unsafe {
            core::slice::from_raw_parts_mut(FLASH_START as *mut u8, FLASH_SIZE)
        };
        InternalFlash {
            nvmc: Nvmc::new(nvmc, storage),
        }
    }

    fn offset(address: u32) -> Result<u32, NorFlashErrorKind> {
        address
            .checked_sub(FLASH_START)
            .ok_or(NorFlashErrorKind::OutOfBounds)
    }
}

impl ErrorType for InternalFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for InternalFlash {
    const READ_SIZE: usize = <Nvmc<NVMC> as ReadNorFlash>::READ_SIZE;

    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.nvmc
            .read(Self::offset(address)?, bytes)
            .map_err(|e| e.kind())
    }

    fn capacity(&self) -> usize {
        FLASH_START as usize + FLASH_SIZE
    }
}

impl NorFlash for InternalFlash {
    const WRITE_SIZE: usize = <Nvmc<NVMC> as NorFlash>::WRITE_SIZE;
    const ERASE_SIZE: usize = <Nvmc<NVMC> as NorFlash>::ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.nvmc
            .erase(Self::offset(from)?, Self::offset(to)?)
            .map_err(|e| e.kind())
    }

    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.nvmc
            .write(Self::offset(address)?, bytes)
            .map_err(|e| e.kind())
    }
}
