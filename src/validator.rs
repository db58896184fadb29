//! Image integrity checks over flash regions.

use crc::{Crc, CRC_16_IBM_3740};
use embedded_storage::nor_flash::ReadNorFlash;

use crate::error::Error;
use crate::settings::{Bank0, BootloaderSettings};

/// Erased flash reads back as all ones.
pub const EMPTY_FLASH_WORD: u32 = 0xFFFF_FFFF;

// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

const CHUNK: usize = 64;

pub fn crc16<F: ReadNorFlash>(flash: &mut F, address: u32, len: u32) -> Result<u16, Error> {
    let mut digest = CRC16.digest();
    let mut buf = [0u8; CHUNK];
    let mut offset = 0;
    while offset < len {
        let n = (len - offset).min(CHUNK as u32) as usize;
        flash
            .read(address + offset, &mut buf[..n])
            .map_err(Error::flash)?;
        digest.update(&buf[..n]);
        offset += n as u32;
    }
    Ok(digest.finalize())
}

/// Does `bank_address` hold an application the settings vouch for?
///
/// Fails closed: erased flash, any bank state other than `ValidApp`, a CRC
/// mismatch or an unreadable region all count as invalid. A stored CRC of 0
/// means the image was flashed without one and is accepted as is.
pub fn is_app_valid<F: ReadNorFlash>(
    flash: &mut F,
    settings: &BootloaderSettings,
    bank_address: u32,
) -> bool {
    let mut first = [0u8; 4];
    if flash.read(bank_address, &mut first).is_err()
        || u32::from_le_bytes(first) == EMPTY_FLASH_WORD
    {
        return false;
    }

    if settings.bank_0 != Bank0::ValidApp {
        return false;
    }

    if settings.bank_0_crc == 0 {
        return true;
    }

    match crc16(flash, bank_address, settings.bank_0_size) {
        Ok(crc) => crc == settings.bank_0_crc,
        Err(e) => {
            warn!("cannot checksum bank at {:#x}: {}", bank_address, e);
            false
        }
    }
}

/// Byte-for-byte comparison of two flash regions.
pub fn regions_match<F: ReadNorFlash>(
    flash: &mut F,
    a: u32,
    b: u32,
    len: u32,
) -> Result<bool, Error> {
    let mut left = [0u8; CHUNK];
    let mut right = [0u8; CHUNK];
    let mut offset = 0;
    while offset < len {
        let n = (len - offset).min(CHUNK as u32) as usize;
        flash.read(a + offset, &mut left[..n]).map_err(Error::flash)?;
        flash.read(b + offset, &mut right[..n]).map_err(Error::flash)?;
        if left[..n] != right[..n] {
            return Ok(false);
        }
        offset += n as u32;
    }
    Ok(true)
}
