//! The persisted bootloader settings record.
//!
//! The byte layout is fixed: a bootloader written by a newer update has to be
//! able to read the record an older one left behind.

/// Size of the encoded record. A whole number of flash words.
pub const SETTINGS_SIZE: usize = 28;

const BANK_VALID_APP: u8 = 0x01;
const BANK_VALID_SD: u8 = 0xA5;
const BANK_VALID_BOOT: u8 = 0xAA;
const BANK_INVALID: u8 = 0xFF;

/// What bank 0 holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bank0 {
    #[default]
    Invalid,
    ValidApp,
    /// A SoftDevice (plus optional bootloader and app) is staged and waiting
    /// to be swapped in.
    ValidSoftDevice,
}

/// What the staging bank holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bank1 {
    #[default]
    Invalid,
    ValidBootloader,
}

impl Bank0 {
    fn code(self) -> u8 {
        match self {
            Bank0::Invalid => BANK_INVALID,
            Bank0::ValidApp => BANK_VALID_APP,
            Bank0::ValidSoftDevice => BANK_VALID_SD,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            BANK_VALID_APP => Bank0::ValidApp,
            BANK_VALID_SD => Bank0::ValidSoftDevice,
            _ => Bank0::Invalid,
        }
    }
}

impl Bank1 {
    fn code(self) -> u8 {
        match self {
            Bank1::Invalid => BANK_INVALID,
            Bank1::ValidBootloader => BANK_VALID_BOOT,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            BANK_VALID_BOOT => Bank1::ValidBootloader,
            _ => Bank1::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootloaderSettings {
    pub bank_0: Bank0,
    /// CRC-16 of the bank 0 image. Zero disables the check.
    pub bank_0_crc: u16,
    pub bank_0_size: u32,
    pub bank_1: Bank1,
    pub sd_image_size: u32,
    pub bl_image_size: u32,
    pub app_image_size: u32,
    /// Offset of the staged SoftDevice image inside bank 0.
    pub sd_image_start: u32,
}

impl BootloaderSettings {
    pub fn to_bytes(&self) -> [u8; SETTINGS_SIZE] {
        let mut buf = [0u8; SETTINGS_SIZE];
        buf[0] = self.bank_0.code();
        buf[2..4].copy_from_slice(&self.bank_0_crc.to_le_bytes());
        buf[4] = self.bank_1.code();
        buf[8..12].copy_from_slice(&self.bank_0_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.sd_image_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.bl_image_size.to_le_bytes());
        buf[20..24].copy_from_slice(&self.app_image_size.to_le_bytes());
        buf[24..28].copy_from_slice(&self.sd_image_start.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; SETTINGS_SIZE]) -> Self {
        let word = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        BootloaderSettings {
            bank_0: Bank0::from_code(buf[0]),
            bank_0_crc: u16::from_le_bytes([buf[2], buf[3]]),
            bank_0_size: word(8),
            bank_1: Bank1::from_code(buf[4]),
            sd_image_size: word(12),
            bl_image_size: word(16),
            app_image_size: word(20),
            sd_image_start: word(24),
        }
    }

    /// Bank 0 emptied out: no image, no CRC, no size.
    pub(crate) fn clear_bank_0(&mut self) {
        self.bank_0 = Bank0::Invalid;
        self.bank_0_crc = 0;
        self.bank_0_size = 0;
    }

    pub(crate) fn clear_image_sizes(&mut self) {
        self.sd_image_size = 0;
        self.bl_image_size = 0;
        self.app_image_size = 0;
    }

    /// True while a SoftDevice or bootloader swap still has to happen.
    pub fn swap_pending(&self) -> bool {
        self.bank_0 == Bank0::ValidSoftDevice || self.bank_1 == Bank1::ValidBootloader
    }
}
