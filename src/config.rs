use fugit::{ExtU32, MillisDurationU32};

/// Where everything lives in internal flash.
///
/// Addresses are flash offsets; on the nRF52 flash is mapped at 0x0 so they
/// double as bus addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLayout {
    /// First byte after the MBR, where the SoftDevice starts.
    pub softdevice_start: u32,
    /// Bank 0: the application (and the staging area for SoftDevice updates).
    pub app_start: u32,
    pub bootloader_start: u32,
    /// Page holding the persisted `BootloaderSettings`.
    pub settings_address: u32,
    /// Page the MBR uses as scratch while copying the bootloader.
    pub mbr_params_address: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub layout: FlashLayout,
    /// Number of interrupt lines the NVIC scan has to cover.
    pub irq_count: u16,
    /// How long a forced serial DFU session waits for its first packet.
    pub dfu_startup_timeout: MillisDurationU32,
    /// Pause before the first destructive flash operation of a swap, so a
    /// debugger can still attach.
    pub swap_grace_period: MillisDurationU32,
}

impl Config {
    /// nRF52832 with S132 6.x.
    pub const NRF52832: Config = Config {
        layout: FlashLayout {
            softdevice_start: 0x0000_1000,
            app_start: 0x0002_6000,
            bootloader_start: 0x0007_4000,
            settings_address: 0x0007_F000,
            mbr_params_address: 0x0007_E000,
        },
        irq_count: 39,
        dfu_startup_timeout: MillisDurationU32::from_ticks(1000),
        swap_grace_period: MillisDurationU32::from_ticks(100),
    };

    /// nRF52840 with S140 6.x.
    pub const NRF52840: Config = Config {
        layout: FlashLayout {
            softdevice_start: 0x0000_1000,
            app_start: 0x0002_6000,
            bootloader_start: 0x000F_4000,
            settings_address: 0x000F_F000,
            mbr_params_address: 0x000F_E000,
        },
        irq_count: 48,
        dfu_startup_timeout: MillisDurationU32::from_ticks(1000),
        swap_grace_period: MillisDurationU32::from_ticks(100),
    };

    pub fn with_startup_timeout(mut self, ms: u32) -> Self {
        self.dfu_startup_timeout = ms.millis();
        self
    }
}
