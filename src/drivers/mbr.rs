use cortex_m::peripheral::NVIC;
use nrf_softdevice_mbr as mbr;

use crate::error::Error;
use crate::launch::Cpu;
use crate::swap::ImageMover;

fn command(mut cmd: mbr::sd_mbr_command_t) -> Result<(), Error> {
    match unsafe { mbr::sd_mbr_command(&mut cmd) } {
        0 => Ok(()),
        code => Err(Error::SoftDevice(code)),
    }
}

fn words(len: u32) -> u32 {
    len.div_ceil(4)
}

/// Image moves done by the MBR, which can write regions the bootloader
/// itself is not allowed to touch.
pub struct MbrMover;

impl<F> ImageMover<F> for MbrMover {
    fn move_softdevice(&mut self, _flash: &mut F, from: u32, to: u32, len: u32) -> Result<(), Error> {
        command(mbr::sd_mbr_command_t {
            command: mbr::NRF_MBR_COMMANDS_SD_MBR_COMMAND_COPY_SD,
            params: mbr::sd_mbr_command_t__bindgen_ty_1 {
                copy_sd: mbr::sd_mbr_command_copy_sd_t {
                    src: from as *mut u32,
                    dst: to as *mut u32,
                    len: words(len),
                },
            },
        })
    }

    /// The MBR always copies to the bootloader address in UICR, which is
    /// `to`. On success it resets the chip into the new bootloader.
    fn move_bootloader(&mut self, _flash: &mut F, from: u32, _to: u32, len: u32) -> Result<(), Error> {
        command(mbr::sd_mbr_command_t {
            command: mbr::NRF_MBR_COMMANDS_SD_MBR_COMMAND_COPY_BL,
            params: mbr::sd_mbr_command_t__bindgen_ty_1 {
                copy_bl: mbr::sd_mbr_command_copy_bl_t {
                    bl_src: from as *mut u32,
                    bl_len: words(len),
                },
            },
        })
    }
}

pub struct MbrCpu {
    softdevice_start: u32,
}

impl MbrCpu {
    pub fn new(softdevice_start: u32) -> Self {
        MbrCpu { softdevice_start }
    }

    fn softdevice_present(&self) -> bool {
        let first = unsafe { core::ptr::read_volatile(self.softdevice_start as *const u32) };
        first != crate::validator::EMPTY_FLASH_WORD
    }
}

impl Cpu for MbrCpu {
    fn disable_softdevice(&mut self) -> Result<(), Error> {
        // Nothing here enables the SoftDevice: OTA requests are dropped by
        // `GpregretEntry`, so it is still off when the application starts.
        Ok(())
    }

    fn enabled_interrupts(&self) -> [u32; 2] {
        let nvic = unsafe { &*NVIC::PTR };
        [nvic.iser[0].read(), nvic.iser[1].read()]
    }

    fn disable_interrupt(&mut self, irq: u16) {
        let nvic = unsafe { &*NVIC::PTR };
        unsafe { nvic.icer[usize::from(irq / 32)].write(1 << (irq % 32)) };
    }

    fn set_vector_table(&mut self, address: u32) -> Result<(), Error> {
        command(mbr::sd_mbr_command_t {
            command: mbr::NRF_MBR_COMMANDS_SD_MBR_COMMAND_VECTOR_TABLE_BASE_SET,
            params: mbr::sd_mbr_command_t__bindgen_ty_1 {
                base_set: mbr::sd_mbr_command_vector_table_base_set_t { address },
            },
        })?;

        // With a SoftDevice installed the MBR hands interrupts to it, and it
        // forwards them to the application.
        if self.softdevice_present() {
            command(mbr::sd_mbr_command_t {
                command: mbr::NRF_MBR_COMMANDS_SD_MBR_COMMAND_IRQ_FORWARD_ADDRESS_SET,
                params: mbr::sd_mbr_command_t__bindgen_ty_1 {
                    irq_forward_address_set: mbr::sd_mbr_command_irq_forward_address_set_t {
                        address: self.softdevice_start,
                    },
                },
            })?;
        }
        Ok(())
    }

    unsafe fn jump(&mut self, address: u32) -> ! {
        cortex_m::asm::bootload(address as *const u32)
    }
}
