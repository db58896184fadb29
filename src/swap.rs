//! Moving a staged SoftDevice and bootloader into their live regions.

use embedded_hal::delay::DelayNs;
use embedded_storage::nor_flash::NorFlash;

use crate::config::FlashLayout;
use crate::error::Error;
use crate::processor::Bootloader;
use crate::settings::BootloaderSettings;
use crate::store::SettingsStore;
use crate::transport::Transport;
use crate::validator;

/// Copies an image between flash regions. On hardware this is the MBR; on
/// the host (and for chips without one) it is `FlashMover`.
///
/// Both moves have to be safe to repeat from the start after a reset.
pub trait ImageMover<F> {
    fn move_softdevice(&mut self, flash: &mut F, from: u32, to: u32, len: u32) -> Result<(), Error>;
    fn move_bootloader(&mut self, flash: &mut F, from: u32, to: u32, len: u32) -> Result<(), Error>;
}

/// Where the staged images sit in bank 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedImages {
    pub softdevice: u32,
    pub bootloader: u32,
}

impl StagedImages {
    pub fn locate(settings: &BootloaderSettings, layout: &FlashLayout) -> Self {
        let bootloader = if settings.sd_image_size == 0 {
            layout.app_start
        } else {
            settings.sd_image_start.wrapping_add(settings.sd_image_size)
        };
        StagedImages { softdevice: settings.sd_image_start, bootloader }
    }
}

/// The live SoftDevice matches the staged one. Nothing staged counts as a
/// match.
pub fn softdevice_in_place<F: NorFlash>(
    flash: &mut F,
    settings: &BootloaderSettings,
    layout: &FlashLayout,
) -> Result<bool, Error> {
    if settings.sd_image_size == 0 {
        return Ok(true);
    }
    let staged = StagedImages::locate(settings, layout);
    validator::regions_match(flash, layout.softdevice_start, staged.softdevice, settings.sd_image_size)
}

pub fn bootloader_in_place<F: NorFlash>(
    flash: &mut F,
    settings: &BootloaderSettings,
    layout: &FlashLayout,
) -> Result<bool, Error> {
    if settings.bl_image_size == 0 {
        return Ok(true);
    }
    let staged = StagedImages::locate(settings, layout);
    validator::regions_match(flash, layout.bootloader_start, staged.bootloader, settings.bl_image_size)
}

/// Plain page-by-page copy through the flash driver.
#[derive(Debug, Default)]
pub struct FlashMover;

impl FlashMover {
    const CHUNK: usize = 64;

    /// Copies `len` bytes, one destination page at a time in ascending
    /// order. Overlapping regions are only allowed when the source starts at
    /// least a page above the destination, so every source byte is read
    /// before its page gets erased.
    pub fn copy<F: NorFlash>(flash: &mut F, from: u32, to: u32, len: u32) -> Result<(), Error> {
        let page = F::ERASE_SIZE as u32;
        let disjoint = from.saturating_add(len) <= to || from >= to.saturating_add(page);
        if to % page != 0 || !disjoint || Self::CHUNK % F::WRITE_SIZE != 0 {
            return Err(Error::Layout);
        }

        let mut buf = [0u8; Self::CHUNK];
        let mut offset = 0;
        while offset < len {
            flash.erase(to + offset, to + offset + page).map_err(Error::flash)?;
            let page_end = (offset + page).min(len);
            while offset < page_end {
                let n = (page_end - offset).min(Self::CHUNK as u32) as usize;
                // Pad the tail out to a whole write unit with erased bytes.
                let padded = n.div_ceil(F::WRITE_SIZE) * F::WRITE_SIZE;
                buf[n..padded].fill(0xFF);
                flash.read(from + offset, &mut buf[..n]).map_err(Error::flash)?;
                flash.write(to + offset, &buf[..padded]).map_err(Error::flash)?;
                offset += n as u32;
            }
        }
        Ok(())
    }
}

impl<F: NorFlash> ImageMover<F> for FlashMover {
    fn move_softdevice(&mut self, flash: &mut F, from: u32, to: u32, len: u32) -> Result<(), Error> {
        Self::copy(flash, from, to, len)
    }

    fn move_bootloader(&mut self, flash: &mut F, from: u32, to: u32, len: u32) -> Result<(), Error> {
        Self::copy(flash, from, to, len)
    }
}

impl<'q, F, S, T> Bootloader<'q, F, S, T>
where
    F: NorFlash,
    S: SettingsStore,
    T: Transport,
{
    /// A SoftDevice or bootloader update was received but not yet finalized.
    pub fn sd_update_in_progress(&self) -> bool {
        self.committed.swap_pending()
    }

    /// Bring the live SoftDevice and bootloader in line with the staged
    /// images. Any validation failure after a move is fatal.
    pub fn advance_pending_swap<M, D>(&mut self, mover: &mut M, delay: &mut D) -> Result<(), Error>
    where
        M: ImageMover<F>,
        D: DelayNs,
    {
        let settings = self.committed;
        let layout = self.config.layout;

        if softdevice_in_place(&mut self.flash, &settings, &layout)?
            && bootloader_in_place(&mut self.flash, &settings, &layout)?
        {
            info!("staged images already in place");
            return Ok(());
        }

        // Leave a window for a debugger to attach before flash is touched.
        delay.delay_ms(self.config.swap_grace_period.to_millis());

        let staged = StagedImages::locate(&settings, &layout);

        if settings.sd_image_size != 0 {
            info!(
                "moving SoftDevice {:#x}+{:#x} -> {:#x}",
                staged.softdevice, settings.sd_image_size, layout.softdevice_start
            );
            mover.move_softdevice(
                &mut self.flash,
                staged.softdevice,
                layout.softdevice_start,
                settings.sd_image_size,
            )?;
        }
        if !softdevice_in_place(&mut self.flash, &settings, &layout)? {
            error!("SoftDevice does not match the staged image");
            return Err(Error::SoftDeviceInvalid);
        }

        if settings.bl_image_size != 0 {
            info!(
                "moving bootloader {:#x}+{:#x} -> {:#x}",
                staged.bootloader, settings.bl_image_size, layout.bootloader_start
            );
            mover.move_bootloader(
                &mut self.flash,
                staged.bootloader,
                layout.bootloader_start,
                settings.bl_image_size,
            )?;
        }
        if !bootloader_in_place(&mut self.flash, &settings, &layout)? {
            error!("bootloader does not match the staged image");
            return Err(Error::BootloaderInvalid);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;
    use crate::settings::{Bank0, Bank1};
    use crate::store::DirectStore;
    use crate::test_support::{config, MockTransport, NoDelay, RamFlash, LAYOUT};

    use std::vec::Vec;

    const SD_SIZE: u32 = 0x1800;
    const BL_SIZE: u32 = 0x900;

    fn pattern(len: u32, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn staged_settings() -> BootloaderSettings {
        BootloaderSettings {
            bank_0: Bank0::ValidSoftDevice,
            bank_0_crc: 0,
            bank_0_size: SD_SIZE + BL_SIZE,
            bank_1: Bank1::Invalid,
            sd_image_size: SD_SIZE,
            bl_image_size: BL_SIZE,
            app_image_size: 0,
            sd_image_start: LAYOUT.app_start,
        }
    }

    fn staged_flash(settings: &BootloaderSettings) -> RamFlash {
        let mut flash = RamFlash::new();
        flash.load(LAYOUT.settings_address, &settings.to_bytes());
        let staged = StagedImages::locate(settings, &LAYOUT);
        flash.load(staged.softdevice, &pattern(settings.sd_image_size, 1));
        flash.load(staged.bootloader, &pattern(settings.bl_image_size, 2));
        flash
    }

    fn bootloader(flash: RamFlash, queue: &EventQueue) -> Bootloader<'_, RamFlash, DirectStore, MockTransport> {
        Bootloader::new(
            flash,
            DirectStore::new(LAYOUT.settings_address),
            MockTransport::default(),
            queue,
            config(),
        )
        .unwrap()
    }

    /// Records the moves it is asked for, optionally doing them.
    #[derive(Default)]
    struct CountingMover {
        moves: Vec<(u32, u32, u32)>,
        skip_bootloader: bool,
    }

    impl ImageMover<RamFlash> for CountingMover {
        fn move_softdevice(&mut self, flash: &mut RamFlash, from: u32, to: u32, len: u32) -> Result<(), Error> {
            self.moves.push((from, to, len));
            FlashMover::copy(flash, from, to, len)
        }

        fn move_bootloader(&mut self, flash: &mut RamFlash, from: u32, to: u32, len: u32) -> Result<(), Error> {
            self.moves.push((from, to, len));
            if self.skip_bootloader {
                return Ok(());
            }
            FlashMover::copy(flash, from, to, len)
        }
    }

    #[test]
    fn bootloader_follows_the_softdevice_or_sits_at_bank_0() {
        let settings = staged_settings();
        assert_eq!(
            StagedImages::locate(&settings, &LAYOUT),
            StagedImages { softdevice: LAYOUT.app_start, bootloader: LAYOUT.app_start + SD_SIZE }
        );

        let bl_only = BootloaderSettings { sd_image_size: 0, sd_image_start: 0, ..settings };
        assert_eq!(StagedImages::locate(&bl_only, &LAYOUT).bootloader, LAYOUT.app_start);
    }

    #[test]
    fn swap_moves_both_images_after_the_grace_period() {
        let settings = staged_settings();
        let queue = EventQueue::new();
        let mut bl = bootloader(staged_flash(&settings), &queue);
        let mut mover = CountingMover::default();
        let mut delay = NoDelay::default();

        assert!(bl.sd_update_in_progress());
        bl.advance_pending_swap(&mut mover, &mut delay).unwrap();

        assert_eq!(delay.total_ns, 100_000_000);
        assert_eq!(
            mover.moves,
            [
                (LAYOUT.app_start, LAYOUT.softdevice_start, SD_SIZE),
                (LAYOUT.app_start + SD_SIZE, LAYOUT.bootloader_start, BL_SIZE),
            ]
        );
        let flash = bl.flash();
        assert!(softdevice_in_place(flash, &settings, &LAYOUT).unwrap());
        assert!(bootloader_in_place(flash, &settings, &LAYOUT).unwrap());
    }

    #[test]
    fn completed_swap_is_a_no_op() {
        let settings = staged_settings();
        let mut flash = staged_flash(&settings);
        flash.load(LAYOUT.softdevice_start, &pattern(SD_SIZE, 1));
        flash.load(LAYOUT.bootloader_start, &pattern(BL_SIZE, 2));

        let queue = EventQueue::new();
        let mut bl = bootloader(flash, &queue);
        let mut mover = CountingMover::default();
        let mut delay = NoDelay::default();

        bl.advance_pending_swap(&mut mover, &mut delay).unwrap();

        assert!(mover.moves.is_empty());
        assert_eq!(delay.total_ns, 0);
    }

    #[test]
    fn rerun_after_an_interrupted_swap_finishes_it() {
        let settings = staged_settings();
        let queue = EventQueue::new();
        let mut bl = bootloader(staged_flash(&settings), &queue);
        let mut delay = NoDelay::default();

        // First attempt dies after the SoftDevice move.
        let mut interrupted = CountingMover { skip_bootloader: true, ..Default::default() };
        assert_eq!(
            bl.advance_pending_swap(&mut interrupted, &mut delay),
            Err(Error::BootloaderInvalid)
        );

        let mut mover = CountingMover::default();
        bl.advance_pending_swap(&mut mover, &mut delay).unwrap();
        assert_eq!(mover.moves.len(), 2);
        assert!(bootloader_in_place(bl.flash(), &settings, &LAYOUT).unwrap());

        let mut idle = CountingMover::default();
        bl.advance_pending_swap(&mut idle, &mut delay).unwrap();
        assert!(idle.moves.is_empty());
    }

    #[test]
    fn softdevice_mismatch_after_the_move_is_fatal() {
        struct BrokenMover;
        impl ImageMover<RamFlash> for BrokenMover {
            fn move_softdevice(&mut self, _: &mut RamFlash, _: u32, _: u32, _: u32) -> Result<(), Error> {
                Ok(())
            }
            fn move_bootloader(&mut self, _: &mut RamFlash, _: u32, _: u32, _: u32) -> Result<(), Error> {
                panic!("bootloader moved after a bad SoftDevice");
            }
        }

        let settings = staged_settings();
        let queue = EventQueue::new();
        let mut bl = bootloader(staged_flash(&settings), &queue);

        assert_eq!(
            bl.advance_pending_swap(&mut BrokenMover, &mut NoDelay::default()),
            Err(Error::SoftDeviceInvalid)
        );
    }

    #[test]
    fn bootloader_only_update_skips_the_softdevice() {
        let settings = BootloaderSettings {
            bank_0: Bank0::ValidApp,
            bank_1: Bank1::ValidBootloader,
            sd_image_size: 0,
            sd_image_start: 0,
            ..staged_settings()
        };
        let queue = EventQueue::new();
        let mut bl = bootloader(staged_flash(&settings), &queue);
        let mut mover = CountingMover::default();

        assert!(bl.sd_update_in_progress());
        bl.advance_pending_swap(&mut mover, &mut NoDelay::default()).unwrap();

        assert_eq!(mover.moves, [(LAYOUT.app_start, LAYOUT.bootloader_start, BL_SIZE)]);
    }

    #[test]
    fn copy_pads_partial_writes_and_rejects_unsafe_overlap() {
        let mut flash = RamFlash::filled(0x00);
        let data = pattern(0x1003, 9);
        flash.load(0x4000, &data);

        FlashMover::copy(&mut flash, 0x4000, 0x1000, 0x1003).unwrap();
        assert_eq!(&flash.bytes()[0x1000..0x2003], &data[..]);
        assert_eq!(flash.bytes()[0x2003], 0xFF);

        assert_eq!(FlashMover::copy(&mut flash, 0x1000, 0x2000, 0x2000), Err(Error::Layout));
        assert_eq!(FlashMover::copy(&mut flash, 0x1800, 0x1000, 0x1000), Err(Error::Layout));
        assert_eq!(FlashMover::copy(&mut flash, 0x3000, 0x1010, 0x10), Err(Error::Layout));
    }
}
