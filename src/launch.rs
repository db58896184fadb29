//! Handing the CPU over to the application.

use core::convert::Infallible;

use crate::error::Error;

/// Core and SoftDevice operations the launch needs.
pub trait Cpu {
    fn disable_softdevice(&mut self) -> Result<(), Error>;

    /// The NVIC enable words (ISER0, ISER1).
    fn enabled_interrupts(&self) -> [u32; 2];

    fn disable_interrupt(&mut self, irq: u16);

    /// Point interrupt forwarding at the image at `address`.
    fn set_vector_table(&mut self, address: u32) -> Result<(), Error>;

    /// Load SP and PC from the vector table at `address` and branch.
    ///
    /// # Safety
    ///
    /// `address` must hold a valid vector table of an image that is allowed
    /// to take over the chip.
    unsafe fn jump(&mut self, address: u32) -> !;
}

/// Interrupt lines that are enabled in `words`, limited to the first
/// `irq_count` lines.
pub fn enabled_lines(words: [u32; 2], irq_count: u16) -> impl Iterator<Item = u16> {
    (0..irq_count.min(64)).filter(move |&irq| words[usize::from(irq / 32)] & (1 << (irq % 32)) != 0)
}

/// Shut the bootloader down and jump to the application at `address`.
///
/// Only comes back if the SoftDevice or the vector table refuse; past that
/// point the jump cannot fail.
///
/// # Safety
///
/// The image at `address` must already have passed validation.
pub unsafe fn start_application<C: Cpu>(
    cpu: &mut C,
    address: u32,
    irq_count: u16,
) -> Result<Infallible, Error> {
    info!("starting application at {:#x}", address);

    cpu.disable_softdevice()?;

    for irq in enabled_lines(cpu.enabled_interrupts(), irq_count) {
        cpu.disable_interrupt(irq);
    }

    cpu.set_vector_table(address)?;

    cpu.jump(address)
}
