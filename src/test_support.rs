//! Host-side stand-ins for the hardware the core talks to.

extern crate std;

use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};
use fugit::MillisDurationU32;

use crate::config::{Config, FlashLayout};
use crate::error::Error;
use crate::event::{EventQueue, Message};
use crate::event_loop::Platform;
use crate::launch::Cpu;
use crate::transport::Transport;

/// Small layout that fits in a `RamFlash`.
pub const LAYOUT: FlashLayout = FlashLayout {
    softdevice_start: 0x1000,
    app_start: 0x8000,
    bootloader_start: 0x1C000,
    settings_address: 0x1F000,
    mbr_params_address: 0x1E000,
};

pub fn config() -> Config {
    Config { layout: LAYOUT, ..Config::NRF52832 }
}

/// NOR flash in RAM: erase sets bytes to 0xFF, writes can only clear bits.
pub struct RamFlash {
    data: Vec<u8>,
    fail_writes: bool,
    pub erases: usize,
}

impl RamFlash {
    pub const SIZE: usize = 0x20000;
    pub const PAGE: u32 = 0x1000;

    pub fn new() -> Self {
        Self::filled(0xFF)
    }

    pub fn filled(byte: u8) -> Self {
        RamFlash {
            data: vec![byte; Self::SIZE],
            fail_writes: false,
            erases: 0,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Put bytes in place without going through erase/write.
    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        let start = address as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl ErrorType for RamFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = Self::PAGE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        self.data[from as usize..to as usize].fill(0xFF);
        self.erases += 1;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        if self.fail_writes {
            return Err(NorFlashErrorKind::Other);
        }
        let start = offset as usize;
        for (cell, byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockTransport {
    pub started: usize,
    pub closed: usize,
    pub fail_close: bool,
}

impl Transport for MockTransport {
    fn update_start(&mut self) -> Result<(), Error> {
        self.started += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.closed += 1;
        if self.fail_close {
            Err(Error::Transport)
        } else {
            Ok(())
        }
    }
}

/// Platform that replays one scripted message per wakeup and records the
/// watchdog traffic.
pub struct ScriptedPlatform<'q> {
    queue: &'q EventQueue,
    script: Vec<Option<Message>>,
    pub watchdog_running: bool,
    pub waits: usize,
    /// Channels reloaded, one entry per loop pass that fed the dog.
    pub feeds: Vec<Vec<u8>>,
    pub armed: Option<MillisDurationU32>,
    pub usb_polls: usize,
}

impl<'q> ScriptedPlatform<'q> {
    const MAX_WAITS: usize = 64;

    pub fn new(queue: &'q EventQueue) -> Self {
        ScriptedPlatform {
            queue,
            script: Vec::new(),
            watchdog_running: false,
            waits: 0,
            feeds: Vec::new(),
            armed: None,
            usb_polls: 0,
        }
    }

    /// Messages delivered on successive wakeups; `None` is a spurious wakeup.
    pub fn script(mut self, script: Vec<Option<Message>>) -> Self {
        self.script = script;
        self.script.reverse();
        self
    }

    pub fn with_watchdog(mut self) -> Self {
        self.watchdog_running = true;
        self
    }
}

impl Platform for ScriptedPlatform<'_> {
    fn wait_for_event(&mut self) {
        self.waits += 1;
        assert!(self.waits < Self::MAX_WAITS, "event loop never reached a terminal state");
        if let Some(Some(message)) = self.script.pop() {
            self.queue.post(message).unwrap();
        }
    }

    fn watchdog_running(&self) -> bool {
        self.watchdog_running
    }

    fn watchdog_reload(&mut self, channel: u8) {
        if channel == 0 {
            self.feeds.push(Vec::new());
        }
        if let Some(pass) = self.feeds.last_mut() {
            pass.push(channel);
        }
    }

    fn arm_startup_timer(&mut self, timeout: MillisDurationU32) {
        self.armed = Some(timeout);
    }

    fn usb_task(&mut self) {
        self.usb_polls += 1;
    }
}

/// Platform with no interrupt source armed: WFE would never return, so any
/// request to sleep fails the test.
#[derive(Default)]
pub struct NoWakeSource {
    pub feeds: usize,
}

impl Platform for NoWakeSource {
    fn wait_for_event(&mut self) {
        panic!("asked to sleep with nothing armed to wake the core");
    }

    fn watchdog_running(&self) -> bool {
        true
    }

    fn watchdog_reload(&mut self, channel: u8) {
        if channel == 0 {
            self.feeds += 1;
        }
    }

    fn arm_startup_timer(&mut self, _timeout: MillisDurationU32) {
        panic!("no timer on this platform");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuCall {
    DisableSoftDevice,
    DisableIrq(u16),
    VectorTable(u32),
    Jump(u32),
}

/// CPU that records what the launch guard asks of it. `jump` panics, since
/// there is nowhere to go on the host.
pub struct RecordingCpu {
    pub enabled: [u32; 2],
    pub calls: Vec<CpuCall>,
}

impl RecordingCpu {
    pub fn new(enabled: [u32; 2]) -> Self {
        RecordingCpu { enabled, calls: Vec::new() }
    }
}

impl Cpu for RecordingCpu {
    fn disable_softdevice(&mut self) -> Result<(), Error> {
        self.calls.push(CpuCall::DisableSoftDevice);
        Ok(())
    }

    fn enabled_interrupts(&self) -> [u32; 2] {
        self.enabled
    }

    fn disable_interrupt(&mut self, irq: u16) {
        self.calls.push(CpuCall::DisableIrq(irq));
    }

    fn set_vector_table(&mut self, address: u32) -> Result<(), Error> {
        self.calls.push(CpuCall::VectorTable(address));
        Ok(())
    }

    unsafe fn jump(&mut self, address: u32) -> ! {
        self.calls.push(CpuCall::Jump(address));
        panic!("jumped to {:#x}", address);
    }
}

/// Delay that returns immediately and remembers how long it was asked for.
#[derive(Default)]
pub struct NoDelay {
    pub total_ns: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
