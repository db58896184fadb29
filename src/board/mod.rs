use nrf52_bootloader::transport::StartupTimeout;
use nrf52_bootloader::{Config, EventQueue};

pub mod tasks_impl;

pub const CONFIG: Config = Config::NRF52832;

/// Deferred work posted from interrupts, drained by `idle`.
pub static QUEUE: EventQueue = EventQueue::new();

pub static STARTUP_TIMEOUT: StartupTimeout = StartupTimeout::new();
