#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod boot;
pub mod config;
pub mod error;
pub mod event;
pub mod event_loop;
pub mod launch;
pub mod processor;
pub mod settings;
pub mod store;
pub mod swap;
pub mod transport;
pub mod validator;

#[cfg(feature = "nrf52832")]
pub mod drivers;

#[cfg(test)]
mod test_support;

pub use config::{Config, FlashLayout};
pub use error::Error;
pub use event::{EventQueue, Message, RawUpdateStatus, RunState, UpdateStatusEvent};
pub use processor::Bootloader;
pub use settings::{Bank0, Bank1, BootloaderSettings};
