//! nRF52832 implementations of the core's hardware traits.

pub mod flash;
mod gpregret;
mod mbr;
mod platform;
mod uarte;

pub use gpregret::GpregretEntry;
pub use mbr::{MbrCpu, MbrMover};
pub use platform::{acknowledge_startup_timer, BoardPlatform};
pub use uarte::{on_uarte_interrupt, UarteTransport, RX_LEN};
