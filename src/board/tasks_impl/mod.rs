mod idle;
mod init;
mod serial_packet;
mod startup_timeout;

pub use idle::idle;
pub use init::init;
pub use serial_packet::serial_packet;
pub use startup_timeout::startup_timeout;
