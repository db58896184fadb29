//! Logging macros for the bootloader core.
//!
//! With the `nrf52832` feature every line goes out over RTT. Host builds only
//! type-check the arguments.

#[cfg(feature = "nrf52832")]
macro_rules! emit {
    ($tag:literal, $($arg:tt)+) => {
        rtt_target::rprintln!("[{} {}] {}", $tag, module_path!(), format_args!($($arg)+))
    };
}

#[cfg(not(feature = "nrf52832"))]
macro_rules! emit {
    ($tag:literal, $($arg:tt)+) => {{
        let _ = format_args!($($arg)+);
    }};
}

macro_rules! info {
    ($($arg:tt)+) => {
        emit!("INFO", $($arg)+)
    };
}

macro_rules! warn {
    ($($arg:tt)+) => {
        emit!("WARN", $($arg)+)
    };
}

macro_rules! error {
    ($($arg:tt)+) => {
        emit!("ERROR", $($arg)+)
    };
}
