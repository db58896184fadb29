mod internal;

pub use internal::InternalFlash;
