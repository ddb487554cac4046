//! Thin logging shims over `defmt`.
//!
//! Mirrors the opt-in shape of `n32g4xx-hal`'s `defmt` cargo feature: with the
//! feature enabled every macro forwards to the matching `defmt` macro, and
//! with it disabled the call sites compile away to nothing.

#[cfg(feature = "defmt")]
macro_rules! pm_debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}
#[cfg(not(feature = "defmt"))]
macro_rules! pm_debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(feature = "defmt")]
macro_rules! pm_warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}
#[cfg(not(feature = "defmt"))]
macro_rules! pm_warn {
    ($($arg:tt)*) => {{}};
}

#[cfg(feature = "defmt")]
macro_rules! pm_error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}
#[cfg(not(feature = "defmt"))]
macro_rules! pm_error {
    ($($arg:tt)*) => {{}};
}

pub(crate) use pm_debug;
pub(crate) use pm_error;
pub(crate) use pm_warn;

/// Logs a fatal-condition message then aborts the process.
///
/// Used for the conditions spec.md §7 lists as non-recoverable: an unlock of
/// an already-zero lock count, an out-of-range mode passed to
/// `impl_get_cpu_freq`, a cross-core compensator rendezvous timeout, or a
/// `ClockDriver` rejection of a previously accepted configuration. None of
/// these admit a recovery path, so unlike `PmError` they are not returned to
/// a caller.
macro_rules! fatal {
    ($($arg:tt)*) => {{
        $crate::log::pm_error!($($arg)*);
        panic!($($arg)*)
    }};
}

pub(crate) use fatal;
