//! Error kinds returned by the core's fallible entry points.

use core::fmt;

/// Errors returned by [`crate::manager::PowerManager::configure`].
///
/// `D` is the sleep sequencer's own domain error type, propagated verbatim
/// when `SleepSequencer::configure` fails (spec.md §7: `DOMAIN_ERROR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PmError<D> {
    /// Configuration values were out of range or mutually inconsistent.
    InvalidArg,
    /// Power management was compiled out (construction-time
    /// [`crate::config::PmCapability::Disabled`]).
    NotSupported,
    /// Propagated from the sleep sequencer.
    DomainError(D),
}

impl<D: fmt::Display> fmt::Display for PmError<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PmError::InvalidArg => write!(f, "invalid power management configuration"),
            PmError::NotSupported => write!(f, "power management is not supported"),
            PmError::DomainError(inner) => write!(f, "sleep sequencer error: {}", inner),
        }
    }
}

#[cfg(feature = "std")]
impl<D: fmt::Debug + fmt::Display> std::error::Error for PmError<D> {}
