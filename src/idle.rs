//! The idle/ISR protocol that toggles each CPU's implicit `CPU_FREQ_MAX`
//! lock as the scheduler enters and leaves idle (spec.md §4.5).
//!
//! Pure state transitions over [`CoreState`] and [`ArbiterState`], in the
//! same style as [`crate::arbiter`] and [`crate::switch`]; the caller
//! ([`crate::manager::PowerManager`]) holds the switch lock across the call
//! and drives any resulting mode recompute itself.

use crate::arbiter::ArbiterState;
use crate::cpu::CoreState;
use crate::mode::PowerMode;

/// Called when the scheduler's idle loop is entered on this CPU. A no-op if
/// the CPU is already marked idle (the hook is not re-entrant against
/// itself). Releasing the implicit lock feeds an `UNLOCK(CPU_MAX)` into the
/// arbiter; returns `true` iff that release demands a mode recompute.
pub(crate) fn on_idle_enter(core: &mut CoreState, arbiter: &mut ArbiterState) -> bool {
    if core.core_idle {
        return false;
    }
    core.core_idle = true;
    core.rtos_lock_held = false;
    arbiter.unlock(PowerMode::CpuMax)
}

/// Called at the first instruction of any ISR on this CPU, after any pending
/// tick-compare update has already been drained by
/// [`crate::tick::TickCompensator::service_pending`]. A no-op if the CPU
/// wasn't idle. Re-acquiring the implicit lock feeds a `LOCK(CPU_MAX)` into
/// the arbiter, restoring full speed; returns `true` iff that acquire
/// demands a mode recompute.
pub(crate) fn on_isr_entry(core: &mut CoreState, arbiter: &mut ArbiterState) -> bool {
    if !core.core_idle {
        return false;
    }
    core.core_idle = false;
    core.rtos_lock_held = true;
    arbiter.lock(PowerMode::CpuMax)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_enter_releases_implicit_lock_once() {
        let mut core = CoreState::boot();
        let mut arbiter = ArbiterState::new();
        arbiter.lock(PowerMode::CpuMax); // boot acquire, mirrors impl_init

        assert!(on_idle_enter(&mut core, &mut arbiter));
        assert!(core.core_idle);
        assert!(!core.rtos_lock_held);
        assert_eq!(arbiter.mode_mask() & PowerMode::CpuMax.bit(), 0);

        // Re-entering idle while already idle does nothing further.
        assert!(!on_idle_enter(&mut core, &mut arbiter));
    }

    #[test]
    fn isr_entry_reacquires_implicit_lock_once() {
        let mut core = CoreState::boot();
        let mut arbiter = ArbiterState::new();
        arbiter.lock(PowerMode::CpuMax);
        on_idle_enter(&mut core, &mut arbiter);

        assert!(on_isr_entry(&mut core, &mut arbiter));
        assert!(!core.core_idle);
        assert!(core.rtos_lock_held);
        assert_ne!(arbiter.mode_mask() & PowerMode::CpuMax.bit(), 0);

        // An ISR firing while not idle leaves the lock state untouched.
        assert!(!on_isr_entry(&mut core, &mut arbiter));
    }

    #[test]
    fn concurrent_lock_holder_suppresses_recompute_on_idle_release() {
        let mut core = CoreState::boot();
        let mut arbiter = ArbiterState::new();
        arbiter.lock(PowerMode::CpuMax); // boot acquire
        arbiter.lock(PowerMode::CpuMax); // some other task's explicit lock

        // Releasing the implicit lock still leaves one holder, so no
        // recompute is needed.
        assert!(!on_idle_enter(&mut core, &mut arbiter));
        assert_ne!(arbiter.mode_mask() & PowerMode::CpuMax.bit(), 0);
    }
}
